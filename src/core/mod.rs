//! Core building blocks: errors, query building, batched loading

pub mod error;
pub mod loader;
pub mod query;
pub mod query_builder;
pub mod record;

pub use error::{ApiError, LoadError, QueryBuildError, StorageError};
pub use loader::{BatchFn, Loader, LoaderOptions};
pub use query::{Assignments, BuiltQuery, FilterValue, Filters, OrderBy, Page, Pagination, SqlParam};
pub use query_builder::TableSpec;
pub use record::Record;
