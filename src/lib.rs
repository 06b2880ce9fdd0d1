//! # murkylook
//!
//! GraphQL API over a relational travel-data model: continents, countries,
//! destinations, highlights, categories, users and their visits.
//!
//! ## Layers
//!
//! - [`core::query_builder`]: turns a filter map, pagination and an ordering
//!   token into parameterized SQL against a [`TableSpec`](core::TableSpec).
//! - [`core::loader`]: request-scoped batching loader. Keys requested while
//!   one response tree resolves are fetched with one query.
//! - [`services`]: one [`EntityService`](services::EntityService) per entity
//!   kind, plus the per-request [`Loaders`](services::Loaders) registry.
//! - [`server`]: axum router exposing the async-graphql schema.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use murkylook::prelude::*;
//!
//! let config = AppConfig::load(Some("config/default.yaml"))?;
//! let db = Database::connect(&config.database)?;
//! db.migrate().await?;
//!
//! let countries = CountryService::new(db.clone());
//! let page = countries
//!     .find_all(&Filters::new().with("search", "fr"), Some(Pagination::new(10, 0)), None)
//!     .await?;
//! ```

pub mod config;
pub mod core;
pub mod entities;
pub mod server;
pub mod services;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        ApiError, Assignments, BatchFn, BuiltQuery, FilterValue, Filters, LoadError, Loader,
        LoaderOptions, OrderBy, Page, Pagination, QueryBuildError, Record, SqlParam,
        StorageError, TableSpec, query_builder,
    };

    // === Macros ===
    pub use crate::{impl_record, impl_service};

    // === Services ===
    pub use crate::services::{
        Category, CategoryService, Continent, ContinentService, Country, CountryService,
        Destination, DestinationService, DestinationType, DestinationTypeService, EntityService,
        Highlight, HighlightService, IntoFilters, Language, LanguageService, Loaders, Services,
        User, UserService, Visit, VisitService,
    };

    // === Storage ===
    pub use crate::storage::Database;

    // === Config ===
    pub use crate::config::AppConfig;

    // === Server ===
    pub use crate::server::{AppSchema, AppState, build_router, build_schema, serve};

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
}
