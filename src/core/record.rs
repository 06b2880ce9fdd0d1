//! Record trait: the typed boundary between rows and API values

use crate::core::query_builder::TableSpec;
use sqlx::FromRow;
use sqlx::postgres::PgRow;

/// A typed entity stored in one table.
///
/// Rows are mapped into records by `sqlx::FromRow`; the query builder and
/// loaders only see the [`TableSpec`] and the integer key, never the shape of
/// the record itself.
///
/// Implement it with [`impl_record!`](crate::impl_record).
pub trait Record: for<'r> FromRow<'r, PgRow> + Clone + Send + Sync + Unpin + 'static {
    /// Singular name used in errors and logs (e.g. "country")
    const ENTITY_TYPE: &'static str;

    /// Table description used to build queries for this record
    fn table() -> &'static TableSpec;

    /// Primary key of this record
    fn id(&self) -> i64;
}
