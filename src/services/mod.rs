//! Entity services
//!
//! Every entity kind gets an [`EntityService`] over its record type. The
//! generic part (lookup, filtered listing, create/update/delete) lives here;
//! entity-specific lookups and statistics live next to each record in its own
//! module as inherent `impl EntityService<Record>` blocks. Period histograms
//! and site-wide totals live in [`statistics`].

pub mod category;
pub mod continent;
pub mod country;
pub mod destination;
pub mod destination_type;
pub mod highlight;
pub mod language;
pub mod loaders;
pub mod statistics;
pub mod user;
pub mod visit;

use crate::core::error::{ApiError, StorageError};
use crate::core::query::{Assignments, BuiltQuery, Filters, OrderBy, Page, Pagination, SqlParam};
use crate::core::query_builder;
use crate::core::record::Record;
use crate::storage::postgres::Database;
use regex::Regex;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::LazyLock;

pub use category::{Category, CategoryFilters, CategoryService};
pub use continent::{Continent, ContinentFilters, ContinentService};
pub use country::{Country, CountryFilters, CountryService};
pub use destination::{Destination, DestinationFilters, DestinationService};
pub use destination_type::{DestinationType, DestinationTypeService};
pub use highlight::{Highlight, HighlightFilters, HighlightService};
pub use language::{Language, LanguageService};
pub use loaders::{EntityBatch, Loaders};
pub use statistics::{GlobalStats, StatisticsService, StatsPeriod, VisitScope};
pub use user::{User, UserFilters, UserService};
pub use visit::{Visit, VisitFilters, VisitService};

/// Lowercase, dash-separated identifiers used in URLs
pub(crate) static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap());

/// Orderings shared by every table that has `name` and `created_at`
pub(crate) const NAMED_ORDERS: &[(OrderBy, &str)] = &[
    (OrderBy::NameAsc, "name ASC, id ASC"),
    (OrderBy::NameDesc, "name DESC, id DESC"),
    (OrderBy::CreatedAtAsc, "created_at ASC, id ASC"),
    (OrderBy::CreatedAtDesc, "created_at DESC, id DESC"),
    (OrderBy::RecentlyAdded, "created_at DESC, id DESC"),
];

/// Conversion of a typed GraphQL filter input into generic [`Filters`]
pub trait IntoFilters {
    fn to_filters(&self) -> Filters;
}

impl<F: IntoFilters> IntoFilters for Option<F> {
    fn to_filters(&self) -> Filters {
        self.as_ref().map(IntoFilters::to_filters).unwrap_or_default()
    }
}

/// CRUD and lookup operations for one record type
pub struct EntityService<T> {
    db: Database,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for EntityService<T> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            _record: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for EntityService<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityService")
            .field("record", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: Record> EntityService<T> {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            _record: PhantomData,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Fetch one visible record by primary key
    pub async fn find_by_id(&self, id: i64) -> Result<Option<T>, ApiError> {
        let spec = T::table();
        let query = query_builder::select_eq(spec, spec.key_column, id);
        Ok(self.db.fetch_optional(&query).await?)
    }

    /// Like [`find_by_id`](Self::find_by_id) but absence is an error
    pub async fn get(&self, id: i64) -> Result<T, ApiError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found(T::ENTITY_TYPE, id))
    }

    /// Fetch every visible record among `ids`, keyed by id.
    ///
    /// Missing and hidden ids are simply absent from the map. This is the
    /// batch function behind the loaders.
    pub async fn find_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, T>, StorageError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let spec = T::table();
        let query = query_builder::select_by_keys(spec, spec.key_column, ids);
        let rows: Vec<T> = self.db.fetch_all(&query).await?;
        Ok(rows.into_iter().map(|row| (row.id(), row)).collect())
    }

    /// Filtered, ordered, paginated listing with the unpaginated total
    pub async fn find_all(
        &self,
        filters: &Filters,
        pagination: Option<Pagination>,
        order_by: Option<OrderBy>,
    ) -> Result<Page<T>, ApiError> {
        let spec = T::table();
        let data = query_builder::select(spec, filters, pagination, order_by)?;
        let count = query_builder::count(spec, filters)?;

        let (items, total) = futures::try_join!(
            self.db.fetch_all::<T>(&data),
            self.db.fetch_count(&count)
        )?;

        tracing::debug!(
            entity_type = T::ENTITY_TYPE,
            returned = items.len(),
            total,
            "listed records"
        );
        Ok(Page::new(items, total, pagination))
    }

    /// Number of visible records matching `filters`
    pub async fn count(&self, filters: &Filters) -> Result<i64, ApiError> {
        let query = query_builder::count(T::table(), filters)?;
        Ok(self.db.fetch_count(&query).await?)
    }

    pub async fn create(&self, values: &Assignments) -> Result<T, ApiError> {
        let query = query_builder::insert(T::table(), values)?;
        let created: Option<T> = self.db.fetch_optional(&query).await?;
        let created = created.ok_or_else(|| {
            ApiError::Internal(format!("insert into {} returned no row", T::table().table))
        })?;
        tracing::info!(entity_type = T::ENTITY_TYPE, id = created.id(), "created");
        Ok(created)
    }

    /// Update a visible record; `NotFound` when it does not exist or is hidden
    pub async fn update(&self, id: i64, values: &Assignments) -> Result<T, ApiError> {
        if values.is_empty() {
            return self.get(id).await;
        }
        let query = query_builder::update(T::table(), id, values)?;
        let updated: Option<T> = self.db.fetch_optional(&query).await?;
        let updated = updated.ok_or_else(|| ApiError::not_found(T::ENTITY_TYPE, id))?;
        tracing::info!(entity_type = T::ENTITY_TYPE, id, "updated");
        Ok(updated)
    }

    /// Hide (or delete) a record. Returns whether anything changed.
    pub async fn delete(&self, id: i64) -> Result<bool, ApiError> {
        let query = query_builder::delete(T::table(), id);
        let affected = self.db.execute(&query).await?;
        if affected > 0 {
            tracing::info!(entity_type = T::ENTITY_TYPE, id, "deleted");
        }
        Ok(affected > 0)
    }

    /// Visible record whose `column` equals `value` exactly
    pub(crate) async fn find_one_by(
        &self,
        column: &str,
        value: impl Into<SqlParam>,
    ) -> Result<Option<T>, ApiError> {
        let query = query_builder::select_eq(T::table(), column, value);
        Ok(self.db.fetch_optional(&query).await?)
    }

    /// Ids of visible records whose `column` equals `value`
    pub(crate) async fn ids_where(
        &self,
        column: &str,
        value: impl Into<SqlParam>,
    ) -> Result<Vec<i64>, ApiError> {
        let query = query_builder::select_keys(T::table(), column, value);
        self.fetch_ids(&query).await
    }

    /// Run a query whose single column is an id
    pub(crate) async fn fetch_ids(&self, query: &BuiltQuery) -> Result<Vec<i64>, ApiError> {
        let rows: Vec<(i64,)> = self.db.fetch_all(query).await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

/// Every service, built over one shared pool
#[derive(Clone, Debug)]
pub struct Services {
    pub continents: ContinentService,
    pub countries: CountryService,
    pub destinations: DestinationService,
    pub destination_types: DestinationTypeService,
    pub highlights: HighlightService,
    pub languages: LanguageService,
    pub users: UserService,
    pub categories: CategoryService,
    pub visits: VisitService,
    pub statistics: StatisticsService,
}

impl Services {
    pub fn new(db: Database) -> Self {
        Self {
            continents: EntityService::new(db.clone()),
            countries: EntityService::new(db.clone()),
            destinations: EntityService::new(db.clone()),
            destination_types: EntityService::new(db.clone()),
            highlights: EntityService::new(db.clone()),
            languages: EntityService::new(db.clone()),
            users: EntityService::new(db.clone()),
            categories: EntityService::new(db.clone()),
            visits: EntityService::new(db.clone()),
            statistics: StatisticsService::new(db),
        }
    }
}
