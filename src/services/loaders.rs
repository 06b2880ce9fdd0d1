//! Per-request loader registry
//!
//! One [`Loaders`] value is built for every GraphQL request and placed in the
//! request data. Relationship resolvers go through it instead of calling the
//! services directly, so sibling fields that need the same kind of record
//! share one batched query.

use crate::core::error::{ApiError, LoadError, StorageError};
use crate::core::loader::{BatchFn, Loader, LoaderOptions};
use crate::core::record::Record;
use crate::services::{
    Category, Continent, Country, Destination, DestinationType, EntityService, Highlight,
    Language, User, Visit,
};
use crate::storage::postgres::Database;
use async_trait::async_trait;
use std::collections::HashMap;

/// Batch function loading records of `T` by primary key
pub struct EntityBatch<T> {
    service: EntityService<T>,
}

impl<T: Record> EntityBatch<T> {
    pub fn new(db: Database) -> Self {
        Self {
            service: EntityService::new(db),
        }
    }
}

#[async_trait]
impl<T: Record> BatchFn<i64, T> for EntityBatch<T> {
    async fn load(&self, keys: &[i64]) -> Result<HashMap<i64, T>, StorageError> {
        self.service.find_by_ids(keys).await
    }
}

fn entity_loader<T: Record>(
    name: &'static str,
    db: &Database,
    options: LoaderOptions,
) -> Loader<i64, T> {
    Loader::new(name, T::ENTITY_TYPE, EntityBatch::<T>::new(db.clone()), options)
}

/// One loader per entity kind, scoped to a single request
#[derive(Clone, Debug)]
pub struct Loaders {
    pub continents: Loader<i64, Continent>,
    pub countries: Loader<i64, Country>,
    pub destinations: Loader<i64, Destination>,
    pub destination_types: Loader<i64, DestinationType>,
    pub highlights: Loader<i64, Highlight>,
    pub languages: Loader<i64, Language>,
    pub users: Loader<i64, User>,
    pub categories: Loader<i64, Category>,
    pub visits: Loader<i64, Visit>,
}

impl Loaders {
    pub fn new(db: &Database, options: LoaderOptions) -> Self {
        Self {
            continents: entity_loader("continents", db, options),
            countries: entity_loader("countries", db, options),
            destinations: entity_loader("destinations", db, options),
            destination_types: entity_loader("destination_types", db, options),
            highlights: entity_loader("highlights", db, options),
            languages: entity_loader("languages", db, options),
            users: entity_loader("users", db, options),
            categories: entity_loader("categories", db, options),
            visits: entity_loader("visits", db, options),
        }
    }

    /// Total batch queries issued so far in this request
    pub fn dispatch_count(&self) -> usize {
        self.continents.dispatch_count()
            + self.countries.dispatch_count()
            + self.destinations.dispatch_count()
            + self.destination_types.dispatch_count()
            + self.highlights.dispatch_count()
            + self.languages.dispatch_count()
            + self.users.dispatch_count()
            + self.categories.dispatch_count()
            + self.visits.dispatch_count()
    }
}

/// Resolve `ids` through `loader` for a to-many field.
///
/// Ids whose record is missing or hidden are skipped; any other failure fails
/// the field.
pub async fn load_related<T>(loader: &Loader<i64, T>, ids: &[i64]) -> Result<Vec<T>, ApiError>
where
    T: Clone + Send + Sync + 'static,
{
    let mut related = Vec::with_capacity(ids.len());
    for result in loader.load_many(ids).await {
        match result {
            Ok(value) => related.push(value),
            Err(LoadError::NotFound { .. }) => continue,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(related)
}

/// Resolve an optional foreign key; a dangling or hidden target reads as null
pub async fn load_optional<T>(
    loader: &Loader<i64, T>,
    id: Option<i64>,
) -> Result<Option<T>, ApiError>
where
    T: Clone + Send + Sync + 'static,
{
    let Some(id) = id else {
        return Ok(None);
    };
    match loader.load(id).await {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err.into()),
    }
}
