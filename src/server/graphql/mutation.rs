//! Mutation root
//!
//! Inputs are validated before anything reaches storage. Writes keep the
//! request's loaders coherent: updated records are primed, deleted ones
//! evicted.

use super::{loaders, services};
use crate::core::error::ApiError;
use crate::core::loader::Loader;
use crate::services::category::{CreateCategoryInput, UpdateCategoryInput};
use crate::services::continent::{CreateContinentInput, UpdateContinentInput};
use crate::services::country::{CreateCountryInput, UpdateCountryInput};
use crate::services::destination::{CreateDestinationInput, UpdateDestinationInput};
use crate::services::visit::{CreateVisitInput, UpdateVisitInput};
use crate::services::{Category, Continent, Country, Destination, Visit};
use async_graphql::{Context, Object, Result, ResultExt};
use validator::Validate;

fn validate(input: &impl Validate) -> Result<()> {
    input.validate().map_err(ApiError::from).extend()
}

/// Replace whatever the loader holds for `id` with the fresh record
fn refresh<T>(loader: &Loader<i64, T>, id: i64, record: &T)
where
    T: Clone + Send + Sync + 'static,
{
    loader.clear(&id);
    loader.prime(id, record.clone());
}

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    // --- continents -----------------------------------------------------

    async fn create_continent(
        &self,
        ctx: &Context<'_>,
        input: CreateContinentInput,
    ) -> Result<Continent> {
        validate(&input)?;
        let created = services(ctx)?
            .continents
            .create(&input.assignments())
            .await
            .extend()?;
        loaders(ctx)?.continents.prime(created.id, created.clone());
        Ok(created)
    }

    async fn update_continent(
        &self,
        ctx: &Context<'_>,
        id: i64,
        input: UpdateContinentInput,
    ) -> Result<Continent> {
        validate(&input)?;
        let updated = services(ctx)?
            .continents
            .update(id, &input.assignments())
            .await
            .extend()?;
        refresh(&loaders(ctx)?.continents, id, &updated);
        Ok(updated)
    }

    async fn delete_continent(&self, ctx: &Context<'_>, id: i64) -> Result<bool> {
        let deleted = services(ctx)?.continents.delete(id).await.extend()?;
        loaders(ctx)?.continents.clear(&id);
        Ok(deleted)
    }

    // --- countries ------------------------------------------------------

    async fn create_country(&self, ctx: &Context<'_>, input: CreateCountryInput) -> Result<Country> {
        validate(&input)?;
        let created = services(ctx)?
            .countries
            .create(&input.assignments())
            .await
            .extend()?;
        loaders(ctx)?.countries.prime(created.id, created.clone());
        Ok(created)
    }

    async fn update_country(
        &self,
        ctx: &Context<'_>,
        id: i64,
        input: UpdateCountryInput,
    ) -> Result<Country> {
        validate(&input)?;
        let updated = services(ctx)?
            .countries
            .update(id, &input.assignments())
            .await
            .extend()?;
        refresh(&loaders(ctx)?.countries, id, &updated);
        Ok(updated)
    }

    async fn delete_country(&self, ctx: &Context<'_>, id: i64) -> Result<bool> {
        let deleted = services(ctx)?.countries.delete(id).await.extend()?;
        loaders(ctx)?.countries.clear(&id);
        Ok(deleted)
    }

    // --- destinations ---------------------------------------------------

    /// Creates the destination and links `categoryIds` atomically
    async fn create_destination(
        &self,
        ctx: &Context<'_>,
        input: CreateDestinationInput,
    ) -> Result<Destination> {
        validate(&input)?;
        let created = services(ctx)?
            .destinations
            .create_with_categories(&input)
            .await
            .extend()?;
        loaders(ctx)?.destinations.prime(created.id, created.clone());
        Ok(created)
    }

    async fn update_destination(
        &self,
        ctx: &Context<'_>,
        id: i64,
        input: UpdateDestinationInput,
    ) -> Result<Destination> {
        validate(&input)?;
        let updated = services(ctx)?
            .destinations
            .update_with_categories(id, &input)
            .await
            .extend()?;
        refresh(&loaders(ctx)?.destinations, id, &updated);
        Ok(updated)
    }

    async fn delete_destination(&self, ctx: &Context<'_>, id: i64) -> Result<bool> {
        let deleted = services(ctx)?.destinations.delete(id).await.extend()?;
        loaders(ctx)?.destinations.clear(&id);
        Ok(deleted)
    }

    // --- visits ---------------------------------------------------------

    async fn create_visit(&self, ctx: &Context<'_>, input: CreateVisitInput) -> Result<Visit> {
        validate(&input)?;
        let created = services(ctx)?
            .visits
            .create(&input.assignments())
            .await
            .extend()?;
        loaders(ctx)?.visits.prime(created.id, created.clone());
        Ok(created)
    }

    async fn update_visit(
        &self,
        ctx: &Context<'_>,
        id: i64,
        input: UpdateVisitInput,
    ) -> Result<Visit> {
        validate(&input)?;
        let updated = services(ctx)?
            .visits
            .update(id, &input.assignments())
            .await
            .extend()?;
        refresh(&loaders(ctx)?.visits, id, &updated);
        Ok(updated)
    }

    async fn delete_visit(&self, ctx: &Context<'_>, id: i64) -> Result<bool> {
        let deleted = services(ctx)?.visits.delete(id).await.extend()?;
        loaders(ctx)?.visits.clear(&id);
        Ok(deleted)
    }

    // --- categories -----------------------------------------------------

    async fn create_category(
        &self,
        ctx: &Context<'_>,
        input: CreateCategoryInput,
    ) -> Result<Category> {
        validate(&input)?;
        let created = services(ctx)?
            .categories
            .create(&input.assignments())
            .await
            .extend()?;
        loaders(ctx)?.categories.prime(created.id, created.clone());
        Ok(created)
    }

    async fn update_category(
        &self,
        ctx: &Context<'_>,
        id: i64,
        input: UpdateCategoryInput,
    ) -> Result<Category> {
        validate(&input)?;
        let updated = services(ctx)?
            .categories
            .update(id, &input.assignments())
            .await
            .extend()?;
        refresh(&loaders(ctx)?.categories, id, &updated);
        Ok(updated)
    }

    async fn delete_category(&self, ctx: &Context<'_>, id: i64) -> Result<bool> {
        let deleted = services(ctx)?.categories.delete(id).await.extend()?;
        loaders(ctx)?.categories.clear(&id);
        Ok(deleted)
    }

    // --- highlights -----------------------------------------------------

    /// Returns the highlight's total view count
    async fn record_highlight_view(
        &self,
        ctx: &Context<'_>,
        highlight_id: i64,
        user_id: i64,
    ) -> Result<i64> {
        services(ctx)?
            .highlights
            .record_view(highlight_id, user_id)
            .await
            .extend()
    }
}
