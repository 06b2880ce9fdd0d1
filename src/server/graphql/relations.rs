//! Relationship fields
//!
//! To-one fields load by foreign key. To-many fields ask the owning service
//! for the related ids, then resolve them through the loader in one batch;
//! ids whose record is hidden are dropped from the list.

use super::{loaders, services};
use crate::services::category::CategoryStats;
use crate::services::continent::ContinentStats;
use crate::services::country::CountryStats;
use crate::services::destination::DestinationStats;
use crate::services::loaders::{load_optional, load_related};
use crate::services::user::UserStats;
use crate::services::{
    Category, Continent, Country, Destination, DestinationType, GlobalStats, Highlight,
    StatsPeriod, User, Visit,
};
use async_graphql::{ComplexObject, Context, Result, ResultExt};

#[ComplexObject]
impl Continent {
    async fn countries(&self, ctx: &Context<'_>) -> Result<Vec<Country>> {
        let ids = services(ctx)?
            .countries
            .ids_by_continent(self.id)
            .await
            .extend()?;
        load_related(&loaders(ctx)?.countries, &ids).await.extend()
    }

    async fn stats(
        &self,
        ctx: &Context<'_>,
        period: Option<StatsPeriod>,
    ) -> Result<ContinentStats> {
        services(ctx)?
            .continent_stats(self.id, period.unwrap_or_default())
            .await
            .extend()
    }
}

#[ComplexObject]
impl Country {
    async fn continent(&self, ctx: &Context<'_>) -> Result<Option<Continent>> {
        load_optional(&loaders(ctx)?.continents, Some(self.continent_id))
            .await
            .extend()
    }

    async fn destinations(&self, ctx: &Context<'_>) -> Result<Vec<Destination>> {
        let ids = services(ctx)?
            .destinations
            .ids_by_country(self.id)
            .await
            .extend()?;
        load_related(&loaders(ctx)?.destinations, &ids).await.extend()
    }

    async fn stats(&self, ctx: &Context<'_>, period: Option<StatsPeriod>) -> Result<CountryStats> {
        services(ctx)?
            .country_stats(self.id, period.unwrap_or_default())
            .await
            .extend()
    }
}

#[ComplexObject]
impl Destination {
    async fn country(&self, ctx: &Context<'_>) -> Result<Option<Country>> {
        load_optional(&loaders(ctx)?.countries, Some(self.country_id))
            .await
            .extend()
    }

    #[graphql(name = "type")]
    async fn destination_type(&self, ctx: &Context<'_>) -> Result<Option<DestinationType>> {
        load_optional(&loaders(ctx)?.destination_types, self.type_id)
            .await
            .extend()
    }

    async fn highlights(&self, ctx: &Context<'_>) -> Result<Vec<Highlight>> {
        let ids = services(ctx)?
            .highlights
            .ids_by_destination(self.id)
            .await
            .extend()?;
        load_related(&loaders(ctx)?.highlights, &ids).await.extend()
    }

    async fn categories(&self, ctx: &Context<'_>) -> Result<Vec<Category>> {
        let ids = services(ctx)?
            .categories
            .ids_by_destination(self.id)
            .await
            .extend()?;
        load_related(&loaders(ctx)?.categories, &ids).await.extend()
    }

    async fn visits(&self, ctx: &Context<'_>) -> Result<Vec<Visit>> {
        let ids = services(ctx)?
            .visits
            .ids_by_destination(self.id)
            .await
            .extend()?;
        load_related(&loaders(ctx)?.visits, &ids).await.extend()
    }

    async fn stats(
        &self,
        ctx: &Context<'_>,
        period: Option<StatsPeriod>,
    ) -> Result<DestinationStats> {
        services(ctx)?
            .destination_stats(self.id, period.unwrap_or_default())
            .await
            .extend()
    }
}

#[ComplexObject]
impl DestinationType {
    async fn destinations(&self, ctx: &Context<'_>) -> Result<Vec<Destination>> {
        let ids = services(ctx)?
            .destinations
            .ids_by_type(self.id)
            .await
            .extend()?;
        load_related(&loaders(ctx)?.destinations, &ids).await.extend()
    }
}

#[ComplexObject]
impl Highlight {
    async fn destination(&self, ctx: &Context<'_>) -> Result<Option<Destination>> {
        load_optional(&loaders(ctx)?.destinations, Some(self.destination_id))
            .await
            .extend()
    }
}

#[ComplexObject]
impl Category {
    async fn destinations(&self, ctx: &Context<'_>) -> Result<Vec<Destination>> {
        let ids = services(ctx)?
            .destinations
            .ids_by_category(self.id)
            .await
            .extend()?;
        load_related(&loaders(ctx)?.destinations, &ids).await.extend()
    }

    async fn stats(&self, ctx: &Context<'_>, period: Option<StatsPeriod>) -> Result<CategoryStats> {
        services(ctx)?
            .category_stats(self.id, period.unwrap_or_default())
            .await
            .extend()
    }
}

#[ComplexObject]
impl User {
    async fn visits(&self, ctx: &Context<'_>) -> Result<Vec<Visit>> {
        let ids = services(ctx)?.visits.ids_by_user(self.id).await.extend()?;
        load_related(&loaders(ctx)?.visits, &ids).await.extend()
    }

    async fn stats(&self, ctx: &Context<'_>, period: Option<StatsPeriod>) -> Result<UserStats> {
        services(ctx)?
            .user_stats(self.id, period.unwrap_or_default())
            .await
            .extend()
    }
}

#[ComplexObject]
impl Visit {
    async fn user(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        load_optional(&loaders(ctx)?.users, Some(self.user_id))
            .await
            .extend()
    }

    async fn destination(&self, ctx: &Context<'_>) -> Result<Option<Destination>> {
        load_optional(&loaders(ctx)?.destinations, Some(self.destination_id))
            .await
            .extend()
    }
}

#[ComplexObject]
impl GlobalStats {
    async fn most_visited_destination(&self, ctx: &Context<'_>) -> Result<Option<Destination>> {
        load_optional(&loaders(ctx)?.destinations, self.most_visited_destination_id)
            .await
            .extend()
    }

    async fn most_active_user(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        load_optional(&loaders(ctx)?.users, self.most_active_user_id)
            .await
            .extend()
    }
}
