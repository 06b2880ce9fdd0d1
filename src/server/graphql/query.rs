//! Query root

use super::types::PageObject;
use super::{loaders, services};
use crate::core::query::{Filters, OrderBy, Pagination};
use crate::services::category::CategoryStats;
use crate::services::continent::ContinentStats;
use crate::services::country::CountryStats;
use crate::services::destination::{DestinationStats, PopularScope};
use crate::services::loaders::{load_optional, load_related};
use crate::services::statistics::PeriodStat;
use crate::services::user::UserStats;
use crate::services::{
    Category, CategoryFilters, Continent, ContinentFilters, Country, CountryFilters, Destination,
    DestinationFilters, DestinationType, GlobalStats, Highlight, HighlightFilters, IntoFilters,
    Language, StatsPeriod, User, UserFilters, Visit, VisitFilters, VisitScope,
};
use async_graphql::{Context, Object, Result, ResultExt};

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    // --- continents -----------------------------------------------------

    async fn continents(
        &self,
        ctx: &Context<'_>,
        filter: Option<ContinentFilters>,
        pagination: Option<Pagination>,
        order_by: Option<OrderBy>,
    ) -> Result<PageObject<Continent>> {
        let page = services(ctx)?
            .continents
            .find_all(&filter.to_filters(), pagination, order_by)
            .await
            .extend()?;
        Ok(page.into())
    }

    async fn continent(&self, ctx: &Context<'_>, id: i64) -> Result<Option<Continent>> {
        load_optional(&loaders(ctx)?.continents, Some(id)).await.extend()
    }

    async fn continent_by_code(&self, ctx: &Context<'_>, code: String) -> Result<Option<Continent>> {
        services(ctx)?.continents.find_by_code(&code).await.extend()
    }

    async fn continent_stats(
        &self,
        ctx: &Context<'_>,
        id: i64,
        period: Option<StatsPeriod>,
    ) -> Result<ContinentStats> {
        services(ctx)?
            .continent_stats(id, period.unwrap_or_default())
            .await
            .extend()
    }

    async fn top_continents_by_visits(
        &self,
        ctx: &Context<'_>,
        #[graphql(default = 5, validator(minimum = 1, maximum = 100))] limit: i32,
    ) -> Result<Vec<Continent>> {
        let ids = services(ctx)?
            .continents
            .top_by_visits(limit.into())
            .await
            .extend()?;
        load_related(&loaders(ctx)?.continents, &ids).await.extend()
    }

    // --- countries ------------------------------------------------------

    async fn countries(
        &self,
        ctx: &Context<'_>,
        filter: Option<CountryFilters>,
        pagination: Option<Pagination>,
        order_by: Option<OrderBy>,
    ) -> Result<PageObject<Country>> {
        let page = services(ctx)?
            .countries
            .find_all(&filter.to_filters(), pagination, order_by)
            .await
            .extend()?;
        Ok(page.into())
    }

    async fn country(&self, ctx: &Context<'_>, id: i64) -> Result<Option<Country>> {
        load_optional(&loaders(ctx)?.countries, Some(id)).await.extend()
    }

    async fn country_by_iso_code(
        &self,
        ctx: &Context<'_>,
        iso_code: String,
    ) -> Result<Option<Country>> {
        services(ctx)?
            .countries
            .find_by_iso_code(&iso_code)
            .await
            .extend()
    }

    async fn country_stats(
        &self,
        ctx: &Context<'_>,
        id: i64,
        period: Option<StatsPeriod>,
    ) -> Result<CountryStats> {
        services(ctx)?
            .country_stats(id, period.unwrap_or_default())
            .await
            .extend()
    }

    async fn top_countries_by_visits(
        &self,
        ctx: &Context<'_>,
        continent_id: Option<i64>,
        #[graphql(default = 10, validator(minimum = 1, maximum = 100))] limit: i32,
    ) -> Result<Vec<Country>> {
        let ids = services(ctx)?
            .countries
            .top_by_visits(continent_id, limit.into())
            .await
            .extend()?;
        load_related(&loaders(ctx)?.countries, &ids).await.extend()
    }

    // --- destinations ---------------------------------------------------

    async fn destinations(
        &self,
        ctx: &Context<'_>,
        filter: Option<DestinationFilters>,
        pagination: Option<Pagination>,
        order_by: Option<OrderBy>,
    ) -> Result<PageObject<Destination>> {
        let page = services(ctx)?
            .destinations
            .find_all(&filter.to_filters(), pagination, order_by)
            .await
            .extend()?;
        Ok(page.into())
    }

    async fn destination(&self, ctx: &Context<'_>, id: i64) -> Result<Option<Destination>> {
        load_optional(&loaders(ctx)?.destinations, Some(id)).await.extend()
    }

    async fn destination_by_slug(
        &self,
        ctx: &Context<'_>,
        slug: String,
    ) -> Result<Option<Destination>> {
        services(ctx)?.destinations.find_by_slug(&slug).await.extend()
    }

    async fn destination_stats(
        &self,
        ctx: &Context<'_>,
        id: i64,
        period: Option<StatsPeriod>,
    ) -> Result<DestinationStats> {
        services(ctx)?
            .destination_stats(id, period.unwrap_or_default())
            .await
            .extend()
    }

    /// Ranked by visit count (70%) and average rating (30%)
    async fn popular_destinations(
        &self,
        ctx: &Context<'_>,
        category_id: Option<i64>,
        country_id: Option<i64>,
        continent_id: Option<i64>,
        #[graphql(default = 10, validator(minimum = 1, maximum = 100))] limit: i32,
    ) -> Result<Vec<Destination>> {
        let scope = PopularScope {
            category_id,
            country_id,
            continent_id,
        };
        let ids = services(ctx)?
            .destinations
            .popular(scope, limit.into())
            .await
            .extend()?;
        load_related(&loaders(ctx)?.destinations, &ids).await.extend()
    }

    async fn recently_visited_destinations(
        &self,
        ctx: &Context<'_>,
        #[graphql(default = 10, validator(minimum = 1, maximum = 100))] limit: i32,
    ) -> Result<Vec<Destination>> {
        let ids = services(ctx)?
            .destinations
            .recently_visited(limit.into())
            .await
            .extend()?;
        load_related(&loaders(ctx)?.destinations, &ids).await.extend()
    }

    /// Most visited within `period` (default: the last 30 days)
    async fn trending_destinations(
        &self,
        ctx: &Context<'_>,
        period: Option<StatsPeriod>,
        #[graphql(default = 10, validator(minimum = 1, maximum = 100))] limit: i32,
    ) -> Result<Vec<Destination>> {
        let period = period.unwrap_or(StatsPeriod::days(30));
        let ids = services(ctx)?
            .destinations
            .trending(period, limit.into())
            .await
            .extend()?;
        load_related(&loaders(ctx)?.destinations, &ids).await.extend()
    }

    async fn destination_types(&self, ctx: &Context<'_>) -> Result<Vec<DestinationType>> {
        let page = services(ctx)?
            .destination_types
            .find_all(&Default::default(), None, None)
            .await
            .extend()?;
        Ok(page.items)
    }

    async fn destination_type(
        &self,
        ctx: &Context<'_>,
        id: i64,
    ) -> Result<Option<DestinationType>> {
        load_optional(&loaders(ctx)?.destination_types, Some(id)).await.extend()
    }

    // --- highlights -----------------------------------------------------

    async fn highlights(
        &self,
        ctx: &Context<'_>,
        filter: Option<HighlightFilters>,
        pagination: Option<Pagination>,
        order_by: Option<OrderBy>,
    ) -> Result<PageObject<Highlight>> {
        let page = services(ctx)?
            .highlights
            .find_all(&filter.to_filters(), pagination, order_by)
            .await
            .extend()?;
        Ok(page.into())
    }

    async fn highlight(&self, ctx: &Context<'_>, id: i64) -> Result<Option<Highlight>> {
        load_optional(&loaders(ctx)?.highlights, Some(id)).await.extend()
    }

    async fn highlight_by_slug(
        &self,
        ctx: &Context<'_>,
        destination_id: i64,
        slug: String,
    ) -> Result<Option<Highlight>> {
        services(ctx)?
            .highlights
            .find_by_slug(destination_id, &slug)
            .await
            .extend()
    }

    // --- languages ------------------------------------------------------

    async fn languages(&self, ctx: &Context<'_>) -> Result<Vec<Language>> {
        let page = services(ctx)?
            .languages
            .find_all(&Default::default(), None, None)
            .await
            .extend()?;
        Ok(page.items)
    }

    async fn language_by_code(&self, ctx: &Context<'_>, code: String) -> Result<Option<Language>> {
        services(ctx)?.languages.find_by_code(&code).await.extend()
    }

    // --- users ----------------------------------------------------------

    async fn users(
        &self,
        ctx: &Context<'_>,
        filter: Option<UserFilters>,
        pagination: Option<Pagination>,
        order_by: Option<OrderBy>,
    ) -> Result<PageObject<User>> {
        let page = services(ctx)?
            .users
            .find_all(&filter.to_filters(), pagination, order_by)
            .await
            .extend()?;
        Ok(page.into())
    }

    async fn user(&self, ctx: &Context<'_>, id: i64) -> Result<Option<User>> {
        load_optional(&loaders(ctx)?.users, Some(id)).await.extend()
    }

    async fn user_by_username(&self, ctx: &Context<'_>, username: String) -> Result<Option<User>> {
        services(ctx)?.users.find_by_username(&username).await.extend()
    }

    async fn user_by_email(&self, ctx: &Context<'_>, email: String) -> Result<Option<User>> {
        services(ctx)?.users.find_by_email(&email).await.extend()
    }

    async fn user_stats(
        &self,
        ctx: &Context<'_>,
        id: i64,
        period: Option<StatsPeriod>,
    ) -> Result<UserStats> {
        services(ctx)?
            .user_stats(id, period.unwrap_or_default())
            .await
            .extend()
    }

    // --- categories -----------------------------------------------------

    async fn categories(
        &self,
        ctx: &Context<'_>,
        filter: Option<CategoryFilters>,
        pagination: Option<Pagination>,
        order_by: Option<OrderBy>,
    ) -> Result<PageObject<Category>> {
        let page = services(ctx)?
            .categories
            .find_all(&filter.to_filters(), pagination, order_by)
            .await
            .extend()?;
        Ok(page.into())
    }

    async fn category(&self, ctx: &Context<'_>, id: i64) -> Result<Option<Category>> {
        load_optional(&loaders(ctx)?.categories, Some(id)).await.extend()
    }

    async fn category_stats(
        &self,
        ctx: &Context<'_>,
        id: i64,
        period: Option<StatsPeriod>,
    ) -> Result<CategoryStats> {
        services(ctx)?
            .category_stats(id, period.unwrap_or_default())
            .await
            .extend()
    }

    // --- visits ---------------------------------------------------------

    async fn visits(
        &self,
        ctx: &Context<'_>,
        filter: Option<VisitFilters>,
        pagination: Option<Pagination>,
        order_by: Option<OrderBy>,
    ) -> Result<PageObject<Visit>> {
        let page = services(ctx)?
            .visits
            .find_all(&filter.to_filters(), pagination, order_by)
            .await
            .extend()?;
        Ok(page.into())
    }

    async fn visit(&self, ctx: &Context<'_>, id: i64) -> Result<Option<Visit>> {
        load_optional(&loaders(ctx)?.visits, Some(id)).await.extend()
    }

    /// Latest visits first, ten per page unless paginated otherwise
    async fn recent_visits(
        &self,
        ctx: &Context<'_>,
        pagination: Option<Pagination>,
    ) -> Result<PageObject<Visit>> {
        let pagination = pagination.unwrap_or(Pagination::new(10, 0));
        let page = services(ctx)?
            .visits
            .find_all(&Filters::new(), Some(pagination), None)
            .await
            .extend()?;
        Ok(page.into())
    }

    // --- statistics -----------------------------------------------------

    async fn global_stats(&self, ctx: &Context<'_>) -> Result<GlobalStats> {
        services(ctx)?.statistics.global_stats().await.extend()
    }

    /// Site-wide visit histogram, newest bucket first
    async fn visits_by_period(
        &self,
        ctx: &Context<'_>,
        period: Option<StatsPeriod>,
    ) -> Result<Vec<PeriodStat>> {
        services(ctx)?
            .statistics
            .visits_by_period(VisitScope::All, period.unwrap_or_default())
            .await
            .extend()
    }
}
