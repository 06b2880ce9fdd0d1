//! Destinations and their category links

use crate::core::error::{ApiError, QueryBuildError, StorageError};
use crate::core::query::{Assignments, BuiltQuery, Filters, OrderBy};
use crate::core::query_builder::{self, TableSpec};
use crate::impl_service;
use crate::services::statistics::{self, PeriodStat, StatsPeriod};
use crate::services::{EntityService, IntoFilters};
use crate::storage::postgres::{execute_on, fetch_one_on, fetch_optional_on};
use async_graphql::{InputObject, SimpleObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use validator::Validate;

pub static DESTINATIONS: TableSpec = TableSpec {
    table: "destinations",
    key_column: "id",
    soft_delete: Some("hidden"),
    columns: &[
        ("search", "name"),
        ("name", "name"),
        ("slug", "slug"),
        ("country_id", "country_id"),
        ("country_ids", "country_id"),
        ("type_id", "type_id"),
        ("type_ids", "type_id"),
        (
            "continent_id",
            "(SELECT c.continent_id FROM countries c WHERE c.id = destinations.country_id)",
        ),
        (
            "rating",
            "(SELECT AVG(v.rating)::float8 FROM visits v WHERE v.destination_id = destinations.id)",
        ),
        ("ids", "id"),
    ],
    orders: &[
        (OrderBy::NameAsc, "name ASC, id ASC"),
        (OrderBy::NameDesc, "name DESC, id DESC"),
        (OrderBy::CreatedAtAsc, "created_at ASC, id ASC"),
        (OrderBy::CreatedAtDesc, "created_at DESC, id DESC"),
        (OrderBy::RecentlyAdded, "created_at DESC, id DESC"),
        (
            OrderBy::VisitsDesc,
            "(SELECT COUNT(*) FROM visits v WHERE v.destination_id = destinations.id) DESC, id ASC",
        ),
        (
            OrderBy::RatingDesc,
            "(SELECT AVG(v.rating) FROM visits v WHERE v.destination_id = destinations.id) \
             DESC NULLS LAST, id ASC",
        ),
        (
            OrderBy::Popularity,
            "(SELECT COUNT(*) FROM visits v WHERE v.destination_id = destinations.id) * 0.7 \
             + COALESCE((SELECT AVG(v.rating) FROM visits v \
             WHERE v.destination_id = destinations.id), 0) * 0.3 DESC, id ASC",
        ),
    ],
    default_order: "name ASC, id ASC",
};

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow, SimpleObject)]
#[graphql(complex)]
pub struct Destination {
    pub id: i64,
    pub country_id: i64,
    pub type_id: Option<i64>,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub image_url: Option<String>,
    #[graphql(skip)]
    #[serde(skip)]
    pub hidden: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_service!(DestinationService, Destination, "destination", DESTINATIONS);

#[derive(Debug, Clone, Default, InputObject, Deserialize)]
pub struct DestinationFilters {
    pub search: Option<String>,
    pub country_id: Option<i64>,
    pub country_ids: Option<Vec<i64>>,
    pub continent_id: Option<i64>,
    pub type_ids: Option<Vec<i64>>,
    /// Lower bound on the average visit rating
    pub rating_min: Option<f64>,
    pub rating_max: Option<f64>,
    pub ids: Option<Vec<i64>>,
}

impl IntoFilters for DestinationFilters {
    fn to_filters(&self) -> Filters {
        let mut filters = Filters::new();
        filters.insert_opt("search", self.search.clone());
        filters.insert_opt("country_id", self.country_id);
        filters.insert_ids("country_ids", self.country_ids.as_ref());
        filters.insert_opt("continent_id", self.continent_id);
        filters.insert_ids("type_ids", self.type_ids.as_ref());
        filters.insert_opt("rating_min", self.rating_min);
        filters.insert_opt("rating_max", self.rating_max);
        filters.insert_ids("ids", self.ids.as_ref());
        filters
    }
}

#[derive(Debug, Clone, InputObject, Deserialize, Validate)]
pub struct CreateDestinationInput {
    pub country_id: i64,
    pub type_id: Option<i64>,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(regex(path = *crate::services::SLUG_RE))]
    pub slug: String,
    pub description: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    #[validate(url)]
    pub image_url: Option<String>,
    /// Categories to link in the same transaction as the insert
    pub category_ids: Option<Vec<i64>>,
}

impl CreateDestinationInput {
    pub fn assignments(&self) -> Assignments {
        Assignments::new()
            .set("country_id", self.country_id)
            .set_opt("type_id", self.type_id)
            .set("name", self.name.as_str())
            .set("slug", self.slug.as_str())
            .set_opt("description", self.description.clone())
            .set_opt("latitude", self.latitude)
            .set_opt("longitude", self.longitude)
            .set_opt("image_url", self.image_url.clone())
    }
}

#[derive(Debug, Clone, Default, InputObject, Deserialize, Validate)]
pub struct UpdateDestinationInput {
    pub country_id: Option<i64>,
    pub type_id: Option<i64>,
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(regex(path = *crate::services::SLUG_RE))]
    pub slug: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    #[validate(url)]
    pub image_url: Option<String>,
    /// When present, replaces the full set of linked categories
    pub category_ids: Option<Vec<i64>>,
}

impl UpdateDestinationInput {
    pub fn assignments(&self) -> Assignments {
        Assignments::new()
            .set_opt("country_id", self.country_id)
            .set_opt("type_id", self.type_id)
            .set_opt("name", self.name.clone())
            .set_opt("slug", self.slug.clone())
            .set_opt("description", self.description.clone())
            .set_opt("latitude", self.latitude)
            .set_opt("longitude", self.longitude)
            .set_opt("image_url", self.image_url.clone())
    }

    /// Statement returning the row for an update: a column update, a bare
    /// `updated_at` bump when only the links change, or a plain read.
    fn row_write(&self, id: i64) -> Result<BuiltQuery, QueryBuildError> {
        let values = self.assignments();
        Ok(match (values.is_empty(), &self.category_ids) {
            (false, _) => query_builder::update(&DESTINATIONS, id, &values)?,
            (true, Some(_)) => query_builder::touch(&DESTINATIONS, id),
            (true, None) => query_builder::select_eq(&DESTINATIONS, "id", id),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, sqlx::FromRow, SimpleObject)]
pub struct DestinationStats {
    pub total_visits: i64,
    pub unique_visitors: i64,
    pub average_rating: Option<f64>,
    pub total_highlights: i64,
    #[sqlx(skip)]
    pub visits_by_period: Vec<PeriodStat>,
}

/// Narrowing for [`EntityService::<Destination>::popular`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopularScope {
    pub category_id: Option<i64>,
    pub country_id: Option<i64>,
    pub continent_id: Option<i64>,
}

fn popular_query(scope: PopularScope, limit: i64) -> BuiltQuery {
    let mut query = BuiltQuery::new("SELECT id FROM destinations WHERE hidden = false");
    if let Some(category_id) = scope.category_id {
        let placeholder = query.push_param(category_id);
        query.text.push_str(&format!(
            " AND EXISTS (SELECT 1 FROM destination_categories dc \
             WHERE dc.destination_id = destinations.id AND dc.category_id = {})",
            placeholder
        ));
    }
    if let Some(country_id) = scope.country_id {
        let placeholder = query.push_param(country_id);
        query.text.push_str(&format!(" AND country_id = {}", placeholder));
    }
    if let Some(continent_id) = scope.continent_id {
        let placeholder = query.push_param(continent_id);
        query.text.push_str(&format!(
            " AND country_id IN (SELECT c.id FROM countries c WHERE c.continent_id = {})",
            placeholder
        ));
    }
    let placeholder = query.push_param(limit);
    query.text.push_str(&format!(
        " ORDER BY {} LIMIT {}",
        DESTINATIONS.order(Some(OrderBy::Popularity)),
        placeholder
    ));
    query
}

/// Link `destination_id` to every id in `category_ids` on `conn`
async fn link_categories(
    conn: &mut PgConnection,
    destination_id: i64,
    category_ids: &[i64],
) -> Result<u64, StorageError> {
    if category_ids.is_empty() {
        return Ok(0);
    }
    let query = BuiltQuery::with_params(
        "INSERT INTO destination_categories (destination_id, category_id) \
         SELECT $1, UNNEST($2::BIGINT[]) ON CONFLICT DO NOTHING",
        vec![destination_id.into(), category_ids.to_vec().into()],
    );
    execute_on(conn, &query).await
}

impl EntityService<Destination> {
    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Destination>, ApiError> {
        self.find_one_by("slug", slug).await
    }

    pub async fn ids_by_country(&self, country_id: i64) -> Result<Vec<i64>, ApiError> {
        self.ids_where("country_id", country_id).await
    }

    pub async fn ids_by_type(&self, type_id: i64) -> Result<Vec<i64>, ApiError> {
        self.ids_where("type_id", type_id).await
    }

    pub async fn ids_by_category(&self, category_id: i64) -> Result<Vec<i64>, ApiError> {
        let query = BuiltQuery::with_params(
            "SELECT d.id FROM destinations d \
             JOIN destination_categories dc ON dc.destination_id = d.id \
             WHERE d.hidden = false AND dc.category_id = $1 \
             ORDER BY d.name ASC, d.id ASC",
            vec![category_id.into()],
        );
        self.fetch_ids(&query).await
    }

    /// Insert the destination and link its categories as one unit.
    ///
    /// A failing link (e.g. an unknown category) rolls the insert back.
    pub async fn create_with_categories(
        &self,
        input: &CreateDestinationInput,
    ) -> Result<Destination, ApiError> {
        let insert = query_builder::insert(&DESTINATIONS, &input.assignments())?;
        let category_ids = input.category_ids.clone().unwrap_or_default();

        let created = self
            .database()
            .transaction(move |conn| {
                Box::pin(async move {
                    let created: Destination = fetch_one_on(&mut *conn, &insert).await?;
                    link_categories(conn, created.id, &category_ids).await?;
                    Ok::<_, StorageError>(created)
                })
            })
            .await?;

        tracing::info!(id = created.id, slug = %created.slug, "destination created");
        Ok(created)
    }

    /// Update columns and, when given, replace the category links, atomically
    pub async fn update_with_categories(
        &self,
        id: i64,
        input: &UpdateDestinationInput,
    ) -> Result<Destination, ApiError> {
        let write = input.row_write(id)?;
        let category_ids = input.category_ids.clone();

        let updated = self
            .database()
            .transaction(move |conn| {
                Box::pin(async move {
                    let found: Option<Destination> = fetch_optional_on(&mut *conn, &write).await?;
                    let Some(updated) = found else {
                        return Ok(None);
                    };
                    if let Some(category_ids) = category_ids {
                        let unlink = BuiltQuery::with_params(
                            "DELETE FROM destination_categories WHERE destination_id = $1",
                            vec![id.into()],
                        );
                        execute_on(&mut *conn, &unlink).await?;
                        link_categories(conn, id, &category_ids).await?;
                    }
                    Ok::<_, StorageError>(Some(updated))
                })
            })
            .await?;

        let updated = updated.ok_or_else(|| ApiError::not_found("destination", id))?;
        tracing::info!(id, "destination updated");
        Ok(updated)
    }

    /// Most popular visible destinations (visits weighted with rating)
    pub async fn popular(&self, scope: PopularScope, limit: i64) -> Result<Vec<i64>, ApiError> {
        self.fetch_ids(&popular_query(scope, limit)).await
    }

    /// Visible destinations ordered by their latest visit
    pub async fn recently_visited(&self, limit: i64) -> Result<Vec<i64>, ApiError> {
        let query = BuiltQuery::with_params(
            "SELECT d.id FROM destinations d \
             JOIN visits v ON v.destination_id = d.id \
             WHERE d.hidden = false \
             GROUP BY d.id ORDER BY MAX(v.visited_at) DESC, d.id ASC LIMIT $1",
            vec![limit.into()],
        );
        self.fetch_ids(&query).await
    }

    /// Visible destinations with the most visits inside the trailing `period`
    pub async fn trending(&self, period: StatsPeriod, limit: i64) -> Result<Vec<i64>, ApiError> {
        self.fetch_ids(&statistics::trending_query(period, limit)).await
    }

    pub async fn stats(&self, destination_id: i64) -> Result<DestinationStats, ApiError> {
        let query = BuiltQuery::with_params(
            "SELECT \
               (SELECT COUNT(*) FROM visits WHERE destination_id = $1) AS total_visits, \
               (SELECT COUNT(DISTINCT user_id) FROM visits WHERE destination_id = $1) \
                 AS unique_visitors, \
               (SELECT AVG(rating)::float8 FROM visits WHERE destination_id = $1) \
                 AS average_rating, \
               (SELECT COUNT(*) FROM highlights \
                 WHERE destination_id = $1 AND hidden = false) AS total_highlights",
            vec![destination_id.into()],
        );
        let stats: Option<DestinationStats> = self.database().fetch_optional(&query).await?;
        Ok(stats.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::query::{Pagination, SqlParam};

    #[test]
    fn test_rating_bounds_use_the_aggregate_column() {
        let filters = DestinationFilters {
            search: Some("paris".into()),
            rating_min: Some(4.0),
            ..Default::default()
        }
        .to_filters();
        let query = query_builder::select(&DESTINATIONS, &filters, None, None).unwrap();

        assert!(query.text.contains("name ILIKE $1"));
        assert!(query.text.contains(
            "(SELECT AVG(v.rating)::float8 FROM visits v \
             WHERE v.destination_id = destinations.id) >= $2"
        ));
        assert_eq!(
            query.params,
            vec![SqlParam::Text("%paris%".into()), SqlParam::Float(4.0)]
        );
    }

    #[test]
    fn test_popularity_order_and_page() {
        let query = query_builder::select(
            &DESTINATIONS,
            &Filters::new(),
            Some(Pagination::new(10, 20)),
            Some(OrderBy::Popularity),
        )
        .unwrap();
        assert!(query.text.contains(
            "ORDER BY (SELECT COUNT(*) FROM visits v WHERE v.destination_id = destinations.id) * 0.7 \
             + COALESCE((SELECT AVG(v.rating) FROM visits v \
             WHERE v.destination_id = destinations.id), 0) * 0.3 DESC, id ASC"
        ));
        assert!(query.text.ends_with("LIMIT $1 OFFSET $2"));
    }

    #[test]
    fn test_popular_scope_appends_only_given_predicates() {
        let query = popular_query(PopularScope::default(), 10);
        assert!(query.text.starts_with(
            "SELECT id FROM destinations WHERE hidden = false ORDER BY (SELECT COUNT(*)"
        ));
        assert_eq!(query.params, vec![SqlParam::Int(10)]);

        let scope = PopularScope {
            category_id: Some(4),
            continent_id: Some(1),
            ..Default::default()
        };
        let query = popular_query(scope, 3);
        assert!(query.text.contains("dc.category_id = $1)"));
        assert!(query.text.contains("WHERE c.continent_id = $2)"));
        assert!(!query.text.contains("AND country_id = $"));
        assert!(query.text.contains("* 0.3 DESC, id ASC LIMIT $3"));
        assert_eq!(
            query.params,
            vec![SqlParam::Int(4), SqlParam::Int(1), SqlParam::Int(3)]
        );
    }

    #[test]
    fn test_update_assignments_leave_categories_out() {
        let input = UpdateDestinationInput {
            name: Some("Old Town".into()),
            category_ids: Some(vec![1, 2]),
            ..Default::default()
        };
        let values: Vec<_> = input.assignments().iter().map(|(c, _)| *c).collect();
        assert_eq!(values, vec!["name"]);
    }

    #[test]
    fn test_link_only_update_still_bumps_updated_at() {
        let links_only = UpdateDestinationInput {
            category_ids: Some(vec![3]),
            ..Default::default()
        };
        let write = links_only.row_write(4).unwrap();
        assert!(write.text.starts_with("UPDATE destinations SET updated_at = NOW()"));
        assert_eq!(write.params, vec![SqlParam::Int(4)]);

        let nothing = UpdateDestinationInput::default();
        assert!(nothing.row_write(4).unwrap().text.starts_with("SELECT"));

        let renamed = UpdateDestinationInput {
            name: Some("Old Town".into()),
            ..Default::default()
        };
        let write = renamed.row_write(4).unwrap();
        assert!(write.text.contains("name = $2, updated_at = NOW()"));
    }

    #[test]
    fn test_coordinates_are_range_checked() {
        let input = UpdateDestinationInput {
            latitude: Some(120.0),
            ..Default::default()
        };
        assert!(input.validate().is_err());
    }
}
