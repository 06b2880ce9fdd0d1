//! Highlights: points of interest inside a destination

use crate::core::error::ApiError;
use crate::core::query::{BuiltQuery, Filters};
use crate::core::query_builder::TableSpec;
use crate::impl_service;
use crate::services::{EntityService, IntoFilters, NAMED_ORDERS};
use async_graphql::{InputObject, SimpleObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub static HIGHLIGHTS: TableSpec = TableSpec {
    table: "highlights",
    key_column: "id",
    soft_delete: Some("hidden"),
    columns: &[
        ("search", "name"),
        ("destination_id", "destination_id"),
        ("destination_ids", "destination_id"),
        ("ids", "id"),
    ],
    orders: NAMED_ORDERS,
    default_order: "name ASC, id ASC",
};

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow, SimpleObject)]
#[graphql(complex)]
pub struct Highlight {
    pub id: i64,
    pub destination_id: i64,
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

impl_service!(HighlightService, Highlight, "highlight", HIGHLIGHTS);

#[derive(Debug, Clone, Default, InputObject, Deserialize)]
pub struct HighlightFilters {
    pub search: Option<String>,
    pub destination_id: Option<i64>,
    pub destination_ids: Option<Vec<i64>>,
    pub ids: Option<Vec<i64>>,
}

impl IntoFilters for HighlightFilters {
    fn to_filters(&self) -> Filters {
        let mut filters = Filters::new();
        filters.insert_opt("search", self.search.clone());
        filters.insert_opt("destination_id", self.destination_id);
        filters.insert_ids("destination_ids", self.destination_ids.as_ref());
        filters.insert_ids("ids", self.ids.as_ref());
        filters
    }
}

impl EntityService<Highlight> {
    pub async fn ids_by_destination(&self, destination_id: i64) -> Result<Vec<i64>, ApiError> {
        self.ids_where("destination_id", destination_id).await
    }

    /// Slugs are unique per destination, not globally
    pub async fn find_by_slug(
        &self,
        destination_id: i64,
        slug: &str,
    ) -> Result<Option<Highlight>, ApiError> {
        let query = BuiltQuery::with_params(
            "SELECT * FROM highlights \
             WHERE hidden = false AND destination_id = $1 AND slug = $2",
            vec![destination_id.into(), slug.into()],
        );
        Ok(self.database().fetch_optional(&query).await?)
    }

    /// Record that `user_id` has seen the highlight; returns the view count
    pub async fn record_view(&self, highlight_id: i64, user_id: i64) -> Result<i64, ApiError> {
        self.get(highlight_id).await?;

        let insert = BuiltQuery::with_params(
            "INSERT INTO highlight_views (user_id, highlight_id) VALUES ($1, $2)",
            vec![user_id.into(), highlight_id.into()],
        );
        self.database().execute(&insert).await?;

        let count = BuiltQuery::with_params(
            "SELECT COUNT(*) FROM highlight_views WHERE highlight_id = $1",
            vec![highlight_id.into()],
        );
        let views = self.database().fetch_count(&count).await?;
        tracing::debug!(highlight_id, user_id, views, "highlight view recorded");
        Ok(views)
    }
}
