//! Categories (many-to-many with destinations)

use crate::core::error::ApiError;
use crate::core::query::{Assignments, BuiltQuery, Filters};
use crate::core::query_builder::TableSpec;
use crate::impl_service;
use crate::services::statistics::PeriodStat;
use crate::services::{EntityService, IntoFilters, NAMED_ORDERS};
use async_graphql::{InputObject, SimpleObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub static CATEGORIES: TableSpec = TableSpec {
    table: "categories",
    key_column: "id",
    soft_delete: None,
    columns: &[("search", "name"), ("ids", "id")],
    orders: NAMED_ORDERS,
    default_order: "name ASC, id ASC",
};

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow, SimpleObject)]
#[graphql(complex)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_service!(CategoryService, Category, "category", CATEGORIES);

#[derive(Debug, Clone, Default, InputObject, Deserialize)]
pub struct CategoryFilters {
    pub search: Option<String>,
    pub ids: Option<Vec<i64>>,
}

impl IntoFilters for CategoryFilters {
    fn to_filters(&self) -> Filters {
        let mut filters = Filters::new();
        filters.insert_opt("search", self.search.clone());
        filters.insert_ids("ids", self.ids.as_ref());
        filters
    }
}

#[derive(Debug, Clone, InputObject, Deserialize, Validate)]
pub struct CreateCategoryInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
}

impl CreateCategoryInput {
    pub fn assignments(&self) -> Assignments {
        Assignments::new()
            .set("name", self.name.as_str())
            .set_opt("description", self.description.clone())
    }
}

#[derive(Debug, Clone, Default, InputObject, Deserialize, Validate)]
pub struct UpdateCategoryInput {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub description: Option<String>,
}

impl UpdateCategoryInput {
    pub fn assignments(&self) -> Assignments {
        Assignments::new()
            .set_opt("name", self.name.clone())
            .set_opt("description", self.description.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, sqlx::FromRow, SimpleObject)]
pub struct CategoryStats {
    /// Visible destinations linked to the category
    pub total_destinations: i64,
    pub total_visits: i64,
    #[sqlx(skip)]
    pub average_visits_per_destination: f64,
    #[sqlx(skip)]
    pub visits_by_period: Vec<PeriodStat>,
}

impl CategoryStats {
    fn with_average(mut self) -> Self {
        self.average_visits_per_destination = if self.total_destinations > 0 {
            self.total_visits as f64 / self.total_destinations as f64
        } else {
            0.0
        };
        self
    }
}

impl EntityService<Category> {
    /// Categories linked to a destination, by name
    pub async fn ids_by_destination(&self, destination_id: i64) -> Result<Vec<i64>, ApiError> {
        let query = BuiltQuery::with_params(
            "SELECT c.id FROM categories c \
             JOIN destination_categories dc ON dc.category_id = c.id \
             WHERE dc.destination_id = $1 \
             ORDER BY c.name ASC, c.id ASC",
            vec![destination_id.into()],
        );
        self.fetch_ids(&query).await
    }

    pub async fn stats(&self, category_id: i64) -> Result<CategoryStats, ApiError> {
        let query = BuiltQuery::with_params(
            "SELECT \
               (SELECT COUNT(*) FROM destination_categories dc \
                 JOIN destinations d ON d.id = dc.destination_id \
                 WHERE dc.category_id = $1 AND d.hidden = false) AS total_destinations, \
               (SELECT COUNT(*) FROM visits v \
                 JOIN destination_categories dc ON dc.destination_id = v.destination_id \
                 JOIN destinations d ON d.id = v.destination_id \
                 WHERE dc.category_id = $1 AND d.hidden = false) AS total_visits",
            vec![category_id.into()],
        );
        let stats: Option<CategoryStats> = self.database().fetch_optional(&query).await?;
        Ok(stats.unwrap_or_default().with_average())
    }
}
