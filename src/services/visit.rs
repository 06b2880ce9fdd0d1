//! Visits: a user's recorded trip to a destination

use crate::core::error::ApiError;
use crate::core::query::{Assignments, Filters, OrderBy};
use crate::core::query_builder::TableSpec;
use crate::impl_service;
use crate::services::{EntityService, IntoFilters};
use async_graphql::{InputObject, SimpleObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub static VISITS: TableSpec = TableSpec {
    table: "visits",
    key_column: "id",
    soft_delete: None,
    columns: &[
        ("search", "notes"),
        ("user_id", "user_id"),
        ("destination_id", "destination_id"),
        ("destination_ids", "destination_id"),
        ("rating", "rating"),
        ("visited_at", "visited_at"),
        ("ids", "id"),
    ],
    orders: &[
        (OrderBy::CreatedAtAsc, "visited_at ASC, id ASC"),
        (OrderBy::CreatedAtDesc, "visited_at DESC, id DESC"),
        (OrderBy::RecentlyAdded, "created_at DESC, id DESC"),
        (OrderBy::RatingDesc, "rating DESC NULLS LAST, visited_at DESC, id DESC"),
    ],
    default_order: "visited_at DESC, id DESC",
};

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow, SimpleObject)]
#[graphql(complex)]
pub struct Visit {
    pub id: i64,
    pub user_id: i64,
    pub destination_id: i64,
    pub visited_at: DateTime<Utc>,
    /// 1 to 5
    pub rating: Option<i64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_service!(VisitService, Visit, "visit", VISITS);

#[derive(Debug, Clone, Default, InputObject, Deserialize)]
pub struct VisitFilters {
    pub user_id: Option<i64>,
    pub destination_id: Option<i64>,
    pub destination_ids: Option<Vec<i64>>,
    pub rating_min: Option<i64>,
    pub rating_max: Option<i64>,
    pub visited_at_min: Option<DateTime<Utc>>,
    pub visited_at_max: Option<DateTime<Utc>>,
    pub ids: Option<Vec<i64>>,
}

impl IntoFilters for VisitFilters {
    fn to_filters(&self) -> Filters {
        let mut filters = Filters::new();
        filters.insert_opt("user_id", self.user_id);
        filters.insert_opt("destination_id", self.destination_id);
        filters.insert_ids("destination_ids", self.destination_ids.as_ref());
        filters.insert_opt("rating_min", self.rating_min);
        filters.insert_opt("rating_max", self.rating_max);
        filters.insert_opt("visited_at_min", self.visited_at_min);
        filters.insert_opt("visited_at_max", self.visited_at_max);
        filters.insert_ids("ids", self.ids.as_ref());
        filters
    }
}

#[derive(Debug, Clone, InputObject, Deserialize, Validate)]
pub struct CreateVisitInput {
    pub user_id: i64,
    pub destination_id: i64,
    /// Defaults to now
    pub visited_at: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<i64>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl CreateVisitInput {
    pub fn assignments(&self) -> Assignments {
        Assignments::new()
            .set("user_id", self.user_id)
            .set("destination_id", self.destination_id)
            .set_opt("visited_at", self.visited_at)
            .set_opt("rating", self.rating)
            .set_opt("notes", self.notes.clone())
    }
}

#[derive(Debug, Clone, Default, InputObject, Deserialize, Validate)]
pub struct UpdateVisitInput {
    pub visited_at: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<i64>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl UpdateVisitInput {
    pub fn assignments(&self) -> Assignments {
        Assignments::new()
            .set_opt("visited_at", self.visited_at)
            .set_opt("rating", self.rating)
            .set_opt("notes", self.notes.clone())
    }
}

impl EntityService<Visit> {
    pub async fn ids_by_user(&self, user_id: i64) -> Result<Vec<i64>, ApiError> {
        self.ids_where("user_id", user_id).await
    }

    pub async fn ids_by_destination(&self, destination_id: i64) -> Result<Vec<i64>, ApiError> {
        self.ids_where("destination_id", destination_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::query_builder;

    #[test]
    fn test_date_range_filters() {
        let from = "2024-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let filters = VisitFilters {
            user_id: Some(7),
            visited_at_min: Some(from),
            ..Default::default()
        }
        .to_filters();
        let query = query_builder::count(&VISITS, &filters).unwrap();
        assert_eq!(
            query.text,
            "SELECT COUNT(*) FROM visits WHERE user_id = $1 AND visited_at >= $2"
        );
    }

    #[test]
    fn test_rating_out_of_range_is_rejected() {
        let input = CreateVisitInput {
            user_id: 1,
            destination_id: 1,
            visited_at: None,
            rating: Some(6),
            notes: None,
        };
        assert!(input.validate().is_err());
    }
}
