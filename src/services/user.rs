//! Users

use crate::core::error::ApiError;
use crate::core::query::{BuiltQuery, Filters};
use crate::core::query_builder::TableSpec;
use crate::impl_service;
use crate::services::statistics::PeriodStat;
use crate::services::{EntityService, IntoFilters, NAMED_ORDERS};
use async_graphql::{InputObject, SimpleObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub static USERS: TableSpec = TableSpec {
    table: "users",
    key_column: "id",
    soft_delete: Some("hidden"),
    columns: &[
        ("search", "name"),
        ("username", "username"),
        ("role", "role"),
        ("is_active", "is_active"),
        ("ids", "id"),
    ],
    orders: NAMED_ORDERS,
    default_order: "created_at DESC, id DESC",
};

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow, SimpleObject)]
#[graphql(complex)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub email: String,
    #[graphql(skip)]
    #[serde(skip)]
    pub password_hash: String,
    pub role: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    #[graphql(skip)]
    #[serde(skip)]
    pub hidden: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_service!(UserService, User, "user", USERS);

#[derive(Debug, Clone, Default, InputObject, Deserialize)]
pub struct UserFilters {
    pub search: Option<String>,
    pub username: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
    pub ids: Option<Vec<i64>>,
}

impl IntoFilters for UserFilters {
    fn to_filters(&self) -> Filters {
        let mut filters = Filters::new();
        filters.insert_opt("search", self.search.clone());
        filters.insert_opt("username", self.username.clone());
        filters.insert_opt("role", self.role.clone());
        filters.insert_opt("is_active", self.is_active);
        filters.insert_ids("ids", self.ids.as_ref());
        filters
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, sqlx::FromRow, SimpleObject)]
pub struct UserStats {
    pub total_visits: i64,
    pub destinations_visited: i64,
    pub countries_visited: i64,
    pub continents_visited: i64,
    pub average_rating: Option<f64>,
    #[sqlx(skip)]
    pub visits_by_period: Vec<PeriodStat>,
}

impl EntityService<User> {
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        self.find_one_by("email", email.to_lowercase()).await
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
        self.find_one_by("username", username).await
    }

    pub async fn stats(&self, user_id: i64) -> Result<UserStats, ApiError> {
        let query = BuiltQuery::with_params(
            "SELECT \
               COUNT(v.id) AS total_visits, \
               COUNT(DISTINCT v.destination_id) AS destinations_visited, \
               COUNT(DISTINCT d.country_id) AS countries_visited, \
               COUNT(DISTINCT c.continent_id) AS continents_visited, \
               AVG(v.rating)::float8 AS average_rating \
             FROM visits v \
             JOIN destinations d ON d.id = v.destination_id \
             JOIN countries c ON c.id = d.country_id \
             WHERE v.user_id = $1",
            vec![user_id.into()],
        );
        let stats: Option<UserStats> = self.database().fetch_optional(&query).await?;
        Ok(stats.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::query::FilterValue;

    #[test]
    fn test_boolean_filter_is_exact() {
        let filters = UserFilters {
            is_active: Some(false),
            ..Default::default()
        }
        .to_filters();
        assert_eq!(
            filters.iter().collect::<Vec<_>>(),
            vec![("is_active", &FilterValue::Bool(false))]
        );
    }

    #[test]
    fn test_password_hash_is_never_serialized() {
        let user = User {
            id: 1,
            name: "Ada".into(),
            username: "ada".into(),
            email: "ada@example.com".into(),
            password_hash: "secret".into(),
            role: "user".into(),
            avatar_url: None,
            bio: None,
            is_active: true,
            last_login_at: None,
            hidden: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "ada");
    }
}
