//! Continents

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

pub static CONTINENTS: TableSpec = TableSpec {
    table: "continents",
    key_column: "id",
    soft_delete: Some("hidden"),
    columns: &[
        ("search", "name"),
        ("name", "name"),
        ("code", "code"),
        ("ids", "id"),
    ],
    orders: NAMED_ORDERS,
    default_order: "name ASC, id ASC",
};

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow, SimpleObject)]
#[graphql(complex)]
pub struct Continent {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub code: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    #[graphql(skip)]
    #[serde(skip)]
    pub hidden: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_service!(ContinentService, Continent, "continent", CONTINENTS);

#[derive(Debug, Clone, Default, InputObject, Deserialize)]
pub struct ContinentFilters {
    /// Case-insensitive match on the name
    pub search: Option<String>,
    pub code: Option<String>,
    pub ids: Option<Vec<i64>>,
}

impl IntoFilters for ContinentFilters {
    fn to_filters(&self) -> Filters {
        let mut filters = Filters::new();
        filters.insert_opt("search", self.search.clone());
        filters.insert_opt("code", self.code.clone());
        filters.insert_ids("ids", self.ids.as_ref());
        filters
    }
}

#[derive(Debug, Clone, InputObject, Deserialize, Validate)]
pub struct CreateContinentInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(regex(path = *crate::services::SLUG_RE))]
    pub slug: String,
    #[validate(length(min = 2, max = 2))]
    pub code: String,
    pub description: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
}

impl CreateContinentInput {
    pub fn assignments(&self) -> Assignments {
        Assignments::new()
            .set("name", self.name.as_str())
            .set("slug", self.slug.as_str())
            .set("code", self.code.to_uppercase())
            .set_opt("description", self.description.clone())
            .set_opt("image_url", self.image_url.clone())
    }
}

#[derive(Debug, Clone, Default, InputObject, Deserialize, Validate)]
pub struct UpdateContinentInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(regex(path = *crate::services::SLUG_RE))]
    pub slug: Option<String>,
    #[validate(length(min = 2, max = 2))]
    pub code: Option<String>,
    pub description: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
}

impl UpdateContinentInput {
    pub fn assignments(&self) -> Assignments {
        Assignments::new()
            .set_opt("name", self.name.clone())
            .set_opt("slug", self.slug.clone())
            .set_opt("code", self.code.as_ref().map(|c| c.to_uppercase()))
            .set_opt("description", self.description.clone())
            .set_opt("image_url", self.image_url.clone())
    }
}

/// Aggregate counts for one continent
#[derive(Debug, Clone, Default, PartialEq, Serialize, sqlx::FromRow, SimpleObject)]
pub struct ContinentStats {
    pub total_countries: i64,
    pub total_destinations: i64,
    pub total_visits: i64,
    #[sqlx(skip)]
    pub visits_by_period: Vec<PeriodStat>,
}

impl EntityService<Continent> {
    /// Exact, case-insensitive lookup by two-letter code
    pub async fn find_by_code(&self, code: &str) -> Result<Option<Continent>, ApiError> {
        self.find_one_by("code", code.to_uppercase()).await
    }

    pub async fn stats(&self, continent_id: i64) -> Result<ContinentStats, ApiError> {
        let query = BuiltQuery::with_params(
            "SELECT \
               (SELECT COUNT(*) FROM countries c \
                 WHERE c.continent_id = $1 AND c.hidden = false) AS total_countries, \
               (SELECT COUNT(*) FROM destinations d \
                 JOIN countries c ON c.id = d.country_id \
                 WHERE c.continent_id = $1 AND d.hidden = false AND c.hidden = false) \
                 AS total_destinations, \
               (SELECT COUNT(*) FROM visits v \
                 JOIN destinations d ON d.id = v.destination_id \
                 JOIN countries c ON c.id = d.country_id \
                 WHERE c.continent_id = $1) AS total_visits",
            vec![continent_id.into()],
        );
        let stats: Option<ContinentStats> = self.database().fetch_optional(&query).await?;
        Ok(stats.unwrap_or_default())
    }

    /// Visible continents by visits to their visible destinations, busiest first
    pub async fn top_by_visits(&self, limit: i64) -> Result<Vec<i64>, ApiError> {
        self.fetch_ids(&top_by_visits_query(limit)).await
    }
}

fn top_by_visits_query(limit: i64) -> BuiltQuery {
    BuiltQuery::with_params(
        "SELECT ct.id FROM continents ct \
         LEFT JOIN countries c ON c.continent_id = ct.id AND c.hidden = false \
         LEFT JOIN destinations d ON d.country_id = c.id AND d.hidden = false \
         LEFT JOIN visits v ON v.destination_id = d.id \
         WHERE ct.hidden = false \
         GROUP BY ct.id ORDER BY COUNT(v.id) DESC, ct.id ASC LIMIT $1",
        vec![limit.into()],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::query::FilterValue;

    #[test]
    fn test_filters_skip_absent_fields() {
        let filters = ContinentFilters {
            search: Some("eur".into()),
            ..Default::default()
        }
        .to_filters();
        assert_eq!(filters.len(), 1);
        assert_eq!(
            filters.iter().next(),
            Some(("search", &FilterValue::Text("eur".into())))
        );
    }

    #[test]
    fn test_code_is_normalized() {
        let input = UpdateContinentInput {
            code: Some("eu".into()),
            ..Default::default()
        };
        let values: Vec<_> = input.assignments().iter().cloned().collect();
        assert_eq!(values, vec![("code", "EU".into())]);
    }

    #[test]
    fn test_create_input_validation() {
        let input = CreateContinentInput {
            name: "Europe".into(),
            slug: "Not A Slug".into(),
            code: "EU".into(),
            description: None,
            image_url: None,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_top_by_visits_keeps_empty_continents() {
        let query = top_by_visits_query(5);
        assert!(query.text.contains("LEFT JOIN visits v ON v.destination_id = d.id"));
        assert!(query.text.ends_with("ORDER BY COUNT(v.id) DESC, ct.id ASC LIMIT $1"));
        assert_eq!(query.params, vec![crate::core::query::SqlParam::Int(5)]);
    }
}
