//! Countries

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

pub static COUNTRIES: TableSpec = TableSpec {
    table: "countries",
    key_column: "id",
    soft_delete: Some("hidden"),
    columns: &[
        ("search", "name"),
        ("name", "name"),
        ("iso_code", "iso_code"),
        ("continent_id", "continent_id"),
        ("continent_ids", "continent_id"),
        ("ids", "id"),
    ],
    orders: NAMED_ORDERS,
    default_order: "name ASC, id ASC",
};

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow, SimpleObject)]
#[graphql(complex)]
pub struct Country {
    pub id: i64,
    pub continent_id: i64,
    pub name: String,
    pub iso_code: String,
    pub iso_code3: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    #[graphql(skip)]
    #[serde(skip)]
    pub hidden: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_service!(CountryService, Country, "country", COUNTRIES);

#[derive(Debug, Clone, Default, InputObject, Deserialize)]
pub struct CountryFilters {
    pub search: Option<String>,
    pub continent_id: Option<i64>,
    pub continent_ids: Option<Vec<i64>>,
    pub ids: Option<Vec<i64>>,
}

impl IntoFilters for CountryFilters {
    fn to_filters(&self) -> Filters {
        let mut filters = Filters::new();
        filters.insert_opt("search", self.search.clone());
        filters.insert_opt("continent_id", self.continent_id);
        filters.insert_ids("continent_ids", self.continent_ids.as_ref());
        filters.insert_ids("ids", self.ids.as_ref());
        filters
    }
}

#[derive(Debug, Clone, InputObject, Deserialize, Validate)]
pub struct CreateCountryInput {
    pub continent_id: i64,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 2, max = 2))]
    pub iso_code: String,
    #[validate(length(min = 3, max = 3))]
    pub iso_code3: Option<String>,
    pub description: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
}

impl CreateCountryInput {
    pub fn assignments(&self) -> Assignments {
        Assignments::new()
            .set("continent_id", self.continent_id)
            .set("name", self.name.as_str())
            .set("iso_code", self.iso_code.to_uppercase())
            .set_opt("iso_code3", self.iso_code3.as_ref().map(|c| c.to_uppercase()))
            .set_opt("description", self.description.clone())
            .set_opt("image_url", self.image_url.clone())
    }
}

#[derive(Debug, Clone, Default, InputObject, Deserialize, Validate)]
pub struct UpdateCountryInput {
    pub continent_id: Option<i64>,
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 2, max = 2))]
    pub iso_code: Option<String>,
    #[validate(length(min = 3, max = 3))]
    pub iso_code3: Option<String>,
    pub description: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
}

impl UpdateCountryInput {
    pub fn assignments(&self) -> Assignments {
        Assignments::new()
            .set_opt("continent_id", self.continent_id)
            .set_opt("name", self.name.clone())
            .set_opt("iso_code", self.iso_code.as_ref().map(|c| c.to_uppercase()))
            .set_opt("iso_code3", self.iso_code3.as_ref().map(|c| c.to_uppercase()))
            .set_opt("description", self.description.clone())
            .set_opt("image_url", self.image_url.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, sqlx::FromRow, SimpleObject)]
pub struct CountryStats {
    pub total_destinations: i64,
    pub total_visits: i64,
    pub unique_visitors: i64,
    #[sqlx(skip)]
    pub visits_by_period: Vec<PeriodStat>,
}

impl EntityService<Country> {
    pub async fn find_by_iso_code(&self, iso_code: &str) -> Result<Option<Country>, ApiError> {
        self.find_one_by("iso_code", iso_code.to_uppercase()).await
    }

    pub async fn ids_by_continent(&self, continent_id: i64) -> Result<Vec<i64>, ApiError> {
        self.ids_where("continent_id", continent_id).await
    }

    pub async fn stats(&self, country_id: i64) -> Result<CountryStats, ApiError> {
        let query = BuiltQuery::with_params(
            "SELECT \
               (SELECT COUNT(*) FROM destinations d \
                 WHERE d.country_id = $1 AND d.hidden = false) AS total_destinations, \
               (SELECT COUNT(*) FROM visits v \
                 JOIN destinations d ON d.id = v.destination_id \
                 WHERE d.country_id = $1) AS total_visits, \
               (SELECT COUNT(DISTINCT v.user_id) FROM visits v \
                 JOIN destinations d ON d.id = v.destination_id \
                 WHERE d.country_id = $1) AS unique_visitors",
            vec![country_id.into()],
        );
        let stats: Option<CountryStats> = self.database().fetch_optional(&query).await?;
        Ok(stats.unwrap_or_default())
    }

    /// Visible countries by visits, busiest first, optionally within one continent
    pub async fn top_by_visits(
        &self,
        continent_id: Option<i64>,
        limit: i64,
    ) -> Result<Vec<i64>, ApiError> {
        self.fetch_ids(&top_by_visits_query(continent_id, limit)).await
    }
}

fn top_by_visits_query(continent_id: Option<i64>, limit: i64) -> BuiltQuery {
    let mut query = BuiltQuery::new(
        "SELECT c.id FROM countries c \
         LEFT JOIN destinations d ON d.country_id = c.id AND d.hidden = false \
         LEFT JOIN visits v ON v.destination_id = d.id \
         WHERE c.hidden = false",
    );
    if let Some(continent_id) = continent_id {
        let placeholder = query.push_param(continent_id);
        query.text.push_str(&format!(" AND c.continent_id = {}", placeholder));
    }
    let placeholder = query.push_param(limit);
    query.text.push_str(&format!(
        " GROUP BY c.id ORDER BY COUNT(v.id) DESC, c.id ASC LIMIT {}",
        placeholder
    ));
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::query::FilterValue;
    use crate::core::query_builder;

    #[test]
    fn test_filters_translate_in_declaration_order() {
        let filters = CountryFilters {
            search: Some("fra".into()),
            continent_id: Some(2),
            ids: Some(vec![]),
            ..Default::default()
        }
        .to_filters();

        let names: Vec<_> = filters.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["search", "continent_id"]);

        let query = query_builder::select(&COUNTRIES, &filters, None, None).unwrap();
        assert_eq!(
            query.text,
            "SELECT * FROM countries WHERE hidden = false AND name ILIKE $1 \
             AND continent_id = $2 ORDER BY name ASC, id ASC"
        );
        assert_eq!(filters.iter().nth(1).map(|(_, v)| v), Some(&FilterValue::Int(2)));
    }

    #[test]
    fn test_top_by_visits_continent_is_optional() {
        let query = top_by_visits_query(None, 10);
        assert!(!query.text.contains("continent_id"));
        assert!(query.text.ends_with("LIMIT $1"));

        let query = top_by_visits_query(Some(2), 10);
        assert!(query.text.contains("AND c.continent_id = $1 GROUP BY c.id"));
        assert!(query.text.ends_with("LIMIT $2"));
    }
}
