//! Cross-entity statistics
//!
//! Visit histograms bucketed by calendar period and the site-wide totals.
//! Per-entity counters stay with their record modules; this module owns the
//! period handling they share.

use crate::core::error::ApiError;
use crate::core::query::BuiltQuery;
use crate::services::Services;
use crate::services::category::CategoryStats;
use crate::services::continent::ContinentStats;
use crate::services::country::CountryStats;
use crate::services::destination::DestinationStats;
use crate::services::user::UserStats;
use crate::storage::postgres::Database;
use async_graphql::{Enum, InputObject, SimpleObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Calendar unit for bucketing and windows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Enum, Serialize, Deserialize)]
pub enum PeriodUnit {
    Day,
    Week,
    #[default]
    Month,
    Year,
}

impl PeriodUnit {
    /// Field name understood by `DATE_TRUNC` and interval literals
    pub fn as_sql(self) -> &'static str {
        match self {
            PeriodUnit::Day => "day",
            PeriodUnit::Week => "week",
            PeriodUnit::Month => "month",
            PeriodUnit::Year => "year",
        }
    }
}

/// `count` periods of one unit, ending now
#[derive(Debug, Clone, Copy, PartialEq, Eq, InputObject, Deserialize)]
pub struct StatsPeriod {
    #[graphql(default)]
    pub period: PeriodUnit,
    #[graphql(default = 12, validator(minimum = 1, maximum = 1000))]
    pub count: i32,
}

impl Default for StatsPeriod {
    fn default() -> Self {
        Self {
            period: PeriodUnit::Month,
            count: 12,
        }
    }
}

impl StatsPeriod {
    pub fn days(count: i32) -> Self {
        Self {
            period: PeriodUnit::Day,
            count,
        }
    }

    /// Bind unit and count; returns the SQL for the start of the window.
    ///
    /// Calendar-aligned windows start at the beginning of the oldest bucket,
    /// rolling ones exactly `count` units before now.
    fn push_window_start(&self, query: &mut BuiltQuery, aligned: bool) -> String {
        let unit = query.push_param(self.period.as_sql());
        let count = query.push_param(i64::from(self.count.max(1)));
        if aligned {
            format!(
                "DATE_TRUNC({unit}, NOW()) - ({count}::float8 - 1) * ('1 ' || {unit})::interval"
            )
        } else {
            format!("NOW() - {count}::float8 * ('1 ' || {unit})::interval")
        }
    }
}

/// Visits in one bucket
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow, SimpleObject)]
pub struct PeriodStat {
    /// Start of the bucket
    pub period: DateTime<Utc>,
    pub visit_count: i64,
}

/// Which visits a histogram counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitScope {
    All,
    Continent(i64),
    Country(i64),
    Destination(i64),
    Category(i64),
    User(i64),
}

impl VisitScope {
    /// Predicate over `v` (visits), `d` (destinations) and `c` (countries)
    fn push_predicate(self, query: &mut BuiltQuery) -> Option<String> {
        let (template, id) = match self {
            VisitScope::All => return None,
            VisitScope::Continent(id) => ("c.continent_id = {}", id),
            VisitScope::Country(id) => ("d.country_id = {}", id),
            VisitScope::Destination(id) => ("v.destination_id = {}", id),
            VisitScope::Category(id) => (
                "EXISTS (SELECT 1 FROM destination_categories dc \
                 WHERE dc.destination_id = v.destination_id AND dc.category_id = {})",
                id,
            ),
            VisitScope::User(id) => ("v.user_id = {}", id),
        };
        let placeholder = query.push_param(id);
        Some(template.replace("{}", &placeholder))
    }
}

/// Site-wide totals
#[derive(Debug, Clone, Default, PartialEq, Serialize, sqlx::FromRow, SimpleObject)]
#[graphql(complex)]
pub struct GlobalStats {
    pub total_users: i64,
    pub total_visits: i64,
    pub total_destinations: i64,
    pub total_countries: i64,
    pub total_continents: i64,
    /// Visits in the last seven days
    pub recent_visits_count: i64,
    pub average_visits_per_user: f64,
    #[graphql(skip)]
    pub most_visited_destination_id: Option<i64>,
    #[graphql(skip)]
    pub most_active_user_id: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct StatisticsService {
    db: Database,
}

impl StatisticsService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Visit counts per `period` bucket, newest first; empty buckets are absent
    pub async fn visits_by_period(
        &self,
        scope: VisitScope,
        period: StatsPeriod,
    ) -> Result<Vec<PeriodStat>, ApiError> {
        let query = visits_by_period_query(scope, period);
        Ok(self.db.fetch_all(&query).await?)
    }

    pub async fn global_stats(&self) -> Result<GlobalStats, ApiError> {
        let query = BuiltQuery::new(
            "SELECT \
               (SELECT COUNT(*) FROM users WHERE hidden = false) AS total_users, \
               (SELECT COUNT(*) FROM visits) AS total_visits, \
               (SELECT COUNT(*) FROM destinations WHERE hidden = false) AS total_destinations, \
               (SELECT COUNT(*) FROM countries WHERE hidden = false) AS total_countries, \
               (SELECT COUNT(*) FROM continents WHERE hidden = false) AS total_continents, \
               (SELECT COUNT(*) FROM visits WHERE visited_at >= NOW() - INTERVAL '7 days') \
                 AS recent_visits_count, \
               COALESCE((SELECT COUNT(*) FROM visits)::float8 \
                 / NULLIF((SELECT COUNT(*) FROM users WHERE hidden = false), 0), 0) \
                 AS average_visits_per_user, \
               (SELECT destination_id FROM visits GROUP BY destination_id \
                 ORDER BY COUNT(*) DESC, destination_id ASC LIMIT 1) \
                 AS most_visited_destination_id, \
               (SELECT user_id FROM visits GROUP BY user_id \
                 ORDER BY COUNT(*) DESC, user_id ASC LIMIT 1) AS most_active_user_id",
        );
        let stats: Option<GlobalStats> = self.db.fetch_optional(&query).await?;
        Ok(stats.unwrap_or_default())
    }
}

/// Entity counters together with their visit histogram
impl Services {
    pub async fn continent_stats(
        &self,
        id: i64,
        period: StatsPeriod,
    ) -> Result<ContinentStats, ApiError> {
        let (mut stats, histogram) = futures::try_join!(
            self.continents.stats(id),
            self.statistics.visits_by_period(VisitScope::Continent(id), period)
        )?;
        stats.visits_by_period = histogram;
        Ok(stats)
    }

    pub async fn country_stats(&self, id: i64, period: StatsPeriod) -> Result<CountryStats, ApiError> {
        let (mut stats, histogram) = futures::try_join!(
            self.countries.stats(id),
            self.statistics.visits_by_period(VisitScope::Country(id), period)
        )?;
        stats.visits_by_period = histogram;
        Ok(stats)
    }

    pub async fn destination_stats(
        &self,
        id: i64,
        period: StatsPeriod,
    ) -> Result<DestinationStats, ApiError> {
        let (mut stats, histogram) = futures::try_join!(
            self.destinations.stats(id),
            self.statistics.visits_by_period(VisitScope::Destination(id), period)
        )?;
        stats.visits_by_period = histogram;
        Ok(stats)
    }

    pub async fn user_stats(&self, id: i64, period: StatsPeriod) -> Result<UserStats, ApiError> {
        let (mut stats, histogram) = futures::try_join!(
            self.users.stats(id),
            self.statistics.visits_by_period(VisitScope::User(id), period)
        )?;
        stats.visits_by_period = histogram;
        Ok(stats)
    }

    pub async fn category_stats(
        &self,
        id: i64,
        period: StatsPeriod,
    ) -> Result<CategoryStats, ApiError> {
        let (mut stats, histogram) = futures::try_join!(
            self.categories.stats(id),
            self.statistics.visits_by_period(VisitScope::Category(id), period)
        )?;
        stats.visits_by_period = histogram;
        Ok(stats)
    }
}

fn visits_by_period_query(scope: VisitScope, period: StatsPeriod) -> BuiltQuery {
    let mut query = BuiltQuery::new("");
    let window_start = period.push_window_start(&mut query, true);
    let mut predicate = format!("v.visited_at >= {}", window_start);
    if let Some(scoped) = scope.push_predicate(&mut query) {
        predicate.push_str(" AND ");
        predicate.push_str(&scoped);
    }
    query.text = format!(
        "SELECT DATE_TRUNC($1, v.visited_at) AS period, COUNT(*) AS visit_count \
         FROM visits v \
         JOIN destinations d ON d.id = v.destination_id \
         JOIN countries c ON c.id = d.country_id \
         WHERE {} GROUP BY 1 ORDER BY 1 DESC",
        predicate
    );
    query
}

/// Ids of visible destinations visited within `period` before now, busiest first
pub(crate) fn trending_query(period: StatsPeriod, limit: i64) -> BuiltQuery {
    let mut query = BuiltQuery::new("");
    let window_start = period.push_window_start(&mut query, false);
    let limit = query.push_param(limit);
    query.text = format!(
        "SELECT d.id FROM destinations d \
         JOIN visits v ON v.destination_id = d.id \
         WHERE d.hidden = false AND v.visited_at >= {} \
         GROUP BY d.id ORDER BY COUNT(v.id) DESC, d.id ASC LIMIT {}",
        window_start, limit
    );
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::query::SqlParam;

    #[test]
    fn test_histogram_binds_unit_then_count_then_scope() {
        let query = visits_by_period_query(VisitScope::Country(7), StatsPeriod::default());
        assert_eq!(
            query.params,
            vec![
                SqlParam::Text("month".into()),
                SqlParam::Int(12),
                SqlParam::Int(7)
            ]
        );
        assert!(query.text.starts_with("SELECT DATE_TRUNC($1, v.visited_at) AS period"));
        assert!(query.text.contains(
            "v.visited_at >= DATE_TRUNC($1, NOW()) - ($2::float8 - 1) * ('1 ' || $1)::interval \
             AND d.country_id = $3"
        ));
        assert!(query.text.ends_with("GROUP BY 1 ORDER BY 1 DESC"));
    }

    #[test]
    fn test_unscoped_histogram_has_no_extra_predicate() {
        let query = visits_by_period_query(VisitScope::All, StatsPeriod::days(7));
        assert_eq!(query.params.len(), 2);
        assert_eq!(query.params[0], SqlParam::Text("day".into()));
        assert!(query.text.contains("::interval GROUP BY 1"));
    }

    #[test]
    fn test_category_scope_goes_through_links() {
        let query = visits_by_period_query(VisitScope::Category(3), StatsPeriod::default());
        assert!(query.text.contains("dc.category_id = $3)"));
    }

    #[test]
    fn test_trending_window_is_rolling() {
        let query = trending_query(StatsPeriod::days(30), 10);
        assert!(query.text.contains("v.visited_at >= NOW() - $2::float8 * ('1 ' || $1)::interval"));
        assert!(query.text.ends_with("ORDER BY COUNT(v.id) DESC, d.id ASC LIMIT $3"));
        assert_eq!(
            query.params,
            vec![SqlParam::Text("day".into()), SqlParam::Int(30), SqlParam::Int(10)]
        );
    }
}
