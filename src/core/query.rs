//! Filter, ordering and pagination types shared by every entity service

use async_graphql::{Enum, InputObject};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A positional query parameter.
///
/// Values never reach the query text; they are bound as `$n` placeholders by
/// the executor in the order they appear in [`BuiltQuery::params`].
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    IntArray(Vec<i64>),
    TextArray(Vec<String>),
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        SqlParam::Int(v)
    }
}

impl From<i32> for SqlParam {
    fn from(v: i32) -> Self {
        SqlParam::Int(v.into())
    }
}

impl From<f64> for SqlParam {
    fn from(v: f64) -> Self {
        SqlParam::Float(v)
    }
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        SqlParam::Bool(v)
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(v)
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(v.to_string())
    }
}

impl From<DateTime<Utc>> for SqlParam {
    fn from(v: DateTime<Utc>) -> Self {
        SqlParam::Timestamp(v)
    }
}

impl From<Vec<i64>> for SqlParam {
    fn from(v: Vec<i64>) -> Self {
        SqlParam::IntArray(v)
    }
}

impl From<Vec<String>> for SqlParam {
    fn from(v: Vec<String>) -> Self {
        SqlParam::TextArray(v)
    }
}

/// A filter value as supplied by a caller.
///
/// # Translation
/// - `IntList` / `TextList`: `column = ANY($n)`
/// - name ending in `_min` / `_max`: `column >= $n` / `column <= $n`
/// - `Text`: `column ILIKE $n` with the value wrapped in `%…%`
/// - other scalars: `column = $n`
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    IntList(Vec<i64>),
    TextList(Vec<String>),
}

impl FilterValue {
    pub(crate) fn into_param(self) -> SqlParam {
        match self {
            FilterValue::Text(v) => SqlParam::Text(v),
            FilterValue::Int(v) => SqlParam::Int(v),
            FilterValue::Float(v) => SqlParam::Float(v),
            FilterValue::Bool(v) => SqlParam::Bool(v),
            FilterValue::Timestamp(v) => SqlParam::Timestamp(v),
            FilterValue::IntList(v) => SqlParam::IntArray(v),
            FilterValue::TextList(v) => SqlParam::TextArray(v),
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, FilterValue::IntList(_) | FilterValue::TextList(_))
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::Text(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        FilterValue::Text(v)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        FilterValue::Int(v)
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        FilterValue::Float(v)
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        FilterValue::Bool(v)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(v: DateTime<Utc>) -> Self {
        FilterValue::Timestamp(v)
    }
}

impl From<Vec<i64>> for FilterValue {
    fn from(v: Vec<i64>) -> Self {
        FilterValue::IntList(v)
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(v: Vec<String>) -> Self {
        FilterValue::TextList(v)
    }
}

/// Filter specification: logical filter name to value, in insertion order.
///
/// Insertion order decides predicate and parameter order in the built query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters(IndexMap<String, FilterValue>);

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter, replacing any previous value under the same name
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FilterValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Add a filter only when a value is present
    pub fn insert_opt<V: Into<FilterValue>>(&mut self, name: &str, value: Option<V>) {
        if let Some(value) = value {
            self.insert(name, value);
        }
    }

    /// Add an id-list filter only when the list is present and non-empty
    pub fn insert_ids(&mut self, name: &str, ids: Option<&Vec<i64>>) {
        if let Some(ids) = ids.filter(|ids| !ids.is_empty()) {
            self.insert(name, ids.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Pagination window. Absent fields mean "no limit" / "from the start".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, InputObject, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl Pagination {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
        }
    }
}

/// Ordering tokens accepted by list queries.
///
/// Each table maps the tokens it supports onto a fixed `ORDER BY` fragment;
/// a token a table does not support falls back to that table's default order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderBy {
    NameAsc,
    NameDesc,
    CreatedAtAsc,
    CreatedAtDesc,
    VisitsDesc,
    RatingDesc,
    Popularity,
    RecentlyAdded,
}

/// Query text plus the parameters to bind, in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub text: String,
    pub params: Vec<SqlParam>,
}

impl BuiltQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
        }
    }

    /// Bind a parameter and return its placeholder (`$1`, `$2`, ...)
    pub fn push_param(&mut self, param: impl Into<SqlParam>) -> String {
        self.params.push(param.into());
        format!("${}", self.params.len())
    }

    /// Convenience constructor for hand-written statements
    pub fn with_params(text: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            text: text.into(),
            params,
        }
    }
}

/// Column/value pairs for INSERT and UPDATE statements
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignments(Vec<(&'static str, SqlParam)>);

impl Assignments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, column: &'static str, value: impl Into<SqlParam>) -> Self {
        self.0.push((column, value.into()));
        self
    }

    /// Set a column only when a value is present
    pub fn set_opt<V: Into<SqlParam>>(mut self, column: &'static str, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.0.push((column, value.into()));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(&'static str, SqlParam)> {
        self.0.iter()
    }
}

/// One page of results together with the unpaginated total
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: i64,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_count: i64, pagination: Option<Pagination>) -> Self {
        let offset = pagination.and_then(|p| p.offset).unwrap_or(0) as i64;
        let has_more = offset + (items.len() as i64) < total_count;
        Self {
            items,
            total_count,
            has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_keep_insertion_order() {
        let filters = Filters::new()
            .with("search", "paris")
            .with("rating_min", 4i64)
            .with("ids", vec![1i64, 2]);
        let names: Vec<_> = filters.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["search", "rating_min", "ids"]);
    }

    #[test]
    fn test_insert_ids_skips_empty_list() {
        let mut filters = Filters::new();
        filters.insert_ids("ids", Some(&vec![]));
        filters.insert_ids("ids", None);
        assert!(filters.is_empty());

        filters.insert_ids("ids", Some(&vec![3]));
        assert_eq!(filters.len(), 1);
    }

    #[test]
    fn test_push_param_numbers_sequentially() {
        let mut query = BuiltQuery::new("");
        assert_eq!(query.push_param(1i64), "$1");
        assert_eq!(query.push_param("x"), "$2");
        assert_eq!(query.params.len(), 2);
    }

    #[test]
    fn test_page_has_more() {
        let page = Page::new(vec![1, 2], 5, Some(Pagination::new(2, 0)));
        assert!(page.has_more);

        let page = Page::new(vec![5], 5, Some(Pagination::new(2, 4)));
        assert!(!page.has_more);

        let page: Page<i32> = Page::new(vec![], 0, None);
        assert!(!page.has_more);
    }
}
