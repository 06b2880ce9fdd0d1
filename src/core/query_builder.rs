//! Generic filtered-query builder
//!
//! Every entity service describes its table once with a [`TableSpec`]
//! (filter-to-column map, supported orderings, soft-delete flag) and then
//! asks this module for SQL. Predicates are AND-ed in filter iteration order
//! and all values travel as positional parameters, numbered in the same
//! order the fragments appear in the text.
//!
//! # Example
//!
//! ```rust,ignore
//! let filters = Filters::new().with("search", "paris").with("rating_min", 4i64);
//! let query = query_builder::select(&DESTINATIONS, &filters, None, Some(OrderBy::NameAsc))?;
//! // SELECT * FROM destinations WHERE hidden = false AND name ILIKE $1 AND rating >= $2 ORDER BY name ASC
//! ```

use crate::core::error::QueryBuildError;
use crate::core::query::{
    Assignments, BuiltQuery, FilterValue, Filters, OrderBy, Pagination, SqlParam,
};

/// Static description of a table, supplied by its entity service.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    /// Physical table name
    pub table: &'static str,

    /// Primary-key column
    pub key_column: &'static str,

    /// Boolean visibility column; rows with it set are excluded everywhere
    pub soft_delete: Option<&'static str>,

    /// Logical filter name to column expression
    pub columns: &'static [(&'static str, &'static str)],

    /// Ordering token to `ORDER BY` fragment (without the keywords)
    pub orders: &'static [(OrderBy, &'static str)],

    /// Ordering used when no token is given or the token is not supported
    pub default_order: &'static str,
}

impl TableSpec {
    /// Resolve a logical filter name to its column expression
    pub fn column(&self, filter: &str) -> Option<&'static str> {
        self.columns
            .iter()
            .find(|(name, _)| *name == filter)
            .map(|(_, column)| *column)
    }

    /// Resolve an ordering token, falling back to the default order
    pub fn order(&self, order_by: Option<OrderBy>) -> &'static str {
        order_by
            .and_then(|token| {
                self.orders
                    .iter()
                    .find(|(t, _)| *t == token)
                    .map(|(_, clause)| *clause)
            })
            .unwrap_or(self.default_order)
    }

    fn visibility_predicate(&self) -> Option<String> {
        self.soft_delete.map(|column| format!("{} = false", column))
    }
}

/// Build the WHERE clause (including the keyword) into `query`.
///
/// Fails before emitting anything if a filter is not in the column map.
fn push_where(
    spec: &TableSpec,
    filters: &Filters,
    query: &mut BuiltQuery,
) -> Result<(), QueryBuildError> {
    let mut predicates: Vec<String> = spec.visibility_predicate().into_iter().collect();

    for (name, value) in filters.iter() {
        let predicate = if value.is_list() {
            let column = lookup(spec, name)?;
            format!("{} = ANY({})", column, query.push_param(value.clone().into_param()))
        } else if let Some(base) = name.strip_suffix("_min") {
            let column = lookup(spec, base)?;
            format!("{} >= {}", column, query.push_param(value.clone().into_param()))
        } else if let Some(base) = name.strip_suffix("_max") {
            let column = lookup(spec, base)?;
            format!("{} <= {}", column, query.push_param(value.clone().into_param()))
        } else {
            let column = lookup(spec, name)?;
            match value {
                FilterValue::Text(term) => {
                    format!("{} ILIKE {}", column, query.push_param(format!("%{}%", term)))
                }
                other => format!("{} = {}", column, query.push_param(other.clone().into_param())),
            }
        };
        predicates.push(predicate);
    }

    if !predicates.is_empty() {
        query.text.push_str(" WHERE ");
        query.text.push_str(&predicates.join(" AND "));
    }
    Ok(())
}

fn lookup(spec: &TableSpec, name: &str) -> Result<&'static str, QueryBuildError> {
    spec.column(name).ok_or_else(|| QueryBuildError::UnknownFilter {
        table: spec.table.to_string(),
        filter: name.to_string(),
    })
}

/// Build the data query: filters, then order, then limit/offset.
pub fn select(
    spec: &TableSpec,
    filters: &Filters,
    pagination: Option<Pagination>,
    order_by: Option<OrderBy>,
) -> Result<BuiltQuery, QueryBuildError> {
    let mut query = BuiltQuery::new(format!("SELECT * FROM {}", spec.table));
    push_where(spec, filters, &mut query)?;

    query.text.push_str(" ORDER BY ");
    query.text.push_str(spec.order(order_by));

    if let Some(pagination) = pagination {
        if let Some(limit) = pagination.limit {
            let placeholder = query.push_param(i64::from(limit));
            query.text.push_str(&format!(" LIMIT {}", placeholder));
        }
        if let Some(offset) = pagination.offset {
            let placeholder = query.push_param(i64::from(offset));
            query.text.push_str(&format!(" OFFSET {}", placeholder));
        }
    }

    Ok(query)
}

/// Build the COUNT query paired with [`select`]; numbered on its own.
pub fn count(spec: &TableSpec, filters: &Filters) -> Result<BuiltQuery, QueryBuildError> {
    let mut query = BuiltQuery::new(format!("SELECT COUNT(*) FROM {}", spec.table));
    push_where(spec, filters, &mut query)?;
    Ok(query)
}

/// Fetch visible rows whose `column` is one of `keys` (batch-load query)
pub fn select_by_keys(spec: &TableSpec, column: &str, keys: &[i64]) -> BuiltQuery {
    let mut query = BuiltQuery::new(format!("SELECT * FROM {} WHERE ", spec.table));
    if let Some(visible) = spec.visibility_predicate() {
        query.text.push_str(&visible);
        query.text.push_str(" AND ");
    }
    let placeholder = query.push_param(keys.to_vec());
    query.text.push_str(&format!("{} = ANY({})", column, placeholder));
    query
}

/// Visible rows where `column` equals `value` exactly (lookup by code, slug...)
pub fn select_eq(spec: &TableSpec, column: &str, value: impl Into<SqlParam>) -> BuiltQuery {
    let mut query = BuiltQuery::new(format!("SELECT * FROM {} WHERE ", spec.table));
    if let Some(visible) = spec.visibility_predicate() {
        query.text.push_str(&visible);
        query.text.push_str(" AND ");
    }
    let placeholder = query.push_param(value);
    query.text.push_str(&format!("{} = {}", column, placeholder));
    query
}

/// Keys of visible rows where `column` equals `value`, in default order.
///
/// Feeds the to-many relationship fields, which then go through a loader.
pub fn select_keys(spec: &TableSpec, column: &str, value: impl Into<SqlParam>) -> BuiltQuery {
    let mut query = BuiltQuery::new(format!("SELECT {} FROM {} WHERE ", spec.key_column, spec.table));
    if let Some(visible) = spec.visibility_predicate() {
        query.text.push_str(&visible);
        query.text.push_str(" AND ");
    }
    let placeholder = query.push_param(value);
    query.text.push_str(&format!(
        "{} = {} ORDER BY {}",
        column, placeholder, spec.default_order
    ));
    query
}

/// `INSERT ... RETURNING *`
pub fn insert(spec: &TableSpec, values: &Assignments) -> Result<BuiltQuery, QueryBuildError> {
    if values.is_empty() {
        return Err(QueryBuildError::EmptyAssignment {
            table: spec.table.to_string(),
        });
    }

    let mut query = BuiltQuery::new("");
    let mut columns = Vec::new();
    let mut placeholders = Vec::new();
    for (column, value) in values.iter() {
        columns.push(*column);
        placeholders.push(query.push_param(value.clone()));
    }

    query.text = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
        spec.table,
        columns.join(", "),
        placeholders.join(", ")
    );
    Ok(query)
}

/// `UPDATE ... SET ... WHERE key = $1 RETURNING *`; also bumps `updated_at`.
pub fn update(
    spec: &TableSpec,
    key: i64,
    values: &Assignments,
) -> Result<BuiltQuery, QueryBuildError> {
    if values.is_empty() {
        return Err(QueryBuildError::EmptyAssignment {
            table: spec.table.to_string(),
        });
    }

    let mut query = BuiltQuery::new("");
    let key_placeholder = query.push_param(key);
    let mut sets = Vec::new();
    for (column, value) in values.iter() {
        sets.push(format!("{} = {}", column, query.push_param(value.clone())));
    }
    sets.push("updated_at = NOW()".to_string());

    query.text = format!(
        "UPDATE {} SET {} WHERE {} RETURNING *",
        spec.table,
        sets.join(", "),
        visible_key_predicate(spec, &key_placeholder)
    );
    Ok(query)
}

/// Bump only `updated_at` on a visible row, `RETURNING *`.
///
/// For writes that change related rows (links) but no column of the row itself.
pub fn touch(spec: &TableSpec, key: i64) -> BuiltQuery {
    let mut query = BuiltQuery::new("");
    let key_placeholder = query.push_param(key);
    query.text = format!(
        "UPDATE {} SET updated_at = NOW() WHERE {} RETURNING *",
        spec.table,
        visible_key_predicate(spec, &key_placeholder)
    );
    query
}

fn visible_key_predicate(spec: &TableSpec, key_placeholder: &str) -> String {
    let mut predicate = format!("{} = {}", spec.key_column, key_placeholder);
    if let Some(visible) = spec.visibility_predicate() {
        predicate.push_str(" AND ");
        predicate.push_str(&visible);
    }
    predicate
}

/// Hide the row when the table is soft-deletable, otherwise delete it
pub fn delete(spec: &TableSpec, key: i64) -> BuiltQuery {
    let mut query = BuiltQuery::new("");
    let placeholder = query.push_param(key);
    query.text = match spec.soft_delete {
        Some(column) => format!(
            "UPDATE {} SET {} = true, updated_at = NOW() WHERE {} = {} AND {} = false",
            spec.table, column, spec.key_column, placeholder, column
        ),
        None => format!(
            "DELETE FROM {} WHERE {} = {}",
            spec.table, spec.key_column, placeholder
        ),
    };
    query
}
