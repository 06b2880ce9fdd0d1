//! Languages

use crate::core::error::ApiError;
use crate::core::query::OrderBy;
use crate::core::query_builder::TableSpec;
use crate::impl_service;
use crate::services::EntityService;
use async_graphql::SimpleObject;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub static LANGUAGES: TableSpec = TableSpec {
    table: "languages",
    key_column: "id",
    soft_delete: None,
    columns: &[("search", "name"), ("code", "code"), ("ids", "id")],
    orders: &[
        (OrderBy::NameAsc, "name ASC, id ASC"),
        (OrderBy::NameDesc, "name DESC, id DESC"),
    ],
    default_order: "code ASC",
};

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow, SimpleObject)]
pub struct Language {
    pub id: i64,
    /// ISO 639-1 code
    pub code: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_service!(LanguageService, Language, "language", LANGUAGES);

impl EntityService<Language> {
    pub async fn find_by_code(&self, code: &str) -> Result<Option<Language>, ApiError> {
        self.find_one_by("code", code.to_lowercase()).await
    }
}
