//! Destination types (beach, museum, trail...)

use crate::core::error::ApiError;
use crate::core::query_builder::TableSpec;
use crate::impl_service;
use crate::services::{EntityService, NAMED_ORDERS};
use async_graphql::SimpleObject;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub static DESTINATION_TYPES: TableSpec = TableSpec {
    table: "destination_types",
    key_column: "id",
    soft_delete: None,
    columns: &[("search", "name"), ("ids", "id")],
    orders: NAMED_ORDERS,
    default_order: "name ASC, id ASC",
};

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow, SimpleObject)]
#[graphql(complex)]
pub struct DestinationType {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub icon_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_service!(
    DestinationTypeService,
    DestinationType,
    "destination type",
    DESTINATION_TYPES
);

impl EntityService<DestinationType> {
    pub async fn find_by_name(&self, name: &str) -> Result<Option<DestinationType>, ApiError> {
        self.find_one_by("name", name).await
    }
}
