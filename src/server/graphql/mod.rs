//! GraphQL schema and HTTP handlers
//!
//! The schema is static (`QueryRoot`, `MutationRoot`, no subscriptions) and
//! carries the process-wide [`Services`]. Every execution additionally gets a
//! fresh [`Loaders`] in its request data; relationship fields resolve through
//! it so that one response tree costs one query per entity kind and level.

mod mutation;
mod query;
mod relations;
pub mod types;

pub use mutation::MutationRoot;
pub use query::QueryRoot;

use crate::core::loader::LoaderOptions;
use crate::services::{Loaders, Services};
use crate::storage::postgres::Database;
use async_graphql::http::GraphiQLSource;
use async_graphql::{Context, EmptySubscription, Schema};
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::extract::State;
use axum::response::{Html, IntoResponse};
use tracing::Instrument;
use uuid::Uuid;

use super::AppState;

pub type AppSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Nesting deeper than this is rejected before execution
const MAX_DEPTH: usize = 12;

pub fn build_schema(services: Services) -> AppSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(services)
        .limit_depth(MAX_DEPTH)
        .finish()
}

/// Run one GraphQL request with its own loader registry
pub async fn execute(
    schema: &AppSchema,
    db: &Database,
    options: LoaderOptions,
    request: async_graphql::Request,
) -> async_graphql::Response {
    let loaders = Loaders::new(db, options);
    let response = schema.execute(request.data(loaders.clone())).await;
    tracing::debug!(
        batches = loaders.dispatch_count(),
        errors = response.errors.len(),
        "graphql request complete"
    );
    response
}

pub(crate) async fn graphql_handler(
    State(state): State<AppState>,
    request: GraphQLRequest,
) -> GraphQLResponse {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("graphql", %request_id);
    execute(
        &state.schema,
        &state.db,
        state.loader_options,
        request.into_inner(),
    )
    .instrument(span)
    .await
    .into()
}

pub(crate) async fn graphiql(State(state): State<AppState>) -> impl IntoResponse {
    Html(
        GraphiQLSource::build()
            .endpoint(&state.graphql_path)
            .finish(),
    )
}

pub(crate) fn services<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a Services> {
    ctx.data::<Services>()
}

pub(crate) fn loaders<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a Loaders> {
    ctx.data::<Loaders>()
}
