//! HTTP server
//!
//! Routes:
//! - `POST {graphql_path}`: GraphQL queries and mutations
//! - `GET {graphql_path}`: GraphiQL
//! - `GET /health`: database round-trip

pub mod graphql;

use crate::config::{AppConfig, ServerConfig};
use crate::core::error::ApiError;
use crate::core::loader::LoaderOptions;
use crate::services::Services;
use crate::storage::postgres::Database;
use anyhow::Result;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use graphql::{AppSchema, build_schema};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub schema: AppSchema,
    pub loader_options: LoaderOptions,
    pub graphql_path: String,
}

impl AppState {
    pub fn new(db: Database, config: &AppConfig) -> Self {
        let schema = build_schema(Services::new(db.clone()));
        Self {
            db,
            schema,
            loader_options: config.loader.options(),
            graphql_path: config.server.graphql_path.clone(),
        }
    }
}

/// Build the application router
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let graphql_path = state.graphql_path.clone();
    Router::new()
        .route(
            &graphql_path,
            get(graphql::graphiql).post(graphql::graphql_handler),
        )
        .route("/health", get(health))
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.db.ping().await?;
    Ok(Json(json!({ "status": "ok" })))
}

/// Serve until SIGTERM or Ctrl+C, then drain the pool
pub async fn serve(config: &AppConfig, db: Database) -> Result<()> {
    let state = AppState::new(db.clone(), config);
    let app = build_router(state, &config.server);

    let addr = config.server.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(
        "Server listening on {} (GraphQL at {})",
        addr,
        config.server.graphql_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or Ctrl+C
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
