use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use crate::directory_manager::{DirectoryHandle, DirectorySummary};
use shared::protocol::{API_SERVERS, API_SERVERS_HASH, API_SERVER_BY_ID, HEALTH};
use shared::types::{HealthResponse, ServiceRecord};

#[derive(Clone)]
pub struct AppState {
    pub directory: DirectoryHandle,
    pub summary_rx: watch::Receiver<DirectorySummary>,
}

#[derive(Deserialize)]
pub struct ServerQuery {
    pub name: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(API_SERVERS, get(list_servers))
        .route(API_SERVERS_HASH, get(get_hash))
        .route(API_SERVER_BY_ID, get(get_server))
        .route(HEALTH, get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Never fails: a directory that cannot be read answers with an empty list
async fn list_servers(
    State(state): State<AppState>,
    Query(params): Query<ServerQuery>,
) -> Json<Vec<ServiceRecord>> {
    match state.directory.query(params.name).await {
        Ok(records) => Json(records),
        Err(e) => {
            tracing::error!("Failed to query directory: {}", e);
            Json(Vec::new())
        }
    }
}

async fn get_hash(State(state): State<AppState>) -> String {
    state.summary_rx.borrow().hash.clone()
}

async fn get_server(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ServiceRecord>, StatusCode> {
    state
        .directory
        .get(id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to query directory: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        count: state.summary_rx.borrow().count,
    })
}
