use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::gtfs::reference::ReferenceStore;

#[derive(Clone)]
pub struct HealthState {
    pub reference: ReferenceStore,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Whether the service is running
    pub healthy: bool,
    /// Whether the static reference index has been loaded into memory
    pub reference_loaded: bool,
    /// Number of stops in the loaded reference
    pub stop_count: usize,
    /// Number of routes in the loaded reference
    pub route_count: usize,
    /// Number of stop ids resolved for the target stop name
    pub target_stop_count: usize,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service health status", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<HealthState>) -> Json<HealthResponse> {
    let reference_guard = state.reference.read().await;
    let (loaded, stop_count, route_count, target_stop_count) =
        if let Some(reference) = reference_guard.as_ref() {
            (
                true,
                reference.stops.len(),
                reference.routes.len(),
                reference.target_stop_ids.len(),
            )
        } else {
            (false, 0, 0, 0)
        };

    Json(HealthResponse {
        healthy: true,
        reference_loaded: loaded,
        stop_count,
        route_count,
        target_stop_count,
    })
}

pub fn router(reference: ReferenceStore) -> Router {
    let state = HealthState { reference };
    Router::new()
        .route("/", get(health_check))
        .with_state(state)
}
