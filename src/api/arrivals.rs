use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use crate::api::ErrorResponse;
use crate::arrivals::correlate::correlate;
use crate::arrivals::rank::rank;
use crate::arrivals::Arrival;
use crate::gtfs::reference::ReferenceStore;
use crate::gtfs::GtfsClient;

#[derive(Clone)]
pub struct ArrivalsState {
    pub gtfs: Arc<GtfsClient>,
    pub reference: ReferenceStore,
    pub stop_key: String,
    pub stop_display_name: String,
}

/// Arrivals for the monitored stop.
///
/// On failure the lists are empty and `error` is set; a response never mixes
/// partial data with an error.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ArrivalsResponse {
    /// Display name of the monitored stop
    pub stop_name: String,
    /// Distinct line labels across the full (uncapped) correlated set
    pub lines: Vec<String>,
    /// Capped arrival list, soonest first
    pub arrivals: Vec<Arrival>,
    /// RFC 3339 timestamp of when this response was produced
    pub generated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn failure(state: &ArrivalsState, status: StatusCode, message: String) -> Response {
    let body = ArrivalsResponse {
        stop_name: state.stop_display_name.clone(),
        lines: Vec::new(),
        arrivals: Vec::new(),
        generated_at: Utc::now().to_rfc3339(),
        error: Some(message),
    };
    (status, Json(body)).into_response()
}

/// Upcoming arrivals at the monitored stop
#[utoipa::path(
    get,
    path = "/api/arrivals/{stop}",
    params(
        ("stop" = String, Path, description = "Configured stop key")
    ),
    responses(
        (status = 200, description = "Correlated arrivals, soonest first", body = ArrivalsResponse),
        (status = 404, description = "Unknown stop key", body = ErrorResponse),
        (status = 502, description = "Live feed fetch or decode failed", body = ArrivalsResponse),
        (status = 503, description = "Static reference not loaded yet", body = ArrivalsResponse)
    ),
    tag = "arrivals"
)]
pub async fn get_arrivals(
    State(state): State<ArrivalsState>,
    Path(stop): Path<String>,
) -> Response {
    if stop != state.stop_key {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!("unknown stop key: {stop}"))),
        )
            .into_response();
    }

    // Clone the index handle out and release the lock before the network
    // fetch; holding a read guard across it would block the loader's write
    // and, behind it, every later request.
    let reference = {
        let guard = state.reference.read().await;
        guard.as_ref().filter(|r| r.is_ready()).cloned()
    };
    let Some(reference) = reference else {
        return failure(
            &state,
            StatusCode::SERVICE_UNAVAILABLE,
            "target stop set not available (static reference not loaded)".to_string(),
        );
    };

    let updates = match state.gtfs.fetch_trip_updates().await {
        Ok(updates) => updates,
        Err(e) => {
            warn!(error = %e, "Live feed fetch failed");
            return failure(&state, StatusCode::BAD_GATEWAY, e.to_string());
        }
    };

    let now_epoch = Utc::now().timestamp();
    let correlated = correlate(
        &updates,
        &reference.target_stop_ids,
        &reference.routes,
        now_epoch,
    );
    let ranked = rank(correlated);

    let body = ArrivalsResponse {
        stop_name: state.stop_display_name.clone(),
        lines: ranked.lines,
        arrivals: ranked.arrivals,
        generated_at: Utc::now().to_rfc3339(),
        error: None,
    };
    (StatusCode::OK, Json(body)).into_response()
}

pub fn router(state: ArrivalsState) -> Router {
    Router::new()
        .route("/{stop}", get(get_arrivals))
        .with_state(state)
}
