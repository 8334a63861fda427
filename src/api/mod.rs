pub mod arrivals;
pub mod error;
pub mod health;

pub use error::ErrorResponse;

use std::sync::Arc;

use axum::Router;

use crate::config::Config;
use crate::gtfs::GtfsClient;

pub fn router(gtfs: Arc<GtfsClient>, config: &Config) -> Router {
    let reference = gtfs.reference();
    let arrivals_state = arrivals::ArrivalsState {
        gtfs,
        reference: reference.clone(),
        stop_key: config.stop_key.clone(),
        stop_display_name: config.target_stop_name.clone(),
    };

    Router::new()
        .nest("/arrivals", arrivals::router(arrivals_state))
        .nest("/health", health::router(reference))
}
