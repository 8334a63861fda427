//! GTFS data access.
//!
//! Downloads the static GTFS reference dataset (ZIP) once at startup and
//! builds an in-memory stop/route index, and fetches the GTFS-RT trip-updates
//! protobuf fresh on every correlation cycle.

pub mod error;
pub mod realtime;
pub mod reference;

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::config::FeedConfig;

use error::GtfsError;
use realtime::TripUpdateRecord;
use reference::ReferenceStore;

pub struct GtfsClient {
    client: reqwest::Client,
    feeds: FeedConfig,
    target_stop_name: String,
    reference: ReferenceStore,
}

impl GtfsClient {
    pub fn new(feeds: FeedConfig, target_stop_name: String) -> Result<Self, GtfsError> {
        let client = reqwest::Client::builder()
            .user_agent("catchthebus/0.1")
            .build()?;

        Ok(Self {
            client,
            feeds,
            target_stop_name,
            reference: Arc::new(RwLock::new(None)),
        })
    }

    /// Download and index the static reference dataset.
    ///
    /// Runs once; on failure the store stays `None` and requests keep
    /// reporting not-ready. No partial index is ever installed.
    pub async fn load_reference(&self) -> Result<(), GtfsError> {
        info!(url = %self.feeds.static_url, "Loading static GTFS reference");

        let bytes = reference::download_archive(&self.client, &self.feeds.static_url).await?;

        let target = self.target_stop_name.clone();
        let index =
            tokio::task::spawn_blocking(move || reference::build_index(&bytes, &target)).await??;

        info!(
            stops = index.stops.len(),
            routes = index.routes.len(),
            target_stops = index.target_stop_ids.len(),
            "Loaded static GTFS reference into memory"
        );

        let mut guard = self.reference.write().await;
        *guard = Some(Arc::new(index));

        Ok(())
    }

    /// Fetch the live feed and decode it into trip-update records.
    pub async fn fetch_trip_updates(&self) -> Result<Vec<TripUpdateRecord>, GtfsError> {
        let feed = realtime::fetch_feed(&self.client, &self.feeds.trip_updates_url).await?;
        Ok(realtime::decode_trip_updates(&feed))
    }

    /// Shared handle to the reference store for API handlers.
    pub fn reference(&self) -> ReferenceStore {
        self.reference.clone()
    }
}
