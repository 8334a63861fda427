//! Console watcher that polls the arrivals API on an interval and renders
//! leave-by advice for each arrival.
//!
//! Polls are fired without waiting for the previous one to finish. Each poll
//! is tagged with a monotonically increasing generation number and a response
//! is only installed if no newer poll has completed, so a slow response can
//! never overwrite a fresher snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::advisory::{advice_for, first_catchable};
use crate::api::arrivals::ArrivalsResponse;
use crate::config::WatchConfig;

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },
}

/// The installed snapshot together with the generation that produced it.
/// One lock guards both so the staleness check and the install are a single
/// critical section.
#[derive(Default)]
struct Current {
    generation: u64,
    snapshot: Option<ArrivalsResponse>,
}

pub struct Watcher {
    client: reqwest::Client,
    config: WatchConfig,
    stop_key: String,
    next_generation: AtomicU64,
    latest: RwLock<Current>,
}

impl Watcher {
    pub fn new(config: WatchConfig, stop_key: String) -> Result<Self, WatchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            config,
            stop_key,
            next_generation: AtomicU64::new(0),
            latest: RwLock::new(Current::default()),
        })
    }

    /// Poll loop. Each tick launches an independent request so a stalled
    /// response never delays the next poll.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.interval_secs));
        loop {
            ticker.tick().await;
            let watcher = self.clone();
            tokio::spawn(async move {
                let generation = watcher.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
                let result = watcher.poll_once().await;
                watcher.install(generation, result).await;
            });
        }
    }

    async fn poll_once(&self) -> Result<ArrivalsResponse, WatchError> {
        let url = format!(
            "{}/api/arrivals/{}",
            self.config.base_url.trim_end_matches('/'),
            self.stop_key
        );
        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if !status.is_success() {
            // Both the arrivals failure body and the 404 body carry `error`.
            let message = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(WatchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    /// Install a poll result, discarding it if a newer poll already landed.
    /// The staleness check happens under the write lock; a slow early poll
    /// that loses the race for the lock still cannot overwrite a fresher
    /// snapshot.
    async fn install(&self, generation: u64, result: Result<ArrivalsResponse, WatchError>) {
        let mut guard = self.latest.write().await;
        if generation <= guard.generation {
            debug!(
                generation,
                installed = guard.generation,
                "Discarding superseded poll result"
            );
            return;
        }
        guard.generation = generation;

        match result {
            Ok(snapshot) => {
                println!("{}", render(&snapshot, &self.config));
                guard.snapshot = Some(snapshot);
            }
            Err(e) => {
                warn!(error = %e, "Poll failed");
                // Stale advice is worse than no advice.
                guard.snapshot = None;
            }
        }
    }

    pub async fn latest(&self) -> Option<ArrivalsResponse> {
        self.latest.read().await.snapshot.clone()
    }
}

/// Render one snapshot as console lines, one per arrival, with the first
/// still-catchable arrival marked.
pub fn render(snapshot: &ArrivalsResponse, config: &WatchConfig) -> String {
    if snapshot.arrivals.is_empty() {
        return format!("{}: no upcoming arrivals", snapshot.stop_name);
    }

    let highlight = first_catchable(
        &snapshot.arrivals,
        config.walk_minutes,
        config.buffer_minutes,
    );

    let mut out = format!(
        "{} (lines: {})\n",
        snapshot.stop_name,
        snapshot.lines.join(", ")
    );
    for (i, arrival) in snapshot.arrivals.iter().enumerate() {
        let advice = advice_for(arrival.in_minutes, config.walk_minutes, config.buffer_minutes);
        let marker = if highlight == Some(i) { ">" } else { " " };
        let direction = arrival
            .direction
            .as_deref()
            .map(|d| format!(" to {d}"))
            .unwrap_or_default();
        out.push_str(&format!(
            "{marker} line {}{} in {} min - {}\n",
            arrival.line, direction, arrival.in_minutes, advice.label
        ));
    }
    out
}
