//! Console poller: prints leave-by advice for the monitored stop every
//! interval, using the same config file as the server.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catchthebus::config::Config;
use catchthebus::watch::Watcher;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::load("config.yaml").expect("Failed to load config");
    tracing::info!(
        base_url = %config.watch.base_url,
        interval_secs = config.watch.interval_secs,
        walk_minutes = config.watch.walk_minutes,
        buffer_minutes = config.watch.buffer_minutes,
        "Watching arrivals"
    );

    let watcher = Arc::new(
        Watcher::new(config.watch, config.stop_key).expect("Failed to initialize watcher"),
    );
    watcher.run().await;
}
