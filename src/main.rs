use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use catchthebus::api;
use catchthebus::config::Config;
use catchthebus::gtfs::GtfsClient;

#[derive(OpenApi)]
#[openapi(
    info(title = "Catch The Bus API", version = "0.1.0"),
    paths(
        api::arrivals::get_arrivals,
        api::health::health_check,
    ),
    components(schemas(
        api::arrivals::ArrivalsResponse,
        api::health::HealthResponse,
        api::ErrorResponse,
        catchthebus::arrivals::Arrival,
    )),
    tags(
        (name = "arrivals", description = "Upcoming arrivals at the monitored stop"),
        (name = "health", description = "Service health check")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Load config
    let config = Config::load("config.yaml").expect("Failed to load config");
    tracing::info!(
        stop = %config.target_stop_name,
        key = %config.stop_key,
        "Loaded configuration"
    );

    // Build CORS layer based on config
    let cors_layer = if config.cors_permissive {
        tracing::warn!("CORS: Permissive mode explicitly enabled (all origins allowed) - DO NOT USE IN PRODUCTION");
        CorsLayer::permissive()
    } else if !config.cors_origins.is_empty() {
        tracing::info!(origins = ?config.cors_origins, "CORS: Restricting to configured origins");
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([axum::http::Method::GET, axum::http::Method::OPTIONS])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    } else {
        panic!("CORS configuration error: Either set 'cors_origins' with allowed origins, or set 'cors_permissive: true' for development");
    };

    let gtfs = Arc::new(
        GtfsClient::new(config.feeds.clone(), config.target_stop_name.clone())
            .expect("Failed to initialize GTFS client"),
    );

    // Load the static reference in the background; until it completes the
    // arrivals endpoint answers 503 and health reports reference_loaded=false.
    let loader = gtfs.clone();
    tokio::spawn(async move {
        if let Err(e) = loader.load_reference().await {
            tracing::error!(error = %e, "Failed to load static GTFS reference");
        }
    });

    // Build the app
    let app = Router::new()
        .route("/", get(root))
        .nest("/api", api::router(gtfs, &config))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {}: {e}", config.listen_addr));

    tracing::info!("Server running on http://{}", config.listen_addr);
    tracing::info!("Swagger UI: http://{}/swagger-ui", config.listen_addr);

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}

async fn root() -> &'static str {
    "Catch The Bus API"
}
