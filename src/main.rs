use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;

// Import from the library instead of local modules
use lookup_service::{classify, Config, LookupClient, LookupError, LookupResponse};

// Import metrics module locally (API-only)
mod metrics;

#[derive(Clone)]
pub struct AppState {
    client: LookupClient,
    config: Arc<Config>,
}

#[derive(Deserialize)]
struct LookupQuery {
    /// Domain, IP address (optionally bracketed or with CIDR) or ASN
    query: String,
    #[serde(default)]
    /// Skip cache if true
    fresh: bool,
}

#[derive(Deserialize)]
struct LookupOptions {
    #[serde(default)]
    fresh: bool,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "lookup_service=info,tower_http=debug".into()),
        )
        .init();

    let config = Arc::new(Config::load()?);
    info!("Configuration loaded successfully");

    let client = LookupClient::new_with_config(config.clone()).await?;

    metrics::init_metrics();

    let app_state = AppState {
        client,
        config: config.clone(),
    };

    let app = Router::new()
        .route("/api/lookup", get(lookup_get).post(lookup_post))
        .route("/api/lookup/:query", get(lookup_path))
        .route("/config", get(site_config))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics::metrics_handler))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive())
                .into_inner(),
        )
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Lookup service listening on {}", addr);
    info!("Lookup API: http://{}/api/lookup/<domain|ip|asn>", addr);
    info!("Metrics: http://{}/metrics", addr);

    let shutdown_signal = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, gracefully shutting down...");
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    Ok(())
}

async fn lookup(state: &AppState, query: &str, fresh: bool) -> Result<Json<LookupResponse>, LookupError> {
    let query_type = classify(query.trim());

    match state.client.lookup_with_options(query, fresh).await {
        Ok(response) => {
            metrics::increment_requests(query_type);
            if response.cached {
                metrics::increment_cache_hits();
            } else {
                metrics::record_query_time(response.query_time_ms);
            }
            Ok(Json(response))
        }
        Err(e) => {
            tracing::debug!("Lookup for {:?} failed: {}", query, e);
            metrics::increment_errors(&e);
            Err(e)
        }
    }
}

async fn lookup_path(
    Path(query): Path<String>,
    Query(options): Query<LookupOptions>,
    State(state): State<AppState>,
) -> Result<Json<LookupResponse>, LookupError> {
    lookup(&state, &query, options.fresh).await
}

async fn lookup_get(
    Query(params): Query<LookupQuery>,
    State(state): State<AppState>,
) -> Result<Json<LookupResponse>, LookupError> {
    lookup(&state, &params.query, params.fresh).await
}

async fn lookup_post(
    State(state): State<AppState>,
    Json(payload): Json<LookupQuery>,
) -> Result<Json<LookupResponse>, LookupError> {
    lookup(&state, &payload.query, payload.fresh).await
}

async fn site_config(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "siteTitle": state.config.site_title }))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.config.start_time.elapsed().as_secs(),
    })
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
