mod config;
mod errors;
mod handlers;
mod middleware;
mod models;
mod services;
mod validation;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;

use crate::config::Config;
use crate::services::{CreditLedger, HttpComputeBackend, JobService, RedisStore, Store};

// Slack on top of the escaped document for the JSON envelope. JSON
// string escaping can double a quote-heavy document, so the body cap is
// twice the document limit plus this; oversized documents that still fit
// the transport are rejected by the validator with a proper error body.
const BODY_LIMIT_SLACK: usize = 64 * 1024;

// Application state shared between handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub ledger: CreditLedger,
    pub jobs: JobService,
}

#[tokio::main]
async fn main() {
    // Initialize basic tracing subscriber
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::load().expect("Failed to load configuration");

    // Initialize Redis-backed store
    let redis_client = Arc::new(
        redis::Client::open(config.redis.url.clone()).expect("Failed to connect to Redis"),
    );
    let store: Arc<dyn Store> = Arc::new(RedisStore::new(redis_client));

    // Compute backend client; a missing endpoint/credential surfaces per
    // request as FailedPrecondition rather than a startup failure.
    let backend = Arc::new(HttpComputeBackend::new(&config.backend));

    let ledger = CreditLedger::new(store.clone());
    let jobs = JobService::new(
        store.clone(),
        backend,
        ledger.clone(),
        config.credit.min_balance_cents,
        config.limits.max_xml_chars,
    );

    let state = AppState {
        store,
        ledger,
        jobs,
    };

    // Create router with all routes
    let app = Router::new()
        // Account routes
        .route("/account/ensure", post(handlers::ensure_account))
        // Job routes
        .route("/jobs", post(handlers::submit_job))
        .route("/jobs/:job_id/cancel", post(handlers::cancel_job))
        .route("/jobs/:job_id/status", get(handlers::job_status))
        // Payment event delivery (machine-to-machine, bypasses auth)
        .route("/payments/events", post(handlers::payment_event))
        // Add middleware
        .layer(from_fn(middleware::require_auth))
        // Request body limits from config
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(
            config.limits.max_xml_chars * 2 + BODY_LIMIT_SLACK,
        ))
        // Add state
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Server running on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind server");

    axum::serve(listener, app.into_make_service())
        .await
        .expect("Failed to start server");
}
