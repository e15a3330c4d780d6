//! AutoPress API Gateway
//!
//! The main entry point for the admin dashboard API.
//! Handles:
//! - Authentication and authorization
//! - Company, website, prompt, webhook and article management
//! - Article generation triggers and n8n callbacks
//! - Rate limiting
//! - Observability (logging, metrics)

mod handlers;
mod middleware;

use anyhow::Context;
use axum::{
    extract::{FromRef, Request},
    middleware::{from_fn, Next},
    routing::{get, patch, post},
    Router,
};
use autopress_common::{
    auth::JwtVerifier,
    config::{AppConfig, ObservabilityConfig},
    db::{DbPool, Repository},
    metrics,
    workflow::ArticleWorkflow,
    HttpWebhookClient,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub verifier: Arc<JwtVerifier>,
    pub workflow: Arc<ArticleWorkflow>,
}

impl FromRef<AppState> for Arc<JwtVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.verifier.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config.observability);

    info!(
        service = %config.observability.service_name,
        "Starting AutoPress API Gateway v{}",
        autopress_common::VERSION
    );

    let config = Arc::new(config);

    // Initialize metrics
    install_metrics_exporter(&config.observability)?;
    metrics::register_metrics();

    // Initialize database connection
    let db = DbPool::new(&config.database).await?;

    if config.database.run_migrations {
        db.migrate().await?;
    }

    if config.n8n.callback_secret.as_deref().map_or(true, str::is_empty) {
        warn!("n8n.callback_secret is not set, n8n callbacks will be accepted unsigned");
    }

    let dispatcher = Arc::new(HttpWebhookClient::new(config.webhook_timeout())?);
    let workflow = ArticleWorkflow::new(
        Repository::new(db.clone()),
        dispatcher,
        config.callback_url(),
    );

    // Create app state
    let state = AppState {
        config: config.clone(),
        db,
        verifier: Arc::new(JwtVerifier::new(&config.auth)),
        workflow: Arc::new(workflow),
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let listener = tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.server.host, config.server.port))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Serve Prometheus metrics on their own port. Port 0 disables the exporter.
fn install_metrics_exporter(config: &ObservabilityConfig) -> anyhow::Result<()> {
    if config.metrics_port == 0 {
        info!("Metrics exporter disabled");
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("request_duration_seconds".to_string()),
            metrics::LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Suffix("webhook_dispatch_duration_seconds".to_string()),
            metrics::WEBHOOK_BUCKETS,
        )?
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!(%addr, "Metrics exporter listening");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // API routes
    let mut api_routes = Router::new()
        // Company endpoints
        .route(
            "/companies",
            get(handlers::companies::list_companies).post(handlers::companies::create_company),
        )
        .route(
            "/companies/{id}",
            get(handlers::companies::get_company)
                .patch(handlers::companies::update_company)
                .delete(handlers::companies::delete_company),
        )

        // Website endpoints
        .route(
            "/websites",
            get(handlers::websites::list_websites).post(handlers::websites::create_website),
        )
        .route(
            "/websites/{id}",
            get(handlers::websites::get_website)
                .patch(handlers::websites::update_website)
                .delete(handlers::websites::delete_website),
        )

        // Prompt endpoints
        .route(
            "/prompts",
            get(handlers::prompts::list_prompts).post(handlers::prompts::create_prompt),
        )
        .route(
            "/prompts/{id}",
            get(handlers::prompts::get_prompt)
                .patch(handlers::prompts::update_prompt)
                .delete(handlers::prompts::delete_prompt),
        )

        // Webhook endpoints (n8n callback authenticates by signature)
        .route(
            "/webhooks",
            get(handlers::webhooks::list_webhooks).post(handlers::webhooks::create_webhook),
        )
        .route("/webhooks/n8n", post(handlers::callbacks::n8n_callback))
        .route(
            "/webhooks/{id}",
            get(handlers::webhooks::get_webhook)
                .patch(handlers::webhooks::update_webhook)
                .delete(handlers::webhooks::delete_webhook),
        )

        // Article endpoints
        .route(
            "/articles",
            get(handlers::articles::list_articles).post(handlers::articles::create_article),
        )
        .route(
            "/articles/{id}",
            get(handlers::articles::get_article)
                .patch(handlers::articles::update_article)
                .delete(handlers::articles::delete_article),
        )
        .route("/articles/{id}/force-process", post(handlers::articles::force_process))

        // Scheduled article endpoints
        .route("/scheduled-articles", get(handlers::scheduled::list_scheduled))
        .route("/scheduled-articles/dispatch", post(handlers::scheduled::dispatch_due))
        .route(
            "/scheduled-articles/{id}/progress",
            patch(handlers::scheduled::update_progress),
        )
        .route_layer(from_fn(middleware::metrics::track_metrics));

    let limits = &state.config.rate_limit;
    if limits.enabled {
        match middleware::rate_limit::create_rate_limiter(limits.requests_per_second, limits.burst) {
            Some(limiter) => {
                let rps = limits.requests_per_second;
                api_routes = api_routes.layer(from_fn(move |request: Request, next: Next| {
                    middleware::rate_limit::rate_limit_middleware(request, next, limiter.clone(), rps)
                }));
            }
            None => warn!("Rate limit enabled with a zero quota, not limiting"),
        }
    }

    let timeout = state.config.request_timeout();

    // Compose the app
    Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/api", api_routes)
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
