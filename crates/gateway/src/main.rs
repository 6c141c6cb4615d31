//! Noe Ops API Gateway
//!
//! The back-office API for Noe Sushi Bar.
//! Handles:
//! - Session authentication
//! - Recipes, costing and documents
//! - Odoo and Toast proxying
//! - Rate limiting
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use noe_common::{
    auth::{Credentials, SessionStore},
    cache::TtlCache,
    config::{AppConfig, ObservabilityConfig},
    db::{self, Store},
    errors::{self, AppError, Result},
    metrics,
    models::{OdooProduct, SalesPage},
    odoo::{OdooClient, ProductCatalog},
    toast::{SalesSource, ToastClient},
};
use opentelemetry::{trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub sessions: Arc<SessionStore>,
    pub catalog: Option<Arc<dyn ProductCatalog>>,
    pub sales: Option<Arc<dyn SalesSource>>,
    pub product_cache: Arc<TtlCache<String, Vec<OdooProduct>>>,
    pub sales_cache: Arc<TtlCache<String, SalesPage>>,
}

impl FromRef<AppState> for Arc<SessionStore> {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

impl AppState {
    /// Wire up state from configuration and an opened store
    pub fn new(config: AppConfig, store: Arc<dyn Store>) -> Result<Self> {
        let credentials = Credentials::from_config(&config.auth, config.is_development());
        if matches!(credentials, Credentials::AnyNonEmpty) {
            tracing::warn!("No login credentials configured: mock login accepts any non-empty pair");
        }
        let sessions = Arc::new(SessionStore::new(credentials, config.session_ttl()));

        let catalog = OdooClient::from_config(&config.odoo)?
            .map(|client| Arc::new(client) as Arc<dyn ProductCatalog>);
        let sales = ToastClient::from_config(&config.toast)?
            .map(|client| Arc::new(client) as Arc<dyn SalesSource>);

        info!(
            odoo = catalog.is_some(),
            toast = sales.is_some(),
            store = store.backend(),
            "Integrations configured"
        );

        let product_cache = Arc::new(TtlCache::new(
            "odoo_products",
            Duration::from_secs(config.cache.odoo_products_ttl_secs),
        ));
        let sales_cache = Arc::new(TtlCache::new(
            "toast_sales",
            Duration::from_secs(config.cache.toast_sales_ttl_secs),
        ));

        Ok(Self {
            config: Arc::new(config),
            store,
            sessions,
            catalog,
            sales,
            product_cache,
            sales_cache,
        })
    }

    /// The Odoo catalog, or 503 when Odoo is not configured
    pub fn catalog(&self) -> Result<&Arc<dyn ProductCatalog>> {
        self.catalog.as_ref().ok_or_else(|| AppError::NotConfigured {
            service: "Odoo".to_string(),
        })
    }

    /// The Toast sales source, or 503 when Toast is not configured
    pub fn sales(&self) -> Result<&Arc<dyn SalesSource>> {
        self.sales.as_ref().ok_or_else(|| AppError::NotConfigured {
            service: "Toast".to_string(),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize tracing
    init_tracing(&config.observability)?;

    info!("Starting Noe Ops API Gateway v{}", noe_common::VERSION);

    errors::expose_internal_errors(config.is_development());

    // Initialize metrics
    init_metrics(&config.observability)?;

    // Open the store
    let store = db::connect_store(&config.database).await?;

    let state = AppState::new(config, store)?;
    let config = state.config.clone();

    spawn_sweeper(state.clone(), config.sweep_interval());

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let (stopping_tx, mut stopping_rx) = tokio::sync::watch::channel(false);
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = stopping_tx.send(true);
    });

    // Open connections get `shutdown_timeout` to drain once a signal arrives
    let drain_deadline = async {
        if stopping_rx.wait_for(|stopping| *stopping).await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(config.shutdown_timeout()).await;
    };

    tokio::select! {
        result = async { server.await } => result?,
        _ = drain_deadline => {
            tracing::warn!(
                timeout_secs = config.server.shutdown_timeout_secs,
                "Shutdown timeout elapsed, dropping open connections"
            );
        }
    }

    opentelemetry::global::shutdown_tracer_provider();
    info!("Server shutdown complete");
    Ok(())
}

/// Install the tracing subscriber, with OTLP export when an endpoint is set
fn init_tracing(config: &ObservabilityConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let json_layer = config
        .json_logging
        .then(|| tracing_subscriber::fmt::layer().json().with_target(true));
    let text_layer = (!config.json_logging)
        .then(|| tracing_subscriber::fmt::layer().with_target(true));

    let otel_layer = match &config.otel_endpoint {
        Some(endpoint) => {
            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint.clone())
                .build()?;

            let provider = opentelemetry_sdk::trace::TracerProvider::builder()
                .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
                .with_config(opentelemetry_sdk::trace::Config::default().with_resource(
                    opentelemetry_sdk::Resource::new(vec![KeyValue::new(
                        "service.name",
                        config.service_name.clone(),
                    )]),
                ))
                .build();

            let tracer = provider.tracer(config.service_name.clone());
            opentelemetry::global::set_tracer_provider(provider);
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(otel_layer)
        .try_init()?;

    Ok(())
}

/// Register metric descriptions and start the Prometheus listener
fn init_metrics(config: &ObservabilityConfig) -> anyhow::Result<()> {
    if config.metrics_port == 0 {
        info!("Metrics exporter disabled");
        return Ok(());
    }

    PrometheusBuilder::new()
        .set_buckets(metrics::LATENCY_BUCKETS)?
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], config.metrics_port)))
        .install()?;

    metrics::register_metrics();
    info!(port = config.metrics_port, "Prometheus exporter listening");
    Ok(())
}

/// Periodically drop expired sessions and cache entries
fn spawn_sweeper(state: AppState, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let sessions = state.sessions.sweep_expired().await;
            let products = state.product_cache.purge_expired().await;
            let sales = state.sales_cache.purge_expired().await;

            if sessions + products + sales > 0 {
                tracing::debug!(sessions, products, sales, "Sweep removed expired entries");
            }
        }
    })
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

    // Base64 inflates payloads by a third; leave room for the JSON around it
    let body_limit = state.config.documents.max_file_bytes / 3 * 4 + 64 * 1024;

    let limiter = middleware::rate_limit::create_rate_limiter(
        state.config.rate_limit.requests_per_second,
        state.config.rate_limit.burst,
    );

    let mut app = Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Auth endpoints
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/me", get(handlers::auth::me))

        // Recipe endpoints
        .route(
            "/api/recipes",
            get(handlers::recipes::list_recipes).post(handlers::recipes::create_recipe),
        )
        .route("/api/recipes/calculate", post(handlers::recipes::calculate))
        .route(
            "/api/recipes/{id}",
            get(handlers::recipes::get_recipe)
                .put(handlers::recipes::update_recipe)
                .delete(handlers::recipes::delete_recipe),
        )
        .route("/api/recipes/{id}/recalculate", post(handlers::recipes::recalculate))
        .route("/api/recipes/{id}/sync-prices", post(handlers::recipes::sync_prices))

        // Document endpoints
        .route(
            "/api/documents",
            get(handlers::documents::list_documents).post(handlers::documents::create_document),
        )
        .route(
            "/api/documents/{id}",
            get(handlers::documents::get_document)
                .put(handlers::documents::update_document)
                .delete(handlers::documents::delete_document),
        )
        .route("/api/documents/{id}/content", get(handlers::documents::get_content))

        // Odoo endpoints
        .route("/api/odoo/status", get(handlers::odoo::status))
        .route("/api/odoo/products", get(handlers::odoo::search_products))

        // Toast endpoints
        .route("/api/toast/status", get(handlers::toast::status))
        .route("/api/toast/sales", get(handlers::toast::sales))
        .route("/api/toast/sales/summary", get(handlers::toast::sales_summary))

        .route_layer(axum::middleware::from_fn(middleware::metrics::track_requests))
        .fallback(handlers::not_found);

    if state.config.rate_limit.enabled {
        app = app.layer(axum::middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    // Compose the app
    app.layer(DefaultBodyLimit::max(body_limit))
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
