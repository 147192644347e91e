use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::get,
};
use portal_auth::{
    MemorySessionBackend, PortalState, RedisSessionBackend, SessionBackend, SystemClock,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::{AppConfig, RedisConfig};
use crate::handlers;

pub struct PortalServer {
    addr: SocketAddr,
    app: Router,
}

/// Builds the session backend: Redis when enabled and reachable, otherwise
/// process memory.
pub async fn create_session_backend(config: &RedisConfig) -> Arc<dyn SessionBackend> {
    let memory = || -> Arc<dyn SessionBackend> {
        Arc::new(MemorySessionBackend::new(Arc::new(SystemClock)))
    };

    if !config.enabled {
        tracing::info!("Redis disabled, sessions are kept in process memory");
        return memory();
    }

    tracing::info!(url = %config.url, "Connecting to Redis");

    let timeout = Some(Duration::from_millis(config.timeout_ms));
    let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
    pool_config.timeouts.wait = timeout;
    pool_config.timeouts.create = timeout;
    pool_config.timeouts.recycle = timeout;

    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    redis_config.pool = Some(pool_config);

    let pool = match redis_config.create_pool(Some(deadpool_redis::Runtime::Tokio1)) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to create Redis pool. Falling back to memory sessions."
            );
            return memory();
        }
    };

    let backend: Arc<dyn SessionBackend> = Arc::new(RedisSessionBackend::new(pool));
    match backend.ping().await {
        Ok(()) => {
            tracing::info!("Connected to Redis");
            backend
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to connect to Redis. Falling back to memory sessions."
            );
            memory()
        }
    }
}

/// Wires the portal auth state from configuration.
pub async fn build_state(cfg: &AppConfig) -> anyhow::Result<PortalState> {
    let backend = create_session_backend(&cfg.redis).await;
    let state = PortalState::from_config(&cfg.auth, backend, Arc::new(SystemClock))?;
    Ok(state)
}

pub fn build_app(state: PortalState, cfg: &AppConfig) -> Router {
    let health = Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/health/ready", get(handlers::ready))
        .with_state(state.clone());

    let app = Router::new()
        .merge(portal_auth::router(state))
        .merge(health)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri().path(),
                        http.status_code = Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                        let status = res.status().as_u16();
                        span.record("http.status_code", tracing::field::display(status));
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        );

    match cors_layer(&cfg.server.cors_allowed_origins) {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

/// Credentialed CORS for the configured browser origins.
fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    if origins.is_empty() {
        return None;
    }
    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true),
    )
}

pub struct ServerBuilder {
    config: AppConfig,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.config = cfg;
        self
    }

    pub async fn build(self) -> anyhow::Result<PortalServer> {
        let state = build_state(&self.config).await?;
        Ok(PortalServer {
            addr: self.config.addr(),
            app: build_app(state, &self.config),
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PortalServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
