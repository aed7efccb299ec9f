//! Application startup and lifecycle management.

use crate::config::ProxyConfig;
use crate::handlers::{app::health_check, metrics::metrics, proxy::proxy_handler};
use crate::middleware::http_metrics_middleware;
use crate::services::metrics::init_metrics;
use crate::services::providers::openai::{OpenAiConfig, OpenAiProvider};
use crate::services::providers::ChatProvider;
use crate::services::ProxyService;
use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{request_id_middleware, security_headers_middleware};
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

/// Room for the prompt and multipart framing on top of the image itself.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ProxyConfig,
    pub proxy: ProxyService,
}

impl AppState {
    pub fn new(config: ProxyConfig, provider: Arc<dyn ChatProvider>) -> Self {
        Self {
            config,
            proxy: ProxyService::new(provider),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();
    let body_limit = state.config.upload.max_file_bytes + FORM_OVERHEAD_BYTES;

    Router::new()
        .route(
            "/api/openai",
            post(proxy_handler).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .fallback_service(ServeDir::new(static_dir))
        .layer(from_fn(http_metrics_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(CorsLayer::permissive())
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(service_core::middleware::REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Last-resort responder for anything that panicked inside a handler.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic".to_string()
    };

    tracing::error!(panic = %message, "Handler panicked");
    AppError::InternalError(anyhow::anyhow!(message)).into_response()
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application against the real OpenAI API.
    pub async fn build(config: ProxyConfig) -> Result<Self, AppError> {
        let provider = OpenAiProvider::new(OpenAiConfig::from(&config.openai))
            .map_err(|e| AppError::ConfigError(anyhow::Error::new(e)))?;

        tracing::info!(
            model = %config.openai.model,
            base_url = %config.openai.base_url,
            timeout_secs = config.openai.timeout_secs,
            api_key = "*** configured ***",
            "Initialized OpenAI provider"
        );

        Self::build_with_provider(config, Arc::new(provider)).await
    }

    /// Build the application with an injected provider.
    pub async fn build_with_provider(
        config: ProxyConfig,
        provider: Arc<dyn ChatProvider>,
    ) -> Result<Self, AppError> {
        init_metrics().map_err(|e| AppError::InternalError(anyhow::Error::new(e)))?;

        tokio::fs::create_dir_all(&config.upload.dir)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to create upload directory {}: {}",
                    config.upload.dir.display(),
                    e
                );
                AppError::from(e)
            })?;

        // Port 0 = random port for testing
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        let router = build_router(AppState::new(config, provider));

        tracing::info!("vision-proxy listening on http://localhost:{}", port);

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until a shutdown signal arrives.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                tracing::error!("HTTP server error: {}", e);
                std::io::Error::other(format!("HTTP server error: {}", e))
            })
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
