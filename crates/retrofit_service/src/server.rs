use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use retrofit_core::{Predictor, ResolverOptions, RetrofitError};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{CorsConfig, ServiceConfig};
use crate::routes;

/// Shared, read-only request context
pub struct AppState {
    /// `None` when the artifacts failed to load
    pub predictor: Option<Arc<Predictor>>,
    pub config: ServiceConfig,
    pub models_dir: PathBuf,
    pub load_error: Option<String>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: ServiceConfig, models_dir: PathBuf, predictor: Option<Predictor>) -> Self {
        Self {
            predictor: predictor.map(Arc::new),
            config,
            models_dir,
            load_error: None,
            start_time: Instant::now(),
        }
    }

    /// Resolve the bundle directory and load it once.
    ///
    /// A failed load is logged and leaves the service running without models.
    pub fn load(config: ServiceConfig) -> Self {
        let options = ResolverOptions {
            verify_versions: config.models.verify_versions,
        };

        let dir = match config.models.resolve_dir() {
            Ok(dir) => dir,
            Err(err) => {
                let root = config.models.root_dir.clone();
                return Self::unloaded(config, root, err);
            }
        };

        match Predictor::from_directory(&dir, &options) {
            Ok(predictor) => {
                info!(
                    directory = %dir.display(),
                    model = %predictor.bundle().model_label(),
                    "Retrofit prediction models loaded"
                );
                Self::new(config, dir, Some(predictor))
            }
            Err(err) => Self::unloaded(config, dir, err),
        }
    }

    fn unloaded(config: ServiceConfig, models_dir: PathBuf, err: RetrofitError) -> Self {
        warn!(
            directory = %models_dir.display(),
            error = %err,
            "Could not load retrofit predictor; prediction endpoints will return 503"
        );
        let mut state = Self::new(config, models_dir, None);
        state.load_error = Some(err.to_string());
        state
    }

    pub fn models_loaded(&self) -> bool {
        self.predictor.is_some()
    }

    pub(crate) fn predictor(&self) -> Result<&Predictor, ApiError> {
        self.predictor.as_deref().ok_or_else(|| {
            ApiError::service_unavailable(
                "Models not loaded. Please ensure models are trained and available.",
            )
        })
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

pub type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub(crate) fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub(crate) fn not_found<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub(crate) fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub(crate) fn service_unavailable<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl From<RetrofitError> for ApiError {
    fn from(err: RetrofitError) -> Self {
        if err.is_client_error() {
            Self::bad_request(err.to_string())
        } else {
            Self::internal(format!("Prediction failed: {err}"))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let payload = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, payload).into_response()
    }
}

pub async fn start_server(state: AppState) -> Result<()> {
    let addr = state.config.server.bind_address();
    let shared = Arc::new(state);
    let app = build_router(shared);
    let listener = bind_listener(&addr).await?;
    info!("Retrofit prediction service listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server terminated unexpectedly")
}

async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind HTTP listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind HTTP listener on {addr}"))
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

pub fn build_router(state: SharedState) -> Router {
    let retrofit = Router::new()
        .route("/predict", post(routes::predict))
        .route("/batch", post(routes::batch_predict))
        .route("/upload", post(routes::upload_and_predict))
        .route("/template/download", get(routes::download_template))
        .route("/models/info", get(routes::models_info))
        .route("/status", get(routes::status))
        .route("/health", get(routes::health));

    let body_limit = state.config.upload.max_body_bytes;
    let cors = cors_layer(&state.config.cors);

    Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::app_health))
        .nest("/retrofit", retrofit)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    if config.allowed_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
