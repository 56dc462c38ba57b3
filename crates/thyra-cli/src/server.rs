//! HTTP API: `POST /predict`, `GET /predict/history`, `GET /health`,
//! `POST /model/reload`.
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use thyra_classifiers::inference::InferenceService;
use thyra_classifiers::{Label, PredictionError, RawFeatureRecord};

use crate::config::ServiceConfig;
use crate::records::{PredictionOutcome, RecordStore, RecordStoreError, SqliteRecordStore};

/// Errors returned to HTTP clients as `{"detail": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Prediction(#[from] PredictionError),

    #[error("model not ready after {}s; training is still running, retry later", .0.as_secs())]
    Timeout(Duration),

    #[error("invalid request body: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Records(#[from] RecordStoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Prediction(e) if e.is_invalid_input() => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Prediction(_) | ApiError::Records(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = self.to_string();
        if status.is_server_error() {
            log::error!("{} {}", status.as_u16(), detail);
        } else {
            log::info!("{} {}", status.as_u16(), detail);
        }
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<InferenceService>,
    pub records: Arc<dyn RecordStore>,
    /// Upper bound on how long a request waits for the model.
    pub training_timeout: Duration,
    pub history_limit: usize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PredictResponse {
    pub prediction: Label,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/predict/history", get(history))
        .route("/model/reload", post(reload_model))
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Thyroid Cancer Risk Predictor" }))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "model_loaded": state.service.store().is_loaded(),
    }))
}

async fn predict(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RawFeatureRecord>, JsonRejection>,
) -> std::result::Result<Json<PredictResponse>, ApiError> {
    let Json(record) = payload?;

    let service = Arc::clone(&state.service);
    let input = record.clone();
    // Training keeps running on the blocking pool if the wait times out.
    let task = tokio::task::spawn_blocking(move || service.predict(&input));
    let label = match tokio::time::timeout(state.training_timeout, task).await {
        Err(_) => return Err(ApiError::Timeout(state.training_timeout)),
        Ok(joined) => joined.map_err(|e| ApiError::Internal(e.to_string()))??,
    };

    let records = Arc::clone(&state.records);
    let outcome = tokio::task::spawn_blocking(move || records.save(&record, label))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    log::info!("Prediction {}: {}", outcome.id, outcome.prediction);

    Ok(Json(PredictResponse { prediction: label }))
}

/// Pick up a bundle published by an out-of-band `thyra train`.
async fn reload_model(
    State(state): State<AppState>,
) -> std::result::Result<Json<serde_json::Value>, ApiError> {
    let service = Arc::clone(&state.service);
    let task = tokio::task::spawn_blocking(move || service.reload());
    let version = match tokio::time::timeout(state.training_timeout, task).await {
        Err(_) => return Err(ApiError::Timeout(state.training_timeout)),
        Ok(joined) => joined.map_err(|e| ApiError::Internal(e.to_string()))??,
    };
    Ok(Json(json!({ "version": version })))
}

async fn history(
    State(state): State<AppState>,
) -> std::result::Result<Json<Vec<PredictionOutcome>>, ApiError> {
    let records = Arc::clone(&state.records);
    let limit = state.history_limit;
    let outcomes = tokio::task::spawn_blocking(move || records.recent(limit))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(Json(outcomes))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down");
}

/// Run the HTTP server until interrupted.
pub async fn serve(config: ServiceConfig) -> Result<()> {
    let service = config.inference_service();
    let records = SqliteRecordStore::new(&config.server.database).with_context(|| {
        format!(
            "Failed to open prediction database: {}",
            config.server.database.display()
        )
    })?;

    if config.server.warm_up {
        let service = Arc::clone(&service);
        tokio::task::spawn_blocking(move || {
            if let Err(e) = service.warm_up() {
                log::error!("Model warm-up failed: {}", e);
            }
        });
    }

    let state = AppState {
        service,
        records: Arc::new(records),
        training_timeout: config.training_timeout(),
        history_limit: config.server.history_limit,
    };

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    log::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;
    Ok(())
}
