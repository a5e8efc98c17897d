//! HTTP surface of the coastal threat service.
//!
//! Routes:
//! - `GET  /health`        liveness probe
//! - `GET  /threat/latest` score of the most recent dataset row
//! - `POST /threat/score`  score a client-supplied reading
//! - `GET  /threat/stream` Server-Sent Events replay of the dataset
//!
//! The dataset is re-read for every `latest`/`stream` request so a freshly
//! prepared table is picked up without a restart. Scoring rules are fixed
//! for the life of the process.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::{debug, info};

use crate::config::{ScoringConfig, ServiceConfig};
use crate::ingest::table::{latest_reading, load_table};
use crate::logging::{log_failure, Component};
use crate::model::{RiskLevel, SensorReading, ThreatAssessment, ThreatError, ThreatLevel};
use crate::replay::{CancelSignal, ReplayEngine, ReplaySequence};
use crate::threat::score;

/// Location suffix for a client-supplied reading.
pub const CUSTOM_INPUT_LOCATION: &str = "CUSTOM_INPUT";

// ============================================================================
// State
// ============================================================================

pub struct AppState {
    pub scoring: Arc<ScoringConfig>,
    pub service: ServiceConfig,
    pub engine: ReplayEngine,
    /// Fired once at shutdown; every open replay stream listens on it.
    pub shutdown: CancelSignal,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(scoring: Arc<ScoringConfig>, service: ServiceConfig) -> Self {
        let engine = ReplayEngine::new(Arc::clone(&scoring), service.stream_interval)
            .with_buffer(service.stream_buffer);
        Self {
            scoring,
            service,
            engine,
            shutdown: CancelSignal::new(),
        }
    }

    fn location(&self, suffix: &str) -> String {
        format!("{}_{}", self.service.location_id, suffix)
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// JSON body returned by every scoring route and each SSE event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatScoreResponse {
    pub score: f64,
    pub level: ThreatLevel,
    pub parameters: BTreeMap<String, RiskLevel>,
    pub raw: SensorReading,
    /// Time the response was produced, not the reading's measurement time.
    pub timestamp: DateTime<Utc>,
    pub location_id: String,
}

impl ThreatScoreResponse {
    pub fn from_assessment(assessment: ThreatAssessment, location_id: impl Into<String>) -> Self {
        Self {
            score: assessment.score,
            level: assessment.level,
            parameters: assessment.parameters,
            raw: assessment.raw,
            timestamp: Utc::now(),
            location_id: location_id.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
}

/// A `ThreatError` on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub ThreatError);

impl From<ThreatError> for ApiError {
    fn from(err: ThreatError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            ThreatError::DataUnavailable(_)
            | ThreatError::Io(_)
            | ThreatError::Csv(_)
            | ThreatError::StreamTerminated(_) => StatusCode::SERVICE_UNAVAILABLE,
            ThreatError::MalformedReading(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ThreatError::Config(_) | ThreatError::Toml(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match &self.0 {
            ThreatError::DataUnavailable(_) | ThreatError::Io(_) | ThreatError::Csv(_) => {
                "data_unavailable"
            }
            ThreatError::MalformedReading(_) => "malformed_reading",
            ThreatError::StreamTerminated(_) => "stream_terminated",
            ThreatError::Config(_) | ThreatError::Toml(_) => "config",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        log_failure(Component::Api, "request", &self.0);
        let body = ErrorBody {
            error: self.kind().to_string(),
            detail: self.0.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: SharedState) -> Router {
    let cors = cors_layer(&state.service.cors_origins);
    Router::new()
        .route("/health", get(health))
        .route("/threat/latest", get(latest_threat))
        .route("/threat/score", post(score_reading))
        .route("/threat/stream", get(stream_threat))
        .layer(cors)
        .with_state(state)
}

/// Serve the router until `signal` resolves, then end every open replay
/// stream so long-lived SSE connections do not hold the shutdown open.
pub async fn serve<F>(
    listener: TcpListener,
    state: SharedState,
    signal: F,
) -> Result<(), ThreatError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let shutdown = state.shutdown.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            signal.await;
            info!(component = %Component::System, "shutting down, closing replay streams");
            shutdown.cancel();
        })
        .await?;
    Ok(())
}

/// Credentialed CORS. Methods and headers are mirrored from the preflight
/// since a credentialed response cannot use the `*` wildcard; for the same
/// reason `*` in the origin list mirrors the caller's origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request());

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(AllowOrigin::mirror_request());
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn latest_threat(
    State(state): State<SharedState>,
) -> Result<Json<ThreatScoreResponse>, ApiError> {
    let path = state.service.data_path.clone();
    let reading = blocking(move || latest_reading(&path)).await?;
    let assessment = score(&reading, &state.scoring);
    debug!(component = %Component::Api, score = assessment.score, "latest reading scored");
    Ok(Json(ThreatScoreResponse::from_assessment(
        assessment,
        state.location("MAIN"),
    )))
}

async fn score_reading(
    State(state): State<SharedState>,
    payload: Result<Json<SensorReading>, JsonRejection>,
) -> Result<Json<ThreatScoreResponse>, ApiError> {
    let Json(reading) = payload.map_err(|e| ThreatError::MalformedReading(e.body_text()))?;
    let assessment = score(&reading, &state.scoring);
    Ok(Json(ThreatScoreResponse::from_assessment(
        assessment,
        CUSTOM_INPUT_LOCATION,
    )))
}

async fn stream_threat(
    State(state): State<SharedState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let path: PathBuf = state.service.data_path.clone();
    let options = state.service.replay.clone();
    let scoring = Arc::clone(&state.scoring);
    let sequence = blocking(move || {
        let table = load_table(&path)?;
        ReplaySequence::build(table, &options, &scoring)
    })
    .await?;

    let replay = state.engine.stream(sequence, state.shutdown.clone());
    info!(component = %Component::Api, stream_id = replay.id(), "SSE client connected");

    let location_id = state.location("STREAM");
    let events = replay.into_stream().map(move |assessment| {
        let body = ThreatScoreResponse::from_assessment(assessment, location_id.clone());
        let event = Event::default()
            .json_data(&body)
            .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()));
        Ok(event)
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Run a dataset read off the async workers.
async fn blocking<T, F>(job: F) -> Result<T, ThreatError>
where
    F: FnOnce() -> Result<T, ThreatError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| ThreatError::DataUnavailable(format!("dataset task failed: {}", e)))?
}
