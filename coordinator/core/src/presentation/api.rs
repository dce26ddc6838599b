// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Query, State,
    },
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Response, Sse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio_stream::StreamExt;
use tower_http::trace::TraceLayer;

use crate::application::coordinator::{RoundCoordinator, SubmissionRequest};
use crate::domain::distribution::DeliveryReport;
use crate::domain::model::GlobalModel;
use crate::domain::parameters::ParameterTree;
use crate::domain::round::{RoundError, RoundId, RoundStatus};

pub struct AppState {
    pub coordinator: Arc<RoundCoordinator>,
    pub start_time: Instant,
}

/// `max_body_bytes` caps request bodies; `None` accepts models of any size.
pub fn app(coordinator: Arc<RoundCoordinator>, max_body_bytes: Option<usize>) -> Router {
    let state = Arc::new(AppState {
        coordinator,
        start_time: Instant::now(),
    });
    let body_limit = match max_body_bytes {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };

    Router::new()
        .route("/health", get(health))
        .route("/round/start", post(start_round))
        .route("/round/submit", post(submit))
        .route("/round/reset", post(reset_round))
        .route("/round/status", get(round_status))
        .route("/round/events", get(stream_events))
        .route("/round/participants", get(participants))
        .route("/round/report", get(delivery_report))
        .route("/model/global", get(global_model))
        .route("/upload", post(upload))
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error body: `{"error": "...", "code": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    Round(RoundError),
    BadRequest(String),
    PayloadTooLarge(String),
    NotFound(&'static str),
}

impl From<RoundError> for ApiError {
    fn from(e: RoundError) -> Self {
        ApiError::Round(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, code) = match self {
            ApiError::Round(e) => {
                let status = match e {
                    RoundError::InvalidExpectedCount(_)
                    | RoundError::RoundInProgress(_)
                    | RoundError::InvalidSubmission(_) => StatusCode::BAD_REQUEST,
                    RoundError::RoundNotCollecting(_) | RoundError::ShapeMismatch(_) => {
                        StatusCode::CONFLICT
                    }
                };
                (status, e.to_string(), e.code())
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message, "invalid_request"),
            ApiError::PayloadTooLarge(message) => {
                (StatusCode::PAYLOAD_TOO_LARGE, message, "payload_too_large")
            }
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, what.to_string(), "not_found"),
        };

        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct StartRoundRequest {
    pub expected_count: i64,
}

#[derive(Debug, Serialize)]
pub struct StartRoundResponse {
    pub round_id: RoundId,
    pub expected: usize,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub participant_id: String,
    pub callback_address: String,
    pub parameters: ParameterTree,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub accepted: bool,
    pub round_id: RoundId,
    pub received: usize,
    pub expected: usize,
    pub replaced: bool,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub client_id: String,
    pub client_address: String,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
        "round_state": state.coordinator.status().state,
    }))
}

async fn start_round(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StartRoundRequest>, JsonRejection>,
) -> Result<Json<StartRoundResponse>, ApiError> {
    let Json(payload) = payload?;
    let round_id = state.coordinator.start_round(payload.expected_count)?;
    let expected = state.coordinator.status().expected;
    Ok(Json(StartRoundResponse { round_id, expected }))
}

async fn submit(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let Json(payload) = payload?;
    accept(
        &state,
        SubmissionRequest {
            participant_id: payload.participant_id,
            callback_address: payload.callback_address,
            parameters: payload.parameters,
        },
    )
}

/// Older participant clients: identity in the query, bare parameter tree as body.
async fn upload(
    State(state): State<Arc<AppState>>,
    query: Result<Query<UploadQuery>, QueryRejection>,
    payload: Result<Json<ParameterTree>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let Query(query) = query?;
    let Json(parameters) = payload?;
    accept(
        &state,
        SubmissionRequest {
            participant_id: query.client_id,
            callback_address: query.client_address,
            parameters,
        },
    )
}

fn accept(state: &AppState, request: SubmissionRequest) -> Result<Json<SubmitResponse>, ApiError> {
    let receipt = state.coordinator.submit(request)?;
    Ok(Json(SubmitResponse {
        accepted: true,
        round_id: receipt.round_id,
        received: receipt.received,
        expected: receipt.expected,
        replaced: receipt.replaced,
    }))
}

async fn reset_round(State(state): State<Arc<AppState>>) -> Json<RoundStatus> {
    state.coordinator.reset();
    Json(state.coordinator.status())
}

async fn round_status(State(state): State<Arc<AppState>>) -> Json<RoundStatus> {
    Json(state.coordinator.status())
}

async fn participants(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let status = state.coordinator.status();
    Json(json!({
        "round_id": status.round_id,
        "participants": state.coordinator.participants(),
    }))
}

async fn global_model(
    State(state): State<Arc<AppState>>,
) -> Result<Json<GlobalModel>, ApiError> {
    state
        .coordinator
        .global_model()
        .map(|model| Json(model.as_ref().clone()))
        .ok_or(ApiError::NotFound("no global model has been aggregated yet"))
}

async fn delivery_report(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DeliveryReport>, ApiError> {
    state
        .coordinator
        .last_delivery_report()
        .map(Json)
        .ok_or(ApiError::NotFound("no round has completed distribution yet"))
}

/// Current status first, then every event as it is published.
async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let live = state.coordinator.events().subscribe_stream();
    let snapshot = Event::default()
        .event("status")
        .json_data(state.coordinator.status());

    let stream = tokio_stream::once(snapshot).chain(
        live.map(|event| Event::default().event(event.kind()).json_data(&event)),
    );

    Sse::new(stream).keep_alive(KeepAlive::default())
}
