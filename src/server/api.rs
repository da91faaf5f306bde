use axum::{
    extract::{rejection::JsonRejection, State, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::http::AppState;
use crate::{ErrorKind, MirrorError, SessionOptions};

/// Wire form of a [`MirrorError`] with a status code picked from its kind.
pub struct ApiError(pub MirrorError);

impl From<MirrorError> for ApiError {
    fn from(err: MirrorError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.kind {
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::NotRunning => StatusCode::CONFLICT,
            ErrorKind::CommandFailed | ErrorKind::Parse => StatusCode::BAD_GATEWAY,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(kind = %self.0.kind, error = %self.0, "Request failed");
        (self.status(), Json(json!({ "error": self.0 }))).into_response()
    }
}

type ApiResult = Result<Json<serde_json::Value>, ApiError>;

/// Front ends send ports as plain numbers, so range checking happens here.
fn port(value: i64) -> Result<u16, MirrorError> {
    u16::try_from(value)
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| MirrorError::invalid_input(format!("port must be between 1 and 65535, got {}", value)))
}

/// Malformed or incomplete bodies are bad input like any other.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, MirrorError> {
    payload
        .map(|Json(req)| req)
        .map_err(|rejection| MirrorError::invalid_input(rejection.body_text()))
}

fn ok() -> ApiResult {
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
pub struct PairRequest {
    pub address: String,
    pub port: i64,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct EndpointRequest {
    pub address: String,
    pub port: i64,
}

#[derive(Debug, Deserialize)]
pub struct WirelessRequest {
    pub port: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StartSessionRequest {
    pub device_id: String,
    pub options: SessionOptions,
}

// Device endpoints
pub async fn list_devices(State(state): State<AppState>) -> ApiResult {
    let devices = state.controller.list_devices().await?;
    Ok(Json(json!({ "devices": devices })))
}

pub async fn pair(State(state): State<AppState>, payload: Result<Json<PairRequest>, JsonRejection>) -> ApiResult {
    let req = body(payload)?;
    info!("Pairing with {}:{}", req.address, req.port);
    state.controller.pair(&req.address, port(req.port)?, &req.code).await?;
    ok()
}

pub async fn connect(State(state): State<AppState>, payload: Result<Json<EndpointRequest>, JsonRejection>) -> ApiResult {
    let req = body(payload)?;
    info!("Connecting to {}:{}", req.address, req.port);
    state.controller.connect(&req.address, port(req.port)?).await?;
    ok()
}

pub async fn disconnect(State(state): State<AppState>, payload: Result<Json<EndpointRequest>, JsonRejection>) -> ApiResult {
    let req = body(payload)?;
    info!("Disconnecting {}:{}", req.address, req.port);
    state.controller.disconnect(&req.address, port(req.port)?).await?;
    ok()
}

pub async fn enable_wireless(State(state): State<AppState>, payload: Result<Json<WirelessRequest>, JsonRejection>) -> ApiResult {
    let req = body(payload)?;
    state.controller.enable_wireless(port(req.port)?).await?;
    ok()
}

// Session endpoints
pub async fn session_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "session": state.controller.session_status() }))
}

pub async fn start_session(
    State(state): State<AppState>,
    payload: Result<Json<StartSessionRequest>, JsonRejection>,
) -> ApiResult {
    let req = body(payload)?;
    state.controller.start_session(&req.device_id, &req.options)?;
    Ok(Json(json!({
        "success": true,
        "session": state.controller.session_status(),
    })))
}

pub async fn stop_session(State(state): State<AppState>) -> ApiResult {
    state.controller.stop_session().await?;
    ok()
}
