//! Operational HTTP endpoints.
//!
//! - `/healthz`            : liveness
//! - `/metrics`            : metrics snapshot (envelope)
//! - `/metrics/prometheus` : Prometheus text format

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};

use reqgate_core::ReqGateError;

use crate::app_state::AppState;
use crate::obs::MetricsSnapshot;
use crate::pipeline::{ApiOk, HandlerError};

pub async fn healthz(State(state): State<AppState>) -> ApiOk<Value> {
    ApiOk::new(json!({ "status": "ok", "environment": state.environment().as_str() }))
}

pub async fn metrics(State(state): State<AppState>) -> ApiOk<MetricsSnapshot> {
    ApiOk::new(state.metrics().snapshot())
}

pub async fn prometheus(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics().render_prometheus(),
    )
        .into_response()
}

pub async fn not_found() -> HandlerError {
    ReqGateError::NotFound.into()
}
