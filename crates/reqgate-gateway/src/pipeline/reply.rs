//! Handler-side reply types.
//!
//! Handlers return `ApiOk<T>` on success or `HandlerError` on failure. A
//! `HandlerError` does not render anything itself: it travels to the pipeline
//! in the response extensions, where it is translated exactly once.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use reqgate_core::envelope::{ApiResponse, Meta};
use reqgate_core::ReqGateError;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Marks a response whose body is already an envelope.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Enveloped;

/// Untranslated handler failure, picked up by the pipeline.
#[derive(Debug, Clone)]
pub(crate) struct HandlerFailure(pub(crate) ReqGateError);

pub(crate) fn envelope_response(status: StatusCode, body: &ApiResponse) -> Response {
    let mut resp = (status, body.to_vec()).into_response();
    resp.headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    resp.extensions_mut().insert(Enveloped);
    resp
}

/// Success envelope `{ success: true, data, meta? }`.
#[derive(Debug, Clone)]
pub struct ApiOk<T> {
    data: T,
    meta: Option<Meta>,
    status: StatusCode,
}

impl<T: Serialize> ApiOk<T> {
    pub fn new(data: T) -> Self {
        Self { data, meta: None, status: StatusCode::OK }
    }

    pub fn created(data: T) -> Self {
        Self { data, meta: None, status: StatusCode::CREATED }
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }
}

impl<T: Serialize> IntoResponse for ApiOk<T> {
    fn into_response(self) -> Response {
        match serde_json::to_value(&self.data) {
            Ok(data) => envelope_response(self.status, &ApiResponse::Ok { data, meta: self.meta }),
            Err(e) => HandlerError(ReqGateError::Internal(format!("serialize response: {e}")))
                .into_response(),
        }
    }
}

/// Typed handler failure. Convert from `ReqGateError` with `?` or `.into()`.
#[derive(Debug, Clone)]
pub struct HandlerError(pub ReqGateError);

impl From<ReqGateError> for HandlerError {
    fn from(e: ReqGateError) -> Self {
        Self(e)
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut resp = status.into_response();
        resp.extensions_mut().insert(HandlerFailure(self.0));
        resp
    }
}

pub type HandlerResult<T> = std::result::Result<ApiOk<T>, HandlerError>;
