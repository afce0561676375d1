//! Request pipeline orchestrator (axum middleware).
//!
//! Per request: build `RequestContext` -> consult the limiter -> run the
//! handler -> translate any failure once -> attach common headers -> record
//! metrics -> emit one log line.
//!
//! Rejections short-circuit before the handler. Admitted requests run inside a
//! spawned task so bookkeeping still completes if the client goes away and the
//! connection future is dropped.

pub mod headers;
pub mod reply;

use std::panic::AssertUnwindSafe;

use axum::body::{to_bytes, Body};
use axum::extract::{MatchedPath, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use futures_util::FutureExt;
use serde_json::json;

use reqgate_core::clock::now_ms;
use reqgate_core::envelope::Meta;
use reqgate_core::log_value::LogValue;
use reqgate_core::safe::retry_after_secs;
use reqgate_core::{ReqGateError, SafeError};

use crate::app_state::AppState;
use crate::context::{build_request_context, RequestContext};
use crate::obs::{fields, Fields, LogLevel};
use crate::policy::{client_key, Admission};

pub use reply::{ApiOk, HandlerError, HandlerResult};
use reply::{envelope_response, Enveloped, HandlerFailure};

/// Bare 4xx bodies up to this size are read as the validation message.
const BARE_BODY_LIMIT: usize = 4096;

/// Metrics key for requests no route matched (fallback 404s).
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// What went wrong, untranslated, for the server-side log.
enum Original {
    Error(ReqGateError),
    Status { status: StatusCode, body: String },
}

impl Original {
    fn log_value(&self) -> LogValue {
        match self {
            Original::Error(e) => {
                let mut f = fields([("kind", e.client_code().as_str().into())]);
                if let LogValue::Map(chain) = LogValue::error(e) {
                    f.extend(chain);
                }
                LogValue::Map(f)
            }
            Original::Status { status, body } => LogValue::Map(
                fields([
                    ("kind", "STATUS".into()),
                    ("status", status.as_u16().into()),
                    ("reason", LogValue::display(status)),
                    ("body", body.clone().into()),
                ]),
            ),
        }
    }
}

fn request_meta(ctx: &RequestContext) -> Meta {
    let mut meta = Meta::new();
    meta.insert("requestId".into(), json!(ctx.request_id));
    meta
}

fn error_response(ctx: &RequestContext, safe: SafeError, extra: Meta) -> Response {
    let status =
        StatusCode::from_u16(safe.http_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut meta = request_meta(ctx);
    meta.extend(extra);
    envelope_response(status, &safe.into_response(Some(meta)))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_string())
}

/// axum middleware entry: `middleware::from_fn_with_state(state, pipeline::guard)`.
pub async fn guard(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let ctx = build_request_context(&req, state.request_id_header(), state.trusted_proxies());
    let route = metrics_route(&req, &ctx);

    match state.limiter().check(client_key(&ctx), now_ms()) {
        Admission::Reject { retry_after_ms } => reject(&state, &ctx, &route, retry_after_ms),
        Admission::Admit { remaining, .. } => {
            req.extensions_mut().insert(ctx.clone());
            let work = admitted(state.clone(), ctx.clone(), route, req, next, remaining);
            let task = tokio::spawn(work);
            match task.await {
                Ok(resp) => resp,
                // only reachable while the runtime is shutting down
                Err(e) => {
                    let err = ReqGateError::Internal(format!("request task failed: {e}"));
                    let safe = SafeError::translate(&err, state.environment());
                    let mut resp = error_response(&ctx, safe, Meta::new());
                    headers::apply_common(resp.headers_mut(), &ctx.request_id);
                    resp
                }
            }
        }
    }
}

/// Normalized route for matched requests; a single shared key otherwise so
/// scans of random paths cannot grow the route map.
fn metrics_route(req: &Request, ctx: &RequestContext) -> String {
    match req.extensions().get::<MatchedPath>() {
        Some(_) => ctx.route_key().to_string(),
        None => UNMATCHED_ROUTE.to_string(),
    }
}

fn reject(state: &AppState, ctx: &RequestContext, route: &str, retry_after_ms: u64) -> Response {
    let err = ReqGateError::RateLimited { retry_after_ms };
    let safe = SafeError::translate(&err, state.environment());
    let secs = retry_after_secs(retry_after_ms);

    let mut extra = Meta::new();
    extra.insert("retryAfterMs".into(), json!(retry_after_ms));
    extra.insert("retryAfterSec".into(), json!(secs));

    let mut resp = error_response(ctx, safe, extra);
    let h = resp.headers_mut();
    headers::apply_common(h, &ctx.request_id);
    headers::apply_rate_limit(h, state.limiter().limit(), 0);
    headers::apply_retry_after(h, secs);

    let status = resp.status().as_u16();
    let elapsed = ctx.elapsed_ms();
    state.metrics().record(route, status, elapsed);

    let mut f = base_fields(ctx, status, elapsed);
    f.insert("retryAfterMs".into(), retry_after_ms.into());
    state.logger().warn("rate limited", f);
    resp
}

async fn admitted(
    state: AppState,
    ctx: RequestContext,
    route: String,
    req: Request,
    next: Next,
    remaining: u32,
) -> Response {
    let env = state.environment();
    let outcome = AssertUnwindSafe(next.run(req)).catch_unwind().await;

    let (mut resp, original) = match outcome {
        Ok(mut resp) => match resp.extensions_mut().remove::<HandlerFailure>() {
            Some(HandlerFailure(err)) => {
                let safe = SafeError::translate(&err, env);
                (error_response(&ctx, safe, Meta::new()), Some(Original::Error(err)))
            }
            None if is_bare_error(&resp) => translate_bare(&ctx, resp).await,
            None => (resp, None),
        },
        Err(payload) => {
            let err = ReqGateError::Internal(panic_message(payload.as_ref()));
            let safe = SafeError::translate(&err, env);
            (error_response(&ctx, safe, Meta::new()), Some(Original::Error(err)))
        }
    };

    let h = resp.headers_mut();
    headers::apply_common(h, &ctx.request_id);
    headers::apply_rate_limit(h, state.limiter().limit(), remaining);

    finish(&state, &ctx, &route, &resp, original);
    resp
}

fn is_bare_error(resp: &Response) -> bool {
    let s = resp.status();
    (s.is_client_error() || s.is_server_error()) && resp.extensions().get::<Enveloped>().is_none()
}

/// Error status without a typed failure (extractor rejection, 404/405 from
/// routing). Client-error bodies are plain text from axum and become the
/// validation message.
async fn translate_bare(ctx: &RequestContext, resp: Response) -> (Response, Option<Original>) {
    let status = resp.status();
    let body = match to_bytes(resp.into_body(), BARE_BODY_LIMIT).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
        Err(_) => String::new(),
    };
    let reason = if body.is_empty() {
        status.canonical_reason().unwrap_or("Request Error").to_string()
    } else {
        body.clone()
    };
    let safe = SafeError::from_status(status.as_u16(), &reason);
    (error_response(ctx, safe, Meta::new()), Some(Original::Status { status, body }))
}

fn base_fields(ctx: &RequestContext, status: u16, elapsed_ms: u64) -> Fields {
    fields([
        ("requestId", ctx.request_id.clone().into()),
        ("method", ctx.method.clone().into()),
        ("path", ctx.path.clone().into()),
        ("route", ctx.route.clone().into()),
        ("status", status.into()),
        ("durationMs", elapsed_ms.into()),
        ("clientIp", ctx.client_ip.clone().into()),
        ("userAgent", ctx.user_agent.clone().into()),
    ])
}

fn finish(
    state: &AppState,
    ctx: &RequestContext,
    route: &str,
    resp: &Response<Body>,
    original: Option<Original>,
) {
    let status = resp.status().as_u16();
    let elapsed = ctx.elapsed_ms();
    state.metrics().record(route, status, elapsed);

    let mut f = base_fields(ctx, status, elapsed);
    let level = match &original {
        Some(o) => {
            f.insert("error".into(), o.log_value());
            LogLevel::Error
        }
        None => LogLevel::Info,
    };
    let msg = if original.is_some() { "request failed" } else { "request completed" };
    state.logger().log(level, msg, f);
}
