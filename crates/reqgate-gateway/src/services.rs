//! Built-in demo service.
//!
//! `GET /v1/echo/:id` returns the caller's request context; `POST /v1/echo`
//! returns the JSON object it was given. Used by the binary and by the
//! integration tests as a stand-in for application routes.

use axum::extract::Path;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::{json, Value};

use reqgate_core::ReqGateError;

use crate::app_state::AppState;
use crate::context::RequestContext;
use crate::pipeline::{ApiOk, HandlerResult};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/echo", axum::routing::post(echo_body))
        .route("/v1/echo/:id", get(echo_id))
}

async fn echo_id(
    Path(id): Path<String>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiOk<Value> {
    ApiOk::new(json!({ "id": id, "context": ctx }))
}

async fn echo_body(Json(body): Json<Value>) -> HandlerResult<Value> {
    if !body.is_object() {
        return Err(ReqGateError::Validation("body must be a JSON object".into()).into());
    }
    Ok(ApiOk::created(body))
}
