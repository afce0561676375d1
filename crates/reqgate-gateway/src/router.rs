//! Axum router wiring.
//!
//! Application routes are merged with the ops endpoints, unmatched paths fall
//! back to `NotFound`, and the whole tree sits behind the request pipeline.

use axum::{middleware, routing::get, Router};

use crate::{app_state::AppState, ops, pipeline};

pub fn build_router(state: AppState, app: Router<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(ops::healthz))
        .route("/metrics", get(ops::metrics))
        .route("/metrics/prometheus", get(ops::prometheus))
        .merge(app)
        .fallback(ops::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), pipeline::guard))
        .with_state(state)
}
