//! Request identity and context.
//!
//! `RequestContext` is built once per inbound request by the pipeline and is
//! read-only afterwards. Route templates keep metrics keys low-cardinality.

pub mod request;
pub mod route;

pub use request::{build_request_context, client_ip, make_request_id, RequestContext};
pub use route::normalize_route;
