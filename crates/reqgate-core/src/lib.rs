//! reqgate core: error surface and wire rules shared by the gateway.
//!
//! Holds the error kinds, their client-safe translation, the response
//! envelope, the structured log value model and the clock/identity helpers.
//! No HTTP or runtime dependencies live here.
//!
//! `unwrap`, `expect` and `panic!` are denied outside tests; fallible paths
//! return `ReqGateError`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod clock;
pub mod envelope;
pub mod environment;
pub mod error;
pub mod log_value;
pub mod safe;

pub use environment::Environment;
pub use error::{ClientCode, ReqGateError, Result};
pub use safe::SafeError;
