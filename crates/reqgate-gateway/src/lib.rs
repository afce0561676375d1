//! reqgate gateway library entry.
//!
//! This crate wires request context, admission control, metrics and logging
//! into an axum middleware stack. It is intended to be consumed by the binary
//! (`main.rs`), by services embedding the pipeline, and by integration tests.

pub mod app_state;
pub mod config;
pub mod context;
pub mod obs;
pub mod ops;
pub mod pipeline;
pub mod policy;
pub mod router;
pub mod services;
