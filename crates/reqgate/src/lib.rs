//! Top-level facade crate for reqgate.
//!
//! Re-exports the core error/envelope types and the gateway pipeline so users
//! can depend on a single crate.

pub mod core {
    pub use reqgate_core::*;
}

pub mod gateway {
    pub use reqgate_gateway::*;
}
