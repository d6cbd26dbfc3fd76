//! HTTP surface and service wiring for the `nvr-report` binary.

pub mod api;
pub mod context;
pub mod metrics;
pub mod state;
