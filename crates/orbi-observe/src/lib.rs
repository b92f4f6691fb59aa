//! Observability setup for Orbi: structured logging via `tracing` with an
//! optional OpenTelemetry stdout exporter.

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, shutdown_tracing};
