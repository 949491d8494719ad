//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// HTTP login adapter.
pub mod auth;

/// Configuration and dependency injection.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// WebSocket and in-memory transports.
pub mod realtime;

/// File-backed and in-memory key-value stores.
pub mod storage;

/// Logging and OpenTelemetry tracing.
pub mod telemetry;
