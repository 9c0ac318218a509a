//! Observability: structured logging and per-connection metrics

pub mod logging;
pub mod metrics;

pub use logging::{init_default_logging, init_logging, parse_level, LogFormat};
pub use metrics::{ConnectionMetrics, MetricsSnapshot};

// Span macros for structured logging
pub use logging::{connection_span, dispatch_span};
