//! Logging, metrics, and alerting for the liquidation keeper.
//!
//! All three are consumed as fire-and-forget side-effect sinks:
//! - structured logging via tracing (JSON in production)
//! - prometheus counters behind the `Metrics` facade
//! - alert dispatch behind the `AlertSink` trait

pub mod alerts;
pub mod error;
pub mod logging;
pub mod metrics;

pub use alerts::{AlertLevel, AlertSink, DynAlertSink, LogAlertSink, MockAlertSink, WebhookAlertSink};
pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
