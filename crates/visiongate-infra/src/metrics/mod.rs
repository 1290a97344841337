//! Prometheus metrics

mod registry;

pub use registry::{MetricsRegistry, UNMATCHED_ENDPOINT};
