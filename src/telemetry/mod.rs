//! Telemetry and observability subsystem.
//!
//! Collects engine-side timing and event counters during a run and
//! exports them after it. Everything here rides on the report sink, so
//! enabling telemetry never touches the scheduling hot path beyond the
//! events it already emits.

#[cfg(feature = "telemetry")]
pub mod metrics;

#[cfg(feature = "telemetry")]
pub mod export;

#[cfg(feature = "telemetry")]
pub use export::{ConsoleExporter, JsonExporter, MetricsExporter};

#[cfg(feature = "telemetry")]
pub use metrics::{Metrics, MetricsSink, MetricsSnapshot};

// Stub implementations when telemetry is disabled
#[cfg(not(feature = "telemetry"))]
pub mod metrics {
    use std::time::Instant;

    #[derive(Debug, Clone)]
    pub struct Metrics;

    impl Metrics {
        pub fn new() -> Self {
            Self
        }
        pub fn record_tick(&self, _: u64) {}
        pub fn record_event(&self) {}
        pub fn snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot::default()
        }
    }

    impl Default for Metrics {
        fn default() -> Self {
            Self::new()
        }
    }

    #[derive(Debug, Clone, Default)]
    pub struct MetricsSnapshot {
        pub timestamp: Option<Instant>,
        pub ticks: u64,
        pub events: u64,
        pub overruns: u64,
        pub avg_tick_ns: u64,
        pub p50_tick_ns: u64,
        pub p99_tick_ns: u64,
        pub max_tick_ns: u64,
    }
}
