pub use crate::calc::{EnhancedPriority, Urgency, MAX_UTILIZATION};
pub use crate::catalog::{TaskTemplate, TestCase};
pub use crate::config::{FaultInjection, SimConfig, SimConfigBuilder};
pub use crate::error::{Error, Result};
pub use crate::policy::Algorithm;
pub use crate::report::{
    ConsoleSink, EngineError, Event, MemorySink, NullSink, ReportSink, RunStats, Severity,
};
pub use crate::scheduler::Scheduler;
pub use crate::sim::Simulation;
pub use crate::task::{TaskId, TaskState, NUM_SLOTS};

#[cfg(feature = "telemetry")]
pub use crate::telemetry::{Metrics, MetricsSink, MetricsSnapshot};
