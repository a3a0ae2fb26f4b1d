//! Run-time metrics collection.

use crate::report::{Event, ReportSink};
use hdrhistogram::Histogram;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Counters and an engine-latency histogram for one or more runs.
pub struct Metrics {
    ticks: AtomicU64,
    events: AtomicU64,
    overruns: AtomicU64,
    tick_latency: RwLock<Histogram<u64>>,
    started: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            events: AtomicU64::new(0),
            overruns: AtomicU64::new(0),
            // 3 significant figures up to one second per tick
            tick_latency: RwLock::new(
                Histogram::new_with_bounds(1, 1_000_000_000, 3).expect("valid histogram bounds"),
            ),
            started: Instant::now(),
        }
    }

    pub fn record_tick(&self, engine_ns: u64) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        let mut hist = self.tick_latency.write();
        let _ = hist.record(engine_ns.max(1));
    }

    pub fn record_event(&self) {
        self.events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_overrun(&self) {
        self.overruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let hist = self.tick_latency.read();
        MetricsSnapshot {
            uptime_ns: self.started.elapsed().as_nanos() as u64,
            ticks: self.ticks.load(Ordering::Relaxed),
            events: self.events.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            avg_tick_ns: hist.mean() as u64,
            p50_tick_ns: hist.value_at_quantile(0.5),
            p99_tick_ns: hist.value_at_quantile(0.99),
            max_tick_ns: hist.max(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("ticks", &self.ticks.load(Ordering::Relaxed))
            .field("events", &self.events.load(Ordering::Relaxed))
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "telemetry", derive(serde::Serialize))]
pub struct MetricsSnapshot {
    pub uptime_ns: u64,
    pub ticks: u64,
    pub events: u64,
    pub overruns: u64,
    pub avg_tick_ns: u64,
    pub p50_tick_ns: u64,
    pub p99_tick_ns: u64,
    pub max_tick_ns: u64,
}

/// Report sink adapter that feeds [`Metrics`] and optionally forwards
/// every event to an inner sink.
pub struct MetricsSink {
    metrics: Arc<Metrics>,
    inner: Option<Arc<dyn ReportSink>>,
}

impl MetricsSink {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            metrics,
            inner: None,
        }
    }

    pub fn with_inner(metrics: Arc<Metrics>, inner: Arc<dyn ReportSink>) -> Self {
        Self {
            metrics,
            inner: Some(inner),
        }
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }
}

impl ReportSink for MetricsSink {
    fn record(&self, event: &Event) {
        self.metrics.record_event();
        if let Event::TickSnapshot {
            engine_ns, overrun, ..
        } = event
        {
            self.metrics.record_tick(*engine_ns);
            if *overrun {
                self.metrics.record_overrun();
            }
        }
        if let Some(inner) = &self.inner {
            inner.record(event);
        }
    }
}

impl std::fmt::Debug for MetricsSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsSink")
            .field("metrics", &self.metrics)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::MemorySink;
    use crate::task::TaskId;

    #[test]
    fn test_tick_recording() {
        let metrics = Metrics::new();
        metrics.record_tick(1_000);
        metrics.record_tick(2_000);
        metrics.record_tick(3_000);

        let snap = metrics.snapshot();
        assert_eq!(snap.ticks, 3);
        assert!(snap.avg_tick_ns >= 1_000);
        assert!(snap.max_tick_ns >= snap.p50_tick_ns);
    }

    #[test]
    fn test_sink_counts_and_forwards() {
        let metrics = Arc::new(Metrics::new());
        let inner = Arc::new(MemorySink::new());
        let sink = MetricsSink::with_inner(metrics.clone(), inner.clone());

        sink.record(&Event::Preempting { task: TaskId(1) });
        sink.record(&Event::TickSnapshot {
            now: 1,
            tasks: Default::default(),
            engine_ns: 500,
            overrun: true,
        });

        let snap = metrics.snapshot();
        assert_eq!(snap.events, 2);
        assert_eq!(snap.ticks, 1);
        assert_eq!(snap.overruns, 1);
        assert_eq!(inner.len(), 2);
    }

    #[test]
    fn test_zero_latency_clamped() {
        let metrics = Metrics::new();
        metrics.record_tick(0);
        assert_eq!(metrics.snapshot().ticks, 1);
    }
}
