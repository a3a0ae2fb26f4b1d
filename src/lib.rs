//! TICKSCHED - Tick-driven real-time scheduling simulator
//!
//! A discrete-time simulation engine for evaluating real-time scheduling
//! policies against a catalog of canned task sets. One engine hosts up to
//! seven task slots and replays a test case tick by tick under any of the
//! supported policies, from classic rate-monotonic and earliest-deadline
//! through skip-over variants and adaptive overload handlers that shed or
//! stretch flexible tasks.
//!
//! # Quick Start
//!
//! ```no_run
//! use ticksched::prelude::*;
//! use std::sync::Arc;
//!
//! let sink = Arc::new(MemorySink::new());
//! let mut sim = Simulation::new(SimConfig::default(), sink.clone()).unwrap();
//!
//! // Case 1 is the rate-monotonic demo set
//! sim.load_case(1).unwrap();
//! let stats = sim.run().unwrap();
//!
//! println!("missed {} deadlines over {} ticks", stats.deadlines_missed, stats.ticks);
//! ```
//!
//! # Features
//!
//! - **Policy Catalog**: 25 scheduling policies behind a single engine
//! - **Adaptive Overload Handling**: Task removal, restoration, and period
//!   doubling when utilization exceeds capacity
//! - **Skip-Over Scheduling**: Red-task skipping with configurable skip gaps
//! - **Structured Reporting**: Every engine decision flows to a pluggable sink
//! - **Fault Injection**: Extend a running task mid-flight to model overruns
//! - **Telemetry**: Tick-latency histograms and export (optional)

// Lint configuration
#![warn(missing_docs, missing_debug_implementations)]
#![allow(dead_code)] // During development

// Core modules - always available
pub mod calc;
pub mod catalog;
pub mod config;
pub mod error;
pub mod policy;
pub mod prelude;
pub mod queue;
pub mod report;
pub mod scheduler;
pub mod sim;
pub mod task;
pub mod telemetry;

// Re-export key types at crate root
pub use config::{SimConfig, SimConfigBuilder};
pub use error::{Error, Result};
pub use policy::Algorithm;
pub use report::{Event, ReportSink, RunStats, Severity};
pub use scheduler::Scheduler;
pub use sim::Simulation;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::NullSink;
    use std::sync::Arc;

    #[test]
    fn test_demo_case_end_to_end() {
        let mut sim = Simulation::new(SimConfig::default(), Arc::new(NullSink)).unwrap();
        sim.load_case(1).unwrap();
        let stats = sim.run().unwrap();

        assert_eq!(stats.ticks, 400);
        assert_eq!(stats.deadlines_missed, 0);
    }

    #[test]
    fn test_every_catalog_case_completes() {
        let mut sim = Simulation::new(SimConfig::default(), Arc::new(NullSink)).unwrap();
        for case in catalog::TEST_CASES.iter() {
            sim.load_case(case.id).unwrap();
            let stats = sim.run().unwrap();
            assert_eq!(stats.ticks, case.length, "case {}", case.id);
        }
    }
}
