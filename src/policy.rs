//! Scheduling policy catalogue.
//!
//! Every policy the engine knows about, including the reserved ones that
//! are enumerated but have no dispatch rule yet. Each policy answers two
//! questions for the queue engine: how the ready queue is ordered, and
//! which auxiliary machinery (skip queue, doubled queue, laxity tracking
//! queue) the per-tick pipeline must run.

use crate::queue::OrderPolicy;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Cyclic executive (reserved).
    Cyclic,
    /// Round robin (reserved).
    RoundRobin,
    /// Rate monotonic.
    Rm,
    /// Delayed rate monotonic.
    Drm,
    /// Intelligent rate monotonic.
    Irm,
    /// Earliest deadline first.
    Edf,
    /// Shortest processing time first.
    Spt,
    /// Least laxity first.
    Llf,
    /// Modified least laxity first.
    Mllf,
    /// Maximum urgency first.
    Muf,
    /// Modified maximum urgency first.
    Mmuf,
    /// Modified modified maximum urgency first.
    Mmmuf,
    /// D-star (reserved).
    DStar,
    /// DD-star (reserved).
    DdStar,
    /// D-over (reserved).
    DOver,
    /// EDF with skip-over, red tasks only.
    EdfRto,
    /// RM with skip-over, red tasks only (reserved).
    RmRto,
    /// EDF, skip blue when possible (reserved).
    EdfBwp,
    /// Adaptive: remove lowest-priority flexible tasks on overload.
    Adaptive1,
    /// Adaptive: removal plus restoration when capacity returns.
    Adaptive2,
    /// Adaptive: double periods of lowest-priority flexible tasks.
    Adaptive3,
    /// Adaptive: period doubling plus halving when capacity returns.
    Adaptive4,
    /// Adaptive: doubling driven by ready-head laxity pressure.
    Adaptive5,
    /// Adaptive: laxity plus utilization driven doubling, capped retries.
    Adaptive6,
    /// Adaptive: enhanced-priority doubling order, capped retries.
    Adaptive7,
}

impl Algorithm {
    pub const ALL: [Algorithm; 25] = [
        Algorithm::Cyclic,
        Algorithm::RoundRobin,
        Algorithm::Rm,
        Algorithm::Drm,
        Algorithm::Irm,
        Algorithm::Edf,
        Algorithm::Spt,
        Algorithm::Llf,
        Algorithm::Mllf,
        Algorithm::Muf,
        Algorithm::Mmuf,
        Algorithm::Mmmuf,
        Algorithm::DStar,
        Algorithm::DdStar,
        Algorithm::DOver,
        Algorithm::EdfRto,
        Algorithm::RmRto,
        Algorithm::EdfBwp,
        Algorithm::Adaptive1,
        Algorithm::Adaptive2,
        Algorithm::Adaptive3,
        Algorithm::Adaptive4,
        Algorithm::Adaptive5,
        Algorithm::Adaptive6,
        Algorithm::Adaptive7,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Algorithm::Cyclic => "CYC",
            Algorithm::RoundRobin => "RR",
            Algorithm::Rm => "RM",
            Algorithm::Drm => "DRM",
            Algorithm::Irm => "IRM",
            Algorithm::Edf => "EDF",
            Algorithm::Spt => "SPT",
            Algorithm::Llf => "LLF",
            Algorithm::Mllf => "MLLF",
            Algorithm::Muf => "MUF",
            Algorithm::Mmuf => "MMUF",
            Algorithm::Mmmuf => "MMMUF",
            Algorithm::DStar => "D*",
            Algorithm::DdStar => "DD*",
            Algorithm::DOver => "D-OVER",
            Algorithm::EdfRto => "EDF-RTO",
            Algorithm::RmRto => "RM-RTO",
            Algorithm::EdfBwp => "EDF-BWP",
            Algorithm::Adaptive1 => "ADAP-01",
            Algorithm::Adaptive2 => "ADAP-02",
            Algorithm::Adaptive3 => "ADAP-03",
            Algorithm::Adaptive4 => "ADAP-04",
            Algorithm::Adaptive5 => "ADAP-05",
            Algorithm::Adaptive6 => "ADAP-06",
            Algorithm::Adaptive7 => "ADAP-07",
        }
    }

    /// Ready-queue ordering, or `None` for policies without a defined
    /// insertion order (those insert at head with an error report).
    pub fn ready_order(self) -> Option<OrderPolicy> {
        match self {
            Algorithm::Rm | Algorithm::Drm => Some(OrderPolicy::Priority),
            Algorithm::Muf | Algorithm::Mmuf | Algorithm::Mmmuf => Some(OrderPolicy::Urgency),
            Algorithm::Spt => Some(OrderPolicy::ShortestTimeLeft),
            Algorithm::Edf
            | Algorithm::EdfRto
            | Algorithm::Adaptive1
            | Algorithm::Adaptive2
            | Algorithm::Adaptive3
            | Algorithm::Adaptive4
            | Algorithm::Adaptive5
            | Algorithm::Adaptive6
            | Algorithm::Adaptive7 => Some(OrderPolicy::Deadline),
            Algorithm::Llf | Algorithm::Mllf => Some(OrderPolicy::Laxity),
            _ => None,
        }
    }

    /// Policies whose dispatch decisions compare MUF urgency words.
    pub fn is_muf_family(self) -> bool {
        matches!(self, Algorithm::Muf | Algorithm::Mmuf | Algorithm::Mmmuf)
    }

    /// Policies that release tasks back out of the skipped queue.
    pub fn uses_skip_queue(self) -> bool {
        matches!(self, Algorithm::EdfRto | Algorithm::RmRto | Algorithm::EdfBwp)
    }

    /// Policies that attempt doubled-queue restoration each tick. The
    /// restore step is gated on this but only acts for Adaptive4/6/7.
    pub fn uses_doubled_restore(self) -> bool {
        matches!(
            self,
            Algorithm::Adaptive2
                | Algorithm::Adaptive3
                | Algorithm::Adaptive4
                | Algorithm::Adaptive5
                | Algorithm::Adaptive6
                | Algorithm::Adaptive7
        )
    }

    /// Policies that mirror ready tasks into the laxity tracking queue.
    pub fn uses_laxity_queue(self) -> bool {
        matches!(self, Algorithm::Adaptive5 | Algorithm::Adaptive6)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
