//! Structured run reporting.
//!
//! The engine never formats text. Every observable decision is emitted as
//! an [`Event`] to the active [`ReportSink`]; sinks decide what to keep
//! and how to render it. Engine-internal faults travel the same path with
//! [`Severity::Error`] and never abort the run.

use crate::policy::Algorithm;
use crate::queue::QueueError;
use crate::task::{TaskId, TaskState, NUM_SLOTS};
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Per-tick snapshots.
    Debug,
    /// Decision narration: dispatch, preemption, adaptation steps.
    Verbose,
    /// Run lifecycle: case loaded, tasks loaded.
    Info,
    /// End-of-run results.
    Results,
    /// Engine faults, reported and survived.
    Error,
}

/// One task slot's contribution to a per-tick snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskSnapshot {
    pub template_id: u8,
    pub state: TaskState,
    /// Absolute deadline is exactly now.
    pub at_deadline: bool,
    /// More work left than time to the deadline.
    pub late: bool,
    /// Deadline already passed.
    pub overdue: bool,
}

/// Faults detected inside the engine. All are reported, none are fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("unknown task template: {id}")]
    UnknownTemplate { id: u8 },

    #[error("{algorithm} has no ready-queue ordering, inserting at head")]
    UnorderedInsert { algorithm: Algorithm },

    #[error("{algorithm} has no dispatch rule")]
    NoDispatchRule { algorithm: Algorithm },

    #[error("queue violation: {0}")]
    Queue(#[from] QueueError),

    #[error("division by zero computing utilization of task {task:?}")]
    DivisionByZero { task: TaskId },

    #[error("{algorithm} found no adaptation candidate")]
    NoCandidate { algorithm: Algorithm },
}

#[derive(Debug, Clone)]
pub enum Event {
    TickSnapshot {
        now: u32,
        tasks: [TaskSnapshot; NUM_SLOTS],
        engine_ns: u64,
        overrun: bool,
    },
    CaseLoaded {
        case: u8,
        algorithm: Algorithm,
    },
    TaskLoaded {
        slot: TaskId,
        template_id: u8,
    },
    /// Dispatch comparison about to run between the ready head and the
    /// running task, if any.
    Dispatching {
        algorithm: Algorithm,
        running: Option<TaskId>,
        head: TaskId,
    },
    Preempting {
        task: TaskId,
    },
    Completed {
        task: TaskId,
        met: bool,
    },
    DurationRevised {
        task: TaskId,
        from: u32,
        to: u32,
    },
    UtilizationRevised {
        task: TaskId,
        from: u32,
        to: u32,
    },
    OverloadUtilization {
        utilization: u32,
    },
    OverloadLaxity {
        task: TaskId,
        laxity: u32,
        time_left: u32,
    },
    Removing {
        task: TaskId,
    },
    Restoring {
        task: TaskId,
    },
    /// Task-set utilization moved during adaptation.
    UtilizationChanged {
        from: u32,
        to: u32,
    },
    PeriodDoubled {
        task: TaskId,
        multiplier: u8,
    },
    DeadlineExtended {
        task: TaskId,
        from: u32,
        to: u32,
    },
    PeriodHalved {
        task: TaskId,
        multiplier: u8,
    },
    Skipping {
        task: TaskId,
    },
    SkipReleased {
        task: TaskId,
        to_ready: bool,
    },
    GivingUp {
        algorithm: Algorithm,
        iterations: u32,
    },
    FaultInjected {
        task: TaskId,
        added_ticks: u32,
    },
    TaskResult {
        slot: TaskId,
        template_id: u8,
        deadlines_met: u32,
        deadlines_missed: u32,
        preemptions: u32,
        skips: u32,
        period_doubles: u32,
        value: u32,
    },
    CaseStats(RunStats),
    EngineError(EngineError),
}

impl Event {
    pub fn severity(&self) -> Severity {
        match self {
            Event::TickSnapshot { .. } => Severity::Debug,
            Event::CaseLoaded { .. } | Event::TaskLoaded { .. } => Severity::Info,
            Event::TaskResult { .. } | Event::CaseStats(_) => Severity::Results,
            Event::EngineError(_) => Severity::Error,
            _ => Severity::Verbose,
        }
    }
}

/// Aggregate counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub ticks: u32,
    pub preemptions: u32,
    pub skips: u32,
    pub removals: u32,
    pub period_doubles: u32,
    pub deadlines_met: u32,
    pub deadlines_missed: u32,
    /// Execution ticks banked by releases that met their deadline.
    pub value: u32,
}

impl RunStats {
    /// Percentage of processor time spent on work that met its deadline.
    pub fn achieved_utilization(&self) -> u32 {
        if self.ticks == 0 {
            0
        } else {
            self.value * 100 / self.ticks
        }
    }
}

pub trait ReportSink: Send + Sync {
    fn record(&self, event: &Event);
}

/// Discards everything. Useful for soak runs driven purely by stats.
#[derive(Debug, Default)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn record(&self, _event: &Event) {}
}

/// Buffers events for later inspection.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl ReportSink for MemorySink {
    fn record(&self, event: &Event) {
        self.events.lock().push(event.clone());
    }
}

/// Prints events at or above a severity threshold.
#[derive(Debug)]
pub struct ConsoleSink {
    min_severity: Severity,
}

impl ConsoleSink {
    pub fn new(min_severity: Severity) -> Self {
        Self { min_severity }
    }

    fn state_code(snap: &TaskSnapshot) -> &'static str {
        match snap.state {
            TaskState::Running if snap.at_deadline => "<-D->",
            TaskState::Running if snap.overdue => "OVER ",
            TaskState::Running if snap.late => "LATE ",
            TaskState::Running => "+++++",
            TaskState::Ready if snap.at_deadline => "  D  ",
            TaskState::Ready if snap.overdue => " ro  ",
            TaskState::Ready if snap.late => " rl  ",
            TaskState::Ready => "  r  ",
            TaskState::Preempted if snap.at_deadline => "  D  ",
            TaskState::Preempted if snap.overdue => " po  ",
            TaskState::Preempted if snap.late => " pl  ",
            TaskState::Preempted => "  p  ",
            TaskState::Idle if snap.at_deadline => "  D  ",
            TaskState::Idle => "  i  ",
            TaskState::Skipped if snap.at_deadline => "  D  ",
            TaskState::Skipped => " sk  ",
            TaskState::Waiting => "  w  ",
            TaskState::Removed => " rm  ",
            TaskState::Sleeping => "  s  ",
        }
    }
}

impl ReportSink for ConsoleSink {
    fn record(&self, event: &Event) {
        if event.severity() < self.min_severity {
            return;
        }
        match event {
            Event::TickSnapshot {
                now,
                tasks,
                engine_ns,
                ..
            } => {
                let mut line = format!("{:6} |", now);
                for snap in tasks {
                    line.push_str(Self::state_code(snap));
                    line.push('|');
                }
                println!("{} {}ns", line, engine_ns);
            }
            Event::CaseLoaded { case, algorithm } => {
                println!("test case {} using {}", case, algorithm);
            }
            Event::TaskLoaded { slot, template_id } => {
                println!("slot {} <- template {}", slot.0, template_id);
            }
            Event::CaseStats(stats) => {
                println!("duration            {}", stats.ticks);
                println!("pre-emptions        {}", stats.preemptions);
                println!("skips               {}", stats.skips);
                println!("removed tasks       {}", stats.removals);
                println!("doubled periods     {}", stats.period_doubles);
                println!("missed deadlines    {}", stats.deadlines_missed);
                println!("met deadlines       {}", stats.deadlines_met);
                println!("value               {}", stats.value);
                println!("achieved util (%)   {}", stats.achieved_utilization());
            }
            Event::TaskResult {
                slot,
                template_id,
                deadlines_met,
                deadlines_missed,
                preemptions,
                skips,
                period_doubles,
                value,
            } => {
                println!(
                    "task {} (template {}): met {} missed {} preempts {} skips {} doubles {} value {}",
                    slot.0,
                    template_id,
                    deadlines_met,
                    deadlines_missed,
                    preemptions,
                    skips,
                    period_doubles,
                    value
                );
            }
            Event::EngineError(err) => {
                eprintln!("engine error: {}", err);
            }
            other => {
                println!("{:?}", other);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Debug < Severity::Verbose);
        assert!(Severity::Verbose < Severity::Info);
        assert!(Severity::Results < Severity::Error);
    }

    #[test]
    fn test_event_severities() {
        let snapshot = Event::TickSnapshot {
            now: 1,
            tasks: Default::default(),
            engine_ns: 0,
            overrun: false,
        };
        assert_eq!(snapshot.severity(), Severity::Debug);
        assert_eq!(
            Event::Preempting { task: TaskId(1) }.severity(),
            Severity::Verbose
        );
        assert_eq!(
            Event::EngineError(EngineError::UnknownTemplate { id: 92 }).severity(),
            Severity::Error
        );
        assert_eq!(
            Event::CaseStats(RunStats::default()).severity(),
            Severity::Results
        );
    }

    #[test]
    fn test_memory_sink_captures() {
        let sink = MemorySink::new();
        sink.record(&Event::Preempting { task: TaskId(3) });
        sink.record(&Event::Removing { task: TaskId(2) });
        assert_eq!(sink.len(), 2);
        let events = sink.take();
        assert!(matches!(events[0], Event::Preempting { task } if task == TaskId(3)));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_achieved_utilization() {
        let stats = RunStats {
            ticks: 400,
            value: 290,
            ..Default::default()
        };
        assert_eq!(stats.achieved_utilization(), 72);
        assert_eq!(RunStats::default().achieved_utilization(), 0);
    }
}
