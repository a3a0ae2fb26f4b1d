//! The tick-driven scheduling engine.
//!
//! One [`Scheduler`] owns the task store, the state queues and the run
//! counters. Each simulated tick the driver first charges the running
//! task one tick of execution ([`Scheduler::run_task_cycle`]) and then
//! runs the scheduling pass ([`Scheduler::tick`]), which moves tasks
//! between states and decides what runs next.

mod adapt;
mod dispatch;

use crate::calc;
use crate::catalog;
use crate::error::{Error, Result};
use crate::policy::Algorithm;
use crate::queue::{LinkSet, OrderPolicy, QueueError, TaskQueue};
use crate::report::{EngineError, Event, ReportSink, RunStats, TaskSnapshot};
use crate::task::{TaskId, TaskState, TaskStore, NUM_SLOTS};
use std::sync::Arc;
use std::time::Instant;

pub struct Scheduler {
    store: TaskStore,
    algorithm: Algorithm,
    running: TaskId,

    // Primary state queues.
    ready: TaskQueue,
    idle: TaskQueue,
    waiting: TaskQueue,
    skipped: TaskQueue,
    removed: TaskQueue,

    // Adaptation bookkeeping.
    doubled: TaskQueue,
    laxity_queue: TaskQueue,

    stats: RunStats,
    sink: Arc<dyn ReportSink>,
    emit_snapshots: bool,
    overrun_seen: bool,
    last_tick_ns: u64,
}

impl Scheduler {
    pub fn new(algorithm: Algorithm, sink: Arc<dyn ReportSink>) -> Self {
        Self {
            store: TaskStore::new(),
            algorithm,
            running: TaskId::NONE,
            ready: TaskQueue::new(LinkSet::Primary),
            idle: TaskQueue::new(LinkSet::Primary),
            waiting: TaskQueue::new(LinkSet::Primary),
            skipped: TaskQueue::new(LinkSet::Primary),
            removed: TaskQueue::new(LinkSet::Primary),
            doubled: TaskQueue::new(LinkSet::Doubled),
            laxity_queue: TaskQueue::new(LinkSet::Laxity),
            stats: RunStats::default(),
            sink,
            emit_snapshots: true,
            overrun_seen: false,
            last_tick_ns: 0,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn set_algorithm(&mut self, algorithm: Algorithm) {
        self.algorithm = algorithm;
    }

    pub fn running(&self) -> TaskId {
        self.running
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Latched when any competing task is ever observed past its
    /// deadline.
    pub fn has_overrun(&self) -> bool {
        self.overrun_seen
    }

    pub fn set_emit_snapshots(&mut self, emit: bool) {
        self.emit_snapshots = emit;
    }

    /// Load a template into a slot and file the task into the waiting or
    /// idle queue. Template id 0 empties the slot; an unknown template is
    /// reported and leaves the slot empty.
    pub fn add_task(&mut self, slot: TaskId, template_id: u8) -> Result<()> {
        if slot.is_none() || slot.index() > NUM_SLOTS {
            return Err(Error::InvalidSlot(slot.0));
        }
        if template_id == 0 {
            self.store.clear(slot);
            return Ok(());
        }
        let Some(template) = catalog::template(template_id) else {
            self.report(Event::EngineError(EngineError::UnknownTemplate {
                id: template_id,
            }));
            self.store.clear(slot);
            return Ok(());
        };

        self.store.load(slot, template);
        let task = self.store.get_mut(slot);
        if task.release > 0 {
            task.state = TaskState::Waiting;
            task.abs_deadline = task.release;
            let res = self.waiting.insert(&mut self.store, slot, OrderPolicy::Deadline);
            self.check(res);
        } else {
            task.state = TaskState::Idle;
            let res = self.idle.insert(&mut self.store, slot, OrderPolicy::Deadline);
            self.check(res);
        }
        self.report(Event::TaskLoaded { slot, template_id });
        Ok(())
    }

    /// Return the engine to a freshly constructed state, keeping the
    /// sink and the algorithm.
    pub fn soft_reset(&mut self) {
        self.store.reset();
        self.running = TaskId::NONE;
        self.ready = TaskQueue::new(LinkSet::Primary);
        self.idle = TaskQueue::new(LinkSet::Primary);
        self.waiting = TaskQueue::new(LinkSet::Primary);
        self.skipped = TaskQueue::new(LinkSet::Primary);
        self.removed = TaskQueue::new(LinkSet::Primary);
        self.doubled = TaskQueue::new(LinkSet::Doubled);
        self.laxity_queue = TaskQueue::new(LinkSet::Laxity);
        self.stats = RunStats::default();
        self.overrun_seen = false;
        self.last_tick_ns = 0;
    }

    /// One scheduling pass. Runs after the execution charge for `now`.
    pub fn tick(&mut self, now: u32) {
        let started = Instant::now();

        self.recompute_laxities(now);
        if self.algorithm.is_muf_family() {
            self.recompute_urgencies();
        }
        self.process_waiting(now);
        self.process_completed(now);
        self.process_removed(now);
        if self.algorithm.uses_doubled_restore() {
            self.process_doubled();
        }
        if self.algorithm.uses_skip_queue() {
            self.process_skipped(now);
        }
        self.process_idle(now);
        if !self.ready.is_empty() {
            self.dispatch(now);
        }

        self.last_tick_ns = started.elapsed().as_nanos() as u64;
    }

    /// Charge one tick of execution to the running task and emit the
    /// per-tick snapshot.
    pub fn run_task_cycle(&mut self, now: u32) {
        if !self.running.is_none() {
            let task = self.store.get_mut(self.running);
            if task.time_left > 0 {
                task.time_left -= 1;
                task.net_value += 1;
                task.time_taken += 1;
            }
        }
        self.stats.ticks += 1;
        self.emit_snapshot(now);
    }

    /// Mid-run execution-time fault: the running task turns out to need
    /// more time than charged so far.
    pub fn inject_fault(&mut self, added_ticks: u32) {
        if self.running.is_none() {
            return;
        }
        let task = self.store.get_mut(self.running);
        task.time_taken += added_ticks;
        let id = self.running;
        self.report(Event::FaultInjected {
            task: id,
            added_ticks,
        });
    }

    pub(crate) fn report(&self, event: Event) {
        self.sink.record(&event);
    }

    pub(crate) fn check(&self, result: std::result::Result<(), QueueError>) {
        if let Err(err) = result {
            self.report(Event::EngineError(EngineError::Queue(err)));
        }
    }

    /// Ready-queue insertion order for the active policy. Policies with
    /// no defined order are reported and fall back to head insertion.
    pub(crate) fn ready_order(&self) -> OrderPolicy {
        match self.algorithm.ready_order() {
            Some(order) => order,
            None => {
                self.report(Event::EngineError(EngineError::UnorderedInsert {
                    algorithm: self.algorithm,
                }));
                OrderPolicy::Unordered
            }
        }
    }

    pub(crate) fn recompute_laxities(&mut self, now: u32) {
        for id in self.store.slots() {
            let task = self.store.get_mut(id);
            if task.is_loaded() && task.state.is_active() {
                task.laxity = calc::laxity(task.abs_deadline, task.time_left, now);
            }
        }
    }

    pub(crate) fn recompute_urgencies(&mut self) {
        for id in self.store.slots() {
            let task = self.store.get_mut(id);
            if task.is_loaded() && task.state.is_active() {
                task.refresh_urgency();
            }
        }
    }

    fn process_waiting(&mut self, now: u32) {
        loop {
            let head = self.waiting.first();
            if head.is_none() || self.store.get(head).abs_deadline > now {
                break;
            }
            let id = self.waiting.extract_first(&mut self.store);
            self.store.get_mut(id).state = TaskState::Idle;
            self.recompute_laxities(now);
            self.recompute_urgencies();
            let res = self.idle.insert(&mut self.store, id, OrderPolicy::Deadline);
            self.check(res);
        }
    }

    fn process_completed(&mut self, now: u32) {
        if self.running.is_none() || self.store.get(self.running).time_left != 0 {
            return;
        }
        let id = self.running;
        self.notify_completed(id, now);

        if self.store.get(id).period > 0 {
            self.store.get_mut(id).state = TaskState::Idle;
            let res = self.idle.insert(&mut self.store, id, OrderPolicy::Deadline);
            self.check(res);
        } else {
            self.store.get_mut(id).state = TaskState::Sleeping;
        }
        self.running = TaskId::NONE;
    }

    fn notify_completed(&mut self, id: TaskId, now: u32) {
        let task = self.store.get_mut(id);
        let met = task.abs_deadline >= now;
        if met {
            task.deadlines_met += 1;
            task.value += task.net_value;
        } else {
            task.deadlines_missed += 1;
        }
        let net_value = task.net_value;
        let overran = task.time_taken > task.c_duration;
        let (old_duration, new_duration) = (task.c_duration, task.time_taken);
        if overran {
            task.c_duration = task.time_taken;
        }
        task.time_taken = 0;
        task.net_value = 0;

        if met {
            self.stats.deadlines_met += 1;
            self.stats.value += net_value;
        } else {
            self.stats.deadlines_missed += 1;
        }
        self.report(Event::Completed { task: id, met });
        if overran {
            self.report(Event::DurationRevised {
                task: id,
                from: old_duration,
                to: new_duration,
            });
        }
    }

    fn process_skipped(&mut self, now: u32) {
        loop {
            let head = self.skipped.first();
            if head.is_none() || self.store.get(head).abs_deadline > now {
                break;
            }
            let id = self.skipped.extract_first(&mut self.store);
            let order = self.ready_order();
            let task = self.store.get_mut(id);
            task.abs_deadline = now + task.rel_deadline;
            task.time_left = task.c_duration;
            task.not_skipped = task.params.skip_gap;
            let to_ready = task.laxity == 0;
            if to_ready {
                task.state = TaskState::Ready;
                let res = self.ready.insert(&mut self.store, id, order);
                self.check(res);
            } else {
                task.state = TaskState::Idle;
                let res = self.idle.insert(&mut self.store, id, order);
                self.check(res);
            }
            self.report(Event::SkipReleased { task: id, to_ready });
        }
    }

    fn process_idle(&mut self, now: u32) {
        loop {
            let head = self.idle.first();
            if head.is_none() || self.store.get(head).abs_deadline > now {
                break;
            }
            let id = self.idle.extract_first(&mut self.store);
            let order = self.ready_order();
            let task = self.store.get_mut(id);
            task.abs_deadline += task.effective_period();
            task.time_left = task.c_duration;
            task.state = TaskState::Ready;
            self.recompute_laxities(now);
            self.recompute_urgencies();
            let res = self.ready.insert(&mut self.store, id, order);
            self.check(res);
            if self.algorithm.uses_laxity_queue() {
                let res = self.laxity_queue.insert(&mut self.store, id, OrderPolicy::Laxity);
                self.check(res);
            }
        }
    }

    fn emit_snapshot(&mut self, now: u32) {
        let mut tasks: [TaskSnapshot; NUM_SLOTS] = Default::default();
        let mut overrun = false;
        for (i, id) in self.store.slots().enumerate() {
            let task = self.store.get(id);
            if !task.is_loaded() {
                continue;
            }
            let at_deadline = task.abs_deadline == now;
            let overdue = task.abs_deadline < now;
            let late = !at_deadline && !overdue && task.time_left > task.abs_deadline - now;
            if overdue
                && matches!(
                    task.state,
                    TaskState::Running | TaskState::Ready | TaskState::Preempted
                )
            {
                overrun = true;
            }
            tasks[i] = TaskSnapshot {
                template_id: task.template_id,
                state: task.state,
                at_deadline,
                late,
                overdue,
            };
        }
        if overrun {
            self.overrun_seen = true;
        }
        if self.emit_snapshots {
            self.report(Event::TickSnapshot {
                now,
                tasks,
                engine_ns: self.last_tick_ns,
                overrun,
            });
        }
    }
}
