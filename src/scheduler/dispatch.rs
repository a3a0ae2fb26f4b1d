//! Per-policy preemption and dispatch decisions.
//!
//! Called once per tick when the ready queue is non-empty. The ready
//! queue is already ordered for the active policy, so each decision only
//! compares the queue head against the running task.

use super::Scheduler;
use crate::policy::Algorithm;
use crate::report::{EngineError, Event};
use crate::task::{TaskId, TaskState};

impl Scheduler {
    pub(super) fn dispatch(&mut self, now: u32) {
        match self.algorithm {
            Algorithm::Rm | Algorithm::Irm => self.schedule_rm(),
            Algorithm::Drm => self.schedule_drm(),
            Algorithm::Edf => self.schedule_edf(),
            Algorithm::Spt => self.schedule_spt(),
            Algorithm::Llf => self.schedule_llf(),
            Algorithm::Mllf | Algorithm::Mmuf => self.schedule_zero_laxity(),
            Algorithm::Muf => self.schedule_muf(),
            Algorithm::Mmmuf => self.schedule_mmmuf(),
            Algorithm::EdfRto => self.schedule_edf_rto(now),
            Algorithm::Adaptive1 | Algorithm::Adaptive2 => self.schedule_adaptive_removal(now),
            Algorithm::Adaptive3 | Algorithm::Adaptive4 => self.schedule_adaptive_doubling(),
            Algorithm::Adaptive5 => self.schedule_adaptive_laxity(now),
            Algorithm::Adaptive6 => self.schedule_adaptive_monitored(now),
            Algorithm::Adaptive7 => self.schedule_adaptive_enhanced(),
            // Reserved, no decision logic yet.
            Algorithm::Cyclic | Algorithm::RoundRobin | Algorithm::DStar => {}
            Algorithm::DdStar | Algorithm::DOver | Algorithm::RmRto | Algorithm::EdfBwp => {
                self.report(Event::EngineError(EngineError::NoDispatchRule {
                    algorithm: self.algorithm,
                }));
            }
        }
    }

    fn narrate(&self, head: TaskId) {
        self.report(Event::Dispatching {
            algorithm: self.algorithm,
            running: (!self.running.is_none()).then_some(self.running),
            head,
        });
    }

    fn schedule_rm(&mut self) {
        let head = self.ready.first();
        if !self.running.is_none() {
            self.narrate(head);
            if self.store.get(head).priority >= self.store.get(self.running).priority {
                return;
            }
            self.preempt(self.running);
        }
        self.dispatch_next();
    }

    /// DRM holds releases back until they have no slack left, so the CPU
    /// only changes hands at zero laxity.
    fn schedule_drm(&mut self) {
        let head = self.ready.first();
        let better = self.running.is_none()
            || self.store.get(head).priority < self.store.get(self.running).priority;
        if better && self.store.get(head).laxity == 0 {
            self.narrate(head);
            if !self.running.is_none() {
                self.preempt(self.running);
            }
            self.dispatch_next();
        }
    }

    pub(super) fn schedule_edf(&mut self) {
        let head = self.ready.first();
        if !self.running.is_none() {
            self.narrate(head);
            if self.store.get(head).abs_deadline >= self.store.get(self.running).abs_deadline {
                return;
            }
            self.preempt(self.running);
        }
        self.dispatch_next();
    }

    fn schedule_spt(&mut self) {
        let head = self.ready.first();
        if !self.running.is_none() {
            self.narrate(head);
            if self.store.get(head).time_left >= self.store.get(self.running).time_left {
                return;
            }
            self.preempt(self.running);
        }
        self.dispatch_next();
    }

    fn schedule_llf(&mut self) {
        let head = self.ready.first();
        if !self.running.is_none() {
            self.narrate(head);
            if self.store.get(head).laxity >= self.store.get(self.running).laxity {
                return;
            }
            self.preempt(self.running);
        }
        self.dispatch_next();
    }

    /// MLLF and MMUF both let the running task continue until the queue
    /// head reaches zero laxity. The two differ only in queue order.
    fn schedule_zero_laxity(&mut self) {
        let head = self.ready.first();
        if !self.running.is_none() {
            self.narrate(head);
            if self.store.get(head).laxity != 0 {
                return;
            }
            self.preempt(self.running);
        }
        self.dispatch_next();
    }

    fn schedule_muf(&mut self) {
        let head = self.ready.first();
        if !self.running.is_none() {
            self.narrate(head);
            if self.store.get(head).urgency <= self.store.get(self.running).urgency {
                return;
            }
            self.preempt(self.running);
        }
        self.dispatch_next();
    }

    /// MMMUF: zero laxity always preempts; otherwise a more urgent task
    /// may displace a non-critical running task.
    fn schedule_mmmuf(&mut self) {
        let head = self.ready.first();
        if !self.running.is_none() {
            self.narrate(head);
            let running = self.store.get(self.running);
            let head_task = self.store.get(head);
            let zero_laxity = head_task.laxity == 0;
            let outranks =
                !running.params.muf_critical && head_task.urgency > running.urgency;
            if !zero_laxity && !outranks {
                return;
            }
            self.preempt(self.running);
        }
        self.dispatch_next();
    }

    /// EDF with skip-over. An idle CPU may skip the head release outright
    /// when doing so lets the following releases meet their deadlines; a
    /// busy CPU preempts only when the head both has the earlier deadline
    /// and fits inside the running task's slack.
    fn schedule_edf_rto(&mut self, now: u32) {
        let first = self.ready.first();
        if self.running.is_none() {
            if self.is_skippable(first) {
                if self.can_meet_deadline(first, now) {
                    let second = self.ready.second(&self.store);
                    if !self.can_meet_deadline(second, now) {
                        self.skip_first(now);
                    }
                } else {
                    self.skip_first(now);
                }
            }
            self.dispatch_next();
            return;
        }
        self.narrate(first);
        let head = self.store.get(first);
        let running = self.store.get(self.running);
        if head.abs_deadline < running.abs_deadline && head.time_left < running.laxity {
            self.preempt(self.running);
        }
    }

    fn is_skippable(&self, id: TaskId) -> bool {
        !id.is_none() && self.store.get(id).not_skipped == 0
    }

    fn can_meet_deadline(&self, id: TaskId, now: u32) -> bool {
        if id.is_none() {
            return true;
        }
        let task = self.store.get(id);
        now + task.time_left <= task.abs_deadline
    }

    /// Move the ready head to the skipped queue for one period.
    fn skip_first(&mut self, now: u32) {
        let id = self.ready.extract_first(&mut self.store);
        if id.is_none() {
            return;
        }
        let order = self.ready_order();
        self.report(Event::Skipping { task: id });
        let res = self.skipped.insert(&mut self.store, id, order);
        self.check(res);
        let task = self.store.get_mut(id);
        task.state = TaskState::Skipped;
        task.not_skipped = task.params.skip_gap;
        if task.abs_deadline <= now {
            task.abs_deadline = now + task.rel_deadline;
        }
        task.total_skips += 1;
        self.stats.skips += 1;
    }

    /// Displace the running task back into the ready queue.
    pub(super) fn preempt(&mut self, id: TaskId) {
        self.report(Event::Preempting { task: id });
        let order = self.ready_order();
        {
            let task = self.store.get_mut(id);
            task.state = TaskState::Preempted;
            task.preempt_count += 1;
        }
        self.stats.preemptions += 1;
        let res = self.ready.insert(&mut self.store, id, order);
        self.check(res);
        if self.algorithm.uses_laxity_queue() {
            let res = self.laxity_queue.insert(&mut self.store, id, crate::queue::OrderPolicy::Laxity);
            self.check(res);
        }
        self.running = TaskId::NONE;
    }

    /// Give the CPU to the ready head.
    pub(super) fn dispatch_next(&mut self) {
        let id = self.ready.extract_first(&mut self.store);
        if self.algorithm.uses_laxity_queue() && !id.is_none() {
            let _ = self.laxity_queue.remove(&mut self.store, id);
        }
        self.running = id;
        if id.is_none() {
            return;
        }
        let task = self.store.get_mut(id);
        task.state = TaskState::Running;
        if task.not_skipped > 0 {
            task.not_skipped -= 1;
        }
    }
}
