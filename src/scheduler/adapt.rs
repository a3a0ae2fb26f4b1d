//! Overload adaptation.
//!
//! The adaptive policies all dispatch EDF underneath; what varies is how
//! they shed load when the task set stops fitting. Two levers exist:
//! removing flexible tasks outright, and doubling flexible task periods.
//! Both keep their victims queued so capacity can be given back later.

use super::Scheduler;
use crate::calc::{self, MAX_UTILIZATION};
use crate::policy::Algorithm;
use crate::queue::OrderPolicy;
use crate::report::{EngineError, Event};
use crate::task::{TaskId, TaskState};

/// Doubling attempts per tick before ADAP-06 stops trying.
const MONITORED_RETRY_CAP: u32 = 5;
/// Doubling attempts per tick before ADAP-07 stops trying.
const ENHANCED_RETRY_CAP: u32 = 10;

impl Scheduler {
    /// Recompute every loaded task's utilization from its observed
    /// duration and sum the task set, discounting doubled periods.
    pub(super) fn recompute_utilizations(&mut self) -> u32 {
        let mut total = 0;
        for id in self.store.slots() {
            let task = self.store.get(id);
            if !task.is_loaded() || !task.state.is_loaded() {
                continue;
            }
            let fresh = match calc::utilization(task.c_duration, task.period) {
                Some(u) => u,
                None => {
                    self.report(Event::EngineError(EngineError::DivisionByZero { task: id }));
                    0
                }
            };
            let cached = task.task_util;
            if fresh != cached {
                self.report(Event::UtilizationRevised {
                    task: id,
                    from: cached,
                    to: fresh,
                });
                self.store.get_mut(id).task_util = fresh;
            }
            total += self.discounted_utilization(id);
        }
        total
    }

    /// Task-set utilization from the cached per-task figures.
    pub(super) fn cached_utilization(&self) -> u32 {
        self.store
            .slots()
            .filter(|&id| {
                let task = self.store.get(id);
                task.is_loaded() && task.state.is_loaded()
            })
            .map(|id| self.discounted_utilization(id))
            .sum()
    }

    fn discounted_utilization(&self, id: TaskId) -> u32 {
        let task = self.store.get(id);
        if task.params.period_flexible {
            task.task_util >> task.period_multiplier
        } else {
            task.task_util
        }
    }

    /// The next task to shed: lowest static priority among the loaded
    /// flexible tasks that have not been doubled yet.
    fn removal_candidate(&self) -> Option<TaskId> {
        let mut best = TaskId::NONE;
        let mut best_priority = 0;
        for id in self.store.slots() {
            let task = self.store.get(id);
            if task.is_loaded()
                && task.state.is_loaded()
                && task.params.period_flexible
                && task.period_multiplier == 0
                && task.priority > best_priority
            {
                best_priority = task.priority;
                best = id;
            }
        }
        (!best.is_none()).then_some(best)
    }

    /// ADAP-07's candidate: minimum enhanced priority among active
    /// flexible tasks, doubled or not.
    fn enhanced_candidate(&mut self) -> Option<TaskId> {
        for id in self.store.slots() {
            let task = self.store.get_mut(id);
            if task.is_loaded() {
                task.refresh_enhanced_priority();
            }
        }
        let mut best: Option<TaskId> = None;
        for id in self.store.slots() {
            let task = self.store.get(id);
            if !task.is_loaded() || !task.params.period_flexible {
                continue;
            }
            if !matches!(
                task.state,
                TaskState::Ready | TaskState::Running | TaskState::Idle | TaskState::Preempted
            ) {
                continue;
            }
            match best {
                Some(b) if self.store.get(b).enhanced_priority <= task.enhanced_priority => {}
                _ => best = Some(id),
            }
        }
        best
    }

    fn no_candidate(&self) {
        self.report(Event::EngineError(EngineError::NoCandidate {
            algorithm: self.algorithm,
        }));
    }

    /// ADAP-01/02: shed whole tasks while the set does not fit, then try
    /// to take shed tasks back, then dispatch EDF.
    pub(super) fn schedule_adaptive_removal(&mut self, now: u32) {
        let mut utility = self.recompute_utilizations();
        while utility > MAX_UTILIZATION {
            self.report(Event::OverloadUtilization {
                utilization: utility,
            });
            let Some(victim) = self.removal_candidate() else {
                self.no_candidate();
                break;
            };
            self.report(Event::Removing { task: victim });
            if victim == self.running {
                self.preempt(victim);
            }
            self.primary_extract(victim);
            self.stats.removals += 1;
            self.store.get_mut(victim).total_skips += 1;
            let res = self
                .removed
                .insert(&mut self.store, victim, OrderPolicy::Priority);
            self.check(res);
            self.store.get_mut(victim).state = TaskState::Removed;

            let after = self.cached_utilization();
            self.report(Event::UtilizationChanged {
                from: utility,
                to: after,
            });
            utility = after;
        }
        self.process_removed(now);
        self.schedule_edf();
    }

    /// Unlink a task from whichever primary state queue holds it.
    fn primary_extract(&mut self, id: TaskId) {
        let state = self.store.get(id).state;
        let result = match state {
            TaskState::Ready | TaskState::Preempted => self.ready.remove(&mut self.store, id),
            TaskState::Idle => self.idle.remove(&mut self.store, id),
            TaskState::Skipped => self.skipped.remove(&mut self.store, id),
            TaskState::Waiting => self.waiting.remove(&mut self.store, id),
            TaskState::Removed => self.removed.remove(&mut self.store, id),
            TaskState::Running | TaskState::Sleeping => Ok(()),
        };
        self.check(result);
    }

    /// ADAP-02 restoration: while spare capacity fits a shed task, bring
    /// it back through the idle queue with an immediate release.
    pub(super) fn process_removed(&mut self, now: u32) {
        if self.algorithm != Algorithm::Adaptive2 {
            return;
        }
        loop {
            let utility = self.cached_utilization();
            if utility >= MAX_UTILIZATION {
                break;
            }
            let spare = MAX_UTILIZATION - utility;
            let Some(id) = self.removed_fit(spare) else {
                break;
            };
            let res = self.removed.remove(&mut self.store, id);
            self.check(res);
            self.report(Event::Restoring { task: id });
            let task = self.store.get_mut(id);
            task.state = TaskState::Idle;
            task.abs_deadline = now;
            let res = self.idle.insert(&mut self.store, id, OrderPolicy::Deadline);
            self.check(res);

            let after = self.cached_utilization();
            self.report(Event::UtilizationChanged {
                from: utility,
                to: after,
            });
        }
    }

    fn removed_fit(&self, spare: u32) -> Option<TaskId> {
        self.removed
            .iter(&self.store)
            .find(|&id| self.store.get(id).task_util <= spare)
    }

    /// ADAP-04/06/07 restoration: halve doubled periods that fit back
    /// into spare capacity. ADAP-04 trusts the cached utilization;
    /// 06 and 07 recompute and keep the doubled queue ranked.
    pub(super) fn process_doubled(&mut self) {
        match self.algorithm {
            Algorithm::Adaptive4 => {
                let utility = self.cached_utilization();
                self.restore_doubled(utility, false);
            }
            Algorithm::Adaptive6 | Algorithm::Adaptive7 => {
                let utility = self.recompute_utilizations();
                self.restore_doubled(utility, true);
            }
            _ => {}
        }
    }

    fn restore_doubled(&mut self, mut utility: u32, rerank: bool) {
        while utility < MAX_UTILIZATION {
            let spare = MAX_UTILIZATION - utility;
            let Some(id) = self.doubled_fit(spare) else {
                break;
            };
            let res = self.doubled.remove(&mut self.store, id);
            self.check(res);
            self.halve_period(id);
            if rerank && self.store.get(id).period_multiplier > 0 {
                self.store.get_mut(id).refresh_enhanced_priority();
                let res = self
                    .doubled
                    .insert(&mut self.store, id, OrderPolicy::EnhancedPriority);
                self.check(res);
            }
            utility = if rerank {
                self.recompute_utilizations()
            } else {
                self.cached_utilization()
            };
        }
    }

    /// Halving a period at multiplier m adds `util >> m` to the load, so
    /// that is what has to fit in the spare.
    fn doubled_fit(&self, spare: u32) -> Option<TaskId> {
        self.doubled.iter(&self.store).find(|&id| {
            let task = self.store.get(id);
            (task.task_util >> task.period_multiplier) <= spare
        })
    }

    /// ADAP-03/04: double periods while the set does not fit, then
    /// dispatch EDF.
    pub(super) fn schedule_adaptive_doubling(&mut self) {
        let mut utility = self.recompute_utilizations();
        while utility > MAX_UTILIZATION {
            self.report(Event::OverloadUtilization {
                utilization: utility,
            });
            let Some(victim) = self.removal_candidate() else {
                self.no_candidate();
                break;
            };
            self.double_period(victim);
            let res = self
                .doubled
                .insert(&mut self.store, victim, OrderPolicy::Priority);
            self.check(res);

            let after = self.recompute_utilizations();
            self.report(Event::UtilizationChanged {
                from: utility,
                to: after,
            });
            utility = after;
        }
        self.schedule_edf();
    }

    /// ADAP-05: double periods while the ready head cannot wait out the
    /// running task.
    pub(super) fn schedule_adaptive_laxity(&mut self, now: u32) {
        loop {
            let head = self.ready.first();
            if head.is_none() {
                break;
            }
            let head_laxity = self.store.get(head).laxity;
            let running_left = if self.running.is_none() {
                0
            } else {
                self.store.get(self.running).time_left
            };
            if head_laxity >= running_left {
                break;
            }
            self.report(Event::OverloadLaxity {
                task: head,
                laxity: head_laxity,
                time_left: running_left,
            });
            let Some(victim) = self.removal_candidate() else {
                self.no_candidate();
                break;
            };
            self.double_period(victim);
            let res = self
                .doubled
                .insert(&mut self.store, victim, OrderPolicy::Priority);
            self.check(res);
            self.recompute_laxities(now);
        }
        self.schedule_edf();
    }

    /// ADAP-06: react to both utilization and laxity pressure, with a
    /// retry cap so a hopeless tick cannot loop forever.
    pub(super) fn schedule_adaptive_monitored(&mut self, now: u32) {
        let mut utility = self.recompute_utilizations();
        let mut attempts = 0;
        loop {
            let head = self.ready.first();
            let running_left = if self.running.is_none() {
                0
            } else {
                self.store.get(self.running).time_left
            };
            let laxity_pressure = !head.is_none() && self.store.get(head).laxity < running_left;
            let overloaded = utility > MAX_UTILIZATION || laxity_pressure;
            if !overloaded || attempts >= MONITORED_RETRY_CAP {
                break;
            }
            if utility > MAX_UTILIZATION {
                self.report(Event::OverloadUtilization {
                    utilization: utility,
                });
            } else {
                self.report(Event::OverloadLaxity {
                    task: head,
                    laxity: self.store.get(head).laxity,
                    time_left: running_left,
                });
            }
            let Some(victim) = self.removal_candidate() else {
                self.no_candidate();
                break;
            };
            self.double_period(victim);
            let res = self
                .doubled
                .insert(&mut self.store, victim, OrderPolicy::Priority);
            self.check(res);

            let after = self.recompute_utilizations();
            self.report(Event::UtilizationChanged {
                from: utility,
                to: after,
            });
            utility = after;
            self.recompute_laxities(now);
            attempts += 1;
        }
        if attempts >= MONITORED_RETRY_CAP {
            self.report(Event::GivingUp {
                algorithm: self.algorithm,
                iterations: attempts,
            });
        }
        self.schedule_edf();
    }

    /// ADAP-07: utilization-driven doubling in enhanced-priority order,
    /// spreading the doubling across tasks before doubling anyone twice.
    pub(super) fn schedule_adaptive_enhanced(&mut self) {
        let mut utility = self.recompute_utilizations();
        let mut attempts = 0;
        while utility > MAX_UTILIZATION && attempts < ENHANCED_RETRY_CAP {
            self.report(Event::OverloadUtilization {
                utilization: utility,
            });
            let Some(victim) = self.enhanced_candidate() else {
                self.no_candidate();
                break;
            };
            // an already doubled candidate moves within the queue
            if self.doubled.contains(&self.store, victim) {
                let res = self.doubled.remove(&mut self.store, victim);
                self.check(res);
            }
            self.double_period(victim);
            self.store.get_mut(victim).refresh_enhanced_priority();
            let res = self
                .doubled
                .insert(&mut self.store, victim, OrderPolicy::EnhancedPriority);
            self.check(res);

            let after = self.recompute_utilizations();
            self.report(Event::UtilizationChanged {
                from: utility,
                to: after,
            });
            utility = after;
            attempts += 1;
        }
        if attempts >= ENHANCED_RETRY_CAP {
            self.report(Event::GivingUp {
                algorithm: self.algorithm,
                iterations: attempts,
            });
        }
        self.schedule_edf();
    }

    /// Double a flexible task's period. An active release also gets its
    /// deadline pushed out by the widened period.
    pub(super) fn double_period(&mut self, id: TaskId) {
        if !self.store.get(id).params.period_flexible {
            return;
        }
        let (multiplier, state) = {
            let task = self.store.get_mut(id);
            task.per_doubles += 1;
            task.period_multiplier += 1;
            (task.period_multiplier, task.state)
        };
        self.stats.period_doubles += 1;
        self.report(Event::PeriodDoubled {
            task: id,
            multiplier,
        });
        if matches!(
            state,
            TaskState::Ready | TaskState::Running | TaskState::Preempted
        ) {
            let (from, to) = {
                let task = self.store.get_mut(id);
                let from = task.abs_deadline;
                task.abs_deadline += task.rel_deadline * multiplier as u32;
                (from, task.abs_deadline)
            };
            self.report(Event::DeadlineExtended { task: id, from, to });
        }
    }

    pub(super) fn halve_period(&mut self, id: TaskId) {
        let task = self.store.get_mut(id);
        if task.period_multiplier == 0 {
            return;
        }
        task.period_multiplier -= 1;
        let multiplier = task.period_multiplier;
        self.report(Event::PeriodHalved {
            task: id,
            multiplier,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{MemorySink, NullSink, RunStats};
    use std::sync::Arc;

    fn scheduler(algorithm: Algorithm) -> Scheduler {
        Scheduler::new(algorithm, Arc::new(NullSink))
    }

    fn load(sched: &mut Scheduler, slots: &[u8]) {
        for (i, &template) in slots.iter().enumerate() {
            sched.add_task(TaskId(i as u8 + 1), template).unwrap();
        }
    }

    fn run(sched: &mut Scheduler, ticks: u32) {
        sched.tick(0);
        for t in 1..=ticks {
            sched.run_task_cycle(t);
            sched.tick(t);
        }
    }

    // the standard adaptive task set: estimated utilization fits until
    // the late-release tasks arrive at t=13..400
    const ADAPTIVE_SET: [u8; 7] = [73, 74, 75, 76, 77, 78, 79];

    #[test]
    fn test_removal_sheds_lowest_priority_flexible() {
        let sink = Arc::new(MemorySink::new());
        let mut sched = Scheduler::new(Algorithm::Adaptive1, sink.clone());
        load(&mut sched, &ADAPTIVE_SET);
        run(&mut sched, 1000);

        assert!(sched.stats().removals >= 1);
        // every removal reported a utilization drop
        let mut last_removed = TaskId::NONE;
        for event in sink.events() {
            match event {
                Event::Removing { task } => last_removed = task,
                Event::UtilizationChanged { from, to } if !last_removed.is_none() => {
                    assert!(to < from, "removal did not reduce utilization");
                    last_removed = TaskId::NONE;
                }
                _ => {}
            }
        }
        // removed victims must be flexible
        for id in sched.store().slots() {
            let task = sched.store().get(id);
            if task.state == TaskState::Removed {
                assert!(task.params.period_flexible);
            }
        }
    }

    #[test]
    fn test_adaptive1_never_restores() {
        let sink = Arc::new(MemorySink::new());
        let mut sched = Scheduler::new(Algorithm::Adaptive1, sink.clone());
        load(&mut sched, &ADAPTIVE_SET);
        run(&mut sched, 1000);
        assert!(sched.stats().removals >= 1);
        assert!(!sink
            .events()
            .iter()
            .any(|e| matches!(e, Event::Restoring { .. })));
    }

    #[test]
    fn test_adaptive2_restores_after_overshoot() {
        let sink = Arc::new(MemorySink::new());
        let mut sched = Scheduler::new(Algorithm::Adaptive2, sink.clone());
        // 73/74/75 are flexible (200/200/272 permille, priorities 6/5/4),
        // 90 is a rigid 400 and 62 a rigid 400 arriving at t=400. The
        // first overload sheds 73; the arrival then forces 74 and 75
        // out, and shedding 75 leaves exactly enough spare to take 74
        // straight back.
        load(&mut sched, &[73, 74, 75, 90, 62]);
        run(&mut sched, 450);

        let events = sink.events();
        let removed: Vec<TaskId> = events
            .iter()
            .filter_map(|e| match e {
                Event::Removing { task } => Some(*task),
                _ => None,
            })
            .collect();
        assert_eq!(removed, vec![TaskId(1), TaskId(2), TaskId(3)]);
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::Restoring { task } if *task == TaskId(2))));
        assert_ne!(sched.store().get(TaskId(2)).state, TaskState::Removed);
        assert_eq!(sched.store().get(TaskId(1)).state, TaskState::Removed);
    }

    #[test]
    fn test_adaptive3_doubles_instead_of_removing() {
        let mut sched = scheduler(Algorithm::Adaptive3);
        load(&mut sched, &ADAPTIVE_SET);
        run(&mut sched, 1000);
        assert!(sched.stats().period_doubles >= 1);
        assert_eq!(sched.stats().removals, 0);
        // someone actually carries a multiplier or was halved back; the
        // aggregate counter proves doubling ran either way
        let doubled_tasks: u32 = sched
            .store()
            .slots()
            .map(|id| sched.store().get(id).per_doubles)
            .sum();
        assert_eq!(doubled_tasks, sched.stats().period_doubles);
    }

    #[test]
    fn test_adaptive4_halves_back() {
        let sink = Arc::new(MemorySink::new());
        let mut sched = Scheduler::new(Algorithm::Adaptive4, sink.clone());
        load(&mut sched, &ADAPTIVE_SET);
        run(&mut sched, 1000);
        assert!(sched.stats().period_doubles >= 1);
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, Event::PeriodHalved { .. })));
    }

    #[test]
    fn test_monitored_cap_limits_attempts_per_tick() {
        let sink = Arc::new(MemorySink::new());
        let mut sched = Scheduler::new(Algorithm::Adaptive6, sink.clone());
        // estimates here are far below reality, so the monitor discovers
        // a large overload as durations are observed
        load(&mut sched, &[82, 83, 84, 85, 86, 87, 88]);
        run(&mut sched, 1000);
        for event in sink.events() {
            if let Event::GivingUp { iterations, .. } = event {
                assert_eq!(iterations, MONITORED_RETRY_CAP);
            }
        }
    }

    #[test]
    fn test_enhanced_spreads_doubling() {
        let mut sched = scheduler(Algorithm::Adaptive7);
        load(&mut sched, &[82, 83, 84, 85, 86, 87, 88]);
        run(&mut sched, 1000);
        // slots 1..=4 are flexible and active from t=0, so the enhanced
        // order never doubles one of them twice while another of them is
        // still undoubled
        let multipliers: Vec<u8> = (1..=4)
            .map(|slot| sched.store().get(TaskId(slot)).period_multiplier)
            .collect();
        if multipliers.iter().any(|&m| m >= 2) {
            assert!(
                multipliers.iter().all(|&m| m >= 1),
                "doubling concentrated: {:?}",
                multipliers
            );
        }
        let doubles: u32 = sched
            .store()
            .slots()
            .map(|id| sched.store().get(id).per_doubles)
            .sum();
        assert_eq!(doubles, sched.stats().period_doubles);
    }

    #[test]
    fn test_double_period_extends_active_deadline() {
        let mut sched = scheduler(Algorithm::Adaptive3);
        load(&mut sched, &[73]);
        sched.tick(0); // release and dispatch
        let before = sched.store().get(TaskId(1)).abs_deadline;
        sched.double_period(TaskId(1));
        let task = sched.store().get(TaskId(1));
        assert_eq!(task.period_multiplier, 1);
        assert_eq!(task.abs_deadline, before + task.rel_deadline);
        assert_eq!(task.effective_period(), task.rel_deadline * 2);
    }

    #[test]
    fn test_double_period_ignores_rigid_tasks() {
        let mut sched = scheduler(Algorithm::Adaptive3);
        load(&mut sched, &[77]); // not flexible
        sched.tick(0);
        sched.double_period(TaskId(1));
        assert_eq!(sched.store().get(TaskId(1)).period_multiplier, 0);
        assert_eq!(sched.stats().period_doubles, 0);
    }

    #[test]
    fn test_no_candidate_breaks_loop() {
        let sink = Arc::new(MemorySink::new());
        let mut sched = Scheduler::new(Algorithm::Adaptive1, sink.clone());
        // heavy overload with no flexible task at all
        load(&mut sched, &[32, 33, 34]);
        run(&mut sched, 100);
        assert_eq!(sched.stats().removals, 0);
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, Event::EngineError(EngineError::NoCandidate { .. }))));
    }

    #[test]
    fn test_utilization_monitor_discovers_real_load() {
        let mut sched = scheduler(Algorithm::Adaptive6);
        // template 83 claims 100 permille but really needs 200
        load(&mut sched, &[83]);
        run(&mut sched, 300);
        let task = sched.store().get(TaskId(1));
        assert_eq!(task.task_util, 200);
    }

    #[test]
    fn test_stats_start_clean() {
        let sched = scheduler(Algorithm::Adaptive1);
        assert_eq!(*sched.stats(), RunStats::default());
    }

    // Hand-build a state where the earliest-deadline ready head and the
    // minimum-laxity task disagree: slot 1 running with 5 ticks left,
    // slot 2 the ready head with plenty of slack, slot 3 behind it with
    // almost none.
    fn split_heads(algorithm: Algorithm) -> Scheduler {
        let mut sched = scheduler(algorithm);
        load(&mut sched, &[73, 74, 75]);

        {
            let t = sched.store.get_mut(TaskId(1));
            t.state = TaskState::Running;
            t.time_left = 5;
        }
        sched.running = TaskId(1);
        {
            let t = sched.store.get_mut(TaskId(2));
            t.state = TaskState::Ready;
            t.abs_deadline = 20;
            t.time_left = 10;
            t.laxity = 10;
        }
        {
            let t = sched.store.get_mut(TaskId(3));
            t.state = TaskState::Ready;
            t.abs_deadline = 30;
            t.time_left = 29;
            t.laxity = 1;
        }
        for slot in [TaskId(2), TaskId(3)] {
            sched
                .ready
                .insert(&mut sched.store, slot, OrderPolicy::Deadline)
                .unwrap();
            sched
                .laxity_queue
                .insert(&mut sched.store, slot, OrderPolicy::Laxity)
                .unwrap();
        }
        assert_eq!(sched.ready.first(), TaskId(2));
        assert_eq!(sched.laxity_queue.first(), TaskId(3));
        sched
    }

    #[test]
    fn test_laxity_pressure_reads_ready_head() {
        // ready-head laxity (10) covers the running remainder (5), so no
        // overload exists even though a deeper ready task is tight
        let mut sched = split_heads(Algorithm::Adaptive5);
        sched.schedule_adaptive_laxity(0);
        assert_eq!(sched.stats().period_doubles, 0);
    }

    #[test]
    fn test_monitored_pressure_reads_ready_head() {
        let mut sched = split_heads(Algorithm::Adaptive6);
        // set utilization 672 permille, so only laxity could trigger
        sched.schedule_adaptive_monitored(0);
        assert_eq!(sched.stats().period_doubles, 0);
    }

    #[test]
    fn test_laxity_pressure_fires_on_tight_ready_head() {
        let mut sched = split_heads(Algorithm::Adaptive5);
        // tighten the ready head below the running remainder
        let t = sched.store.get_mut(TaskId(2));
        t.time_left = 19;
        t.laxity = 1;

        sched.schedule_adaptive_laxity(0);
        // first doubling takes slot 1 (priority 6) and leaves the head
        // tight; the second takes the head itself, pushing its deadline
        // out far enough to clear the pressure
        assert_eq!(sched.stats().period_doubles, 2);
        assert_eq!(sched.store.get(TaskId(1)).per_doubles, 1);
        assert_eq!(sched.store.get(TaskId(2)).per_doubles, 1);
    }
}
