//! Task records and the fixed-slot task store.
//!
//! The engine works over a small fixed arena of task slots. Slot 0 is a
//! permanent sentinel whose computed fields stay zeroed; queue links use
//! [`TaskId::NONE`] (slot 0) as their null value, so queue walks never
//! need a separate null check against the arena.

use crate::calc::{EnhancedPriority, Urgency};
use crate::catalog::TaskTemplate;

/// Number of usable task slots. Valid ids are `1..=NUM_SLOTS`.
pub const NUM_SLOTS: usize = 7;

const STORE_LEN: usize = NUM_SLOTS + 1;

/// Index into the task store. `TaskId::NONE` doubles as the queue link
/// sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TaskId(pub u8);

impl TaskId {
    pub const NONE: TaskId = TaskId(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TaskState {
    /// Finished a non-periodic run, or slot never released.
    #[default]
    Sleeping,
    /// Release time not reached yet.
    Waiting,
    /// Shed by an adaptive policy, not competing for the CPU.
    Removed,
    /// Between completion and next period release.
    Idle,
    /// Release skipped by a skip-over policy.
    Skipped,
    /// Dispatched earlier, displaced before completion.
    Preempted,
    /// Released and competing for the CPU.
    Ready,
    /// Currently holding the CPU.
    Running,
}

impl TaskState {
    /// States that compete for or hold processor time. Used by laxity and
    /// urgency recomputation.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            TaskState::Ready | TaskState::Running | TaskState::Skipped | TaskState::Preempted
        )
    }

    /// States that count toward task-set utilization.
    pub fn is_loaded(self) -> bool {
        matches!(
            self,
            TaskState::Ready
                | TaskState::Running
                | TaskState::Skipped
                | TaskState::Idle
                | TaskState::Preempted
        )
    }
}

/// Policy-specific per-task parameters. The MUF flag, the flexible-period
/// flag for the adaptive policies and the skip gap for skip-over policies
/// are independent knobs; a template sets whichever its test cases use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicyParams {
    /// MUF critical set membership.
    pub muf_critical: bool,
    /// Eligible for period doubling and removal.
    pub period_flexible: bool,
    /// Minimum releases between skips; 0 means never skippable.
    pub skip_gap: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Link {
    pub prev: TaskId,
    pub next: TaskId,
}

/// One task slot: constant template parameters, per-release computed
/// state, queue links for the three link sets, and run counters that
/// survive until the next soft reset.
#[derive(Debug, Clone, Default)]
pub struct Task {
    // Template parameters, fixed for the run.
    pub template_id: u8,
    pub release: u32,
    pub duration: u32,
    pub rel_deadline: u32,
    pub period: u32,
    pub priority: u8,
    pub preemptable: bool,
    pub params: PolicyParams,

    // Computed per release / per tick.
    pub state: TaskState,
    pub time_left: u32,
    pub time_taken: u32,
    pub abs_deadline: u32,
    pub laxity: u32,
    /// Observed worst-case duration; starts at the template estimate and
    /// only grows when a completion overruns it.
    pub c_duration: u32,
    /// Cached utilization in permille.
    pub task_util: u32,
    pub urgency: Urgency,
    pub enhanced_priority: EnhancedPriority,
    pub period_multiplier: u8,
    /// Releases remaining before the task may be skipped again.
    pub not_skipped: u32,

    pub(crate) links: [Link; 3],

    // Run counters.
    pub preempt_count: u32,
    pub per_doubles: u32,
    pub deadlines_met: u32,
    pub deadlines_missed: u32,
    pub total_skips: u32,
    /// Execution ticks accumulated in the current release.
    pub net_value: u32,
    /// Execution ticks banked by releases that met their deadline.
    pub value: u32,
}

impl Task {
    /// Slot holds a loaded template.
    pub fn is_loaded(&self) -> bool {
        self.template_id != 0
    }

    pub(crate) fn refresh_urgency(&mut self) {
        self.urgency = Urgency::new(self.params.muf_critical, self.laxity, self.priority);
    }

    pub(crate) fn refresh_enhanced_priority(&mut self) {
        self.enhanced_priority = EnhancedPriority::new(self.period_multiplier, self.priority);
    }

    /// Period length with the current doubling multiplier applied.
    pub fn effective_period(&self) -> u32 {
        if self.params.period_flexible {
            self.rel_deadline << self.period_multiplier
        } else {
            self.rel_deadline
        }
    }
}

/// Fixed arena of task slots. Index 0 is the sentinel and is never
/// loaded.
#[derive(Debug)]
pub struct TaskStore {
    tasks: [Task; STORE_LEN],
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    pub fn new() -> Self {
        Self {
            tasks: Default::default(),
        }
    }

    pub fn get(&self, id: TaskId) -> &Task {
        &self.tasks[id.index()]
    }

    pub fn get_mut(&mut self, id: TaskId) -> &mut Task {
        &mut self.tasks[id.index()]
    }

    /// Ids of all usable slots, loaded or not.
    pub fn slots(&self) -> impl Iterator<Item = TaskId> {
        (1..=NUM_SLOTS as u8).map(TaskId)
    }

    /// Seed a slot from a template. Overwrites whatever the slot held.
    pub fn load(&mut self, slot: TaskId, template: &TaskTemplate) {
        let task = self.get_mut(slot);
        *task = Task {
            template_id: template.id,
            release: template.release,
            duration: template.duration,
            rel_deadline: template.rel_deadline,
            period: template.period,
            priority: template.priority,
            preemptable: template.preemptable,
            params: PolicyParams {
                muf_critical: template.muf_critical,
                period_flexible: template.period_flexible,
                skip_gap: template.skip_gap,
            },
            c_duration: template.duration,
            task_util: template.utilization,
            not_skipped: template.skip_gap,
            ..Task::default()
        };
    }

    /// Return a slot to its unloaded state.
    pub fn clear(&mut self, slot: TaskId) {
        *self.get_mut(slot) = Task::default();
    }

    /// Clear every slot and the sentinel's links.
    pub fn reset(&mut self) {
        self.tasks = Default::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    #[test]
    fn test_sentinel_is_none() {
        assert!(TaskId::NONE.is_none());
        assert!(!TaskId(1).is_none());
        assert_eq!(TaskId::default(), TaskId::NONE);
    }

    #[test]
    fn test_state_classes() {
        assert!(TaskState::Running.is_active());
        assert!(TaskState::Skipped.is_active());
        assert!(!TaskState::Idle.is_active());
        assert!(TaskState::Idle.is_loaded());
        assert!(!TaskState::Waiting.is_loaded());
        assert!(!TaskState::Removed.is_loaded());
    }

    #[test]
    fn test_load_seeds_computed_fields() {
        let mut store = TaskStore::new();
        let template = catalog::template(1).unwrap();
        store.load(TaskId(1), template);

        let task = store.get(TaskId(1));
        assert_eq!(task.template_id, 1);
        assert_eq!(task.c_duration, task.duration);
        assert_eq!(task.task_util, 170);
        assert_eq!(task.state, TaskState::Sleeping);
        assert_eq!(task.not_skipped, task.params.skip_gap);
    }

    #[test]
    fn test_clear_unloads_slot() {
        let mut store = TaskStore::new();
        store.load(TaskId(2), catalog::template(5).unwrap());
        assert!(store.get(TaskId(2)).is_loaded());
        store.clear(TaskId(2));
        assert!(!store.get(TaskId(2)).is_loaded());
    }

    #[test]
    fn test_effective_period_doubles_for_flexible() {
        let mut store = TaskStore::new();
        store.load(TaskId(1), catalog::template(73).unwrap());
        let task = store.get_mut(TaskId(1));
        assert!(task.params.period_flexible);
        assert_eq!(task.effective_period(), task.rel_deadline);
        task.period_multiplier = 2;
        assert_eq!(task.effective_period(), task.rel_deadline << 2);
    }
}
