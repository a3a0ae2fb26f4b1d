//! Intrusive task queues.
//!
//! Queues never allocate: they thread doubly-linked prev/next pairs
//! through the task store itself. Three independent link sets exist, so a
//! task can sit in one primary state queue, the doubled-period queue and
//! the laxity tracking queue at the same time without interference.

use crate::task::{TaskId, TaskStore};

/// Which of a task's three link pairs a queue threads through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSet {
    /// State queues: ready, idle, waiting, skipped, removed.
    Primary = 0,
    /// Period-doubled / removed-for-restoration bookkeeping.
    Doubled = 1,
    /// Laxity tracking for the laxity-driven adaptive policies.
    Laxity = 2,
}

/// Insertion ordering for [`TaskQueue::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderPolicy {
    /// Ascending static priority; ties go before existing entries.
    Priority,
    /// Ascending absolute deadline; ties keep arrival order.
    Deadline,
    /// Ascending laxity.
    Laxity,
    /// Descending MUF urgency.
    Urgency,
    /// Ascending remaining execution time; ties keep arrival order.
    ShortestTimeLeft,
    /// Ascending enhanced priority (doubling candidates first).
    EnhancedPriority,
    /// No defined order; insert at head.
    Unordered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("task {0:?} is already linked in this queue")]
    AlreadyLinked(TaskId),
    #[error("task {0:?} is not linked in this queue")]
    NotLinked(TaskId),
}

/// An intrusive queue head over one link set of a [`TaskStore`].
#[derive(Debug)]
pub struct TaskQueue {
    set: LinkSet,
    head: TaskId,
}

impl TaskQueue {
    pub fn new(set: LinkSet) -> Self {
        Self {
            set,
            head: TaskId::NONE,
        }
    }

    fn idx(&self) -> usize {
        self.set as usize
    }

    pub fn first(&self) -> TaskId {
        self.head
    }

    pub fn second(&self, store: &TaskStore) -> TaskId {
        if self.head.is_none() {
            TaskId::NONE
        } else {
            store.get(self.head).links[self.idx()].next
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn contains(&self, store: &TaskStore, id: TaskId) -> bool {
        self.iter(store).any(|t| t == id)
    }

    pub fn iter<'a>(&self, store: &'a TaskStore) -> QueueIter<'a> {
        QueueIter {
            store,
            set: self.idx(),
            cursor: self.head,
        }
    }

    /// Drop all links and empty the queue.
    pub fn clear(&mut self, store: &mut TaskStore) {
        let set = self.idx();
        let mut cursor = self.head;
        while !cursor.is_none() {
            let next = store.get(cursor).links[set].next;
            store.get_mut(cursor).links[set] = Default::default();
            cursor = next;
        }
        self.head = TaskId::NONE;
    }

    /// Insert `id` at its ordered position. The laxity link set rejects a
    /// task that is already linked; state transitions on the other sets
    /// always extract before reinsertion.
    pub fn insert(
        &mut self,
        store: &mut TaskStore,
        id: TaskId,
        order: OrderPolicy,
    ) -> Result<(), QueueError> {
        if self.set == LinkSet::Laxity && self.contains(store, id) {
            return Err(QueueError::AlreadyLinked(id));
        }

        let set = self.idx();
        let mut prev = TaskId::NONE;
        let mut cursor = self.head;
        while !cursor.is_none() && keeps_walking(store, id, cursor, order) {
            prev = cursor;
            cursor = store.get(cursor).links[set].next;
        }

        store.get_mut(id).links[set].prev = prev;
        store.get_mut(id).links[set].next = cursor;
        if prev.is_none() {
            self.head = id;
        } else {
            store.get_mut(prev).links[set].next = id;
        }
        if !cursor.is_none() {
            store.get_mut(cursor).links[set].prev = id;
        }
        Ok(())
    }

    /// Unlink and return the head, or `TaskId::NONE` when empty.
    pub fn extract_first(&mut self, store: &mut TaskStore) -> TaskId {
        let id = self.head;
        if id.is_none() {
            return TaskId::NONE;
        }
        let set = self.idx();
        let next = store.get(id).links[set].next;
        self.head = next;
        if !next.is_none() {
            store.get_mut(next).links[set].prev = TaskId::NONE;
        }
        store.get_mut(id).links[set] = Default::default();
        id
    }

    /// Unlink `id` from anywhere in the queue.
    pub fn remove(&mut self, store: &mut TaskStore, id: TaskId) -> Result<(), QueueError> {
        if !self.contains(store, id) {
            return Err(QueueError::NotLinked(id));
        }
        let set = self.idx();
        let link = store.get(id).links[set];
        if link.prev.is_none() {
            self.head = link.next;
        } else {
            store.get_mut(link.prev).links[set].next = link.next;
        }
        if !link.next.is_none() {
            store.get_mut(link.next).links[set].prev = link.prev;
        }
        store.get_mut(id).links[set] = Default::default();
        Ok(())
    }
}

/// Whether the walk continues past `cursor` when placing `id`.
fn keeps_walking(store: &TaskStore, id: TaskId, cursor: TaskId, order: OrderPolicy) -> bool {
    let task = store.get(id);
    let next = store.get(cursor);
    match order {
        OrderPolicy::Priority => task.priority > next.priority,
        OrderPolicy::Deadline => task.abs_deadline >= next.abs_deadline,
        OrderPolicy::Laxity => task.laxity > next.laxity,
        OrderPolicy::Urgency => task.urgency < next.urgency,
        OrderPolicy::ShortestTimeLeft => task.time_left >= next.time_left,
        OrderPolicy::EnhancedPriority => task.enhanced_priority > next.enhanced_priority,
        OrderPolicy::Unordered => false,
    }
}

pub struct QueueIter<'a> {
    store: &'a TaskStore,
    set: usize,
    cursor: TaskId,
}

impl Iterator for QueueIter<'_> {
    type Item = TaskId;

    fn next(&mut self) -> Option<TaskId> {
        if self.cursor.is_none() {
            return None;
        }
        let id = self.cursor;
        self.cursor = self.store.get(id).links[self.set].next;
        Some(id)
    }
}
