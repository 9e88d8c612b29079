//! Per-region task plans (spec.md §4.2): an intrusive, doubly-linked
//! free-list pool of `(origin, destination)` task pairs, plus per-state
//! success/failure bit arrays that the root driver consults to advance a
//! plan as its tasks complete.

use crate::bits::BitArray;
use crate::descriptor::MachineDescriptor;
use crate::ids::{RegionId, StateId};

pub type TaskId = usize;

#[derive(Debug, Clone, Copy)]
struct Task {
    region: RegionId,
    origin: StateId,
    destination: StateId,
    prev: Option<TaskId>,
    next: Option<TaskId>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("task pool exhausted (capacity {0})")]
    PoolExhausted(usize),
}

/// A task's read-only view, returned by [`PlanData::task`].
#[derive(Debug, Clone, Copy)]
pub struct TaskView {
    pub origin: StateId,
    pub destination: StateId,
}

#[derive(Debug, Clone)]
pub struct PlanData {
    pool: Vec<Task>,
    free_head: Option<TaskId>,
    region_head: Vec<Option<TaskId>>,
    region_tail: Vec<Option<TaskId>>,
    plan_exists: Vec<bool>,
    task_succeeded: BitArray,
    task_failed: BitArray,
}

impl PlanData {
    pub fn new(descriptor: &MachineDescriptor) -> Self {
        let capacity = descriptor.task_capacity;
        let mut pool = Vec::with_capacity(capacity);
        for i in 0..capacity {
            pool.push(Task {
                region: 0,
                origin: 0,
                destination: 0,
                prev: None,
                next: if i + 1 < capacity { Some(i + 1) } else { None },
            });
        }
        Self {
            pool,
            free_head: if capacity > 0 { Some(0) } else { None },
            region_head: vec![None; descriptor.region_count()],
            region_tail: vec![None; descriptor.region_count()],
            plan_exists: vec![false; descriptor.region_count()],
            task_succeeded: BitArray::with_len(descriptor.state_count()),
            task_failed: BitArray::with_len(descriptor.state_count()),
        }
    }

    pub fn plan_exists(&self, region: RegionId) -> bool {
        self.plan_exists[region]
    }

    /// Appends a task to the back of `region`'s list. Marks the region as
    /// having a plan even if this is its first task.
    pub fn append(&mut self, region: RegionId, origin: StateId, destination: StateId) -> Result<TaskId, PlanError> {
        let id = self.free_head.ok_or(PlanError::PoolExhausted(self.pool.len()))?;
        self.free_head = self.pool[id].next;

        self.pool[id] = Task {
            region,
            origin,
            destination,
            prev: self.region_tail[region],
            next: None,
        };

        match self.region_tail[region] {
            Some(tail) => self.pool[tail].next = Some(id),
            None => self.region_head[region] = Some(id),
        }
        self.region_tail[region] = Some(id);
        self.plan_exists[region] = true;
        Ok(id)
    }

    pub fn first(&self, region: RegionId) -> Option<TaskId> {
        self.region_head[region]
    }

    pub fn task(&self, id: TaskId) -> TaskView {
        let t = &self.pool[id];
        TaskView {
            origin: t.origin,
            destination: t.destination,
        }
    }

    /// Unlinks `id` from its region's list and returns it to the free pool.
    /// Returns the task that followed it, so callers advancing a cursor
    /// don't lose their place.
    pub fn remove(&mut self, id: TaskId) -> Option<TaskId> {
        let (region, prev, next) = {
            let t = &self.pool[id];
            (t.region, t.prev, t.next)
        };
        match prev {
            Some(p) => self.pool[p].next = next,
            None => self.region_head[region] = next,
        }
        match next {
            Some(n) => self.pool[n].prev = prev,
            None => self.region_tail[region] = prev,
        }
        if self.region_head[region].is_none() {
            self.plan_exists[region] = false;
        }

        self.pool[id].next = self.free_head;
        self.pool[id].prev = None;
        self.free_head = Some(id);
        next
    }

    /// Drops every task belonging to `region` and clears its success/failure
    /// bits for every state in the region's subtree (spec.md §4.2, plans are
    /// scoped to the region and torn down when it is exited).
    pub fn clear_region(&mut self, descriptor: &MachineDescriptor, region: RegionId) {
        let mut cur = self.region_head[region];
        while let Some(id) = cur {
            cur = self.remove(id);
        }
        let (start, len) = descriptor.region_span(region);
        for state in start..start + len {
            self.task_succeeded.clear_bit(state);
            self.task_failed.clear_bit(state);
        }
    }

    pub fn set_succeeded(&mut self, state: StateId) {
        self.task_succeeded.set(state);
        self.task_failed.clear_bit(state);
    }

    pub fn set_failed(&mut self, state: StateId) {
        self.task_failed.set(state);
        self.task_succeeded.clear_bit(state);
    }

    pub fn clear_status(&mut self, state: StateId) {
        self.task_succeeded.clear_bit(state);
        self.task_failed.clear_bit(state);
    }

    pub fn has_succeeded(&self, state: StateId) -> bool {
        self.task_succeeded.get(state)
    }

    pub fn has_failed(&self, state: StateId) -> bool {
        self.task_failed.get(state)
    }

    /// A forward-only cursor over one region's task list, safe to advance
    /// across a `remove()` of the task it currently points at (spec.md §8,
    /// "iterator remove-current-continue").
    pub fn cursor(&self, region: RegionId) -> TaskCursor {
        TaskCursor {
            current: self.region_head[region],
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TaskCursor {
    current: Option<TaskId>,
}

impl TaskCursor {
    pub fn peek(&self) -> Option<TaskId> {
        self.current
    }

    /// Advances to the task that currently follows `id` in the plan,
    /// captured *before* `id` is (optionally) removed by the caller.
    pub fn advance_past(&mut self, plan: &PlanData, id: TaskId) {
        self.current = plan.pool[id].next;
    }
}
