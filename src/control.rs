//! Control contexts (spec.md §4.4): the windows through which a [`crate::UserState`]
//! callback observes and steers the machine. Each is a thin, scope-limited
//! view over the same underlying data — never a wrapper over the previous
//! one — so a call site can hand out exactly the capability the callback
//! being invoked is allowed to have.

use crate::descriptor::MachineDescriptor;
use crate::ids::{RegionId, StateId};
use crate::plan::{PlanData, PlanError, TaskCursor, TaskId, TaskView};
use crate::registry::StateRegistry;
use crate::state_data::StateData;

/// A transition request queued by [`FullControl`], drained at the end of the
/// tick by `processTransitions` (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    ChangeTo,
    Restart,
    Resume,
    Utilize,
    Randomize,
    Schedule,
}

#[derive(Debug, Clone, Copy)]
pub struct Request {
    pub kind: RequestKind,
    pub target: StateId,
    /// The state whose callback enqueued this request, for
    /// `Logger::record_transition` (spec.md §6). Requests issued directly
    /// through `Machine`'s own public methods rather than from within a
    /// callback have no such state, so `origin == target` in that case —
    /// a self-request, not a loop.
    pub origin: StateId,
}

/// `true` if `target` lies outside `current`'s own subtree — a request that
/// reaches past the currently-executing branch rather than refining it
/// (spec.md §4.3). Cheap thanks to pre-order-contiguous subtree ranges.
pub fn is_outer_request(descriptor: &MachineDescriptor, current: StateId, target: StateId) -> bool {
    let end = descriptor.state(current).subtree_end;
    !(target >= current && target < end)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskResult {
    Success,
    Failure,
}

/// The outcome of one `update`/`react` dispatch: an optional task result
/// (consumed by plan advancement) plus whether the call produced an outer
/// transition request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Status {
    pub result: Option<TaskResult>,
    pub outer_transition: bool,
}

impl Status {
    pub const NONE: Status = Status {
        result: None,
        outer_transition: false,
    };

    pub fn success() -> Self {
        Status {
            result: Some(TaskResult::Success),
            outer_transition: false,
        }
    }

    pub fn failure() -> Self {
        Status {
            result: Some(TaskResult::Failure),
            outer_transition: false,
        }
    }

    pub fn with_outer_transition(mut self, outer: bool) -> Self {
        self.outer_transition |= outer;
        self
    }

    /// Combines two orthogonal siblings' statuses (spec.md §4.2): failure is
    /// dominant, success requires both, an outer transition on either side
    /// propagates up.
    pub fn combine_orthogonal(self, other: Status) -> Status {
        let result = match (self.result, other.result) {
            (Some(TaskResult::Failure), _) | (_, Some(TaskResult::Failure)) => Some(TaskResult::Failure),
            (Some(TaskResult::Success), Some(TaskResult::Success)) => Some(TaskResult::Success),
            _ => None,
        };
        Status {
            result,
            outer_transition: self.outer_transition || other.outer_transition,
        }
    }
}

/// Read-only query surface shared by every control context: activity and
/// plan-membership questions, with no ability to mutate anything.
pub struct Control<'a> {
    pub(crate) descriptor: &'a MachineDescriptor,
    pub(crate) registry: &'a StateRegistry,
    pub(crate) plan: &'a PlanData,
    pub(crate) state_data: &'a StateData,
}

impl<'a> Control<'a> {
    pub fn is_active(&self, state: StateId) -> bool {
        self.registry.is_active(self.descriptor, state)
    }

    pub fn is_resumable(&self, state: StateId) -> bool {
        self.registry.is_resumable(self.descriptor, state)
    }

    pub fn is_scheduled(&self, state: StateId) -> bool {
        self.registry.is_scheduled(self.descriptor, state)
    }

    pub fn is_pending_change(&self, state: StateId) -> bool {
        self.registry.is_pending_change(self.descriptor, state)
    }

    pub fn is_pending_enter(&self, state: StateId) -> bool {
        self.registry.is_pending_enter(self.descriptor, state)
    }

    pub fn is_pending_exit(&self, state: StateId) -> bool {
        self.registry.is_pending_exit(self.descriptor, state)
    }

    pub fn plan_exists(&self, region: RegionId) -> bool {
        self.plan.plan_exists(region)
    }

    pub fn state_data(&self) -> &StateData {
        self.state_data
    }
}

/// Adds mutable access to the current region's plan (spec.md §4.2): a state
/// building out a task sequence for its own region does so here.
pub struct PlanControl<'a> {
    pub(crate) descriptor: &'a MachineDescriptor,
    pub(crate) registry: &'a StateRegistry,
    pub(crate) plan: &'a mut PlanData,
    pub(crate) state_data: &'a StateData,
    pub(crate) region: RegionId,
}

impl<'a> PlanControl<'a> {
    pub fn as_control(&self) -> Control<'_> {
        Control {
            descriptor: self.descriptor,
            registry: self.registry,
            plan: self.plan,
            state_data: self.state_data,
        }
    }

    pub fn region(&self) -> RegionId {
        self.region
    }

    pub fn plan_exists(&self) -> bool {
        self.plan.plan_exists(self.region)
    }

    pub fn add_task(&mut self, origin: StateId, destination: StateId) -> Result<TaskId, PlanError> {
        self.plan.append(self.region, origin, destination)
    }

    pub fn first_task(&self) -> Option<TaskId> {
        self.plan.first(self.region)
    }

    pub fn task(&self, id: TaskId) -> TaskView {
        self.plan.task(id)
    }

    pub fn cursor(&self) -> TaskCursor {
        self.plan.cursor(self.region)
    }

    pub fn remove_task(&mut self, cursor: &mut TaskCursor, id: TaskId) {
        cursor.advance_past(self.plan, id);
        self.plan.remove(id);
    }

    pub fn clear_plan(&mut self) {
        self.plan.clear_region(self.descriptor, self.region);
    }
}

/// Adds transition requests and self-reported task outcomes (spec.md
/// §4.4.1): the context handed to `update`/`react`. `lock` mirrors the
/// source's re-entrancy guard — while `true`, further requests from nested
/// callbacks in the same dispatch are rejected rather than queued.
pub struct FullControl<'a> {
    pub(crate) descriptor: &'a MachineDescriptor,
    pub(crate) registry: &'a StateRegistry,
    pub(crate) plan: &'a mut PlanData,
    pub(crate) state_data: &'a StateData,
    pub(crate) requests: &'a mut Vec<Request>,
    pub(crate) lock: &'a mut bool,
    pub(crate) current: StateId,
    pub(crate) region: Option<RegionId>,
}

impl<'a> FullControl<'a> {
    pub fn as_control(&self) -> Control<'_> {
        Control {
            descriptor: self.descriptor,
            registry: self.registry,
            plan: self.plan,
            state_data: self.state_data,
        }
    }

    pub fn plan_control(&mut self) -> Option<PlanControl<'_>> {
        self.region.map(|region| PlanControl {
            descriptor: self.descriptor,
            registry: self.registry,
            plan: self.plan,
            state_data: self.state_data,
            region,
        })
    }

    pub fn is_locked(&self) -> bool {
        *self.lock
    }

    fn enqueue(&mut self, kind: RequestKind, target: StateId) {
        if *self.lock {
            return;
        }
        self.requests.push(Request {
            kind,
            target,
            origin: self.current,
        });
    }

    pub fn change_to(&mut self, target: StateId) {
        self.enqueue(RequestKind::ChangeTo, target);
    }

    pub fn restart(&mut self, target: StateId) {
        self.enqueue(RequestKind::Restart, target);
    }

    pub fn resume(&mut self, target: StateId) {
        self.enqueue(RequestKind::Resume, target);
    }

    pub fn utilize(&mut self, target: StateId) {
        self.enqueue(RequestKind::Utilize, target);
    }

    pub fn randomize(&mut self, target: StateId) {
        self.enqueue(RequestKind::Randomize, target);
    }

    pub fn schedule(&mut self, target: StateId) {
        self.enqueue(RequestKind::Schedule, target);
    }

    /// Reports this dispatch's own state as having succeeded its plan task,
    /// if one exists. Returns the [`Status`] the caller should propagate.
    pub fn succeed(&mut self) -> Status {
        self.plan.set_succeeded(self.current);
        Status::success()
    }

    pub fn fail(&mut self) -> Status {
        self.plan.set_failed(self.current);
        Status::failure()
    }

    /// Whether a request queued so far this dispatch targets outside the
    /// current state's own subtree.
    pub fn has_outer_request(&self) -> bool {
        self.requests
            .iter()
            .any(|r| is_outer_request(self.descriptor, self.current, r.target))
    }
}

/// Adds the ability to veto the transition currently being evaluated
/// (spec.md §4.4.1): the context handed to entry/exit guards.
pub struct GuardControl<'a> {
    pub(crate) descriptor: &'a MachineDescriptor,
    pub(crate) registry: &'a StateRegistry,
    pub(crate) plan: &'a PlanData,
    pub(crate) state_data: &'a StateData,
    pub(crate) current: StateId,
    /// `Some(origin)` once a guard in this pass has cancelled, recording
    /// which state's guard did it — `Logger::record_cancelled_pending`
    /// (spec.md §6) reports that origin, not just "some cancellation
    /// happened".
    pub(crate) cancelled: &'a mut Option<StateId>,
}

impl<'a> GuardControl<'a> {
    pub fn as_control(&self) -> Control<'_> {
        Control {
            descriptor: self.descriptor,
            registry: self.registry,
            plan: self.plan,
            state_data: self.state_data,
        }
    }

    pub fn cancel_pending_transitions(&mut self) {
        if self.cancelled.is_none() {
            *self.cancelled = Some(self.current);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outer_request_detection_uses_subtree_range() {
        let descriptor = crate::descriptor::DescriptorBuilder::new()
            .build(crate::descriptor::Node::composite(
                crate::strategy::Strategy::Composite,
                vec![
                    crate::descriptor::Node::composite(crate::strategy::Strategy::Composite, vec![
                        crate::descriptor::Node::Leaf,
                        crate::descriptor::Node::Leaf,
                    ]),
                    crate::descriptor::Node::Leaf,
                ],
            ))
            .unwrap();
        // states: 0 root, 1 compo head, 2/3 its leaves, 4 sibling leaf.
        assert!(!is_outer_request(&descriptor, 1, 2)); // into own subtree
        assert!(is_outer_request(&descriptor, 2, 4)); // to an unrelated sibling
    }

    #[test]
    fn orthogonal_status_combination_prefers_failure() {
        let ok = Status::success();
        let fail = Status::failure();
        assert_eq!(ok.combine_orthogonal(fail).result, Some(TaskResult::Failure));
        assert_eq!(ok.combine_orthogonal(ok).result, Some(TaskResult::Success));
        assert_eq!(ok.combine_orthogonal(Status::NONE).result, None);
    }
}
