//! The deep tree operations (spec.md §4.3-§4.5): entry, exit, update, react,
//! and transition application, all expressed as free functions walking the
//! [`MachineDescriptor`] tables rather than as methods recursing on `self`.
//!
//! This shape exists for the borrow checker as much as for style: a
//! recursive method call on `&mut self` can't also hand out a fresh mutable
//! borrow of the same `self` to a sibling subtree, but indexing into a
//! `Vec<StateSlot<Dom>>` fresh at each call site — never holding a borrow of
//! one slot across the recursive call into another — composes fine, because
//! each borrow ends (NLL) before the next one is taken.

use crate::control::{FullControl, GuardControl, PlanControl, RequestKind, Status, TaskResult};
use crate::descriptor::{MachineDescriptor, StateKind};
use crate::ids::{Prong, StateId, INVALID_PRONG};
use crate::logger::{Logger, Method, StatusEvent, TransitionKind};
use crate::plan::PlanData;
use crate::random::RandomSource;
use crate::registry::StateRegistry;
use crate::state_data::StateData;
use crate::strategy::{select_random_util, select_utilitarian, Strategy};
use crate::user_state::{Domain, StateSlot};

/// A child's rank as seen by its parent composite's `RandomUtil` selection
/// (spec.md §4.4.2). A plain leaf or composite head reports its own
/// `rank()`; an orthogonal head instead aggregates its children's ranks by
/// sum, since no single child speaks for the whole region.
fn child_rank<Dom: Domain>(descriptor: &MachineDescriptor, states: &[StateSlot<Dom>], context: &Dom::Context, state: StateId) -> i32 {
    match descriptor.state(state).kind {
        StateKind::OrthoHead(region_id) => descriptor
            .region(region_id)
            .children
            .iter()
            .map(|&child| child_rank(descriptor, states, context, child))
            .sum(),
        StateKind::Leaf | StateKind::CompositeHead(_) => states[state].behavior.rank(context),
    }
}

/// A child's utility as seen by its parent composite's `Utilitarian`/
/// `RandomUtil` selection (spec.md §4.4.2). An orthogonal head's children's
/// utilities aggregate by sum, then the sum is divided by the region's width
/// to yield a normalized per-child contribution; a leaf or composite head
/// reports its own `utility()` directly.
fn child_utility<Dom: Domain>(descriptor: &MachineDescriptor, states: &[StateSlot<Dom>], context: &Dom::Context, state: StateId) -> f32 {
    match descriptor.state(state).kind {
        StateKind::OrthoHead(region_id) => {
            let region = descriptor.region(region_id);
            let width = region.children.len().max(1) as f32;
            let sum: f32 = region.children.iter().map(|&child| child_utility(descriptor, states, context, child)).sum();
            sum / width
        }
        StateKind::Leaf | StateKind::CompositeHead(_) => states[state].behavior.utility(context),
    }
}

/// Resolves which prong a composite region selects for a given request kind
/// (spec.md §4.4.1). `ChangeTo` and `Schedule` use the region's own
/// configured default strategy; the other four force one specific policy.
#[allow(clippy::too_many_arguments)]
fn resolve_prong<Dom: Domain>(
    descriptor: &MachineDescriptor,
    registry: &StateRegistry,
    states: &[StateSlot<Dom>],
    context: &Dom::Context,
    rand: &mut dyn RandomSource,
    logger: &mut dyn Logger,
    region_id: crate::ids::RegionId,
    kind: RequestKind,
) -> Prong {
    let region = descriptor.region(region_id);
    let compo_index = region.fork_id.compo_index().expect("resolve_prong on a composite region");
    let default_strategy = region.strategy.expect("composite region always has a strategy");

    let effective = match kind {
        RequestKind::Restart => Strategy::Composite,
        RequestKind::Resume => Strategy::Resumable,
        RequestKind::Utilize => Strategy::Utilitarian,
        RequestKind::Randomize => Strategy::RandomUtil,
        RequestKind::ChangeTo | RequestKind::Schedule => default_strategy,
    };

    match effective {
        Strategy::Composite => 0,
        Strategy::Resumable => {
            let resumable = registry.compo_resumable(compo_index);
            if resumable == INVALID_PRONG {
                0
            } else {
                resumable
            }
        }
        Strategy::Utilitarian => {
            let utilities: Vec<f32> =
                region.children.iter().map(|&child| child_utility(descriptor, states, context, child)).collect();
            let picked = select_utilitarian(&utilities);
            logger.record_utility_resolution(region.head, picked, utilities[picked as usize]);
            picked
        }
        Strategy::RandomUtil => {
            let ranks: Vec<i32> =
                region.children.iter().map(|&child| child_rank(descriptor, states, context, child)).collect();
            let top = ranks.iter().copied().max().unwrap_or(0);
            let entries: Vec<(usize, i32, f32)> = region
                .children
                .iter()
                .enumerate()
                .map(|(i, &child)| {
                    let rank = ranks[i];
                    let utility = if rank == top { child_utility(descriptor, states, context, child) } else { 0.0 };
                    (i, rank, utility)
                })
                .collect();
            let draw = rand.next();
            let (picked, underflowed) = select_random_util(&entries, draw);
            if underflowed {
                tracing::warn!(region = region_id, "RandomUtil selection underflowed; picked last eligible prong");
            }
            logger.record_random_resolution(region.head, picked, draw);
            picked
        }
    }
}

/// Enters `state` and, if it heads a region, recursively enters the prong
/// selected for it — consuming a pending `requested` value set by
/// `StateRegistry::request_immediate` if one is present, or resolving the
/// region's own default strategy otherwise (spec.md §4.3, initial entry and
/// the destination side of a commit are the same walk).
#[allow(clippy::too_many_arguments)]
pub fn enter_subtree<Dom: Domain>(
    descriptor: &MachineDescriptor,
    registry: &mut StateRegistry,
    plan: &mut PlanData,
    state_data: &StateData,
    states: &mut [StateSlot<Dom>],
    context: &mut Dom::Context,
    rand: &mut dyn RandomSource,
    logger: &mut dyn Logger,
    cancelled: &mut Option<StateId>,
    state: StateId,
) {
    logger.record_method(state, Method::EntryGuard);
    {
        let mut gc = GuardControl {
            descriptor,
            registry,
            plan,
            state_data,
            current: state,
            cancelled,
        };
        states[state].behavior.entry_guard(context, &mut gc);
    }
    if cancelled.is_some() {
        return;
    }

    logger.record_method(state, Method::Enter);
    {
        let region = descriptor.enclosing_region(state);
        let mut pc = PlanControl {
            descriptor,
            registry,
            plan,
            state_data,
            region: region.unwrap_or(0),
        };
        states[state].behavior.enter(context, &mut pc);
        for mixin in &mut states[state].mixins {
            mixin.after_enter(context, &mut pc);
        }
    }

    match descriptor.state(state).kind {
        StateKind::Leaf => {}
        StateKind::CompositeHead(region_id) => {
            let compo_index = descriptor.region(region_id).fork_id.compo_index().unwrap();
            let prong = if registry.compo_requested(compo_index) != INVALID_PRONG {
                let p = registry.compo_requested(compo_index);
                registry.clear_compo_requested(compo_index);
                p
            } else {
                resolve_prong(descriptor, registry, states, context, rand, logger, region_id, RequestKind::ChangeTo)
            };
            registry.set_compo_active(compo_index, prong);
            let child = descriptor.region(region_id).children[prong as usize];
            enter_subtree(descriptor, registry, plan, state_data, states, context, rand, logger, cancelled, child);
        }
        StateKind::OrthoHead(region_id) => {
            let children = descriptor.region(region_id).children.clone();
            for child in children {
                enter_subtree(descriptor, registry, plan, state_data, states, context, rand, logger, cancelled, child);
                if cancelled.is_some() {
                    break;
                }
            }
        }
    }
}

/// Exits `state`'s children (deepest first) before `state` itself, the
/// mirror image of [`enter_subtree`]. Saves the exited composite prong into
/// `resumable` before clearing `active`.
#[allow(clippy::too_many_arguments)]
pub fn exit_subtree<Dom: Domain>(
    descriptor: &MachineDescriptor,
    registry: &mut StateRegistry,
    plan: &mut PlanData,
    state_data: &StateData,
    states: &mut [StateSlot<Dom>],
    context: &mut Dom::Context,
    logger: &mut dyn Logger,
    state: StateId,
) {
    match descriptor.state(state).kind {
        StateKind::Leaf => {}
        StateKind::CompositeHead(region_id) => {
            let compo_index = descriptor.region(region_id).fork_id.compo_index().unwrap();
            let active = registry.compo_active(compo_index);
            if active != INVALID_PRONG {
                let child = descriptor.region(region_id).children[active as usize];
                exit_subtree(descriptor, registry, plan, state_data, states, context, logger, child);
            }
            registry.set_compo_resumable(compo_index, active);
            registry.set_compo_active(compo_index, INVALID_PRONG);
            plan.clear_region(descriptor, region_id);
        }
        StateKind::OrthoHead(region_id) => {
            let children = descriptor.region(region_id).children.clone();
            for child in children.into_iter().rev() {
                exit_subtree(descriptor, registry, plan, state_data, states, context, logger, child);
            }
            plan.clear_region(descriptor, region_id);
        }
    }

    // Exit guards cannot veto a commit already in flight; the cancellation
    // slot here exists only so `GuardControl` stays uniform, never read back.
    let mut cancelled = None;
    logger.record_method(state, Method::ExitGuard);
    {
        let mut gc = GuardControl {
            descriptor,
            registry,
            plan,
            state_data,
            current: state,
            cancelled: &mut cancelled,
        };
        states[state].behavior.exit_guard(context, &mut gc);
    }
    logger.record_method(state, Method::Exit);
    {
        let region = descriptor.enclosing_region(state);
        let mut pc = PlanControl {
            descriptor,
            registry,
            plan,
            state_data,
            region: region.unwrap_or(0),
        };
        for mixin in &mut states[state].mixins {
            mixin.before_exit(context, &mut pc);
        }
        states[state].behavior.exit(context, &mut pc);
    }
    plan.clear_status(state);
}

/// Walks down from `state` applying whatever `requested != active` mismatch
/// it finds along the already-active path, committing the nearest one as an
/// exit-then-enter pair. Leaves subtrees with no pending request untouched.
/// Returns `true` if a commit happened anywhere in this subtree.
#[allow(clippy::too_many_arguments)]
pub fn apply_pending<Dom: Domain>(
    descriptor: &MachineDescriptor,
    registry: &mut StateRegistry,
    plan: &mut PlanData,
    state_data: &StateData,
    states: &mut [StateSlot<Dom>],
    context: &mut Dom::Context,
    rand: &mut dyn RandomSource,
    logger: &mut dyn Logger,
    cancelled: &mut Option<StateId>,
    state: StateId,
) -> bool {
    match descriptor.state(state).kind {
        StateKind::Leaf => false,
        StateKind::CompositeHead(region_id) => {
            let compo_index = descriptor.region(region_id).fork_id.compo_index().unwrap();
            let requested = registry.compo_requested(compo_index);
            let active = registry.compo_active(compo_index);

            if requested != INVALID_PRONG && requested != active {
                if active != INVALID_PRONG {
                    let old_child = descriptor.region(region_id).children[active as usize];
                    exit_subtree(descriptor, registry, plan, state_data, states, context, logger, old_child);
                }
                registry.clear_compo_requested(compo_index);
                registry.set_compo_active(compo_index, requested);
                let new_child = descriptor.region(region_id).children[requested as usize];
                enter_subtree(
                    descriptor, registry, plan, state_data, states, context, rand, logger, cancelled, new_child,
                );
                true
            } else if active != INVALID_PRONG {
                let child = descriptor.region(region_id).children[active as usize];
                apply_pending(descriptor, registry, plan, state_data, states, context, rand, logger, cancelled, child)
            } else {
                false
            }
        }
        StateKind::OrthoHead(region_id) => {
            let children = descriptor.region(region_id).children.clone();
            let mut changed = false;
            for child in children {
                changed |=
                    apply_pending(descriptor, registry, plan, state_data, states, context, rand, logger, cancelled, child);
            }
            changed
        }
    }
}

/// Checks whether `state`'s own reported `status` completes the head task
/// of *its parent's* plan — not the region `state` itself heads. A
/// composite/orthogonal head's `succeed()`/`fail()` call reports that head's
/// status upward to whatever plan placed it as a task destination, so this
/// must walk to the parent region via the state's `ParentRecord` rather than
/// `MachineDescriptor::enclosing_region` (which resolves to the region a
/// head *owns*, the wrong one here).
#[allow(clippy::too_many_arguments)]
fn advance_plan<Dom: Domain>(
    descriptor: &MachineDescriptor,
    registry: &StateRegistry,
    plan: &mut PlanData,
    state_data: &StateData,
    states: &mut [StateSlot<Dom>],
    context: &mut Dom::Context,
    requests: &mut Vec<crate::control::Request>,
    lock: &mut bool,
    logger: &mut dyn Logger,
    state: StateId,
    status: Status,
) {
    let Some(result) = status.result else { return };
    let parent = descriptor.state(state).parent;
    if parent.is_root() {
        return;
    }
    let Some(region) = descriptor.region_of_fork(parent.fork_id) else { return };
    if !plan.plan_exists(region) {
        return;
    }
    let Some(task_id) = plan.first(region) else { return };
    let view = plan.task(task_id);
    if view.origin != state {
        return;
    }
    let event = match result {
        TaskResult::Success => StatusEvent::Success,
        TaskResult::Failure => StatusEvent::Failure,
    };
    logger.record_task_status(state, event);

    let head = descriptor.region(region).head;

    match result {
        TaskResult::Success => {
            plan.remove(task_id);
            requests.push(crate::control::Request {
                kind: RequestKind::ChangeTo,
                target: view.destination,
                origin: state,
            });
            if !plan.plan_exists(region) {
                logger.record_plan_status(region, StatusEvent::Success);
                let escalated = invoke_plan_hook(
                    descriptor, registry, plan, state_data, states, context, requests, lock, logger, head, Method::PlanSucceeded,
                );
                advance_plan(
                    descriptor, registry, plan, state_data, states, context, requests, lock, logger, head, escalated,
                );
            }
        }
        TaskResult::Failure => {
            plan.clear_region(descriptor, region);
            logger.record_plan_status(region, StatusEvent::Failure);
            let escalated = invoke_plan_hook(
                descriptor, registry, plan, state_data, states, context, requests, lock, logger, head, Method::PlanFailed,
            );
            advance_plan(
                descriptor, registry, plan, state_data, states, context, requests, lock, logger, head, escalated,
            );
        }
    }
}

/// Invokes a region head's `plan_succeeded`/`plan_failed` hook (spec.md
/// §4.2) and returns the `Status` it reports, so the caller can feed that
/// status back into [`advance_plan`] at the head's own position and let
/// multi-level escalation (spec.md §8 scenario 1) continue within the same
/// tick.
#[allow(clippy::too_many_arguments)]
fn invoke_plan_hook<Dom: Domain>(
    descriptor: &MachineDescriptor,
    registry: &StateRegistry,
    plan: &mut PlanData,
    state_data: &StateData,
    states: &mut [StateSlot<Dom>],
    context: &mut Dom::Context,
    requests: &mut Vec<crate::control::Request>,
    lock: &mut bool,
    logger: &mut dyn Logger,
    head: StateId,
    method: Method,
) -> Status {
    logger.record_method(head, method);
    let region = descriptor.enclosing_region(head);
    let mut fc = FullControl {
        descriptor,
        registry,
        plan,
        state_data,
        requests,
        lock,
        current: head,
        region,
    };
    match method {
        Method::PlanSucceeded => states[head].behavior.plan_succeeded(context, &mut fc),
        Method::PlanFailed => states[head].behavior.plan_failed(context, &mut fc),
        _ => unreachable!("invoke_plan_hook only ever called with PlanSucceeded/PlanFailed"),
    }
}

/// Dispatches `update` across the active subtree rooted at `state`,
/// combining orthogonal siblings' statuses and advancing any plan whose
/// head task originates at a state that just reported success or failure.
#[allow(clippy::too_many_arguments)]
pub fn update_subtree<Dom: Domain>(
    descriptor: &MachineDescriptor,
    registry: &StateRegistry,
    plan: &mut PlanData,
    state_data: &StateData,
    states: &mut [StateSlot<Dom>],
    context: &mut Dom::Context,
    requests: &mut Vec<crate::control::Request>,
    lock: &mut bool,
    logger: &mut dyn Logger,
    state: StateId,
) -> Status {
    logger.record_method(state, Method::Update);
    let own_status = {
        let region = descriptor.enclosing_region(state);
        let mut fc = FullControl {
            descriptor,
            registry,
            plan,
            state_data,
            requests,
            lock,
            current: state,
            region,
        };
        for mixin in &mut states[state].mixins {
            mixin.before_update(context, &mut fc);
        }
        let status = states[state].behavior.update(context, &mut fc);
        for mixin in &mut states[state].mixins {
            mixin.after_update(context, &mut fc, status);
        }
        status
    };

    let combined = match descriptor.state(state).kind {
        StateKind::Leaf => own_status,
        StateKind::CompositeHead(region_id) => {
            let compo_index = descriptor.region(region_id).fork_id.compo_index().unwrap();
            let active = registry.compo_active(compo_index);
            if active == INVALID_PRONG {
                own_status
            } else {
                let child = descriptor.region(region_id).children[active as usize];
                if own_status.result.is_some() {
                    // The head already decided the outcome; lock out further
                    // enqueues from the child's update (spec.md §4.4.1) but
                    // still dispatch it, for side-effect consistency.
                    let was_locked = *lock;
                    *lock = true;
                    update_subtree(descriptor, registry, plan, state_data, states, context, requests, lock, logger, child);
                    *lock = was_locked;
                    own_status
                } else {
                    let child_status =
                        update_subtree(descriptor, registry, plan, state_data, states, context, requests, lock, logger, child);
                    if child_status.result.is_some() {
                        child_status
                    } else {
                        own_status.with_outer_transition(child_status.outer_transition)
                    }
                }
            }
        }
        StateKind::OrthoHead(region_id) => {
            let children = descriptor.region(region_id).children.clone();
            children.into_iter().fold(own_status, |acc, child| {
                let child_status =
                    update_subtree(descriptor, registry, plan, state_data, states, context, requests, lock, logger, child);
                acc.combine_orthogonal(child_status)
            })
        }
    };

    advance_plan(descriptor, registry, plan, state_data, states, context, requests, lock, logger, state, own_status);
    combined
}

/// Dispatches `react(event)` the same way [`update_subtree`] dispatches
/// `update` (spec.md §4.3).
#[allow(clippy::too_many_arguments)]
pub fn react_subtree<Dom: Domain>(
    descriptor: &MachineDescriptor,
    registry: &StateRegistry,
    plan: &mut PlanData,
    state_data: &StateData,
    states: &mut [StateSlot<Dom>],
    context: &mut Dom::Context,
    event: &Dom::Event,
    requests: &mut Vec<crate::control::Request>,
    lock: &mut bool,
    logger: &mut dyn Logger,
    state: StateId,
) -> Status {
    logger.record_method(state, Method::React);
    let own_status = {
        let region = descriptor.enclosing_region(state);
        let mut fc = FullControl {
            descriptor,
            registry,
            plan,
            state_data,
            requests,
            lock,
            current: state,
            region,
        };
        states[state].behavior.react(context, event, &mut fc)
    };

    let combined = match descriptor.state(state).kind {
        StateKind::Leaf => own_status,
        StateKind::CompositeHead(region_id) => {
            let compo_index = descriptor.region(region_id).fork_id.compo_index().unwrap();
            let active = registry.compo_active(compo_index);
            if active == INVALID_PRONG {
                own_status
            } else {
                let child = descriptor.region(region_id).children[active as usize];
                if own_status.result.is_some() {
                    let was_locked = *lock;
                    *lock = true;
                    react_subtree(
                        descriptor, registry, plan, state_data, states, context, event, requests, lock, logger, child,
                    );
                    *lock = was_locked;
                    own_status
                } else {
                    let child_status = react_subtree(
                        descriptor, registry, plan, state_data, states, context, event, requests, lock, logger, child,
                    );
                    if child_status.result.is_some() {
                        child_status
                    } else {
                        own_status.with_outer_transition(child_status.outer_transition)
                    }
                }
            }
        }
        StateKind::OrthoHead(region_id) => {
            let children = descriptor.region(region_id).children.clone();
            children.into_iter().fold(own_status, |acc, child| {
                let child_status = react_subtree(
                    descriptor, registry, plan, state_data, states, context, event, requests, lock, logger, child,
                );
                acc.combine_orthogonal(child_status)
            })
        }
    };

    advance_plan(descriptor, registry, plan, state_data, states, context, requests, lock, logger, state, own_status);
    combined
}

/// Resolves one queued [`crate::control::Request`] into registry bookkeeping
/// (spec.md §4.1): `Schedule` only touches `resumable`, everything else runs
/// `requestImmediate` and, for the forcing kinds, pre-resolves the target's
/// own region's prong before the walk (so e.g. `restart(headState)` truly
/// restarts rather than leaving whatever was already active in place).
#[allow(clippy::too_many_arguments)]
pub fn apply_request<Dom: Domain>(
    descriptor: &MachineDescriptor,
    registry: &mut StateRegistry,
    states: &[StateSlot<Dom>],
    context: &Dom::Context,
    rand: &mut dyn RandomSource,
    logger: &mut dyn Logger,
    request: crate::control::Request,
) -> bool {
    let kind = match request.kind {
        RequestKind::ChangeTo => TransitionKind::ChangeTo,
        RequestKind::Restart => TransitionKind::Restart,
        RequestKind::Resume => TransitionKind::Resume,
        RequestKind::Utilize => TransitionKind::Utilize,
        RequestKind::Randomize => TransitionKind::Randomize,
        RequestKind::Schedule => TransitionKind::Schedule,
    };
    logger.record_transition(request.origin, request.target, kind);

    match request.kind {
        RequestKind::Schedule => {
            registry.request_scheduled(descriptor, request.target);
            false
        }
        RequestKind::ChangeTo => registry.request_immediate(descriptor, request.target),
        RequestKind::Restart | RequestKind::Resume | RequestKind::Utilize | RequestKind::Randomize => {
            let mut changed = registry.request_immediate(descriptor, request.target);
            // These four request kinds only force a *prong choice*, which is
            // only meaningful when the target itself heads a composite
            // region; an orthogonal head has no prong to force.
            if let StateKind::CompositeHead(region_id) = descriptor.state(request.target).kind {
                let prong = resolve_prong(descriptor, registry, states, context, rand, logger, region_id, request.kind);
                let compo_index = descriptor.region(region_id).fork_id.compo_index().unwrap();
                let active = registry.compo_active(compo_index);
                registry.set_compo_requested_override(compo_index, prong);
                // The path walk above may have found every ancestor already
                // "remains" (no change needed to reach this region head);
                // the forced override can still demand a real change within
                // the region this request's target itself heads.
                changed |= prong != active;
            }
            changed
        }
    }
}
