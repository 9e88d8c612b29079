//! The per-state behavior surface (spec.md §6) and the domain it runs
//! against.
//!
//! The original source parameterizes a state over a `Config` with an
//! associated `Context`/`Event` pair using the unstable
//! `associated_type_defaults` feature so unit types can be omitted. Stable
//! Rust has no equivalent, so [`Domain`] requires both associated types
//! explicitly; machines with no shared context or no events use `()`.

use crate::control::{FullControl, GuardControl, PlanControl, Status};

/// The shared types a machine runs against: `Context` is passed by
/// exclusive reference into every callback (external state all states may
/// read and mutate), `Event` is whatever `Machine::react` is called with.
pub trait Domain: 'static {
    type Context;
    type Event;
}

/// One state's behavior. Every method is defaulted to a no-op (or the
/// identity `Status`/rank/utility), so a leaf state that only needs, say,
/// `update` can skip implementing everything else — matching spec.md §6's
/// "every hook optional" invariant.
pub trait UserState<Dom: Domain>: Send + Sync {
    /// Vote on whether the pending transition into this state may proceed.
    /// Call `control.cancel_pending_transitions()` to veto it.
    fn entry_guard(&mut self, _context: &mut Dom::Context, _control: &mut GuardControl) {}

    fn enter(&mut self, _context: &mut Dom::Context, _control: &mut PlanControl) {}

    fn update(&mut self, _context: &mut Dom::Context, _control: &mut FullControl) -> Status {
        Status::NONE
    }

    fn react(&mut self, _context: &mut Dom::Context, _event: &Dom::Event, _control: &mut FullControl) -> Status {
        Status::NONE
    }

    /// Vote on whether the pending transition out of this state may
    /// proceed. Call `control.cancel_pending_transitions()` to veto it.
    fn exit_guard(&mut self, _context: &mut Dom::Context, _control: &mut GuardControl) {}

    fn exit(&mut self, _context: &mut Dom::Context, _control: &mut PlanControl) {}

    /// Invoked when this region's (or, for a leaf head, this task's) plan
    /// empties out after its last task advanced (spec.md §4.2). The default
    /// reports the head's own success upward, so an unplanned state's
    /// completion escalates through its ancestors' plans the same way a
    /// leaf's own `succeed()` does.
    fn plan_succeeded(&mut self, _context: &mut Dom::Context, control: &mut FullControl) -> Status {
        control.succeed()
    }

    /// Invoked when this region's plan is cleared by a task failure
    /// (spec.md §4.2). The default reports the head's own failure upward.
    fn plan_failed(&mut self, _context: &mut Dom::Context, control: &mut FullControl) -> Status {
        control.fail()
    }

    /// Used by `RandomUtil` composite regions to find the top rank among
    /// siblings before drawing a weighted pick (spec.md §4.4.1).
    fn rank(&self, _context: &Dom::Context) -> i32 {
        0
    }

    /// Consulted by `Utilitarian` and `RandomUtil` composite regions.
    /// Callers only invoke this on children sharing the top `rank()`.
    fn utility(&self, _context: &Dom::Context) -> f32 {
        1.0
    }
}

/// A cross-cutting hook chain attached to a state in addition to its own
/// [`UserState`] (spec.md §6, "mixins"): logging, metrics, or shared
/// behavior that wraps a state's lifecycle without becoming part of it.
/// Every hook defaults to a no-op.
pub trait Mixin<Dom: Domain>: Send + Sync {
    fn before_enter(&mut self, _context: &mut Dom::Context, _control: &mut PlanControl) {}
    fn after_enter(&mut self, _context: &mut Dom::Context, _control: &mut PlanControl) {}

    fn before_update(&mut self, _context: &mut Dom::Context, _control: &mut FullControl) {}
    fn after_update(&mut self, _context: &mut Dom::Context, _control: &mut FullControl, _status: Status) {}

    fn before_exit(&mut self, _context: &mut Dom::Context, _control: &mut PlanControl) {}
    fn after_exit(&mut self, _context: &mut Dom::Context, _control: &mut PlanControl) {}
}

/// Everything a [`crate::Machine`] owns for one state: its behavior, type
/// erased so the tree can hold heterogeneous state types, plus whatever
/// mixins were attached to it at build time.
pub struct StateSlot<Dom: Domain> {
    pub behavior: Box<dyn UserState<Dom>>,
    pub mixins: Vec<Box<dyn Mixin<Dom>>>,
}

impl<Dom: Domain> StateSlot<Dom> {
    pub fn new(behavior: Box<dyn UserState<Dom>>) -> Self {
        Self {
            behavior,
            mixins: Vec::new(),
        }
    }

    pub fn with_mixin(mut self, mixin: Box<dyn Mixin<Dom>>) -> Self {
        self.mixins.push(mixin);
        self
    }
}

/// The no-op state used to fill any slot a builder doesn't supply an
/// explicit behavior for — every tree node needs a `StateSlot` even if it
/// exists purely as a composite/orthogonal head.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyState;

impl<Dom: Domain> UserState<Dom> for EmptyState {}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoEvents;
    impl Domain for NoEvents {
        type Context = ();
        type Event = ();
    }

    #[test]
    fn empty_state_satisfies_userstate_for_any_domain() {
        fn assert_impl<T: UserState<NoEvents>>() {}
        assert_impl::<EmptyState>();
    }
}
