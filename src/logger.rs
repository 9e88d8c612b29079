//! Diagnostic hook (spec.md §9, "Logger interface"): an optional, zero-cost
//! sink for the root driver to report lifecycle events to, independent of
//! the `tracing` spans the crate emits internally for its own diagnostics.

use crate::ids::{Prong, RegionId, StateId};

/// Which lifecycle callback a [`Logger::record_method`] call is reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    EntryGuard,
    Enter,
    Update,
    React,
    ExitGuard,
    Exit,
    PlanSucceeded,
    PlanFailed,
}

/// Which transition request kind a [`Logger::record_transition`] call is reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    ChangeTo,
    Restart,
    Resume,
    Utilize,
    Randomize,
    Schedule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    Success,
    Failure,
}

/// All seven methods are defaulted to no-ops, so implementing a handful is
/// enough to observe whatever a caller cares about. Every method takes
/// `&mut self` so a logger may accumulate counters or a trace buffer.
pub trait Logger {
    fn record_method(&mut self, _state: StateId, _method: Method) {}

    fn record_transition(&mut self, _origin: StateId, _destination: StateId, _kind: TransitionKind) {}

    fn record_task_status(&mut self, _state: StateId, _event: StatusEvent) {}

    fn record_plan_status(&mut self, _region: RegionId, _event: StatusEvent) {}

    fn record_cancelled_pending(&mut self, _state: StateId) {}

    fn record_utility_resolution(&mut self, _region: RegionId, _prong: Prong, _utility: f32) {}

    fn record_random_resolution(&mut self, _region: RegionId, _prong: Prong, _rand: f32) {}
}

/// The default logger: every method is a no-op, so a [`crate::Machine`]
/// built without an explicit logger pays nothing for the hook.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl Logger for NullLogger {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingLogger {
        methods: u32,
        transitions: u32,
    }

    impl Logger for CountingLogger {
        fn record_method(&mut self, _state: StateId, _method: Method) {
            self.methods += 1;
        }
        fn record_transition(&mut self, _origin: StateId, _destination: StateId, _kind: TransitionKind) {
            self.transitions += 1;
        }
    }

    #[test]
    fn partial_impl_only_counts_overridden_hooks() {
        let mut log = CountingLogger::default();
        log.record_method(0, Method::Enter);
        log.record_transition(0, 1, TransitionKind::ChangeTo);
        log.record_cancelled_pending(0);
        assert_eq!(log.methods, 1);
        assert_eq!(log.transitions, 1);
    }
}
