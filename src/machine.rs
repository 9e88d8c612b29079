//! The root driver (spec.md §4.5) and the crate's public surface: `Machine`
//! owns one tree instance and drives `update`/`react` through the bounded
//! substitution loop that applies queued transition requests.

use std::sync::Arc;

use crate::control::{Request, RequestKind};
use crate::descriptor::MachineDescriptor;
use crate::logger::{Logger, NullLogger};
use crate::plan::PlanData;
use crate::random::RandomSource;
use crate::region;
use crate::registry::StateRegistry;
use crate::state_data::StateData;
use crate::user_state::{Domain, StateSlot};
use crate::ids::StateId;

/// The mutable runtime data behind one [`Machine`]: everything but the
/// transition-request queue, the re-entrancy lock, and the pluggable
/// logger/random source, which `Machine` itself owns so that `process_transitions`
/// can borrow `state` and those fields independently.
struct MachineState<Dom: Domain> {
    descriptor: Arc<MachineDescriptor>,
    registry: StateRegistry,
    plan: PlanData,
    state_data: StateData,
    states: Vec<StateSlot<Dom>>,
}

/// One running instance of a hierarchical state machine built from a
/// [`MachineDescriptor`] and a table of per-state behaviors. Cheap to build
/// many of from the same descriptor (spec.md §9): the descriptor is shared
/// via `Arc`, only the runtime bookkeeping (`StateRegistry`, `PlanData`,
/// `StateData`, the behavior table) is per-instance.
pub struct Machine<Dom: Domain> {
    state: MachineState<Dom>,
    requests: Vec<Request>,
    lock: bool,
    logger: Box<dyn Logger>,
    rand: Box<dyn RandomSource>,
}

impl<Dom: Domain> Machine<Dom> {
    pub fn new(descriptor: Arc<MachineDescriptor>, states: Vec<StateSlot<Dom>>, rand: impl RandomSource + 'static) -> Self {
        assert_eq!(states.len(), descriptor.state_count(), "one StateSlot per descriptor state is required");
        let registry = StateRegistry::new(&descriptor);
        let plan = PlanData::new(&descriptor);
        let state_data = StateData::new(&descriptor);
        Self {
            state: MachineState {
                descriptor,
                registry,
                plan,
                state_data,
                states,
            },
            requests: Vec::new(),
            lock: false,
            logger: Box::new(NullLogger),
            rand: Box::new(rand),
        }
    }

    pub fn with_logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Box::new(logger);
        self
    }

    pub fn descriptor(&self) -> &MachineDescriptor {
        &self.state.descriptor
    }

    /// Runs the tree's initial entry if it hasn't happened yet. Both
    /// `update` and `react` call this so a freshly-built machine doesn't
    /// need a separate "start" step before its first tick, matching
    /// spec.md §4.5's description of initial entry as part of the first
    /// drive rather than a distinct public operation.
    fn ensure_started(&mut self, context: &mut Dom::Context) {
        if self.state.registry.has_entered() {
            return;
        }
        let mut cancelled: Option<StateId> = None;
        let root = self.state.descriptor.root();
        region::enter_subtree(
            &self.state.descriptor,
            &mut self.state.registry,
            &mut self.state.plan,
            &self.state.state_data,
            &mut self.state.states,
            context,
            self.rand.as_mut(),
            self.logger.as_mut(),
            &mut cancelled,
            root,
        );
        if cancelled.is_none() {
            self.state.registry.mark_entered();
        }
    }

    pub fn update(&mut self, context: &mut Dom::Context) {
        self.ensure_started(context);
        let root = self.state.descriptor.root();
        region::update_subtree(
            &self.state.descriptor,
            &self.state.registry,
            &mut self.state.plan,
            &self.state.state_data,
            &mut self.state.states,
            context,
            &mut self.requests,
            &mut self.lock,
            self.logger.as_mut(),
            root,
        );
        self.process_transitions(context);
    }

    pub fn react(&mut self, context: &mut Dom::Context, event: &Dom::Event) {
        self.ensure_started(context);
        let root = self.state.descriptor.root();
        region::react_subtree(
            &self.state.descriptor,
            &self.state.registry,
            &mut self.state.plan,
            &self.state.state_data,
            &mut self.state.states,
            context,
            event,
            &mut self.requests,
            &mut self.lock,
            self.logger.as_mut(),
            root,
        );
        self.process_transitions(context);
    }

    /// The bounded substitution loop (spec.md §4.5): repeatedly drains
    /// queued requests, resolves them into `registry.requested`, commits
    /// the nearest mismatch found by walking down from the root, and rolls
    /// the commit back if a guard cancelled it along the way. Stops once a
    /// round produces no further requests, or after `substitution_limit`
    /// rounds — whichever comes first, matching the source's guard against
    /// requests that keep re-triggering each other forever.
    fn process_transitions(&mut self, context: &mut Dom::Context) {
        let limit = self.state.descriptor.substitution_limit;
        let mut iterations = 0;
        while !self.requests.is_empty() && iterations < limit {
            iterations += 1;
            let batch = std::mem::take(&mut self.requests);
            self.state.registry.clear_requests();

            let mut any_change = false;
            for request in &batch {
                let changed = region::apply_request(
                    &self.state.descriptor,
                    &mut self.state.registry,
                    &self.state.states,
                    context,
                    self.rand.as_mut(),
                    self.logger.as_mut(),
                    *request,
                );
                any_change |= changed;
            }
            if !any_change {
                continue;
            }

            let snapshot = self.state.registry.snapshot();
            let mut cancelled: Option<StateId> = None;
            let root = self.state.descriptor.root();
            region::apply_pending(
                &self.state.descriptor,
                &mut self.state.registry,
                &mut self.state.plan,
                &self.state.state_data,
                &mut self.state.states,
                context,
                self.rand.as_mut(),
                self.logger.as_mut(),
                &mut cancelled,
                root,
            );
            if let Some(origin) = cancelled {
                self.state.registry.restore(snapshot);
                self.logger.record_cancelled_pending(origin);
            }
        }
    }

    // ---- Direct requests (spec.md §6) ----

    pub fn change_to(&mut self, target: StateId) {
        self.requests.push(Request {
            kind: RequestKind::ChangeTo,
            target,
            origin: target,
        });
    }

    pub fn restart(&mut self, target: StateId) {
        self.requests.push(Request {
            kind: RequestKind::Restart,
            target,
            origin: target,
        });
    }

    pub fn resume(&mut self, target: StateId) {
        self.requests.push(Request {
            kind: RequestKind::Resume,
            target,
            origin: target,
        });
    }

    pub fn utilize(&mut self, target: StateId) {
        self.requests.push(Request {
            kind: RequestKind::Utilize,
            target,
            origin: target,
        });
    }

    pub fn randomize(&mut self, target: StateId) {
        self.requests.push(Request {
            kind: RequestKind::Randomize,
            target,
            origin: target,
        });
    }

    pub fn schedule(&mut self, target: StateId) {
        self.requests.push(Request {
            kind: RequestKind::Schedule,
            target,
            origin: target,
        });
    }

    // ---- Queries (spec.md §6) ----

    pub fn is_active(&self, state: StateId) -> bool {
        self.state.registry.is_active(&self.state.descriptor, state)
    }

    pub fn is_resumable(&self, state: StateId) -> bool {
        self.state.registry.is_resumable(&self.state.descriptor, state)
    }

    pub fn is_scheduled(&self, state: StateId) -> bool {
        self.state.registry.is_scheduled(&self.state.descriptor, state)
    }

    // ---- Per-state typed data (spec.md §9) ----

    pub fn set_state_data<T: Send + Sync + 'static>(&mut self, state: StateId, value: T) {
        self.state.state_data.set(state, value);
    }

    pub fn get_state_data<T: Send + Sync + 'static>(&self, state: StateId) -> Option<&T> {
        self.state.state_data.get(state)
    }

    pub fn is_state_data_set(&self, state: StateId) -> bool {
        self.state.state_data.is_set(state)
    }

    pub fn reset_state_data(&mut self, state: StateId) {
        self.state.state_data.reset(state);
    }
}

