//! A hierarchical finite-state-machine runtime core.
//!
//! A machine is built once as a [`MachineDescriptor`] (the dense, pre-order
//! tree of composite and orthogonal regions, spec.md §9) and then driven by
//! any number of [`Machine`] instances, each pairing that shared descriptor
//! with its own per-state behavior table and runtime bookkeeping.
//!
//! ```
//! use gearbox::prelude::*;
//!
//! struct Ctx;
//! struct NoEvents;
//! impl Domain for NoEvents {
//!     type Context = Ctx;
//!     type Event = ();
//! }
//!
//! let descriptor = DescriptorBuilder::new()
//!     .build(Node::composite(Strategy::Composite, vec![Node::Leaf, Node::Leaf]))
//!     .unwrap();
//! let states = vec![
//!     StateSlot::new(Box::new(EmptyState)),
//!     StateSlot::new(Box::new(EmptyState)),
//!     StateSlot::new(Box::new(EmptyState)),
//! ];
//! let mut machine: Machine<NoEvents> =
//!     Machine::new(std::sync::Arc::new(descriptor), states, StepRandomSource::new(1));
//! machine.update(&mut Ctx);
//! assert!(machine.is_active(1));
//! ```

mod bits;
mod control;
mod descriptor;
mod ids;
mod logger;
mod machine;
mod plan;
mod random;
mod region;
mod registry;
mod strategy;
mod state_data;
mod user_state;

pub mod prelude;

pub use control::{Control, FullControl, GuardControl, PlanControl, Request, RequestKind, Status, TaskResult};
pub use descriptor::{BuildError, DescriptorBuilder, MachineDescriptor, Node, RegionDescriptor, StateDescriptor, StateKind};
pub use ids::{ForkId, ParentRecord, Prong, RegionId, StateId, INVALID_PRONG};
pub use logger::{Logger, Method, NullLogger, StatusEvent, TransitionKind};
pub use machine::Machine;
pub use plan::{PlanError, TaskCursor, TaskId, TaskView};
pub use random::{RandomSource, StepRandomSource};
pub use strategy::Strategy;
pub use state_data::StateData;
pub use user_state::{Domain, EmptyState, Mixin, StateSlot, UserState};
