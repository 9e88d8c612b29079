//! Convenience re-exports of the crate's everyday API surface. `use
//! gearbox::prelude::*;` pulls in everything a state implementation needs
//! without reaching into individual modules.

pub use crate::{
    // Building a tree
    BuildError,
    DescriptorBuilder,
    MachineDescriptor,
    Node,
    Strategy,

    // Running a tree
    Machine,
    Domain,

    // Per-state behavior
    EmptyState,
    Mixin,
    StateSlot,
    UserState,

    // Control contexts handed to callbacks
    Control,
    FullControl,
    GuardControl,
    PlanControl,
    Status,
    TaskResult,

    // Diagnostics
    Logger,
    Method,
    NullLogger,
    StatusEvent,
    TransitionKind,

    // Randomness for RandomUtil regions
    RandomSource,
    StepRandomSource,

    // Dense identifiers
    RegionId,
    StateId,
};
