//! Per-state payload storage (spec.md §9, "Per-state typed storage"):
//! the mutable data a state's own lifecycle carries between `enter`/`react`
//! calls, independent of its `UserState` implementation. Grounded on the
//! `Box<dyn Resource>` + downcast pattern used for per-type storage
//! elsewhere in the pack.

use std::any::Any;

use crate::descriptor::MachineDescriptor;
use crate::ids::StateId;

#[derive(Default)]
pub struct StateData {
    slots: Vec<Option<Box<dyn Any + Send + Sync>>>,
}

impl StateData {
    pub fn new(descriptor: &MachineDescriptor) -> Self {
        let mut slots = Vec::with_capacity(descriptor.state_count());
        slots.resize_with(descriptor.state_count(), || None);
        Self { slots }
    }

    pub fn set<T: Send + Sync + 'static>(&mut self, state: StateId, value: T) {
        self.slots[state] = Some(Box::new(value));
    }

    pub fn get<T: Send + Sync + 'static>(&self, state: StateId) -> Option<&T> {
        self.slots[state].as_deref()?.downcast_ref::<T>()
    }

    pub fn get_mut<T: Send + Sync + 'static>(&mut self, state: StateId) -> Option<&mut T> {
        self.slots[state].as_deref_mut()?.downcast_mut::<T>()
    }

    pub fn is_set(&self, state: StateId) -> bool {
        self.slots[state].is_some()
    }

    pub fn reset(&mut self, state: StateId) {
        self.slots[state] = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{DescriptorBuilder, Node};
    use crate::strategy::Strategy;

    #[test]
    fn typed_roundtrip_and_reset() {
        let d = DescriptorBuilder::new()
            .build(Node::composite(Strategy::Composite, vec![Node::Leaf, Node::Leaf]))
            .unwrap();
        let mut data = StateData::new(&d);
        assert!(!data.is_set(1));
        data.set(1, 7u32);
        assert_eq!(data.get::<u32>(1), Some(&7));
        assert_eq!(data.get::<f32>(1), None); // wrong type, not a panic
        data.reset(1);
        assert!(!data.is_set(1));
    }
}
