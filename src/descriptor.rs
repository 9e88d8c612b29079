//! Builder-time tree description (spec.md §9, "State-tree polymorphism").
//!
//! The original source recursively synthesizes each region's type at
//! compile time. This crate instead builds the tree once, up front, as two
//! parallel tables: [`StateDescriptor`] per [`StateId`] and
//! [`RegionDescriptor`] per [`RegionId`]. Every deep operation (enter, exit,
//! update, ...) is then an iterative walk indexed by these tables.

use smallvec::SmallVec;

use crate::ids::{ForkId, ParentRecord, Prong, RegionId, StateId};
use crate::strategy::Strategy;

/// What kind of node a state is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    /// An ordinary leaf state.
    Leaf,
    /// The head state of a composite region (single active child).
    CompositeHead(RegionId),
    /// The head state of an orthogonal region (all children active).
    OrthoHead(RegionId),
}

impl StateKind {
    pub fn region(self) -> Option<RegionId> {
        match self {
            StateKind::Leaf => None,
            StateKind::CompositeHead(r) | StateKind::OrthoHead(r) => Some(r),
        }
    }

    pub fn is_leaf(self) -> bool {
        matches!(self, StateKind::Leaf)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StateDescriptor {
    pub parent: ParentRecord,
    pub kind: StateKind,
    /// Exclusive end of this state's pre-order subtree range. Valid because
    /// pre-order numbering makes every subtree a contiguous `StateId` range;
    /// used to detect "outer transitions" (spec.md §4.3) in O(1).
    pub subtree_end: StateId,
}

#[derive(Debug, Clone)]
pub struct RegionDescriptor {
    pub id: RegionId,
    pub fork_id: ForkId,
    pub head: StateId,
    pub children: SmallVec<[StateId; 8]>,
    /// `Some` for composite regions (the region's default selection
    /// strategy), `None` for orthogonal regions.
    pub strategy: Option<Strategy>,
    /// `(unit, width)` slice into the machine-wide ortho bit arrays; `(0, 0)`
    /// for composite regions.
    pub ortho_unit: (usize, usize),
}

impl RegionDescriptor {
    pub fn is_orthogonal(&self) -> bool {
        self.strategy.is_none()
    }

    pub fn width(&self) -> usize {
        self.children.len()
    }
}

/// The fully built, immutable tree description. Shared (read-only) by every
/// [`crate::Machine`] instance constructed from it.
#[derive(Debug, Clone)]
pub struct MachineDescriptor {
    pub states: Vec<StateDescriptor>,
    pub regions: Vec<RegionDescriptor>,
    /// `compo_regions[c]` is the `RegionId` of the `c`-th composite region.
    pub compo_regions: Vec<RegionId>,
    /// `ortho_regions[o]` is the `RegionId` of the `o`-th orthogonal region.
    pub ortho_regions: Vec<RegionId>,
    pub ortho_bit_count: usize,
    pub task_capacity: usize,
    pub substitution_limit: usize,
}

impl MachineDescriptor {
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn compo_count(&self) -> usize {
        self.compo_regions.len()
    }

    pub fn ortho_count(&self) -> usize {
        self.ortho_regions.len()
    }

    pub fn region(&self, id: RegionId) -> &RegionDescriptor {
        &self.regions[id]
    }

    pub fn state(&self, id: StateId) -> &StateDescriptor {
        &self.states[id]
    }

    /// The region a state's own lifecycle callbacks are scoped to: the
    /// region it heads, if it is a region head, else its immediate parent
    /// region. `None` only for a single-leaf machine's root.
    pub fn enclosing_region(&self, state: StateId) -> Option<RegionId> {
        let desc = self.state(state);
        if let Some(r) = desc.kind.region() {
            return Some(r);
        }
        self.region_of_fork(desc.parent.fork_id)
    }

    pub fn region_of_fork(&self, fork: ForkId) -> Option<RegionId> {
        if let Some(c) = fork.compo_index() {
            self.compo_regions.get(c).copied()
        } else if let Some(o) = fork.ortho_index() {
            self.ortho_regions.get(o).copied()
        } else {
            None
        }
    }

    /// `(regionIndex, regionSize)`: the state-id range spanned by a region's
    /// subtree, used to detect outer transitions (spec.md §4.3).
    pub fn region_span(&self, region: RegionId) -> (StateId, usize) {
        let head = self.region(region).head;
        let end = self.state(head).subtree_end;
        (head, end - head)
    }

    pub fn root(&self) -> StateId {
        0
    }
}

/// Input tree shape for [`DescriptorBuilder`].
#[derive(Debug, Clone)]
pub enum Node {
    Leaf,
    Composite {
        strategy: Strategy,
        children: Vec<Node>,
    },
    Orthogonal {
        children: Vec<Node>,
    },
}

impl Node {
    pub fn composite(strategy: Strategy, children: Vec<Node>) -> Self {
        Node::Composite { strategy, children }
    }

    pub fn orthogonal(children: Vec<Node>) -> Self {
        Node::Orthogonal { children }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("composite region has no children")]
    EmptyComposite,
    #[error("orthogonal region has no children")]
    EmptyOrthogonal,
    #[error("region width {0} exceeds the {1}-prong limit")]
    WidthOverflow(usize, usize),
    #[error("task_capacity override of 0 leaves no room for any plan")]
    TaskCapacityZero,
}

struct BuildCtx {
    states: Vec<StateDescriptor>,
    regions: Vec<RegionDescriptor>,
    compo_regions: Vec<RegionId>,
    ortho_regions: Vec<RegionId>,
    ortho_bit_cursor: usize,
}

/// Assembles a [`MachineDescriptor`] from a [`Node`] tree. This is the
/// "configuration layer" of the crate: the one place construction-time
/// choices (task pool capacity, substitution limit) are validated before a
/// [`crate::Machine`] starts ticking.
#[derive(Debug, Default)]
pub struct DescriptorBuilder {
    task_capacity: Option<usize>,
    substitution_limit: usize,
}

impl DescriptorBuilder {
    pub fn new() -> Self {
        Self {
            task_capacity: None,
            substitution_limit: 4,
        }
    }

    /// Override the task pool size. Defaults to `2 * COMPO_PRONGS` (spec.md §3).
    pub fn task_capacity(mut self, capacity: usize) -> Self {
        self.task_capacity = Some(capacity);
        self
    }

    /// Override the substitution-pass bound. Defaults to 4 (spec.md §4.5).
    pub fn substitution_limit(mut self, limit: usize) -> Self {
        self.substitution_limit = limit;
        self
    }

    pub fn build(self, root: Node) -> Result<MachineDescriptor, BuildError> {
        if self.task_capacity == Some(0) {
            return Err(BuildError::TaskCapacityZero);
        }

        let mut ctx = BuildCtx {
            states: Vec::new(),
            regions: Vec::new(),
            compo_regions: Vec::new(),
            ortho_regions: Vec::new(),
            ortho_bit_cursor: 0,
        };
        build_node(&root, ParentRecord::ROOT, &mut ctx)?;

        let compo_prongs: usize = ctx
            .regions
            .iter()
            .filter(|r| !r.is_orthogonal())
            .map(|r| r.width())
            .sum();
        let task_capacity = self.task_capacity.unwrap_or_else(|| (2 * compo_prongs).max(1));

        Ok(MachineDescriptor {
            states: ctx.states,
            regions: ctx.regions,
            compo_regions: ctx.compo_regions,
            ortho_regions: ctx.ortho_regions,
            ortho_bit_count: ctx.ortho_bit_cursor,
            task_capacity,
            substitution_limit: self.substitution_limit,
        })
    }
}

fn build_node(node: &Node, parent: ParentRecord, ctx: &mut BuildCtx) -> Result<StateId, BuildError> {
    let my_id = ctx.states.len();
    // Placeholder; patched once `kind` and `subtree_end` are known.
    ctx.states.push(StateDescriptor {
        parent,
        kind: StateKind::Leaf,
        subtree_end: my_id + 1,
    });

    match node {
        Node::Leaf => {}
        Node::Composite { strategy, children } => {
            if children.is_empty() {
                return Err(BuildError::EmptyComposite);
            }
            if children.len() > Prong::MAX as usize {
                return Err(BuildError::WidthOverflow(children.len(), Prong::MAX as usize));
            }
            let region_id = ctx.regions.len();
            let fork_id = ForkId::composite(ctx.compo_regions.len() + 1);
            ctx.states[my_id].kind = StateKind::CompositeHead(region_id);
            ctx.regions.push(RegionDescriptor {
                id: region_id,
                fork_id,
                head: my_id,
                children: SmallVec::new(),
                strategy: Some(*strategy),
                ortho_unit: (0, 0),
            });
            ctx.compo_regions.push(region_id);

            let mut child_ids = SmallVec::new();
            for (prong, child) in children.iter().enumerate() {
                let child_parent = ParentRecord {
                    fork_id,
                    prong: prong as Prong,
                };
                child_ids.push(build_node(child, child_parent, ctx)?);
            }
            ctx.regions[region_id].children = child_ids;
        }
        Node::Orthogonal { children } => {
            if children.is_empty() {
                return Err(BuildError::EmptyOrthogonal);
            }
            if children.len() > Prong::MAX as usize {
                return Err(BuildError::WidthOverflow(children.len(), Prong::MAX as usize));
            }
            let region_id = ctx.regions.len();
            let fork_id = ForkId::orthogonal(ctx.ortho_regions.len() + 1);
            let width = children.len();
            let unit = ctx.ortho_bit_cursor;
            ctx.ortho_bit_cursor += width;
            ctx.states[my_id].kind = StateKind::OrthoHead(region_id);
            ctx.regions.push(RegionDescriptor {
                id: region_id,
                fork_id,
                head: my_id,
                children: SmallVec::new(),
                strategy: None,
                ortho_unit: (unit, width),
            });
            ctx.ortho_regions.push(region_id);

            let mut child_ids = SmallVec::new();
            for (prong, child) in children.iter().enumerate() {
                let child_parent = ParentRecord {
                    fork_id,
                    prong: prong as Prong,
                };
                child_ids.push(build_node(child, child_parent, ctx)?);
            }
            ctx.regions[region_id].children = child_ids;
        }
    }

    ctx.states[my_id].subtree_end = ctx.states.len();
    Ok(my_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf() -> Node {
        Node::Leaf
    }

    #[test]
    fn pre_order_ids_and_contiguous_subtrees() {
        let tree = Node::composite(
            Strategy::Composite,
            vec![
                Node::composite(Strategy::Composite, vec![leaf(), leaf()]),
                leaf(),
            ],
        );
        let d = DescriptorBuilder::new().build(tree).unwrap();
        assert_eq!(d.state_count(), 5);
        // root(0) -> compo child(1) -> leaf(2), leaf(3); leaf(4)
        assert_eq!(d.region(0).head, 0);
        assert_eq!(d.region(1).head, 1);
        assert_eq!(d.state(1).subtree_end, 4);
        assert_eq!(d.state(0).subtree_end, 5);
        assert_eq!(d.region_span(0), (0, 5));
        assert_eq!(d.region_span(1), (1, 3));
    }

    #[test]
    fn fork_ids_numbered_per_kind() {
        let tree = Node::orthogonal(vec![
            Node::composite(Strategy::Composite, vec![leaf(), leaf()]),
            Node::composite(Strategy::Resumable, vec![leaf()]),
        ]);
        let d = DescriptorBuilder::new().build(tree).unwrap();
        assert!(d.region(0).fork_id.is_orthogonal());
        assert!(d.region(1).fork_id.is_composite());
        assert!(d.region(2).fork_id.is_composite());
        assert_eq!(d.region(1).fork_id.compo_index(), Some(0));
        assert_eq!(d.region(2).fork_id.compo_index(), Some(1));
    }

    #[test]
    fn rejects_empty_composite() {
        let tree = Node::composite(Strategy::Composite, vec![]);
        assert_eq!(
            DescriptorBuilder::new().build(tree).unwrap_err(),
            BuildError::EmptyComposite
        );
    }

    #[test]
    fn default_task_capacity_is_twice_compo_prongs() {
        let tree = Node::composite(Strategy::Composite, vec![leaf(), leaf(), leaf()]);
        let d = DescriptorBuilder::new().build(tree).unwrap();
        assert_eq!(d.task_capacity, 6);
    }
}
