//! The state registry (spec.md §4.1): answers activity queries and mutates
//! pending selection state in response to transition requests. Holds no
//! user data and no tree topology of its own — both are supplied by a
//! [`MachineDescriptor`] passed into every method.

use crate::bits::BitArray;
use crate::descriptor::MachineDescriptor;
use crate::ids::{Prong, StateId, INVALID_PRONG};

#[derive(Debug, Clone)]
pub struct StateRegistry {
    compo_active: Vec<Prong>,
    compo_resumable: Vec<Prong>,
    compo_requested: Vec<Prong>,
    compo_remains: Vec<bool>,
    ortho_requested: BitArray,
    ortho_resumable: BitArray,
    /// Set once `enterRequested` has run for the whole tree. Resolves the
    /// open question in spec.md §9: `isActive(root)` returns `false` before
    /// initial entry instead of the source's unconditional `true`.
    entered: bool,
}

impl StateRegistry {
    pub fn new(descriptor: &MachineDescriptor) -> Self {
        Self {
            compo_active: vec![INVALID_PRONG; descriptor.compo_count()],
            compo_resumable: vec![INVALID_PRONG; descriptor.compo_count()],
            compo_requested: vec![INVALID_PRONG; descriptor.compo_count()],
            compo_remains: vec![false; descriptor.compo_count()],
            ortho_requested: BitArray::with_len(descriptor.ortho_bit_count),
            ortho_resumable: BitArray::with_len(descriptor.ortho_bit_count),
            entered: false,
        }
    }

    pub fn mark_entered(&mut self) {
        self.entered = true;
    }

    pub fn has_entered(&self) -> bool {
        self.entered
    }

    pub fn compo_active(&self, c: usize) -> Prong {
        self.compo_active[c]
    }

    pub fn set_compo_active(&mut self, c: usize, prong: Prong) {
        self.compo_active[c] = prong;
    }

    pub fn compo_resumable(&self, c: usize) -> Prong {
        self.compo_resumable[c]
    }

    pub fn set_compo_resumable(&mut self, c: usize, prong: Prong) {
        self.compo_resumable[c] = prong;
    }

    pub fn clear_compo_resumable(&mut self, c: usize) {
        self.compo_resumable[c] = INVALID_PRONG;
    }

    pub fn compo_requested(&self, c: usize) -> Prong {
        self.compo_requested[c]
    }

    /// Consumes a single composite region's `requested` prong, marking it
    /// handled so a resumed walk doesn't re-process it. Used once `enter`
    /// has committed the requested prong into `active`.
    pub fn clear_compo_requested(&mut self, c: usize) {
        self.compo_requested[c] = INVALID_PRONG;
    }

    /// Overrides a composite region's `requested` prong directly, bypassing
    /// the path walk `requestImmediate` does. Used when a forcing request
    /// (`restart`/`resume`/`utilize`/`randomize`) targets a region head
    /// itself: the region's *own* selection must follow the forced policy
    /// rather than whatever `changeTo`'s default-strategy walk would pick.
    pub fn set_compo_requested_override(&mut self, c: usize, prong: Prong) {
        self.compo_requested[c] = prong;
        if self.compo_active[c] == prong {
            self.compo_remains[c] = true;
        }
    }

    pub fn compo_remains(&self, c: usize) -> bool {
        self.compo_remains[c]
    }

    pub fn ortho_requested_bit(&self, descriptor: &MachineDescriptor, region: crate::ids::RegionId, local: usize) -> bool {
        let (unit, width) = descriptor.region(region).ortho_unit;
        self.ortho_requested.slice(unit, width).get(local)
    }

    pub fn ortho_resumable_bit(&self, descriptor: &MachineDescriptor, region: crate::ids::RegionId, local: usize) -> bool {
        let (unit, width) = descriptor.region(region).ortho_unit;
        self.ortho_resumable.slice(unit, width).get(local)
    }

    // ---- Queries (spec.md §4.1) ----

    /// `isActive`. Returns `true` for the root only once initial entry has
    /// run (spec.md §9 REDESIGN FLAG); `false` for every state before that.
    pub fn is_active(&self, d: &MachineDescriptor, state: StateId) -> bool {
        if !self.entered {
            return false;
        }
        if state == d.root() {
            return true;
        }
        let mut cur = state;
        loop {
            let parent = d.state(cur).parent;
            if let Some(c) = parent.fork_id.compo_index() {
                if self.compo_active[c] != parent.prong {
                    return false;
                }
            }
            // Orthogonal ancestors always pass: all children are active
            // simultaneously once the orthogonal head itself is active.
            if parent.is_root() {
                return true;
            }
            let region_id = d.region_of_fork(parent.fork_id).expect("fork maps to a region");
            cur = d.region(region_id).head;
        }
    }

    /// `isResumable`. Always `true` for the root (spec.md §4.1).
    pub fn is_resumable(&self, d: &MachineDescriptor, state: StateId) -> bool {
        if state == d.root() {
            return true;
        }
        let mut cur = state;
        loop {
            let parent = d.state(cur).parent;
            if let Some(c) = parent.fork_id.compo_index() {
                if self.compo_resumable[c] != parent.prong {
                    return false;
                }
            } else if let Some(o) = parent.fork_id.ortho_index() {
                let region = d.ortho_regions[o];
                if !self.ortho_resumable_bit(d, region, parent.prong as usize) {
                    return false;
                }
            }
            if parent.is_root() {
                return true;
            }
            let region_id = d.region_of_fork(parent.fork_id).expect("fork maps to a region");
            cur = d.region(region_id).head;
        }
    }

    /// `isScheduled`: would `resume()` on the immediate parent region land
    /// on `state`.
    pub fn is_scheduled(&self, d: &MachineDescriptor, state: StateId) -> bool {
        if state == d.root() {
            return false;
        }
        let parent = d.state(state).parent;
        if let Some(c) = parent.fork_id.compo_index() {
            self.compo_resumable[c] == parent.prong
        } else if let Some(o) = parent.fork_id.ortho_index() {
            let region = d.ortho_regions[o];
            self.ortho_resumable_bit(d, region, parent.prong as usize)
        } else {
            false
        }
    }

    fn pending_at_immediate_parent(&self, d: &MachineDescriptor, state: StateId) -> Option<(Prong, Prong, Prong)> {
        if state == d.root() {
            return None;
        }
        let parent = d.state(state).parent;
        let c = parent.fork_id.compo_index()?;
        let active = self.compo_active[c];
        let requested = self.compo_requested[c];
        Some((parent.prong, active, requested))
    }

    /// `isPendingChange`: this state is either end of a pending, actually
    /// different, requested prong within its own immediate composite region.
    pub fn is_pending_change(&self, d: &MachineDescriptor, state: StateId) -> bool {
        match self.pending_at_immediate_parent(d, state) {
            Some((prong, active, requested)) if requested != INVALID_PRONG && requested != active => {
                prong == active || prong == requested
            }
            _ => false,
        }
    }

    /// `isPendingEnter`: this state is the destination of a pending change.
    pub fn is_pending_enter(&self, d: &MachineDescriptor, state: StateId) -> bool {
        match self.pending_at_immediate_parent(d, state) {
            Some((prong, active, requested)) => {
                requested != INVALID_PRONG && requested != active && prong == requested
            }
            None => false,
        }
    }

    /// `isPendingExit`: this state is the origin of a pending change.
    pub fn is_pending_exit(&self, d: &MachineDescriptor, state: StateId) -> bool {
        match self.pending_at_immediate_parent(d, state) {
            Some((prong, active, requested)) => {
                requested != INVALID_PRONG && requested != active && prong == active
            }
            None => false,
        }
    }

    // ---- Mutations (spec.md §4.1) ----

    /// `requestImmediate`. Sets `requested` at *every* composite ancestor
    /// along the path from `state` up to the root — not just the nearest
    /// one — so `applyRequests` can walk straight down comparing `requested`
    /// against `active` level by level. An ancestor whose active prong
    /// already matches the walk is marked via `compoRemains` instead of
    /// counted as a real change. Returns `false` for the root (cannot be
    /// requested); otherwise `true` iff some ancestor along the path
    /// actually needs its active prong to change.
    pub fn request_immediate(&mut self, d: &MachineDescriptor, state: StateId) -> bool {
        if state == d.root() {
            return false;
        }
        let mut cur = state;
        let mut any_real_change = false;
        loop {
            let parent = d.state(cur).parent;
            if let Some(c) = parent.fork_id.compo_index() {
                self.compo_requested[c] = parent.prong;
                if self.compo_active[c] == parent.prong {
                    self.compo_remains[c] = true;
                } else {
                    any_real_change = true;
                }
            } else if let Some(o) = parent.fork_id.ortho_index() {
                let region = d.ortho_regions[o];
                let (unit, _) = d.region(region).ortho_unit;
                self.ortho_requested.set(unit + parent.prong as usize);
            }
            if parent.is_root() {
                break;
            }
            let region_id = d.region_of_fork(parent.fork_id).expect("fork maps to a region");
            cur = d.region(region_id).head;
        }
        any_real_change
    }

    /// `requestScheduled`: sets the resumable prong/bit at `state`'s
    /// immediate parent only; does not propagate further up the tree.
    pub fn request_scheduled(&mut self, d: &MachineDescriptor, state: StateId) {
        if state == d.root() {
            return;
        }
        let parent = d.state(state).parent;
        if let Some(c) = parent.fork_id.compo_index() {
            self.compo_resumable[c] = parent.prong;
        } else if let Some(o) = parent.fork_id.ortho_index() {
            let region = d.ortho_regions[o];
            let (unit, _) = d.region(region).ortho_unit;
            self.ortho_resumable.set(unit + parent.prong as usize);
        }
    }

    /// `clearRequests`: zero `compoRemains` and `requested` for the next
    /// substitution pass. Resumable bookkeeping survives (spec.md §8
    /// "Resumable recency").
    pub fn clear_requests(&mut self) {
        for v in &mut self.compo_remains {
            *v = false;
        }
        for v in &mut self.compo_requested {
            *v = INVALID_PRONG;
        }
        self.ortho_requested.clear_all();
    }

    /// Snapshot of everything `applyPending` can mutate mid-commit, used by
    /// `processTransitions` to roll back a substitution pass a guard
    /// cancelled. Covers `active`/`resumable` as well as `requested`:
    /// `applyPending` flips `compoActive` (and `exitSubtree` flips
    /// `compoResumable`) *before* the entry guard it's walking toward runs,
    /// so a cancellation partway through a commit needs all three restored
    /// for `isActive`/`isResumable` to stay consistent with "nothing
    /// happened" — even though the user-visible `enter`/`exit` calls already
    /// ran and cannot themselves be undone (spec.md §4.5's guard-cancellation
    /// rollback is best-effort for that reason, not fully transactional).
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            compo_active: self.compo_active.clone(),
            compo_resumable: self.compo_resumable.clone(),
            compo_requested: self.compo_requested.clone(),
            compo_remains: self.compo_remains.clone(),
            ortho_requested: self.ortho_requested.clone(),
            ortho_resumable: self.ortho_resumable.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: RegistrySnapshot) {
        self.compo_active = snapshot.compo_active;
        self.compo_resumable = snapshot.compo_resumable;
        self.compo_requested = snapshot.compo_requested;
        self.compo_remains = snapshot.compo_remains;
        self.ortho_requested = snapshot.ortho_requested;
        self.ortho_resumable = snapshot.ortho_resumable;
    }
}

#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    compo_active: Vec<Prong>,
    compo_resumable: Vec<Prong>,
    compo_requested: Vec<Prong>,
    compo_remains: Vec<bool>,
    ortho_requested: BitArray,
    ortho_resumable: BitArray,
}
