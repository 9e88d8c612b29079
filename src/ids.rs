//! Dense identifiers assigned at machine-build time.
//!
//! `StateId`/`RegionId` are pre-order indices into the flat descriptor
//! tables; `ForkId` is the signed, per-kind numbering used by the state
//! registry's prong arrays (`+k` = the k-th composite region, `-k` = the
//! k-th orthogonal region, 0 = invalid/root).

use std::fmt;

/// Dense index of a state, `[0, STATE_COUNT)`. The root state is always 0.
pub type StateId = usize;

/// Dense index of an interior region, `[0, REGION_COUNT)`, pre-order.
pub type RegionId = usize;

/// Child index within a region, `[0, WIDTH)`.
pub type Prong = u8;

/// Sentinel for "no prong selected".
pub const INVALID_PRONG: Prong = Prong::MAX;

/// Signed region handle. `+k` is the k-th composite region (1-based), `-k`
/// the k-th orthogonal region (1-based). `0` is reserved for "no fork"
/// (used by the root's parent record).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForkId(i32);

impl ForkId {
    pub const INVALID: ForkId = ForkId(0);

    pub fn composite(index_one_based: usize) -> Self {
        debug_assert!(index_one_based > 0);
        ForkId(index_one_based as i32)
    }

    pub fn orthogonal(index_one_based: usize) -> Self {
        debug_assert!(index_one_based > 0);
        ForkId(-(index_one_based as i32))
    }

    pub fn is_invalid(self) -> bool {
        self.0 == 0
    }

    pub fn is_composite(self) -> bool {
        self.0 > 0
    }

    pub fn is_orthogonal(self) -> bool {
        self.0 < 0
    }

    /// 0-based index into `compoActive`/`resumable.compo`/... for a composite fork.
    pub fn compo_index(self) -> Option<usize> {
        (self.0 > 0).then(|| (self.0 - 1) as usize)
    }

    /// 0-based index into the ortho bit arrays for an orthogonal fork.
    pub fn ortho_index(self) -> Option<usize> {
        (self.0 < 0).then(|| (-self.0 - 1) as usize)
    }
}

impl fmt::Display for ForkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 > 0 {
            write!(f, "compo#{}", self.0 - 1)
        } else if self.0 < 0 {
            write!(f, "ortho#{}", -self.0 - 1)
        } else {
            write!(f, "<invalid-fork>")
        }
    }
}

/// `(forkId, prong)` identifying a state's region and position within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentRecord {
    pub fork_id: ForkId,
    pub prong: Prong,
}

impl ParentRecord {
    /// Sentinel parent carried by the root state.
    pub const ROOT: ParentRecord = ParentRecord {
        fork_id: ForkId::INVALID,
        prong: INVALID_PRONG,
    };

    pub fn is_root(self) -> bool {
        self.fork_id.is_invalid()
    }
}
