//! Per-composite-region child-selection policies (spec.md §4.4.1) and the
//! pure arithmetic behind them. Gathering rank/utility values from user
//! states is the caller's job (see `region::report_utility`); this module
//! only picks a prong once those values are known.

use crate::ids::Prong;

/// A composite region's configured default selection policy. `changeTo`
/// uses whichever strategy the region was built with; `restart`, `resume`,
/// `utilize`, and `randomize` force one specific policy regardless of the
/// region's configured default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Restart-default: always prong 0.
    Composite,
    /// Resume the last-active prong, or 0 if none.
    Resumable,
    /// Argmax over child utility, ties broken by lowest index.
    Utilitarian,
    /// Weighted random draw among the top-ranked children only.
    RandomUtil,
}

/// Picks the argmax child by utility. Ties resolve to the lowest index
/// because strictly-greater is required to replace the incumbent.
pub fn select_utilitarian(utilities: &[f32]) -> Prong {
    let mut best_idx = 0usize;
    let mut best_val = f32::NEG_INFINITY;
    for (i, &u) in utilities.iter().enumerate() {
        if u > best_val {
            best_val = u;
            best_idx = i;
        }
    }
    best_idx as Prong
}

/// Weighted draw among the top-ranked children (spec.md §4.4.1 and §9's
/// `RandomUtil` REDESIGN FLAG).
///
/// `entries` is `(child_index, rank, utility)` for every child; `utility`
/// need only be meaningful for children sharing the maximum rank (callers
/// should avoid invoking a child's `utility()` at all unless it is
/// top-ranked, per spec.md's "ask only top-ranked children").
///
/// `rand` must be in `[0, 1)`. Returns `(picked, underflowed)`; `underflowed`
/// is true only when floating-point rounding caused the weighted scan to
/// exhaust every top-ranked entry without crossing the cursor — the spec's
/// source asserts in that case, this implementation instead deterministically
/// picks the last eligible index and lets the caller log a warning.
pub fn select_random_util(entries: &[(usize, i32, f32)], rand: f32) -> (Prong, bool) {
    let top = entries.iter().map(|(_, rank, _)| *rank).max().unwrap_or(0);
    let mut top_entries: Vec<(usize, f32)> = Vec::new();
    let mut total = 0.0f32;
    for &(index, rank, utility) in entries {
        if rank == top {
            let u = utility.max(0.0);
            top_entries.push((index, u));
            total += u;
        }
    }
    let Some(&(first, _)) = top_entries.first() else {
        return (0, false);
    };
    if total <= 0.0 {
        return (first as Prong, false);
    }

    let mut cursor = rand.clamp(0.0, f32::MAX.min(1.0 - f32::EPSILON)) * total;
    for &(index, u) in &top_entries {
        if cursor < u {
            return (index as Prong, false);
        }
        cursor -= u;
    }
    (top_entries.last().unwrap().0 as Prong, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utilitarian_picks_argmax_ties_to_lowest() {
        assert_eq!(select_utilitarian(&[0.4, 0.9, 0.5]), 1);
        assert_eq!(select_utilitarian(&[0.5, 0.5, 0.9]), 2);
        assert_eq!(select_utilitarian(&[0.9, 0.9]), 0);
    }

    #[test]
    fn random_util_only_considers_top_rank() {
        // ranks {1, 2, 1}; only index 1 is top-ranked, so it's always picked.
        let entries = [(0, 1, 0.3), (1, 2, 0.7), (2, 1, 0.4)];
        for rand in [0.0, 0.25, 0.5, 0.75, 0.999] {
            let (picked, underflow) = select_random_util(&entries, rand);
            assert_eq!(picked, 1);
            assert!(!underflow);
        }
    }

    #[test]
    fn random_util_weighted_within_top_rank_group() {
        let entries = [(0, 3, 0.25), (1, 3, 0.75)];
        let (picked_low, _) = select_random_util(&entries, 0.1);
        assert_eq!(picked_low, 0);
        let (picked_high, _) = select_random_util(&entries, 0.9);
        assert_eq!(picked_high, 1);
    }

    #[test]
    fn random_util_underflow_picks_last_eligible() {
        let entries = [(0, 1, 0.0), (1, 1, 0.0)];
        let (picked, underflow) = select_random_util(&entries, 0.5);
        // total utility is 0 -> short-circuits to the first eligible, not an underflow.
        assert_eq!(picked, 0);
        assert!(!underflow);
    }
}
