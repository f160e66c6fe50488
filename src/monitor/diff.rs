// src/monitor/diff.rs
//! Set-difference change detection between consecutive snapshots.
//!
//! Total and history-free: the first observation for an event arrives here
//! as an empty `previous` set, which is handled by plain set algebra. Whether
//! first-run findings alert is the scheduler's policy, not ours.

use std::collections::BTreeSet;

use crate::monitor::types::ChangeResult;

pub fn detect_changes(previous: &BTreeSet<String>, current: &BTreeSet<String>) -> ChangeResult {
    let new_sectors: BTreeSet<String> = current.difference(previous).cloned().collect();
    let removed_sectors: BTreeSet<String> = previous.difference(current).cloned().collect();
    let has_changes = !new_sectors.is_empty() || !removed_sectors.is_empty();

    if has_changes {
        tracing::info!(
            new = new_sectors.len(),
            removed = removed_sectors.len(),
            previous = previous.len(),
            current = current.len(),
            "sector changes detected"
        );
    }

    ChangeResult {
        has_changes,
        new_sectors,
        removed_sectors,
        previous_count: previous.len(),
        current_count: current.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_vs_empty_has_no_changes() {
        let r = detect_changes(&set(&[]), &set(&[]));
        assert!(!r.has_changes);
        assert!(r.new_sectors.is_empty());
        assert!(r.removed_sectors.is_empty());
    }

    #[test]
    fn identical_sets_have_no_changes() {
        let r = detect_changes(&set(&["a", "b"]), &set(&["a", "b"]));
        assert!(!r.has_changes);
        assert!(r.new_sectors.is_empty());
        assert!(r.removed_sectors.is_empty());
        assert_eq!(r.previous_count, 2);
        assert_eq!(r.current_count, 2);
    }

    #[test]
    fn addition_is_reported_as_new() {
        let r = detect_changes(&set(&["a", "b"]), &set(&["a", "b", "c"]));
        assert!(r.has_changes);
        assert_eq!(r.new_sectors, set(&["c"]));
        assert!(r.removed_sectors.is_empty());
    }

    #[test]
    fn removal_is_reported_as_removed() {
        let r = detect_changes(&set(&["a", "b", "c"]), &set(&["a"]));
        assert!(r.has_changes);
        assert!(r.new_sectors.is_empty());
        assert_eq!(r.removed_sectors, set(&["b", "c"]));
    }

    #[test]
    fn mixed_changes_report_both_sides() {
        let r = detect_changes(&set(&["a", "b", "c"]), &set(&["a", "d", "e"]));
        assert!(r.has_changes);
        assert_eq!(r.new_sectors, set(&["d", "e"]));
        assert_eq!(r.removed_sectors, set(&["b", "c"]));
    }

    #[test]
    fn first_observation_reports_everything_as_new() {
        let r = detect_changes(&set(&[]), &set(&["a", "b"]));
        assert!(r.has_changes);
        assert_eq!(r.new_sectors, set(&["a", "b"]));
        assert!(r.removed_sectors.is_empty());
        assert_eq!(r.previous_count, 0);
    }

    #[test]
    fn first_observation_of_nothing_is_quiet() {
        let r = detect_changes(&set(&[]), &set(&[]));
        assert!(!r.has_changes);
    }
}
