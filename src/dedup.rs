// src/dedup.rs
//! Residual-based alert deduplication.
//!
//! A sector alerts at most once per event: every approved alert records the
//! exact residual set it reported, and later evaluations subtract the union
//! of all recorded sets. Computing the residual from the append-only history
//! (instead of an in-memory "already alerted" flag) keeps the suppression
//! intact across restarts.

use std::collections::BTreeSet;

use crate::monitor::types::{AlertRecord, ChangeResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertDecision {
    Suppress(SuppressReason),
    Send {
        message: String,
        sectors: BTreeSet<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    NoChanges,
    /// Removals alone are not alert-worthy; the point is newly purchasable
    /// sectors, not closures.
    RemovalsOnly,
    /// Every "new" sector was already covered by a prior alert (e.g. a
    /// restart re-observing a known state).
    AlreadyReported,
}

/// Decide whether a change must produce an outbound alert. Pure; dispatch
/// and record-keeping stay with the scheduler.
pub fn evaluate(event_name: &str, change: &ChangeResult, history: &[AlertRecord]) -> AlertDecision {
    if !change.has_changes {
        return AlertDecision::Suppress(SuppressReason::NoChanges);
    }
    if change.new_sectors.is_empty() {
        return AlertDecision::Suppress(SuppressReason::RemovalsOnly);
    }

    let reported: BTreeSet<&String> = history.iter().flat_map(|r| r.sectors.iter()).collect();
    let residual: BTreeSet<String> = change
        .new_sectors
        .iter()
        .filter(|s| !reported.contains(s))
        .cloned()
        .collect();

    if residual.is_empty() {
        return AlertDecision::Suppress(SuppressReason::AlreadyReported);
    }

    let message = compose_message(event_name, &residual);
    AlertDecision::Send {
        message,
        sectors: residual,
    }
}

/// Recipient-facing SMS body enumerating the newly available sectors.
pub fn compose_message(event_name: &str, sectors: &BTreeSet<String>) -> String {
    let list = sectors
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    format!("{event_name}: nuevas localidades disponibles: {list}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn change(new: &[&str], removed: &[&str]) -> ChangeResult {
        ChangeResult {
            has_changes: !new.is_empty() || !removed.is_empty(),
            new_sectors: set(new),
            removed_sectors: set(removed),
            previous_count: removed.len(),
            current_count: new.len(),
        }
    }

    fn record(sectors: &[&str]) -> AlertRecord {
        AlertRecord {
            event_id: "pq23".into(),
            sent_at: Utc::now(),
            sectors: set(sectors),
            recipient_count: 2,
        }
    }

    #[test]
    fn no_changes_suppresses() {
        let d = evaluate("PQ23", &change(&[], &[]), &[]);
        assert_eq!(d, AlertDecision::Suppress(SuppressReason::NoChanges));
    }

    #[test]
    fn removals_alone_always_suppress() {
        let d = evaluate("PQ23", &change(&[], &["x"]), &[]);
        assert_eq!(d, AlertDecision::Suppress(SuppressReason::RemovalsOnly));
    }

    #[test]
    fn fresh_sectors_approve_send_with_enumerated_message() {
        match evaluate("PQ23", &change(&["201", "105"], &[]), &[]) {
            AlertDecision::Send { message, sectors } => {
                assert_eq!(sectors, set(&["105", "201"]));
                assert!(message.contains("105, 201"), "message: {message}");
                assert!(message.contains("PQ23"));
            }
            other => panic!("expected Send, got {other:?}"),
        }
    }

    #[test]
    fn identical_change_twice_does_not_send_twice() {
        let c = change(&["105"], &[]);
        let first = evaluate("PQ23", &c, &[]);
        let AlertDecision::Send { sectors, .. } = first else {
            panic!("first evaluation should send");
        };
        // Scheduler appends the residual; the same change re-evaluated
        // against the updated history must stay quiet.
        let history = vec![AlertRecord {
            event_id: "pq23".into(),
            sent_at: Utc::now(),
            sectors,
            recipient_count: 1,
        }];
        let second = evaluate("PQ23", &c, &history);
        assert_eq!(
            second,
            AlertDecision::Suppress(SuppressReason::AlreadyReported)
        );
    }

    #[test]
    fn residual_excludes_only_previously_reported_sectors() {
        let history = vec![record(&["105"])];
        match evaluate("PQ23", &change(&["105", "301"], &[]), &history) {
            AlertDecision::Send { sectors, .. } => assert_eq!(sectors, set(&["301"])),
            other => panic!("expected Send, got {other:?}"),
        }
    }

    #[test]
    fn union_of_all_history_records_counts() {
        let history = vec![record(&["105"]), record(&["301"])];
        let d = evaluate("PQ23", &change(&["105", "301"], &[]), &history);
        assert_eq!(d, AlertDecision::Suppress(SuppressReason::AlreadyReported));
    }
}
