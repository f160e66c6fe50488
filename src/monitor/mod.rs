// src/monitor/mod.rs
pub mod diff;
pub mod fetch;
pub mod normalize;
pub mod scheduler;
pub mod types;

use std::sync::atomic::AtomicU64;

use metrics::{describe_counter, describe_gauge};
use once_cell::sync::OnceCell;

/// Cross-cutting counters shared between the scheduler and the HTTP surface.
/// The only shared mutable state outside the store; updated atomically.
#[derive(Debug, Default)]
pub struct MonitorStats {
    pub cycles_total: AtomicU64,
    pub snapshots_stored: AtomicU64,
    pub alerts_sent: AtomicU64,
    pub sms_sent: AtomicU64,
    pub sms_failed: AtomicU64,
}

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("monitor_cycles_total", "Completed polling cycles.");
        describe_counter!(
            "monitor_event_failures_total",
            "Per-event cycle failures (fetch or store); skipped, never fatal."
        );
        describe_counter!("snapshots_stored_total", "Snapshots persisted to the store.");
        describe_counter!(
            "alerts_sent_total",
            "Alert dispatches approved by the deduplicator."
        );
        describe_counter!("sms_sent_total", "Individual SMS deliveries handed to the carrier.");
        describe_counter!("sms_failures_total", "Individual SMS sends that failed.");
        describe_gauge!(
            "monitor_last_cycle_ts",
            "Unix ts when the last polling cycle finished."
        );
    });
}
