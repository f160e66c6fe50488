// src/monitor/scheduler.rs
//! The polling loop: fetch → normalize → compare → decide → dispatch →
//! persist, per event, with per-event failure isolation and a jittered sleep
//! between cycles.

use std::collections::BTreeSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Utc;
use metrics::{counter, gauge};
use rand::Rng;
use tokio::sync::watch;

use crate::dedup::{self, AlertDecision};
use crate::monitor::fetch::PageFetcher;
use crate::monitor::types::{AlertRecord, ChangeResult, MonitoredEvent, Recipient, Snapshot};
use crate::monitor::{diff, ensure_metrics_described, normalize, MonitorStats};
use crate::notify::AlertTransport;
use crate::recipients::RecipientSource;
use crate::store::MonitorStore;

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub poll_interval_min: u64,
    pub poll_interval_max: u64,
    /// Alert on the first ever observation of an event, or seed the baseline
    /// silently (the default).
    pub alert_on_first_seen: bool,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct EventReport {
    pub event_id: String,
    pub sectors_found: usize,
    pub first_observation: bool,
    pub has_changes: bool,
    pub new_sectors: Vec<String>,
    pub alert_sent: bool,
    pub recipients_attempted: usize,
    pub recipients_delivered: usize,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CycleSummary {
    pub checked: usize,
    pub failed: usize,
    pub alerts_sent: usize,
    pub reports: Vec<EventReport>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SimulateReport {
    pub event_id: String,
    pub sent: bool,
    pub suppressed: Option<String>,
    pub sectors: Vec<String>,
    pub recipients_attempted: usize,
    pub recipients_delivered: usize,
}

pub struct Monitor {
    cfg: SchedulerCfg,
    events: Vec<MonitoredEvent>,
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn MonitorStore>,
    recipients: Arc<dyn RecipientSource>,
    transport: Arc<dyn AlertTransport>,
    stats: Arc<MonitorStats>,
    /// Serializes the background loop against the manual trigger, so no two
    /// cycles for the same event ever overlap.
    cycle_lock: tokio::sync::Mutex<()>,
}

impl Monitor {
    pub fn new(
        cfg: SchedulerCfg,
        events: Vec<MonitoredEvent>,
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn MonitorStore>,
        recipients: Arc<dyn RecipientSource>,
        transport: Arc<dyn AlertTransport>,
        stats: Arc<MonitorStats>,
    ) -> Self {
        Self {
            cfg,
            events,
            fetcher,
            store,
            recipients,
            transport,
            stats,
            cycle_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn events(&self) -> &[MonitoredEvent] {
        &self.events
    }

    /// Drive the loop until the shutdown flag flips. The flag is honored
    /// between cycles, never mid-cycle.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            events = self.events.len(),
            min = self.cfg.poll_interval_min,
            max = self.cfg.poll_interval_max,
            "monitor loop starting"
        );
        loop {
            if *shutdown.borrow() {
                break;
            }
            let summary = self.run_cycle().await;
            tracing::info!(
                checked = summary.checked,
                failed = summary.failed,
                alerts = summary.alerts_sent,
                "cycle complete"
            );

            let secs = self.jittered_interval();
            tracing::debug!(sleep_secs = secs, "sleeping until next cycle");
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("monitor loop stopped");
    }

    /// Uniform draw from [min, max]; a fixed cadence would fingerprint the
    /// poller against the source.
    fn jittered_interval(&self) -> u64 {
        if self.cfg.poll_interval_min >= self.cfg.poll_interval_max {
            return self.cfg.poll_interval_min;
        }
        rand::rng().random_range(self.cfg.poll_interval_min..=self.cfg.poll_interval_max)
    }

    /// One full pass over all events. Also the manual-trigger entry point:
    /// identical per-cycle logic, no sleep.
    pub async fn run_cycle(&self) -> CycleSummary {
        let _guard = self.cycle_lock.lock().await;
        ensure_metrics_described();

        let mut summary = CycleSummary::default();
        for event in &self.events {
            match self.check_event(event).await {
                Ok(report) => {
                    summary.checked += 1;
                    if report.alert_sent {
                        summary.alerts_sent += 1;
                    }
                    summary.reports.push(report);
                }
                Err(e) => {
                    // Fetch/store trouble for one event never disturbs the
                    // others; its stored snapshot stays untouched.
                    summary.failed += 1;
                    counter!("monitor_event_failures_total").increment(1);
                    tracing::warn!(event = %event.id, "event cycle failed, skipping: {e:#}");
                }
            }
        }

        self.stats.cycles_total.fetch_add(1, Ordering::Relaxed);
        counter!("monitor_cycles_total").increment(1);
        gauge!("monitor_last_cycle_ts").set(Utc::now().timestamp() as f64);
        summary
    }

    async fn check_event(&self, event: &MonitoredEvent) -> Result<EventReport> {
        let raw = self.fetcher.fetch_sectors(event).await?;
        let current = normalize::normalize_sectors(&raw);

        let previous = self.store.latest_snapshot(&event.id).await?;
        let first_observation = previous.is_none();
        let previous_sectors = previous.map(|s| s.sectors).unwrap_or_default();

        let change = diff::detect_changes(&previous_sectors, &current);

        let mut report = EventReport {
            event_id: event.id.clone(),
            sectors_found: current.len(),
            first_observation,
            has_changes: change.has_changes,
            new_sectors: change.new_sectors.iter().cloned().collect(),
            alert_sent: false,
            recipients_attempted: 0,
            recipients_delivered: 0,
        };

        if first_observation && !self.cfg.alert_on_first_seen {
            tracing::info!(
                event = %event.id,
                sectors = current.len(),
                "first observation, seeding baseline silently"
            );
        } else {
            let history = self.store.alerts_for(&event.id).await?;
            match dedup::evaluate(&event.name, &change, &history) {
                AlertDecision::Suppress(reason) => {
                    tracing::debug!(event = %event.id, ?reason, "alert suppressed");
                }
                AlertDecision::Send { message, sectors } => {
                    let (attempted, delivered) = self.dispatch(&message).await;
                    report.alert_sent = true;
                    report.recipients_attempted = attempted;
                    report.recipients_delivered = delivered;

                    // The record means "reported", not "delivered": partial
                    // transport failure must not re-trigger this change on
                    // every following cycle.
                    self.record_alert(event, sectors, attempted).await;
                }
            }
        }

        let snapshot = Snapshot {
            event_id: event.id.clone(),
            sectors: current,
            observed_at: Utc::now(),
        };
        match self.store.put_snapshot(&snapshot).await {
            Ok(()) => {
                self.stats.snapshots_stored.fetch_add(1, Ordering::Relaxed);
                counter!("snapshots_stored_total").increment(1);
            }
            Err(e) => {
                counter!("monitor_event_failures_total").increment(1);
                tracing::error!(event = %event.id, error = %e, "failed to persist snapshot");
            }
        }

        Ok(report)
    }

    /// Send to every active recipient; one failure never aborts the rest.
    async fn dispatch(&self, message: &str) -> (usize, usize) {
        let active: Vec<Recipient> = self.recipients.list_active().await;
        if active.is_empty() {
            tracing::warn!("no active recipients registered for alerts");
            return (0, 0);
        }

        let mut delivered = 0usize;
        for recipient in &active {
            match self.transport.send(&recipient.phone, message).await {
                Ok(()) => {
                    delivered += 1;
                    self.stats.sms_sent.fetch_add(1, Ordering::Relaxed);
                    counter!("sms_sent_total").increment(1);
                }
                Err(e) => {
                    self.stats.sms_failed.fetch_add(1, Ordering::Relaxed);
                    counter!("sms_failures_total").increment(1);
                    tracing::error!(phone = %recipient.phone, error = %e, "sms send failed");
                }
            }
        }
        tracing::info!(
            attempted = active.len(),
            delivered,
            "alert dispatch finished"
        );
        (active.len(), delivered)
    }

    async fn record_alert(
        &self,
        event: &MonitoredEvent,
        sectors: BTreeSet<String>,
        recipient_count: usize,
    ) {
        self.stats.alerts_sent.fetch_add(1, Ordering::Relaxed);
        counter!("alerts_sent_total").increment(1);

        let record = AlertRecord {
            event_id: event.id.clone(),
            sent_at: Utc::now(),
            sectors,
            recipient_count,
        };
        if let Err(e) = self.store.append_alert(&record).await {
            counter!("monitor_event_failures_total").increment(1);
            tracing::error!(event = %event.id, error = %e, "failed to append alert record");
        }
    }

    /// Diagnostics: push a synthetic change through the deduplicator and
    /// transport without fetching. Snapshots are not touched.
    pub async fn simulate(&self, event_id: &str, change: &ChangeResult) -> Result<SimulateReport> {
        let _guard = self.cycle_lock.lock().await;
        let event = self
            .events
            .iter()
            .find(|e| e.id == event_id)
            .ok_or_else(|| anyhow!("unknown event id {event_id:?}"))?;

        let history = self.store.alerts_for(&event.id).await?;
        match dedup::evaluate(&event.name, change, &history) {
            AlertDecision::Suppress(reason) => Ok(SimulateReport {
                event_id: event.id.clone(),
                sent: false,
                suppressed: Some(format!("{reason:?}")),
                sectors: Vec::new(),
                recipients_attempted: 0,
                recipients_delivered: 0,
            }),
            AlertDecision::Send { message, sectors } => {
                let (attempted, delivered) = self.dispatch(&message).await;
                let listed: Vec<String> = sectors.iter().cloned().collect();
                self.record_alert(event, sectors, attempted).await;
                Ok(SimulateReport {
                    event_id: event.id.clone(),
                    sent: true,
                    suppressed: None,
                    sectors: listed,
                    recipients_attempted: attempted,
                    recipients_delivered: delivered,
                })
            }
        }
    }
}
