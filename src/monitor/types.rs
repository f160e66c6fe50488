// src/monitor/types.rs
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

/// One watched sales page. Loaded from static config at startup,
/// never mutated afterwards.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct MonitoredEvent {
    pub id: String,
    pub url: String,
    pub name: String,
}

/// Raw per-sector signal as extracted from the rendered page DOM.
/// Every field is optional; the render service sends whatever attributes
/// the element happened to carry.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RawSector {
    pub id: Option<String>,
    pub aria_label: Option<String>,
    pub class_names: Option<String>,
    pub data_section: Option<String>,
    pub data_sector_id: Option<String>,
    pub data_status: Option<String>,
    pub title: Option<String>,
    pub style: Option<String>,
    pub fill: Option<String>,
    pub text_content: Option<String>,
}

/// Canonical availability state of one event at one observation time.
/// The latest snapshot per event is durable; it is replaced wholesale on
/// every successful cycle, never merged.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    pub event_id: String,
    pub sectors: BTreeSet<String>,
    pub observed_at: DateTime<Utc>,
}

/// Set difference between two consecutive snapshots. Derived fresh each
/// cycle, never persisted.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct ChangeResult {
    pub has_changes: bool,
    pub new_sectors: BTreeSet<String>,
    pub removed_sectors: BTreeSet<String>,
    pub previous_count: usize,
    pub current_count: usize,
}

/// Append-only record of one approved alert. `sectors` holds exactly the
/// residual set that was reported, which is what keeps repeated polls of a
/// stable state from re-alerting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct AlertRecord {
    pub event_id: String,
    pub sent_at: DateTime<Utc>,
    pub sectors: BTreeSet<String>,
    pub recipient_count: usize,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Recipient {
    pub phone: String,
    pub registered_at: DateTime<Utc>,
    pub active: bool,
}
