// src/store.rs
//! Durable state behind a narrow contract: the latest snapshot per event and
//! the append-only alert history. The scheduler is the only writer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::fs;

use crate::errors::StoreError;
use crate::monitor::types::{AlertRecord, Snapshot};

#[async_trait]
pub trait MonitorStore: Send + Sync {
    async fn latest_snapshot(&self, event_id: &str) -> Result<Option<Snapshot>, StoreError>;
    async fn put_snapshot(&self, snapshot: &Snapshot) -> Result<(), StoreError>;
    async fn append_alert(&self, record: &AlertRecord) -> Result<(), StoreError>;
    /// Alert history for one event, oldest first.
    async fn alerts_for(&self, event_id: &str) -> Result<Vec<AlertRecord>, StoreError>;
}

/// JSON files under a state directory:
/// `snapshots/<event>.json` holds the latest snapshot (replaced wholesale),
/// `alerts/<event>.json` holds the append-only history. Writes go through a
/// temp file + rename so a crash mid-write cannot leave a torn snapshot.
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn snapshot_path(&self, event_id: &str) -> PathBuf {
        self.root.join("snapshots").join(file_name(event_id))
    }

    fn alerts_path(&self, event_id: &str) -> PathBuf {
        self.root.join("alerts").join(file_name(event_id))
    }

    async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let parent = path.parent().expect("store paths always have a parent");
        fs::create_dir_all(parent).await?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        path: &Path,
    ) -> Result<Option<T>, StoreError> {
        match fs::read_to_string(path).await {
            Ok(s) => Ok(Some(serde_json::from_str(&s)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Event ids come from our own config, but keep the file name tame anyway.
fn file_name(event_id: &str) -> String {
    let safe: String = event_id
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{safe}.json")
}

#[async_trait]
impl MonitorStore for JsonFileStore {
    async fn latest_snapshot(&self, event_id: &str) -> Result<Option<Snapshot>, StoreError> {
        Self::read_json(&self.snapshot_path(event_id)).await
    }

    async fn put_snapshot(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        Self::write_atomic(&self.snapshot_path(&snapshot.event_id), &bytes).await
    }

    async fn append_alert(&self, record: &AlertRecord) -> Result<(), StoreError> {
        let path = self.alerts_path(&record.event_id);
        let mut history: Vec<AlertRecord> = Self::read_json(&path).await?.unwrap_or_default();
        history.push(record.clone());
        let bytes = serde_json::to_vec_pretty(&history)?;
        Self::write_atomic(&path, &bytes).await
    }

    async fn alerts_for(&self, event_id: &str) -> Result<Vec<AlertRecord>, StoreError> {
        Ok(Self::read_json(&self.alerts_path(event_id))
            .await?
            .unwrap_or_default())
    }
}

/// In-memory store for tests, the simulate path and diagnostics.
#[derive(Default)]
pub struct MemoryStore {
    snapshots: Mutex<HashMap<String, Snapshot>>,
    alerts: Mutex<Vec<AlertRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MonitorStore for MemoryStore {
    async fn latest_snapshot(&self, event_id: &str) -> Result<Option<Snapshot>, StoreError> {
        Ok(self
            .snapshots
            .lock()
            .expect("memory store mutex poisoned")
            .get(event_id)
            .cloned())
    }

    async fn put_snapshot(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        self.snapshots
            .lock()
            .expect("memory store mutex poisoned")
            .insert(snapshot.event_id.clone(), snapshot.clone());
        Ok(())
    }

    async fn append_alert(&self, record: &AlertRecord) -> Result<(), StoreError> {
        self.alerts
            .lock()
            .expect("memory store mutex poisoned")
            .push(record.clone());
        Ok(())
    }

    async fn alerts_for(&self, event_id: &str) -> Result<Vec<AlertRecord>, StoreError> {
        Ok(self
            .alerts
            .lock()
            .expect("memory store mutex poisoned")
            .iter()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn snapshot(event_id: &str, ids: &[&str]) -> Snapshot {
        Snapshot {
            event_id: event_id.into(),
            sectors: ids.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            observed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn file_store_roundtrips_latest_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        assert!(store.latest_snapshot("pq23").await.unwrap().is_none());

        store.put_snapshot(&snapshot("pq23", &["a", "b"])).await.unwrap();
        let got = store.latest_snapshot("pq23").await.unwrap().unwrap();
        assert_eq!(got.sectors.len(), 2);

        // Replaced wholesale, not merged.
        store.put_snapshot(&snapshot("pq23", &["c"])).await.unwrap();
        let got = store.latest_snapshot("pq23").await.unwrap().unwrap();
        assert_eq!(got.sectors.len(), 1);
        assert!(got.sectors.contains("c"));
    }

    #[tokio::test]
    async fn file_store_appends_alert_history_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        for ids in [&["a"][..], &["b"][..]] {
            store
                .append_alert(&AlertRecord {
                    event_id: "pq23".into(),
                    sent_at: Utc::now(),
                    sectors: ids.iter().map(|s| s.to_string()).collect(),
                    recipient_count: 1,
                })
                .await
                .unwrap();
        }

        let history = store.alerts_for("pq23").await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].sectors.contains("a"));
        assert!(history[1].sectors.contains("b"));
        assert!(store.alerts_for("pq24").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_store_isolates_events() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        store.put_snapshot(&snapshot("pq23", &["a"])).await.unwrap();
        store.put_snapshot(&snapshot("pq24", &["z"])).await.unwrap();

        let s23 = store.latest_snapshot("pq23").await.unwrap().unwrap();
        let s24 = store.latest_snapshot("pq24").await.unwrap().unwrap();
        assert!(s23.sectors.contains("a"));
        assert!(s24.sectors.contains("z"));
    }
}
