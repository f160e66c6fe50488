// src/config.rs
//! Environment-driven settings plus the static monitored-event list.
//!
//! Events load from `$EVENTS_CONFIG_PATH`, falling back to
//! `config/events.toml` then `config/events.json`. An empty event list is the
//! one unrecoverable startup error; everything at runtime is survivable.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::monitor::types::MonitoredEvent;

const ENV_EVENTS_PATH: &str = "EVENTS_CONFIG_PATH";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Inclusive bounds for the jittered inter-cycle sleep, in seconds.
    pub poll_interval_min: u64,
    pub poll_interval_max: u64,
    pub fetch_timeout: Duration,
    /// First observation of an event: alert on everything currently
    /// available, or silently seed the baseline (default).
    pub alert_on_first_seen: bool,
    pub render_api_url: String,
    pub state_dir: PathBuf,
    pub default_country_code: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            poll_interval_min: 90,
            poll_interval_max: 150,
            fetch_timeout: Duration::from_secs(30),
            alert_on_first_seen: false,
            render_api_url: "http://127.0.0.1:8700/render".to_string(),
            state_dir: PathBuf::from("state"),
            default_country_code: "+57".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        let mut min = env_u64("POLL_INTERVAL_MIN", d.poll_interval_min);
        let mut max = env_u64("POLL_INTERVAL_MAX", d.poll_interval_max);
        if min > max {
            tracing::warn!(min, max, "poll interval bounds inverted, swapping");
            std::mem::swap(&mut min, &mut max);
        }
        Self {
            poll_interval_min: min,
            poll_interval_max: max,
            fetch_timeout: Duration::from_secs(env_u64(
                "FETCH_TIMEOUT_SECS",
                d.fetch_timeout.as_secs(),
            )),
            alert_on_first_seen: std::env::var("ALERT_ON_FIRST_SEEN")
                .ok()
                .is_some_and(|v| v == "1"),
            render_api_url: std::env::var("RENDER_API_URL").unwrap_or(d.render_api_url),
            state_dir: std::env::var("STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.state_dir),
            default_country_code: std::env::var("DEFAULT_COUNTRY_CODE")
                .unwrap_or(d.default_country_code),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Load events from an explicit path. Supports TOML or JSON.
pub fn load_events_from(path: &Path) -> Result<Vec<MonitoredEvent>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading events config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_events(&content, ext.as_str())
}

/// Load events using env var + fallbacks:
/// 1) $EVENTS_CONFIG_PATH
/// 2) config/events.toml
/// 3) config/events.json
pub fn load_events_default() -> Result<Vec<MonitoredEvent>> {
    if let Ok(p) = std::env::var(ENV_EVENTS_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_events_from(&pb);
        }
        return Err(anyhow!("EVENTS_CONFIG_PATH points to non-existent path"));
    }
    let toml_p = PathBuf::from("config/events.toml");
    if toml_p.exists() {
        return load_events_from(&toml_p);
    }
    let json_p = PathBuf::from("config/events.json");
    if json_p.exists() {
        return load_events_from(&json_p);
    }
    Err(anyhow!("no monitored events configured"))
}

fn parse_events(s: &str, hint_ext: &str) -> Result<Vec<MonitoredEvent>> {
    let try_toml = hint_ext == "toml" || s.contains("[[events]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return validate(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return validate(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return validate(v);
        }
    }
    Err(anyhow!("unsupported events config format"))
}

fn parse_toml(s: &str) -> Result<Vec<MonitoredEvent>> {
    #[derive(serde::Deserialize)]
    struct TomlEvents {
        events: Vec<MonitoredEvent>,
    }
    let v: TomlEvents = toml::from_str(s)?;
    Ok(v.events)
}

fn parse_json(s: &str) -> Result<Vec<MonitoredEvent>> {
    Ok(serde_json::from_str(s)?)
}

fn validate(events: Vec<MonitoredEvent>) -> Result<Vec<MonitoredEvent>> {
    use std::collections::BTreeSet;
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(events.len());
    for ev in events {
        if ev.id.trim().is_empty() || ev.url.trim().is_empty() {
            return Err(anyhow!("event entries need a non-empty id and url"));
        }
        if !seen.insert(ev.id.clone()) {
            return Err(anyhow!("duplicate event id {:?}", ev.id));
        }
        out.push(ev);
    }
    if out.is_empty() {
        return Err(anyhow!("no monitored events configured"));
    }
    Ok(out)
}
