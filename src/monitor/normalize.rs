// src/monitor/normalize.rs
//! Normalizes raw sector descriptors into the canonical set of available
//! sector ids.
//!
//! Each descriptor runs through an ordered chain of independent detection
//! rules (label text, class tokens, status code, color hints). Aggregation:
//! one `Unavailable` vote excludes the sector outright, otherwise at least
//! one `Available` vote is required. Descriptors with no recognizable signal
//! are dropped — ambiguity never counts as availability.

use std::collections::BTreeSet;

use crate::monitor::types::RawSector;

/// Label vocabulary observed on the sales pages (Spanish + English variants).
const AVAILABLE_LABELS: &[&str] = &["disponible", "available", "selectable", "enabled"];
const UNAVAILABLE_LABELS: &[&str] = &[
    "no disponible",
    "unavailable",
    "disabled",
    "sold out",
    "agotado",
];

const AVAILABLE_CLASS_TOKENS: &[&str] = &["available", "selectable", "enabled"];
const UNAVAILABLE_CLASS_TOKENS: &[&str] = &["unavailable", "disabled", "sold-out"];

const AVAILABLE_STATUS_CODES: &[&str] = &["available", "enabled", "selectable"];
const UNAVAILABLE_STATUS_CODES: &[&str] = &["unavailable", "disabled", "sold-out", "agotado"];

const AVAILABLE_COLOR_HINTS: &[&str] = &["blue", "#0066cc", "#007bff"];
const UNAVAILABLE_COLOR_HINTS: &[&str] = &["gray", "grey", "#cccccc", "#999999"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Available,
    Unavailable,
    Indeterminate,
}

type Rule = fn(&RawSector) -> Signal;

/// Detection rules in evaluation order. New strategies slot in here without
/// touching the existing ones.
const RULES: &[(&str, Rule)] = &[
    ("label", label_signal),
    ("class", class_signal),
    ("status", status_signal),
    ("color", color_signal),
];

/// Aggregate verdict across all rules. An explicit negative from any rule
/// beats any number of positives.
pub fn classify(sector: &RawSector) -> Signal {
    let mut available = false;
    for (_, rule) in RULES {
        match rule(sector) {
            Signal::Unavailable => return Signal::Unavailable,
            Signal::Available => available = true,
            Signal::Indeterminate => {}
        }
    }
    if available {
        Signal::Available
    } else {
        Signal::Indeterminate
    }
}

/// Canonical set of available sector ids for one fetch batch.
/// Pure and total: malformed descriptors are dropped, never an error.
pub fn normalize_sectors(raw: &[RawSector]) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for sector in raw {
        if classify(sector) != Signal::Available {
            continue;
        }
        if let Some(id) = extract_sector_id(sector) {
            out.insert(id);
        }
    }
    tracing::debug!(
        raw = raw.len(),
        available = out.len(),
        "normalized sector batch"
    );
    out
}

fn label_signal(sector: &RawSector) -> Signal {
    let Some(label) = sector.aria_label.as_deref() else {
        return Signal::Indeterminate;
    };
    // Labels come straight out of the DOM and may still carry entities.
    let label = html_escape::decode_html_entities(label).to_lowercase();
    if label.is_empty() {
        return Signal::Indeterminate;
    }
    // Negative vocabulary first: "no disponible" contains "disponible".
    if UNAVAILABLE_LABELS.iter().any(|w| label.contains(w)) {
        return Signal::Unavailable;
    }
    if AVAILABLE_LABELS.iter().any(|w| label.contains(w)) {
        return Signal::Available;
    }
    Signal::Indeterminate
}

fn class_signal(sector: &RawSector) -> Signal {
    let Some(classes) = sector.class_names.as_deref() else {
        return Signal::Indeterminate;
    };
    let mut available = false;
    for token in classes.split_whitespace() {
        let token = token.to_lowercase();
        if UNAVAILABLE_CLASS_TOKENS.contains(&token.as_str()) {
            return Signal::Unavailable;
        }
        if AVAILABLE_CLASS_TOKENS.contains(&token.as_str()) {
            available = true;
        }
    }
    if available {
        Signal::Available
    } else {
        Signal::Indeterminate
    }
}

fn status_signal(sector: &RawSector) -> Signal {
    let Some(status) = sector.data_status.as_deref() else {
        return Signal::Indeterminate;
    };
    let status = status.trim().to_lowercase();
    if UNAVAILABLE_STATUS_CODES.contains(&status.as_str()) {
        return Signal::Unavailable;
    }
    if AVAILABLE_STATUS_CODES.contains(&status.as_str()) {
        return Signal::Available;
    }
    Signal::Indeterminate
}

/// Weakest rule: venue maps color available blocks blue-ish and grey out the
/// rest. Only consulted when nothing stronger matched.
fn color_signal(sector: &RawSector) -> Signal {
    let mut haystack = String::new();
    if let Some(style) = sector.style.as_deref() {
        haystack.push_str(&style.to_lowercase());
    }
    if let Some(fill) = sector.fill.as_deref() {
        haystack.push(' ');
        haystack.push_str(&fill.to_lowercase());
    }
    if haystack.trim().is_empty() {
        return Signal::Indeterminate;
    }
    if UNAVAILABLE_COLOR_HINTS.iter().any(|c| haystack.contains(c)) {
        return Signal::Unavailable;
    }
    if AVAILABLE_COLOR_HINTS.iter().any(|c| haystack.contains(c)) {
        return Signal::Available;
    }
    Signal::Indeterminate
}

/// Stable identifier for a sector, preferring explicit ids over derived text.
pub fn extract_sector_id(sector: &RawSector) -> Option<String> {
    let candidates = [
        sector.id.as_deref(),
        sector.data_sector_id.as_deref(),
        sector.data_section.as_deref(),
        sector.aria_label.as_deref(),
        sector.title.as_deref(),
        sector.text_content.as_deref(),
    ];
    let raw = candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())?;
    clean_sector_id(raw)
}

fn clean_sector_id(raw: &str) -> Option<String> {
    static RE_PUNCT: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_punct = RE_PUNCT.get_or_init(|| regex::Regex::new(r"[^\w\s-]").unwrap());
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());

    let cleaned = re_punct.replace_all(raw, "");
    let cleaned = re_ws.replace_all(cleaned.trim(), "_").to_lowercase();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}
