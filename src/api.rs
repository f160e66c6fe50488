use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::errors::RegistrationError;
use crate::monitor::scheduler::Monitor;
use crate::monitor::types::ChangeResult;
use crate::monitor::MonitorStats;
use crate::recipients::RecipientRegistry;
use crate::store::MonitorStore;

#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<Monitor>,
    pub registry: Arc<RecipientRegistry>,
    pub store: Arc<dyn MonitorStore>,
    pub stats: Arc<MonitorStats>,
    pub sms_configured: bool,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status))
        .route("/stats", get(stats))
        .route("/register", post(register))
        .route("/unregister", post(unregister))
        .route("/admin/run-once", post(run_once))
        .route("/admin/simulate", post(simulate))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
struct EventStatus {
    event_id: String,
    name: String,
    url: String,
    sectors_available: Option<usize>,
    sectors: Vec<String>,
    observed_at: Option<DateTime<Utc>>,
    last_alert: Option<LastAlert>,
}

#[derive(serde::Serialize)]
struct LastAlert {
    sent_at: DateTime<Utc>,
    sectors: Vec<String>,
    recipient_count: usize,
}

/// Per-event snapshot summary + most recent alert. Store trouble degrades to
/// nulls instead of failing the whole page.
async fn status(State(state): State<AppState>) -> Json<Vec<EventStatus>> {
    let mut out = Vec::new();
    for event in state.monitor.events() {
        let snapshot = match state.store.latest_snapshot(&event.id).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(event = %event.id, error = %e, "status: snapshot read failed");
                None
            }
        };
        let last_alert = match state.store.alerts_for(&event.id).await {
            Ok(history) => history.into_iter().last().map(|r| LastAlert {
                sent_at: r.sent_at,
                sectors: r.sectors.into_iter().collect(),
                recipient_count: r.recipient_count,
            }),
            Err(e) => {
                tracing::warn!(event = %event.id, error = %e, "status: alert read failed");
                None
            }
        };
        let (sectors_available, sectors, observed_at) = match snapshot {
            Some(s) => (
                Some(s.sectors.len()),
                s.sectors.into_iter().collect(),
                Some(s.observed_at),
            ),
            None => (None, Vec::new(), None),
        };
        out.push(EventStatus {
            event_id: event.id.clone(),
            name: event.name.clone(),
            url: event.url.clone(),
            sectors_available,
            sectors,
            observed_at,
            last_alert,
        });
    }
    Json(out)
}

#[derive(serde::Serialize)]
struct StatsOut {
    active_recipients: usize,
    cycles_total: u64,
    snapshots_stored_total: u64,
    alerts_sent_total: u64,
    sms_sent_total: u64,
    sms_failures_total: u64,
    sms_configured: bool,
}

async fn stats(State(state): State<AppState>) -> Json<StatsOut> {
    Json(StatsOut {
        active_recipients: state.registry.active_count(),
        cycles_total: state.stats.cycles_total.load(Ordering::Relaxed),
        snapshots_stored_total: state.stats.snapshots_stored.load(Ordering::Relaxed),
        alerts_sent_total: state.stats.alerts_sent.load(Ordering::Relaxed),
        sms_sent_total: state.stats.sms_sent.load(Ordering::Relaxed),
        sms_failures_total: state.stats.sms_failed.load(Ordering::Relaxed),
        sms_configured: state.sms_configured,
    })
}

#[derive(serde::Deserialize)]
struct PhoneReq {
    phone: String,
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<PhoneReq>,
) -> impl IntoResponse {
    match state.registry.register(&body.phone).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": format!("{outcome:?}"),
            })),
        ),
        Err(e) => registration_error(e),
    }
}

async fn unregister(
    State(state): State<AppState>,
    Json(body): Json<PhoneReq>,
) -> impl IntoResponse {
    match state.registry.unregister(&body.phone).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "success": true, "message": "unregistered" })),
        ),
        Err(e) => registration_error(e),
    }
}

fn registration_error(e: RegistrationError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match &e {
        RegistrationError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        RegistrationError::NotFound => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_REQUEST,
    };
    (status, Json(json!({ "success": false, "error": e.to_string() })))
}

/// Manual trigger: exactly one cycle through the identical per-cycle logic,
/// no sleep.
async fn run_once(State(state): State<AppState>) -> impl IntoResponse {
    let summary = state.monitor.run_cycle().await;
    Json(summary)
}

#[derive(serde::Deserialize)]
struct SimulateReq {
    event_id: String,
    #[serde(default)]
    new_sectors: Vec<String>,
    #[serde(default)]
    removed_sectors: Vec<String>,
}

/// Inject a synthetic change to exercise the dedup + transport path without
/// a fetch.
async fn simulate(
    State(state): State<AppState>,
    Json(body): Json<SimulateReq>,
) -> impl IntoResponse {
    let change = ChangeResult {
        has_changes: !body.new_sectors.is_empty() || !body.removed_sectors.is_empty(),
        previous_count: body.removed_sectors.len(),
        current_count: body.new_sectors.len(),
        new_sectors: body.new_sectors.into_iter().collect(),
        removed_sectors: body.removed_sectors.into_iter().collect(),
    };
    match state.monitor.simulate(&body.event_id, &change).await {
        Ok(report) => (StatusCode::OK, Json(json!(report))),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": e.to_string() })),
        ),
    }
}
