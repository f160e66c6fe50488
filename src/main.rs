//! Sector Watch — Binary Entrypoint
//! Boots the Axum HTTP surface and spawns the background polling loop.
//!
//! See `README.md` for quickstart.

use std::sync::Arc;

use shuttle_axum::ShuttleAxum;
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sector_watch::api::{self, AppState};
use sector_watch::config::{self, AppConfig};
use sector_watch::metrics::Metrics;
use sector_watch::monitor::fetch::RenderServiceFetcher;
use sector_watch::monitor::scheduler::{Monitor, SchedulerCfg};
use sector_watch::monitor::MonitorStats;
use sector_watch::notify::sms::SmsTransport;
use sector_watch::notify::AlertTransport;
use sector_watch::recipients::RecipientRegistry;
use sector_watch::store::JsonFileStore;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sector_watch=info,warn"));
    // try_init: the hosting runtime may have installed a subscriber already.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::from_env();
    // Zero configured events is the one unrecoverable startup error.
    let events = config::load_events_default().expect("monitored events config");

    let metrics = Metrics::init(cfg.poll_interval_min, cfg.poll_interval_max);

    let store = Arc::new(JsonFileStore::new(&cfg.state_dir));
    let registry = Arc::new(
        RecipientRegistry::load(
            cfg.state_dir.join("recipients.json"),
            &cfg.default_country_code,
        )
        .await,
    );
    let fetcher = Arc::new(RenderServiceFetcher::new(
        cfg.render_api_url.clone(),
        cfg.fetch_timeout,
    ));
    let transport = Arc::new(SmsTransport::from_env());
    let stats = Arc::new(MonitorStats::default());

    let monitor = Arc::new(Monitor::new(
        SchedulerCfg {
            poll_interval_min: cfg.poll_interval_min,
            poll_interval_max: cfg.poll_interval_max,
            alert_on_first_seen: cfg.alert_on_first_seen,
        },
        events,
        fetcher,
        store.clone(),
        registry.clone(),
        transport.clone(),
        stats.clone(),
    ));

    // Background polling loop with cooperative shutdown, honored between
    // cycles (an in-flight fetch completes or times out first).
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn({
        let monitor = monitor.clone();
        async move { monitor.run(shutdown_rx).await }
    });
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let sms_configured = transport.is_configured();
    let state = AppState {
        monitor,
        registry,
        store,
        stats,
        sms_configured,
    };
    let router = api::create_router(state).merge(metrics.router());

    Ok(router.into())
}
