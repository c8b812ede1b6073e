//! Policy Change Monitor — Binary Entrypoint
//! Boots the Axum HTTP server, the daily scheduler, and wires the
//! fetch/detect/record/notify pipeline behind them.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use policy_change_monitor::api::{self, AppState};
use policy_change_monitor::config::AppConfig;
use policy_change_monitor::fetch::{ContentFetcher, HttpFetcher};
use policy_change_monitor::metrics::Metrics;
use policy_change_monitor::monitor::Monitor;
use policy_change_monitor::notify::email::EmailTransport;
use policy_change_monitor::notify::{NotificationTransport, Notifier};
use policy_change_monitor::rules::SeverityRules;
use policy_change_monitor::scheduler::Scheduler;
use policy_change_monitor::store::{ChangeStore, MemoryStore, RecipientStore, SourceStore};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("policy_change_monitor=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::from_env();
    let rules = match SeverityRules::load_default() {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "severity rules load failed, using built-in seed");
            SeverityRules::default_seed()
        }
    };

    let store = Arc::new(MemoryStore::new());
    let fetcher: Arc<dyn ContentFetcher> =
        Arc::new(HttpFetcher::new(Duration::from_secs(cfg.fetch_timeout_secs)));
    let transport: Arc<dyn NotificationTransport> = Arc::new(EmailTransport::from_env());

    let monitor = Arc::new(Monitor::new(
        fetcher,
        store.clone() as Arc<dyn SourceStore>,
        store.clone() as Arc<dyn ChangeStore>,
        store.clone() as Arc<dyn RecipientStore>,
        Notifier::new(transport.clone()),
        rules,
        cfg.max_concurrency,
    ));

    let metrics = Metrics::init();

    let mut scheduler = Scheduler::new();
    if cfg.schedule_enabled {
        scheduler.start(monitor.clone(), cfg.schedule_hour_utc);
    }

    let state = AppState {
        store,
        monitor,
        transport,
    };
    let app = api::create_router(state).merge(metrics.router());

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!(%addr, schedule_enabled = cfg.schedule_enabled, "policy-change-monitor listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    scheduler.stop();
    Ok(())
}
