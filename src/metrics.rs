use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("monitor_cycles_total", "Monitoring cycles started.");
        describe_counter!(
            "monitor_sources_checked_total",
            "Sources checked across all cycles."
        );
        describe_counter!("monitor_changes_found_total", "Material changes recorded.");
        describe_counter!("monitor_fetch_errors_total", "Source fetches that failed.");
        describe_counter!(
            "monitor_notifications_sent_total",
            "Change digests dispatched."
        );
        describe_counter!(
            "monitor_notify_failures_total",
            "Digest dispatches that failed."
        );
        describe_counter!("scheduler_runs_total", "Scheduler-initiated cycles.");
        describe_gauge!(
            "monitor_last_cycle_ts",
            "Unix ts when the last cycle started."
        );
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize the Prometheus recorder. Call once, from the binary.
    pub fn init() -> Self {
        let builder = PrometheusBuilder::new();
        let handle = builder
            .install_recorder()
            .expect("prometheus: install recorder");

        ensure_metrics_described();

        Self { handle }
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
