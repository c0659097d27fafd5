use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and pre-register the monitor's metrics.
/// Returns a `PrometheusHandle` whose `render()` produces the scrape payload.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    // Pre-register so they appear before the first increment.
    counter!("cycles_completed_total").absolute(0);
    counter!("records_skipped_total").absolute(0);
    counter!("state_persist_failures_total").absolute(0);
    counter!("alert_delivery_failures_total").absolute(0);

    gauge!("tracked_accounts").set(0.0);
    gauge!("markets_cached").set(0.0);

    histogram!("cycle_duration_seconds").record(0.0);

    Ok(handle)
}
