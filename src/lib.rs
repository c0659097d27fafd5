pub mod api;
pub mod chain;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod services;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::services::notifier::Notifier;

/// Shared state of the health/metrics HTTP surface.
#[derive(Clone)]
pub struct AppState {
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
    pub notifier: Arc<Notifier>,
    /// Cleared while the state store cannot persist.
    pub persistence_ok: Arc<AtomicBool>,
}
