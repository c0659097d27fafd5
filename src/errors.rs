use crate::chain::UpstreamError;
use crate::services::claim_analyzer::ComputeError;
use crate::services::state_store::PersistenceError;

/// Failures that surface at the monitor's account and market boundaries.
///
/// None of these abort a cycle: the monitor logs them with `kind()` and moves
/// on. Undecodable records and failed deliveries never get this far; the
/// decoder and the notifier count and log them where they happen.
/// `Persistence` is the one to watch, since lost state means repeated alerts
/// after a restart; it also flips `/health`.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("upstream fetch failed: {0}")]
    UpstreamFetch(#[from] UpstreamError),

    #[error("claim computation failed: {0}")]
    Compute(#[from] ComputeError),

    #[error("state persistence failed: {0}")]
    Persistence(#[from] PersistenceError),
}

impl MonitorError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            MonitorError::UpstreamFetch(_) => "upstream",
            MonitorError::Compute(_) => "compute",
            MonitorError::Persistence(_) => "persistence",
        }
    }
}
