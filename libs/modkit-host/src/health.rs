//! Module health as seen by the host.

use serde::Serialize;
use tokio::sync::watch;

/// Serving status published by a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Unknown,
    Serving,
    NotServing,
}

impl HealthStatus {
    #[must_use]
    pub fn is_serving(self) -> bool {
        matches!(self, Self::Serving)
    }
}

/// Sink for a module's health. The host decides what to do with it
/// (the local host exposes it on `/health`).
pub trait HealthReporter: Send + Sync {
    fn set_health(&self, status: HealthStatus);
    fn health(&self) -> HealthStatus;
}

/// Watch-backed health cell.
pub struct HealthState {
    tx: watch::Sender<HealthStatus>,
}

impl HealthState {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(HealthStatus::Unknown);
        Self { tx }
    }

    /// Receiver notified on every status change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<HealthStatus> {
        self.tx.subscribe()
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthReporter for HealthState {
    fn set_health(&self, status: HealthStatus) {
        let previous = self.tx.send_replace(status);
        if previous != status {
            tracing::info!(?previous, current = ?status, "health status changed");
        }
    }

    fn health(&self) -> HealthStatus {
        *self.tx.borrow()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn starts_unknown() {
        let state = HealthState::new();
        assert_eq!(state.health(), HealthStatus::Unknown);
        assert!(!state.health().is_serving());
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let state = HealthState::new();
        let mut rx = state.subscribe();

        state.set_health(HealthStatus::Serving);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), HealthStatus::Serving);

        state.set_health(HealthStatus::NotServing);
        assert_eq!(state.health(), HealthStatus::NotServing);
    }

    #[test]
    fn serializes_like_grpc_health() {
        let json = serde_json::to_string(&HealthStatus::NotServing).unwrap();
        assert_eq!(json, "\"NOT_SERVING\"");
    }
}
