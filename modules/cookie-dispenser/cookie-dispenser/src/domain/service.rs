use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};

use super::error::DomainError;
use super::metrics::CookieMetrics;
use super::repo::ReceiptRepository;
use super::state::ModuleState;

/// Transport a call arrived through. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Grpc,
    Rest,
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Grpc => "grpc",
            Self::Rest => "rest",
        })
    }
}

/// Quota before and after a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetOutcome {
    pub previous: u32,
    pub current: u32,
}

/// Dispense policy shared by the gRPC server and both route groups.
pub struct Service {
    state: Arc<ModuleState>,
    repo: Arc<dyn ReceiptRepository>,
    metrics: Arc<dyn CookieMetrics>,
    // Serializes read-then-publish of `cookies_left`, so the last publish always
    // carries the quota as of the last take or reset.
    gauge: Mutex<()>,
}

impl Service {
    #[must_use]
    pub fn new(
        state: Arc<ModuleState>,
        repo: Arc<dyn ReceiptRepository>,
        metrics: Arc<dyn CookieMetrics>,
    ) -> Self {
        Self {
            state,
            repo,
            metrics,
            gauge: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn state(&self) -> &Arc<ModuleState> {
        &self.state
    }

    /// Hand out one cookie to `name`.
    ///
    /// Every call counts as a request and refreshes the `cookies_left` gauge,
    /// whatever the outcome.
    ///
    /// # Errors
    /// - [`DomainError::Exhausted`] when the quota was already 0
    /// - [`DomainError::Rejected`] when `name` is blocked; the unit is still consumed
    /// - [`DomainError::Persistence`] when the receipt could not be stored
    #[instrument(skip(self, surface), fields(surface = %surface))]
    pub async fn consume(&self, name: &str, surface: Surface) -> Result<String, DomainError> {
        let taken = self.state.try_take();
        self.metrics.record_request();
        self.publish_cookies_left();

        if !self.state.config().active {
            warn!("dispensing while the module is not active");
        }

        let Some(remaining) = taken else {
            info!("cookie quota exhausted");
            return Err(DomainError::Exhausted);
        };

        if self.state.is_blocked(name) {
            error!(remaining, "refusing cookie to blocked name");
            return Err(DomainError::rejected(name));
        }

        let receipt = self
            .repo
            .record(name)
            .await
            .map_err(DomainError::Persistence)?;
        debug!(receipt_id = %receipt.id, remaining, "cookie dispensed");

        Ok(format!("Hey there {name}, have a cookie."))
    }

    /// Overwrite the quota with `new_quota`, or the configured default when `None`.
    #[instrument(skip(self, surface), fields(surface = %surface))]
    pub fn reset(&self, new_quota: Option<u32>, surface: Surface) -> ResetOutcome {
        let current = new_quota.unwrap_or_else(|| self.state.config().default_quota);
        let previous = self.state.set_quota(current);
        self.publish_cookies_left();
        info!(previous, current, "cookie quota reset");
        ResetOutcome { previous, current }
    }

    /// Set the initial quota from configuration. Returns the quota it replaced.
    #[must_use]
    pub fn seed_quota(&self, quota: u32) -> u32 {
        let previous = self.state.set_quota(quota);
        self.publish_cookies_left();
        previous
    }

    /// Seed the metrics from persisted receipts and the current quota.
    ///
    /// # Errors
    /// Returns [`DomainError::Persistence`] if the receipts cannot be counted.
    pub async fn initialize_metrics(&self) -> Result<(), DomainError> {
        let served = self.repo.count().await.map_err(DomainError::Persistence)?;
        self.metrics.record_requests(served);
        self.publish_cookies_left();
        info!(served, "cookie metrics initialized");
        Ok(())
    }

    fn publish_cookies_left(&self) {
        let _guard = self.gauge.lock();
        self.metrics.set_cookies_left(self.state.remaining());
    }
}
