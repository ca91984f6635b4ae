use anyhow::Context;
use prometheus::{IntCounter, IntGauge, Registry};

use crate::domain::metrics::CookieMetrics;

/// Prometheus-backed [`CookieMetrics`].
#[derive(Clone)]
pub struct PrometheusCookieMetrics {
    requests_total: IntCounter,
    cookies_left: IntGauge,
}

impl PrometheusCookieMetrics {
    /// Create both metrics and register them with `registry`.
    ///
    /// # Errors
    /// Returns an error if a metric with the same name is already registered.
    pub fn register(registry: &Registry) -> anyhow::Result<Self> {
        let requests_total = IntCounter::new(
            "cookie_requests_total",
            "Cookie requests received, whatever the outcome",
        )?;
        let cookies_left = IntGauge::new("cookies_left", "Cookies left in the jar")?;

        registry
            .register(Box::new(requests_total.clone()))
            .context("failed to register cookie_requests_total")?;
        registry
            .register(Box::new(cookies_left.clone()))
            .context("failed to register cookies_left")?;

        Ok(Self {
            requests_total,
            cookies_left,
        })
    }

    #[must_use]
    pub fn requests_total(&self) -> u64 {
        self.requests_total.get()
    }

    #[must_use]
    pub fn cookies_left(&self) -> i64 {
        self.cookies_left.get()
    }
}

impl CookieMetrics for PrometheusCookieMetrics {
    fn record_requests(&self, count: u64) {
        self.requests_total.inc_by(count);
    }

    fn set_cookies_left(&self, value: u32) {
        self.cookies_left.set(i64::from(value));
    }
}
