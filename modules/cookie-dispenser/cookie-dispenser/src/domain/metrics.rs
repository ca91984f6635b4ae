/// Sink for the module's two metrics: `cookie_requests_total` and `cookies_left`.
pub trait CookieMetrics: Send + Sync {
    fn record_requests(&self, count: u64);

    fn set_cookies_left(&self, value: u32);

    fn record_request(&self) {
        self.record_requests(1);
    }
}
