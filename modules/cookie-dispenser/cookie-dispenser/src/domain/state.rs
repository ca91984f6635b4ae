use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use arc_swap::ArcSwap;

use crate::config::CookieDispenserConfig;

/// State shared by the lifecycle coordinator, the domain service and both route binders.
///
/// One instance per module, handed out by `Arc`. The quota is a single atomic so
/// concurrent dispense calls from gRPC and HTTP never lose an update or go below zero.
/// The blocked names and config are swapped wholesale; readers see either the old
/// or the new snapshot.
pub struct ModuleState {
    remaining_quota: AtomicU32,
    blocked_names: ArcSwap<Vec<String>>,
    auth_available: AtomicBool,
    config: ArcSwap<CookieDispenserConfig>,
}

impl ModuleState {
    /// Quota 0, no blocked names, authentication unavailable, default config.
    #[must_use]
    pub fn new() -> Self {
        Self {
            remaining_quota: AtomicU32::new(0),
            blocked_names: ArcSwap::from_pointee(Vec::new()),
            auth_available: AtomicBool::new(false),
            config: ArcSwap::from_pointee(CookieDispenserConfig::default()),
        }
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining_quota.load(Ordering::SeqCst)
    }

    /// Take one unit. Returns the quota left afterwards, or `None` if it was already 0.
    #[must_use]
    pub fn try_take(&self) -> Option<u32> {
        self.remaining_quota
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |q| q.checked_sub(1))
            .ok()
            .map(|previous| previous.saturating_sub(1))
    }

    /// Overwrite the quota, returning the previous value.
    #[must_use]
    pub fn set_quota(&self, quota: u32) -> u32 {
        self.remaining_quota.swap(quota, Ordering::SeqCst)
    }

    #[must_use]
    pub fn blocked_names(&self) -> Arc<Vec<String>> {
        self.blocked_names.load_full()
    }

    pub fn replace_blocked_names(&self, names: Vec<String>) {
        self.blocked_names.store(Arc::new(names));
    }

    /// Case-insensitive match against the current blocked list.
    #[must_use]
    pub fn is_blocked(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.blocked_names
            .load()
            .iter()
            .any(|blocked| blocked.to_lowercase() == name)
    }

    #[must_use]
    pub fn auth_available(&self) -> bool {
        self.auth_available.load(Ordering::SeqCst)
    }

    pub fn set_auth_available(&self, available: bool) {
        self.auth_available.store(available, Ordering::SeqCst);
    }

    #[must_use]
    pub fn config(&self) -> Arc<CookieDispenserConfig> {
        self.config.load_full()
    }

    pub fn set_config(&self, config: Arc<CookieDispenserConfig>) {
        self.config.store(config);
    }
}

impl Default for ModuleState {
    fn default() -> Self {
        Self::new()
    }
}
