//! Availability of named host capabilities (`database`, `router`, `authentication`, ...).
//!
//! Consumers call [`CapabilityMonitor::observe`] with a transition callback. The callback
//! is invoked once with the current state before `observe` returns, then on every change
//! until the returned [`Subscription`] is cancelled or dropped. Delivery is at-least-once,
//! so callbacks must tolerate seeing the same state twice.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Callback invoked with the new availability of a capability.
pub type TransitionFn = Arc<dyn Fn(bool) -> BoxFuture<'static, ()> + Send + Sync>;

#[async_trait]
pub trait CapabilityMonitor: Send + Sync {
    /// Deliver the current availability of `capability`, then every subsequent change.
    async fn observe(&self, capability: &str, on_transition: TransitionFn) -> Subscription;

    /// Resolve once `capability` is available. No timeout.
    async fn wait_until_available(&self, capability: &str);

    fn is_available(&self, capability: &str) -> bool;
}

/// Handle to an active observation. Dropping it stops delivery.
#[derive(Debug)]
#[must_use = "dropping a Subscription stops delivery"]
pub struct Subscription {
    capability: String,
    cancel: CancellationToken,
}

impl Subscription {
    pub fn new(capability: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            capability: capability.into(),
            cancel,
        }
    }

    #[must_use]
    pub fn capability(&self) -> &str {
        &self.capability
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// In-process capability monitor. Capabilities start unavailable.
#[derive(Default)]
pub struct LocalCapabilityMonitor {
    channels: DashMap<String, watch::Sender<bool>>,
}

impl LocalCapabilityMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip availability. Observers are only woken when the value actually changes.
    pub fn set_available(&self, capability: &str, available: bool) {
        let changed = self
            .channels
            .entry(capability.to_owned())
            .or_insert_with(|| watch::channel(false).0)
            .send_if_modified(|current| {
                if *current == available {
                    false
                } else {
                    *current = available;
                    true
                }
            });
        if changed {
            tracing::info!(capability, available, "capability availability changed");
        }
    }

    fn receiver(&self, capability: &str) -> watch::Receiver<bool> {
        self.channels
            .entry(capability.to_owned())
            .or_insert_with(|| watch::channel(false).0)
            .subscribe()
    }
}

#[async_trait]
impl CapabilityMonitor for LocalCapabilityMonitor {
    async fn observe(&self, capability: &str, on_transition: TransitionFn) -> Subscription {
        let mut rx = self.receiver(capability);
        let initial = *rx.borrow_and_update();
        on_transition(initial).await;

        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        let name = capability.to_owned();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = stop.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let available = *rx.borrow_and_update();
                        tracing::debug!(capability = %name, available, "delivering capability transition");
                        on_transition(available).await;
                    }
                }
            }
            tracing::debug!(capability = %name, "capability observer stopped");
        });

        Subscription::new(capability, cancel)
    }

    async fn wait_until_available(&self, capability: &str) {
        let mut rx = self.receiver(capability);
        if rx.wait_for(|available| *available).await.is_err() {
            tracing::warn!(capability, "capability channel closed while waiting");
        }
    }

    fn is_available(&self, capability: &str) -> bool {
        self.channels
            .get(capability)
            .is_some_and(|tx| *tx.value().borrow())
    }
}
