//! Cookie dispenser lifecycle coordinator.
//!
//! The host drives the module through
//! `Constructed -> PreServerStart -> ServerStarted -> Registered -> Configured`.
//! Each hook checks the current phase first and fails with
//! [`LifecycleError::OutOfOrder`] instead of running early.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use cookie_dispenser_sdk::CookieServiceServer;
use modkit_host::{
    CapabilityMonitor, HealthReporter, HealthStatus, HostCtx, ManagedModule, RouteError,
    RouteRegistrar, Subscription, TransitionFn, capabilities,
};

use crate::MODULE_NAME;
use crate::api::grpc::{ConfigSink, CookieServiceImpl};
use crate::api::rest::{AdminRoutes, AppRoutes};
use crate::config::CookieDispenserConfig;
use crate::domain::metrics::CookieMetrics;
use crate::domain::repo::ReceiptRepository;
use crate::domain::{ModuleState, Service};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Constructed,
    PreServerStart,
    ServerStarted,
    Registered,
    Configured,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Constructed => "Constructed",
            Self::PreServerStart => "PreServerStart",
            Self::ServerStarted => "ServerStarted",
            Self::Registered => "Registered",
            Self::Configured => "Configured",
        })
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LifecycleError {
    #[error("'{hook}' called in phase {actual}, expected {expected}")]
    OutOfOrder {
        hook: &'static str,
        expected: &'static str,
        actual: LifecyclePhase,
    },
    #[error("dependency '{0}' is unavailable")]
    DependencyUnavailable(&'static str),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error("receipt storage setup failed")]
    Persistence(#[source] anyhow::Error),
}

/// Narrow host handles the module works against, one trait object per concern.
#[derive(Clone)]
pub struct HostServices {
    pub monitor: Arc<dyn CapabilityMonitor>,
    pub health: Arc<dyn HealthReporter>,
    pub admin_routes: Arc<dyn RouteRegistrar>,
    pub app_routes: Arc<dyn RouteRegistrar>,
    pub receipts: Arc<dyn ReceiptRepository>,
    pub metrics: Arc<dyn CookieMetrics>,
}

impl HostServices {
    #[must_use]
    pub fn from_host(
        ctx: &HostCtx,
        receipts: Arc<dyn ReceiptRepository>,
        metrics: Arc<dyn CookieMetrics>,
    ) -> Self {
        Self {
            monitor: ctx.monitor(),
            health: ctx.health(),
            admin_routes: ctx.admin_routes(),
            app_routes: ctx.app_routes(),
            receipts,
            metrics,
        }
    }
}

pub struct CookieDispenserModule {
    state: Arc<ModuleState>,
    service: Arc<Service>,
    admin_routes: AdminRoutes,
    app_routes: Arc<AppRoutes>,
    host: HostServices,
    phase: Mutex<LifecyclePhase>,
    seeded: AtomicBool,
    subscriptions: Mutex<Vec<Subscription>>,
    cancel: CancellationToken,
}

impl CookieDispenserModule {
    #[must_use]
    pub fn new(host: HostServices) -> Self {
        let state = Arc::new(ModuleState::new());
        let service = Arc::new(Service::new(
            state.clone(),
            host.receipts.clone(),
            host.metrics.clone(),
        ));
        Self {
            admin_routes: AdminRoutes::new(service.clone()),
            app_routes: Arc::new(AppRoutes::new(service.clone())),
            state,
            service,
            host,
            phase: Mutex::new(LifecyclePhase::Constructed),
            seeded: AtomicBool::new(false),
            subscriptions: Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> &Arc<ModuleState> {
        &self.state
    }

    #[must_use]
    pub fn service(&self) -> &Arc<Service> {
        &self.service
    }

    #[must_use]
    pub fn phase(&self) -> LifecyclePhase {
        *self.phase.lock()
    }

    fn expect_phase(
        &self,
        hook: &'static str,
        expected: &'static str,
        allowed: &[LifecyclePhase],
    ) -> Result<(), LifecycleError> {
        let actual = self.phase();
        if allowed.contains(&actual) {
            Ok(())
        } else {
            tracing::error!(hook, %actual, expected, "lifecycle hook called out of order");
            Err(LifecycleError::OutOfOrder {
                hook,
                expected,
                actual,
            })
        }
    }

    fn enter(&self, next: LifecyclePhase) {
        let previous = std::mem::replace(&mut *self.phase.lock(), next);
        if previous != next {
            tracing::debug!(%previous, %next, "lifecycle phase changed");
        }
    }

    /// Bind the admin route group. Runs before the gRPC server accepts traffic.
    ///
    /// # Errors
    /// Returns [`LifecycleError::OutOfOrder`] unless the module was just constructed.
    pub fn pre_server_start(&self) -> Result<(), LifecycleError> {
        self.expect_phase(
            "pre_server_start",
            "Constructed",
            &[LifecyclePhase::Constructed],
        )?;
        self.admin_routes.bind(self.host.admin_routes.clone());
        self.enter(LifecyclePhase::PreServerStart);
        Ok(())
    }

    /// Wait for the `database` capability, then register the receipt schema and
    /// seed the metrics from stored receipts. There is no timeout.
    ///
    /// # Errors
    /// - [`LifecycleError::OutOfOrder`] unless `pre_server_start` ran
    /// - [`LifecycleError::DependencyUnavailable`] if the module shuts down while waiting
    /// - [`LifecycleError::Persistence`] if the store cannot be prepared
    pub async fn on_server_start(&self) -> Result<(), LifecycleError> {
        self.expect_phase(
            "on_server_start",
            "PreServerStart",
            &[LifecyclePhase::PreServerStart],
        )?;

        if !self.host.monitor.is_available(capabilities::DATABASE) {
            tracing::info!("waiting for the database capability");
        }
        tokio::select! {
            () = self.cancel.cancelled() => {
                return Err(LifecycleError::DependencyUnavailable(capabilities::DATABASE));
            }
            () = self.host.monitor.wait_until_available(capabilities::DATABASE) => {}
        }

        self.host
            .receipts
            .ensure_schema()
            .await
            .map_err(LifecycleError::Persistence)?;
        self.service
            .initialize_metrics()
            .await
            .map_err(|e| LifecycleError::Persistence(e.into()))?;

        self.enter(LifecyclePhase::ServerStarted);
        Ok(())
    }

    /// Register the admin routes and start following `authentication` and `router`.
    ///
    /// Every time the router becomes available the application routes are bound and
    /// registered again. Losing the router leaves them registered.
    ///
    /// # Errors
    /// - [`LifecycleError::OutOfOrder`] unless `on_server_start` completed
    /// - [`LifecycleError::Route`] if the admin routes cannot be registered
    pub async fn on_register(&self) -> Result<(), LifecycleError> {
        self.expect_phase(
            "on_register",
            "ServerStarted",
            &[LifecyclePhase::ServerStarted],
        )?;

        self.admin_routes.register_routes().await?;

        let state = self.state.clone();
        let on_auth: TransitionFn = Arc::new(move |available| {
            let state = state.clone();
            async move {
                if state.auth_available() != available {
                    tracing::info!(available, "authentication availability changed");
                }
                state.set_auth_available(available);
            }
            .boxed()
        });
        let auth_sub = self
            .host
            .monitor
            .observe(capabilities::AUTHENTICATION, on_auth)
            .await;

        let app_routes = self.app_routes.clone();
        let registrar = self.host.app_routes.clone();
        let on_router: TransitionFn = Arc::new(move |available| {
            let app_routes = app_routes.clone();
            let registrar = registrar.clone();
            async move {
                if !available {
                    tracing::warn!("router unavailable, application routes stay registered");
                    return;
                }
                app_routes.bind(registrar);
                if let Err(e) = app_routes.register_routes().await {
                    tracing::error!(error = %e, "failed to register application routes");
                } else {
                    tracing::info!("application routes registered");
                }
            }
            .boxed()
        });
        let router_sub = self
            .host
            .monitor
            .observe(capabilities::ROUTER, on_router)
            .await;

        self.subscriptions.lock().extend([auth_sub, router_sub]);
        self.enter(LifecyclePhase::Registered);
        Ok(())
    }

    /// Apply a configuration delivery.
    ///
    /// An inactive config only flips health to `NotServing`. An active one replaces
    /// the blocked names, seeds the quota on the very first active delivery, and
    /// reports `Serving`. The snapshot is stored either way.
    ///
    /// # Errors
    /// Returns [`LifecycleError::OutOfOrder`] before `on_register` completed.
    pub async fn on_config(&self, config: CookieDispenserConfig) -> Result<(), LifecycleError> {
        self.expect_phase(
            "on_config",
            "Registered or Configured",
            &[LifecyclePhase::Registered, LifecyclePhase::Configured],
        )?;

        let config = Arc::new(config);
        self.state.set_config(config.clone());

        if config.active {
            self.state.replace_blocked_names(config.blocked_names.clone());
            if !self.seeded.swap(true, Ordering::SeqCst) {
                let previous = self.service.seed_quota(config.default_quota);
                tracing::info!(previous, quota = config.default_quota, "cookie quota seeded");
            }
            self.host.health.set_health(HealthStatus::Serving);
        } else {
            tracing::warn!("module deactivated by configuration");
            self.host.health.set_health(HealthStatus::NotServing);
        }

        self.enter(LifecyclePhase::Configured);
        Ok(())
    }

    /// Stop observing capabilities and abort any pending dependency wait.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        for subscription in &subscriptions {
            tracing::debug!(capability = subscription.capability(), "cancelling subscription");
            subscription.cancel();
        }
        tracing::info!("cookie dispenser stopped");
    }
}

#[async_trait]
impl ConfigSink for CookieDispenserModule {
    async fn apply_config(&self, config: CookieDispenserConfig) -> Result<(), LifecycleError> {
        self.on_config(config).await
    }
}

#[async_trait]
impl ManagedModule for CookieDispenserModule {
    type Config = CookieDispenserConfig;

    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    async fn pre_server_start(&self) -> anyhow::Result<()> {
        Ok(CookieDispenserModule::pre_server_start(self)?)
    }

    async fn on_server_start(&self) -> anyhow::Result<()> {
        Ok(CookieDispenserModule::on_server_start(self).await?)
    }

    async fn on_register(&self) -> anyhow::Result<()> {
        Ok(CookieDispenserModule::on_register(self).await?)
    }

    async fn on_config(&self, config: CookieDispenserConfig) -> anyhow::Result<()> {
        Ok(CookieDispenserModule::on_config(self, config).await?)
    }

    async fn shutdown(&self) {
        CookieDispenserModule::shutdown(self);
    }

    fn grpc_routes(self: Arc<Self>) -> tonic::service::Routes {
        let service = self.service.clone();
        let server = CookieServiceServer::new(CookieServiceImpl::new(service, self));
        tonic::service::Routes::new(server)
    }
}
