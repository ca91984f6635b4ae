//! Handles a module receives from its host, and the in-process host that provides them.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use dashmap::DashMap;
use prometheus::{Encoder, TextEncoder};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::auth::Authenticator;
use crate::capability::{CapabilityMonitor, LocalCapabilityMonitor};
use crate::health::{HealthReporter, HealthState};
use crate::problem::Problem;
use crate::routing::{RouteRegistrar, RouteTable};

/// Everything a module may ask of its host.
#[derive(Clone)]
pub struct HostCtx {
    monitor: Arc<dyn CapabilityMonitor>,
    health: Arc<dyn HealthReporter>,
    admin_routes: Arc<dyn RouteRegistrar>,
    app_routes: Arc<dyn RouteRegistrar>,
    metrics: prometheus::Registry,
}

impl HostCtx {
    #[must_use]
    pub fn new(
        monitor: Arc<dyn CapabilityMonitor>,
        health: Arc<dyn HealthReporter>,
        admin_routes: Arc<dyn RouteRegistrar>,
        app_routes: Arc<dyn RouteRegistrar>,
        metrics: prometheus::Registry,
    ) -> Self {
        Self {
            monitor,
            health,
            admin_routes,
            app_routes,
            metrics,
        }
    }

    #[must_use]
    pub fn monitor(&self) -> Arc<dyn CapabilityMonitor> {
        self.monitor.clone()
    }

    #[must_use]
    pub fn health(&self) -> Arc<dyn HealthReporter> {
        self.health.clone()
    }

    /// Registrar for the administrative route group (served under `/admin`).
    #[must_use]
    pub fn admin_routes(&self) -> Arc<dyn RouteRegistrar> {
        self.admin_routes.clone()
    }

    /// Registrar for the application route group (served at the root).
    #[must_use]
    pub fn app_routes(&self) -> Arc<dyn RouteRegistrar> {
        self.app_routes.clone()
    }

    #[must_use]
    pub fn metrics_registry(&self) -> &prometheus::Registry {
        &self.metrics
    }
}

/// A module instance the host has accepted.
#[derive(Debug, Clone)]
pub struct RegisteredModule {
    pub instance_id: Uuid,
    pub grpc_endpoint: String,
}

/// In-process host: capability flags, health cell, two route tables and a metrics registry.
pub struct LocalHost {
    monitor: Arc<LocalCapabilityMonitor>,
    health: Arc<HealthState>,
    admin_routes: Arc<RouteTable>,
    app_routes: Arc<RouteTable>,
    authenticator: Arc<dyn Authenticator>,
    metrics: prometheus::Registry,
    modules: DashMap<&'static str, RegisteredModule>,
}

impl LocalHost {
    #[must_use]
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            monitor: Arc::new(LocalCapabilityMonitor::new()),
            health: Arc::new(HealthState::new()),
            admin_routes: Arc::new(RouteTable::new("admin", authenticator.clone())),
            app_routes: Arc::new(RouteTable::new("app", authenticator.clone())),
            authenticator,
            metrics: prometheus::Registry::new(),
            modules: DashMap::new(),
        }
    }

    #[must_use]
    pub fn ctx(&self) -> HostCtx {
        HostCtx::new(
            self.monitor.clone(),
            self.health.clone(),
            self.admin_routes.clone(),
            self.app_routes.clone(),
            self.metrics.clone(),
        )
    }

    #[must_use]
    pub fn monitor(&self) -> &Arc<LocalCapabilityMonitor> {
        &self.monitor
    }

    #[must_use]
    pub fn health(&self) -> &Arc<HealthState> {
        &self.health
    }

    #[must_use]
    pub fn admin_routes(&self) -> &Arc<RouteTable> {
        &self.admin_routes
    }

    #[must_use]
    pub fn app_routes(&self) -> &Arc<RouteTable> {
        &self.app_routes
    }

    #[must_use]
    pub fn authenticator(&self) -> &Arc<dyn Authenticator> {
        &self.authenticator
    }

    /// Accept a module into the registry, replacing any previous instance of it.
    pub fn accept_module(&self, name: &'static str, grpc_endpoint: impl Into<String>) -> Uuid {
        let entry = RegisteredModule {
            instance_id: Uuid::new_v4(),
            grpc_endpoint: grpc_endpoint.into(),
        };
        let instance_id = entry.instance_id;
        tracing::info!(
            module = name,
            %instance_id,
            grpc_endpoint = %entry.grpc_endpoint,
            "module accepted into registry"
        );
        self.modules.insert(name, entry);
        instance_id
    }

    #[must_use]
    pub fn registered_module(&self, name: &str) -> Option<RegisteredModule> {
        self.modules.get(name).map(|entry| entry.value().clone())
    }

    /// HTTP surface: `/health`, `/healthz`, `/metrics`, the admin group under `/admin`,
    /// and the application group for everything else.
    pub fn http_router(&self) -> Router {
        let health = Router::new()
            .route("/health", get(health_handler))
            .with_state(self.health.clone());
        let metrics = Router::new()
            .route("/metrics", get(metrics_handler))
            .with_state(self.metrics.clone());

        Router::new()
            .route("/healthz", get(|| async { "ok" }))
            .merge(health)
            .merge(metrics)
            .nest_service("/admin", self.admin_routes.service())
            .fallback_service(self.app_routes.service())
            .layer(TraceLayer::new_for_http())
    }
}

async fn health_handler(State(health): State<Arc<HealthState>>) -> impl IntoResponse {
    let status = health.health();
    let code = if status.is_serving() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(serde_json::json!({ "status": status })))
}

async fn metrics_handler(State(registry): State<prometheus::Registry>) -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        tracing::error!(error = %e, "failed to encode metrics");
        return Problem::internal("failed to encode metrics").into_response();
    }
    ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], buffer).into_response()
}
