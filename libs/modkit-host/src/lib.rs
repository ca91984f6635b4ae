//! Host-facing contracts for `ModKit` modules.
//!
//! The host side of a module deployment is modelled as a handful of narrow traits
//! so a module can be driven by a real orchestrator or by the in-process
//! [`LocalHost`] used for standalone binaries and tests.
//!
//! Lifecycle: `pre_server_start -> on_server_start -> on_register -> on_config*`,
//! driven by [`runner::run`].

pub mod auth;
pub mod capability;
pub mod config;
pub mod contracts;
pub mod health;
pub mod host;
pub mod logging;
pub mod problem;
pub mod routing;
pub mod runner;

pub use auth::{AuthError, Authenticator, CallerIdentity, Identity, StaticAuthenticator};
pub use capability::{CapabilityMonitor, LocalCapabilityMonitor, Subscription, TransitionFn};
pub use config::{AppConfig, ConfigError, ConfigProvider};
pub use contracts::ManagedModule;
pub use health::{HealthReporter, HealthState, HealthStatus};
pub use host::{HostCtx, LocalHost};
pub use problem::Problem;
pub use routing::{RouteError, RouteRegistrar, RouteSet, RouteSpec, RouteTable};

/// Well-known capability names published by the host.
pub mod capabilities {
    pub const DATABASE: &str = "database";
    pub const ROUTER: &str = "router";
    pub const AUTHENTICATION: &str = "authentication";
}
