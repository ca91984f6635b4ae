//! Cookie Dispenser Module
//!
//! The public API is defined in `cookie-dispenser-sdk` and re-exported here.

pub use cookie_dispenser_sdk::{CookieDispenserClientV1, CookieDispenserError};

pub mod module;
pub use module::{CookieDispenserModule, HostServices, LifecycleError, LifecyclePhase};

pub mod config;
pub use config::CookieDispenserConfig;

#[doc(hidden)]
pub mod api;
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod infra;

/// Name under which the module is registered and configured (`modules.<name>`).
pub const MODULE_NAME: &str = "cookie_dispenser";
