pub mod error;
pub mod metrics;
pub mod repo;
pub mod service;
pub mod state;

pub use service::{ResetOutcome, Service, Surface};
pub use state::ModuleState;
