//! Cookie dispenser API trait and types

use async_trait::async_trait;

/// Quota before and after a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetSummary {
    pub previous_cookies_left: u32,
    pub current_cookies_left: u32,
}

/// Cookie dispenser API, version 1.
#[async_trait]
pub trait CookieDispenserClientV1: Send + Sync {
    /// Take one cookie for `name` and return the greeting.
    ///
    /// # Errors
    ///
    /// - `Exhausted` when no cookies are left
    /// - `Rejected` when `name` is on the blocked list
    async fn get_cookie(&self, name: &str) -> Result<String, CookieDispenserError>;

    /// Set the quota to `cookies_left`, or to the configured default when `None`.
    ///
    /// # Errors
    ///
    /// - `Transport` when the service cannot be reached
    async fn reset_cookies(
        &self,
        cookies_left: Option<u32>,
    ) -> Result<ResetSummary, CookieDispenserError>;
}

/// Error type for cookie dispenser operations
#[derive(thiserror::Error, Debug)]
pub enum CookieDispenserError {
    #[error("no cookies left")]
    Exhausted,

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("gRPC transport error: {0}")]
    Transport(String),
}

impl From<tonic::Status> for CookieDispenserError {
    fn from(status: tonic::Status) -> Self {
        match status.code() {
            tonic::Code::ResourceExhausted => Self::Exhausted,
            tonic::Code::Aborted => Self::Rejected(status.message().to_owned()),
            _ => Self::Transport(status.message().to_owned()),
        }
    }
}
