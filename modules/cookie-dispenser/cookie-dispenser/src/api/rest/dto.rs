use serde::{Deserialize, Serialize};

use crate::domain::ResetOutcome;

/// Body of every successful dispense response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDto {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuestQuery {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetRequest {
    #[serde(default)]
    pub cookies_left: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetResponse {
    pub previous_cookies_left: u32,
    pub current_cookies_left: u32,
}

impl From<ResetOutcome> for ResetResponse {
    fn from(outcome: ResetOutcome) -> Self {
        Self {
            previous_cookies_left: outcome.previous,
            current_cookies_left: outcome.current,
        }
    }
}
