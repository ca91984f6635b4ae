use serde::{Deserialize, Serialize};

/// Configuration for the cookie dispenser module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CookieDispenserConfig {
    /// When false the module reports `NotServing`; routes stay registered.
    pub active: bool,
    /// Quota seeded on the first active delivery and restored by a reset without a value.
    #[serde(alias = "defaultCookieCount")]
    pub default_quota: u32,
    /// Names that never get a cookie, compared case-insensitively.
    #[serde(alias = "illegalNames")]
    pub blocked_names: Vec<String>,
}

impl Default for CookieDispenserConfig {
    fn default() -> Self {
        Self {
            active: true,
            default_quota: 20,
            blocked_names: vec!["Alex".to_owned(), "Betty".to_owned(), "Charlie".to_owned()],
        }
    }
}
