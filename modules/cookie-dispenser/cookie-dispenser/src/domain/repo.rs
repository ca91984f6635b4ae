use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Proof that a cookie was handed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieReceipt {
    pub id: Uuid,
    pub receiver_name: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait ReceiptRepository: Send + Sync {
    /// Register the receipt schema with the backing store. Called once the
    /// `database` capability is available, before any `record`.
    ///
    /// # Errors
    /// Returns an error if the store rejects the schema.
    async fn ensure_schema(&self) -> anyhow::Result<()>;

    /// Store a receipt for `receiver_name`, stamped now.
    ///
    /// # Errors
    /// Returns an error if the schema is not registered or the write fails.
    async fn record(&self, receiver_name: &str) -> anyhow::Result<CookieReceipt>;

    /// # Errors
    /// Returns an error if the schema is not registered or the store is unreachable.
    async fn count(&self) -> anyhow::Result<u64>;
}
