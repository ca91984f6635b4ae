use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::domain::repo::{CookieReceipt, ReceiptRepository};

/// Process-local receipt store. Receipts are lost when the process exits.
#[derive(Default)]
pub struct InMemoryReceiptRepository {
    schema_ready: AtomicBool,
    receipts: Mutex<Vec<CookieReceipt>>,
}

impl InMemoryReceiptRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored receipt, oldest first.
    #[must_use]
    pub fn receipts(&self) -> Vec<CookieReceipt> {
        self.receipts.lock().clone()
    }

    fn check_schema(&self) -> anyhow::Result<()> {
        if self.schema_ready.load(Ordering::Acquire) {
            Ok(())
        } else {
            anyhow::bail!("receipt schema has not been registered")
        }
    }
}

#[async_trait]
impl ReceiptRepository for InMemoryReceiptRepository {
    async fn ensure_schema(&self) -> anyhow::Result<()> {
        if !self.schema_ready.swap(true, Ordering::AcqRel) {
            tracing::debug!("receipt schema registered");
        }
        Ok(())
    }

    async fn record(&self, receiver_name: &str) -> anyhow::Result<CookieReceipt> {
        self.check_schema()?;
        let receipt = CookieReceipt {
            id: Uuid::new_v4(),
            receiver_name: receiver_name.to_owned(),
            created_at: Utc::now(),
        };
        self.receipts.lock().push(receipt.clone());
        Ok(receipt)
    }

    async fn count(&self) -> anyhow::Result<u64> {
        self.check_schema()?;
        let count = self.receipts.lock().len();
        Ok(u64::try_from(count)?)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_requires_schema() {
        let repo = InMemoryReceiptRepository::new();
        assert!(repo.record("Bob").await.is_err());
        assert!(repo.count().await.is_err());
    }

    #[tokio::test]
    async fn records_are_counted_in_order() {
        let repo = InMemoryReceiptRepository::new();
        repo.ensure_schema().await.unwrap();
        repo.ensure_schema().await.unwrap();

        let first = repo.record("Bob").await.unwrap();
        let second = repo.record("Carol").await.unwrap();
        assert_ne!(first.id, second.id);
        assert!(first.created_at <= second.created_at);

        assert_eq!(repo.count().await.unwrap(), 2);
        let names: Vec<_> = repo
            .receipts()
            .into_iter()
            .map(|r| r.receiver_name)
            .collect();
        assert_eq!(names, ["Bob", "Carol"]);
    }
}
