use std::sync::OnceLock;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue, Database, DatabaseConnection, EntityTrait, PaginatorTrait,
};
use sea_orm_migration::MigratorTrait;
use uuid::Uuid;

use crate::domain::repo::{CookieReceipt, ReceiptRepository};

use super::entity::{self, Entity as ReceiptEntity};
use super::migrations::Migrator;

/// Receipt store backed by a sea-orm connection.
///
/// Created unconnected so the module can be built before the database is reachable;
/// `connect` fills the connection in once and every call before that fails.
#[derive(Default)]
pub struct SeaOrmReceiptRepository {
    db: OnceLock<DatabaseConnection>,
}

impl SeaOrmReceiptRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the connection pool for `dsn`. A second successful call keeps the first pool.
    ///
    /// # Errors
    /// Returns an error if the database cannot be reached.
    pub async fn connect(&self, dsn: &str) -> anyhow::Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        let conn = Database::connect(dsn)
            .await
            .context("failed to connect to the receipt database")?;
        if self.db.set(conn).is_err() {
            tracing::debug!("receipt database was connected concurrently");
        }
        Ok(())
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.db.get().is_some()
    }

    fn conn(&self) -> anyhow::Result<&DatabaseConnection> {
        self.db.get().context("receipt database is not connected")
    }
}

#[async_trait]
impl ReceiptRepository for SeaOrmReceiptRepository {
    async fn ensure_schema(&self) -> anyhow::Result<()> {
        Migrator::up(self.conn()?, None)
            .await
            .context("receipt migrations failed")?;
        tracing::debug!("receipt schema registered");
        Ok(())
    }

    async fn record(&self, receiver_name: &str) -> anyhow::Result<CookieReceipt> {
        let active_model = entity::ActiveModel {
            id: ActiveValue::Set(Uuid::new_v4()),
            receiver_name: ActiveValue::Set(receiver_name.to_owned()),
            created_at: ActiveValue::Set(Utc::now()),
        };
        let model = active_model.insert(self.conn()?).await?;
        Ok(model.into())
    }

    async fn count(&self) -> anyhow::Result<u64> {
        Ok(ReceiptEntity::find().count(self.conn()?).await?)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::path::Path;

    fn sqlite_dsn(dir: &Path) -> String {
        format!("sqlite://{}?mode=rwc", dir.join("receipts.db").display())
    }

    #[tokio::test]
    async fn unconnected_repository_fails() {
        let repo = SeaOrmReceiptRepository::new();
        assert!(!repo.is_connected());
        assert!(repo.ensure_schema().await.is_err());
        assert!(repo.record("Bob").await.is_err());
    }

    #[tokio::test]
    async fn record_requires_schema() {
        let dir = tempfile::tempdir().unwrap();
        let repo = SeaOrmReceiptRepository::new();
        repo.connect(&sqlite_dsn(dir.path())).await.unwrap();
        assert!(repo.record("Bob").await.is_err());
    }

    #[tokio::test]
    async fn receipts_survive_a_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let dsn = sqlite_dsn(dir.path());

        let first = SeaOrmReceiptRepository::new();
        first.connect(&dsn).await.unwrap();
        first.ensure_schema().await.unwrap();
        first.ensure_schema().await.unwrap();
        let bob = first.record("Bob").await.unwrap();
        first.record("Carol").await.unwrap();
        assert_eq!(bob.receiver_name, "Bob");
        assert_eq!(first.count().await.unwrap(), 2);
        drop(first);

        let second = SeaOrmReceiptRepository::new();
        second.connect(&dsn).await.unwrap();
        second.ensure_schema().await.unwrap();
        assert_eq!(second.count().await.unwrap(), 2);
    }
}
