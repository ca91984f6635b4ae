use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

/// A module driven by a host through its lifecycle phases.
///
/// Phase order, enforced by the host runner:
/// 1. `pre_server_start` before the gRPC server accepts traffic
/// 2. `on_server_start` once the gRPC server is listening
/// 3. `on_register` once the host has accepted the module into its registry
/// 4. `on_config` on the first configuration delivery and every update after it
/// 5. `shutdown` when the host stops
#[async_trait]
pub trait ManagedModule: Send + Sync + 'static {
    /// Module configuration as delivered by the host.
    type Config: DeserializeOwned + Send + 'static;

    fn name(&self) -> &'static str;

    /// # Errors
    /// A failure aborts startup before the gRPC server accepts traffic.
    async fn pre_server_start(&self) -> anyhow::Result<()>;

    /// # Errors
    /// A failure stops both servers and aborts startup.
    async fn on_server_start(&self) -> anyhow::Result<()>;

    /// # Errors
    /// A failure stops both servers and aborts startup.
    async fn on_register(&self) -> anyhow::Result<()>;

    /// # Errors
    /// Returns an error if the configuration cannot be applied.
    async fn on_config(&self, config: Self::Config) -> anyhow::Result<()>;

    async fn shutdown(&self) {}

    /// gRPC services exported by the module, served by the host's tonic server.
    fn grpc_routes(self: Arc<Self>) -> tonic::service::Routes;
}
