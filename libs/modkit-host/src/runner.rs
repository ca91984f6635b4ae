//! Drives a [`ManagedModule`] through its phases against a [`LocalHost`].

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;

use crate::capabilities;
use crate::contracts::ManagedModule;
use crate::host::LocalHost;

#[derive(thiserror::Error, Debug)]
pub enum PhaseError {
    #[error("phase '{phase}' failed for module '{module}'")]
    Failed {
        phase: &'static str,
        module: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("startup cancelled during phase '{phase}'")]
    Cancelled { phase: &'static str },
}

/// Where to listen and what to deliver first.
pub struct RunOptions<C> {
    pub grpc_addr: SocketAddr,
    pub http_addr: SocketAddr,
    pub initial_config: C,
    pub cancel: CancellationToken,
}

/// A module whose startup phases have all completed.
pub struct RunningHost<M: ManagedModule> {
    module: Arc<M>,
    grpc_addr: SocketAddr,
    http_addr: SocketAddr,
    cancel: CancellationToken,
    grpc_task: JoinHandle<Result<(), tonic::transport::Error>>,
    http_task: JoinHandle<std::io::Result<()>>,
}

impl<M: ManagedModule> RunningHost<M> {
    #[must_use]
    pub fn grpc_addr(&self) -> SocketAddr {
        self.grpc_addr
    }

    #[must_use]
    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    #[must_use]
    pub fn module(&self) -> &Arc<M> {
        &self.module
    }

    /// Wait for cancellation, shut the module down and drain both servers.
    ///
    /// # Errors
    /// Returns an error if either server terminated abnormally.
    pub async fn wait(self) -> anyhow::Result<()> {
        self.cancel.cancelled().await;

        tracing::info!("Phase: shutdown");
        self.module.shutdown().await;

        self.grpc_task
            .await
            .context("gRPC server task panicked")?
            .context("gRPC server failed")?;
        self.http_task
            .await
            .context("HTTP server task panicked")?
            .context("HTTP server failed")?;

        tracing::info!(module = self.module.name(), "host stopped");
        Ok(())
    }
}

/// Run all phases and serve until `opts.cancel` fires.
///
/// # Errors
/// Returns an error if a phase fails, a listener cannot be bound, or a server fails.
pub async fn run<M: ManagedModule>(
    module: Arc<M>,
    host: Arc<LocalHost>,
    opts: RunOptions<M::Config>,
) -> anyhow::Result<()> {
    start(module, host, opts).await?.wait().await
}

/// Bind both listeners and run every startup phase, in order.
///
/// 1. `pre_server_start`, then the gRPC server starts accepting
/// 2. the HTTP server starts and the `router` capability becomes available
/// 3. `on_server_start` (may block on capabilities such as `database`)
/// 4. the module is accepted into the registry, then `on_register`
/// 5. `on_config` with the initial configuration
///
/// On failure the servers are cancelled before the error is returned.
///
/// # Errors
/// Returns an error if a phase fails or a listener cannot be bound.
pub async fn start<M: ManagedModule>(
    module: Arc<M>,
    host: Arc<LocalHost>,
    opts: RunOptions<M::Config>,
) -> anyhow::Result<RunningHost<M>> {
    let RunOptions {
        grpc_addr,
        http_addr,
        initial_config,
        cancel,
    } = opts;
    let name = module.name();

    run_phase(name, "pre_server_start", &cancel, module.pre_server_start()).await?;

    let grpc_listener = TcpListener::bind(grpc_addr)
        .await
        .with_context(|| format!("failed to bind gRPC listener on {grpc_addr}"))?;
    let grpc_addr = grpc_listener.local_addr()?;
    let routes = module.clone().grpc_routes();
    let grpc_cancel = cancel.clone();
    let grpc_task = tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_routes(routes)
            .serve_with_incoming_shutdown(
                TcpListenerStream::new(grpc_listener),
                grpc_cancel.cancelled_owned(),
            )
            .await
    });
    tracing::info!(module = name, %grpc_addr, "gRPC server listening");

    let http_listener = match TcpListener::bind(http_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            cancel.cancel();
            return Err(e).with_context(|| format!("failed to bind HTTP listener on {http_addr}"));
        }
    };
    let http_addr = http_listener.local_addr()?;
    let router = host.http_router();
    let http_cancel = cancel.clone();
    let http_task = tokio::spawn(async move {
        axum::serve(http_listener, router)
            .with_graceful_shutdown(http_cancel.cancelled_owned())
            .await
    });
    tracing::info!(module = name, %http_addr, "HTTP server listening");
    host.monitor().set_available(capabilities::ROUTER, true);

    let phases = async {
        run_phase(name, "on_server_start", &cancel, module.on_server_start()).await?;

        host.accept_module(name, format!("http://{grpc_addr}"));
        run_phase(name, "on_register", &cancel, module.on_register()).await?;

        run_phase(name, "on_config", &cancel, module.on_config(initial_config)).await
    };
    if let Err(e) = phases.await {
        cancel.cancel();
        return Err(e.into());
    }

    Ok(RunningHost {
        module,
        grpc_addr,
        http_addr,
        cancel,
        grpc_task,
        http_task,
    })
}

async fn run_phase(
    module: &'static str,
    phase: &'static str,
    cancel: &CancellationToken,
    fut: impl Future<Output = anyhow::Result<()>>,
) -> Result<(), PhaseError> {
    tracing::info!(module, "Phase: {phase}");
    tokio::select! {
        () = cancel.cancelled() => Err(PhaseError::Cancelled { phase }),
        res = fut => res.map_err(|source| PhaseError::Failed { phase, module, source }),
    }
}
