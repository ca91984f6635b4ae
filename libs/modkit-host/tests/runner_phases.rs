#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Phase ordering of `runner::start` against a recording module.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use modkit_host::runner::{self, RunOptions};
use modkit_host::{
    CapabilityMonitor, LocalHost, ManagedModule, StaticAuthenticator, capabilities,
};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct Recorder {
    phases: Mutex<Vec<String>>,
    fail_on_register: bool,
}

impl Recorder {
    fn push(&self, phase: impl Into<String>) {
        self.phases.lock().push(phase.into());
    }
}

#[async_trait]
impl ManagedModule for Recorder {
    type Config = u32;

    fn name(&self) -> &'static str {
        "recorder"
    }

    async fn pre_server_start(&self) -> anyhow::Result<()> {
        self.push("pre_server_start");
        Ok(())
    }

    async fn on_server_start(&self) -> anyhow::Result<()> {
        self.push("on_server_start");
        Ok(())
    }

    async fn on_register(&self) -> anyhow::Result<()> {
        if self.fail_on_register {
            anyhow::bail!("registration refused");
        }
        self.push("on_register");
        Ok(())
    }

    async fn on_config(&self, config: u32) -> anyhow::Result<()> {
        self.push(format!("on_config:{config}"));
        Ok(())
    }

    async fn shutdown(&self) {
        self.push("shutdown");
    }

    fn grpc_routes(self: Arc<Self>) -> tonic::service::Routes {
        tonic::service::Routes::default()
    }
}

fn local() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

fn host() -> Arc<LocalHost> {
    Arc::new(LocalHost::new(Arc::new(StaticAuthenticator::default())))
}

#[tokio::test]
async fn phases_run_in_order_and_shutdown_on_cancel() {
    let module = Arc::new(Recorder::default());
    let host = host();
    let cancel = CancellationToken::new();

    let running = runner::start(
        module.clone(),
        host.clone(),
        RunOptions {
            grpc_addr: local(),
            http_addr: local(),
            initial_config: 7,
            cancel: cancel.clone(),
        },
    )
    .await
    .unwrap();

    assert_ne!(running.grpc_addr().port(), 0);
    assert_ne!(running.http_addr().port(), 0);
    assert!(host.monitor().is_available(capabilities::ROUTER));
    let registered = host.registered_module("recorder").unwrap();
    assert_eq!(
        registered.grpc_endpoint,
        format!("http://{}", running.grpc_addr())
    );

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), running.wait())
        .await
        .expect("host should stop")
        .unwrap();

    assert_eq!(
        *module.phases.lock(),
        vec![
            "pre_server_start",
            "on_server_start",
            "on_register",
            "on_config:7",
            "shutdown"
        ]
    );
}

#[tokio::test]
async fn failing_phase_aborts_startup() {
    let module = Arc::new(Recorder {
        fail_on_register: true,
        ..Recorder::default()
    });
    let cancel = CancellationToken::new();

    let err = runner::start(
        module.clone(),
        host(),
        RunOptions {
            grpc_addr: local(),
            http_addr: local(),
            initial_config: 1,
            cancel: cancel.clone(),
        },
    )
    .await
    .err()
    .expect("startup should fail");

    assert!(err.to_string().contains("on_register"));
    assert!(cancel.is_cancelled());
    assert_eq!(
        *module.phases.lock(),
        vec!["pre_server_start", "on_server_start"]
    );
}
