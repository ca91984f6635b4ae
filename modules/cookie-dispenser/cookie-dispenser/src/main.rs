//! Standalone binary for the cookie dispenser module.
//!
//! Runs the module against an in-process host: capability flags, health, metrics and
//! both route groups are served by `modkit_host::LocalHost`. Receipts are stored through
//! sea-orm at `database.dsn`; the `database` capability turns available once that
//! connection is up, and the module waits for it before serving.
//!
//! Configuration is loaded from the `--config` YAML file, then overridden by
//! `COOKIE_DISPENSER__*` environment variables.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use cookie_dispenser::infra::{PrometheusCookieMetrics, SeaOrmReceiptRepository};
use cookie_dispenser::{CookieDispenserConfig, CookieDispenserModule, HostServices, MODULE_NAME};
use modkit_host::config::module_config_or_default;
use modkit_host::logging::init_logging;
use modkit_host::runner::{self, RunOptions};
use modkit_host::{AppConfig, Authenticator, LocalHost, StaticAuthenticator, capabilities};

const ENV_PREFIX: &str = "COOKIE_DISPENSER__";

/// Out-of-process cookie dispenser module
#[derive(Parser)]
#[command(name = "cookie-dispenser-oop", version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref(), ENV_PREFIX)?;
    init_logging(&config.logging, cli.verbose);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        grpc_addr = %config.server.grpc_bind_addr,
        http_addr = %config.server.http_bind_addr,
        "cookie dispenser starting"
    );

    let module_config: CookieDispenserConfig = module_config_or_default(&config, MODULE_NAME)?;

    let authenticator = Arc::new(StaticAuthenticator::new(config.auth.tokens.clone()));
    let auth_available = authenticator.is_available();
    if !auth_available {
        tracing::warn!("no auth tokens configured, authenticated routes are disabled");
    }
    let host = Arc::new(LocalHost::new(authenticator));

    host.monitor()
        .set_available(capabilities::AUTHENTICATION, auth_available);

    let metrics = Arc::new(PrometheusCookieMetrics::register(
        host.ctx().metrics_registry(),
    )?);
    let receipts = Arc::new(SeaOrmReceiptRepository::new());
    let module = Arc::new(CookieDispenserModule::new(HostServices::from_host(
        &host.ctx(),
        receipts.clone(),
        metrics,
    )));

    let cancel = CancellationToken::new();
    tokio::spawn({
        let monitor = host.monitor().clone();
        let cancel = cancel.clone();
        let dsn = config.database.dsn.clone();
        let retry = Duration::from_millis(config.database.retry_interval_ms);
        async move {
            loop {
                match receipts.connect(&dsn).await {
                    Ok(()) => {
                        tracing::info!("receipt database connected");
                        monitor.set_available(capabilities::DATABASE, true);
                        return;
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = %format_args!("{e:#}"),
                            "receipt database unavailable, retrying"
                        );
                    }
                }
                tokio::select! {
                    () = cancel.cancelled() => return,
                    () = tokio::time::sleep(retry) => {}
                }
            }
        }
    });
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
                return;
            }
            tracing::info!("shutdown signal received");
            cancel.cancel();
        }
    });

    runner::run(
        module,
        host,
        RunOptions {
            grpc_addr: config.server.grpc_bind_addr,
            http_addr: config.server.http_bind_addr,
            initial_config: module_config,
            cancel,
        },
    )
    .await
}
