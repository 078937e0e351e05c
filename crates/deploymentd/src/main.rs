//! deploymentd entry point.

use anyhow::Context;
use clap::Parser;
use fibernet_common::clients::{HttpClient, HttpCustomerClient, HttpLedgerClient};
use fibernet_common::{daemon, init_logging, CliArgs, InMemoryAuditLog, ServiceConfig};
use fibernet_deploymentd::{router, AppState, DeactivationSaga, TaskService};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_LISTEN: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
    8083,
);

/// fibernet installation tasks, deactivation saga and audit log
#[derive(Parser, Debug)]
#[command(name = "deploymentd")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    common: CliArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = ServiceConfig::resolve(&args.common, DEFAULT_LISTEN)
        .context("failed to load configuration")?;
    init_logging(&config.log_level, config.json_logs).context("failed to initialize logging")?;

    info!(
        listen = %config.listen_addr,
        inventory = %config.inventory_url,
        customers = %config.customer_url,
        "deploymentd: starting deployment service"
    );

    let timeout = config.request_timeout();
    let customers = Arc::new(HttpCustomerClient::new(
        HttpClient::new("customer", &config.customer_url, "deploymentd", timeout)
            .context("failed to build customer client")?,
    ));
    let ledger = HttpLedgerClient::new(
        HttpClient::new("inventory", &config.inventory_url, "deploymentd", timeout)
            .context("failed to build inventory client")?,
    );

    // The audit log lives here, so the saga writes to it directly.
    let audit_log = Arc::new(InMemoryAuditLog::new());
    let tasks = TaskService::new(customers.clone(), audit_log.clone());
    let saga = DeactivationSaga::new(customers, Arc::new(ledger), audit_log.clone());
    let state = Arc::new(AppState {
        tasks,
        saga,
        audit_log,
    });

    daemon::serve("deploymentd", config.listen_addr, router(state))
        .await
        .context("deploymentd server failed")?;

    info!("deploymentd: exiting");
    Ok(())
}
