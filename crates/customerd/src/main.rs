//! customerd entry point.

use anyhow::Context;
use clap::Parser;
use fibernet_common::clients::{HttpAuditSink, HttpClient, HttpLedgerClient};
use fibernet_common::{daemon, init_logging, CliArgs, ServiceConfig};
use fibernet_customerd::{router, CustomerService};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_LISTEN: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
    8082,
);

/// fibernet Customer State Machine and Allocation Coordinator
#[derive(Parser, Debug)]
#[command(name = "customerd")]
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
        audit = %config.audit_url,
        "customerd: starting customer service"
    );

    let timeout = config.request_timeout();
    let ledger = HttpLedgerClient::new(
        HttpClient::new("inventory", &config.inventory_url, "customerd", timeout)
            .context("failed to build inventory client")?,
    );
    let audit = HttpAuditSink::new(
        HttpClient::new("audit", &config.audit_url, "customerd", timeout)
            .context("failed to build audit client")?,
    );

    let service = Arc::new(CustomerService::new(Arc::new(ledger), Arc::new(audit)));
    daemon::serve("customerd", config.listen_addr, router(service))
        .await
        .context("customerd server failed")?;

    info!("customerd: exiting");
    Ok(())
}
