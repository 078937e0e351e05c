//! topologyd entry point.

use anyhow::Context;
use clap::Parser;
use fibernet_common::clients::{HttpClient, HttpCustomerClient, HttpLedgerClient};
use fibernet_common::{daemon, init_logging, CliArgs, ServiceConfig};
use fibernet_topologyd::{router, TopologyResolver};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_LISTEN: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
    8084,
);

/// fibernet Topology Resolver
#[derive(Parser, Debug)]
#[command(name = "topologyd")]
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
        fanout_limit = config.fanout_limit,
        "topologyd: starting topology service"
    );

    let timeout = config.request_timeout();
    let ledger = HttpLedgerClient::new(
        HttpClient::new("inventory", &config.inventory_url, "topologyd", timeout)
            .context("failed to build inventory client")?,
    );
    let customers = HttpCustomerClient::new(
        HttpClient::new("customer", &config.customer_url, "topologyd", timeout)
            .context("failed to build customer client")?,
    );

    let resolver = Arc::new(TopologyResolver::new(
        Arc::new(ledger),
        Arc::new(customers),
        config.fanout_limit,
    ));
    daemon::serve("topologyd", config.listen_addr, router(resolver))
        .await
        .context("topologyd server failed")?;

    info!("topologyd: exiting");
    Ok(())
}
