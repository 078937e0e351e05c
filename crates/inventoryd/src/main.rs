//! inventoryd entry point.

use anyhow::Context;
use clap::Parser;
use fibernet_common::{daemon, init_logging, CliArgs, ServiceConfig};
use fibernet_inventoryd::{router, ResourceLedger};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_LISTEN: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
    8081,
);

/// fibernet Resource Ledger
#[derive(Parser, Debug)]
#[command(name = "inventoryd")]
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

    info!(listen = %config.listen_addr, "inventoryd: starting resource ledger");

    let ledger = Arc::new(ResourceLedger::new());
    daemon::serve("inventoryd", config.listen_addr, router(ledger))
        .await
        .context("inventoryd server failed")?;

    info!("inventoryd: exiting");
    Ok(())
}
