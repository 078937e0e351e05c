//! HTTP daemon lifecycle shared by the service binaries.

use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

/// Binds `addr` and serves `app` until SIGINT or SIGTERM.
pub async fn serve(name: &str, addr: SocketAddr, app: Router) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    info!(service = name, addr = %local, "{}: listening", name);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(name.to_string()))
        .await?;

    info!(service = name, "{}: graceful shutdown complete", name);
    Ok(())
}

/// Resolves on the first of ctrl-c or SIGTERM.
pub async fn shutdown_signal(name: String) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "{}: failed to install ctrl-c handler", name);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "{}: failed to install SIGTERM handler", name);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("{}: received SIGINT", name),
        _ = terminate => info!("{}: received SIGTERM", name),
    }
}
