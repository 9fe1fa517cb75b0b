use std::net::SocketAddr;

use anyhow::{Context, Result};
use oplimit_core::{Duplex, IoStream, Limits, RateLimiter};
use tokio::net::{TcpListener, TcpStream};

use super::pump;

/// Accept TCP connections on `listen` and relay each one to `upstream`.
///
/// Every client connection gets its own limiter; the upstream side is not
/// throttled. Stops accepting on Ctrl-C.
pub async fn run_proxy(
    listen: String,
    upstream: String,
    limits: Limits,
    chunk_size: usize,
) -> Result<()> {
    let listener = TcpListener::bind(&listen)
        .await
        .with_context(|| format!("Failed to listen on {}", listen))?;

    log::info!(
        "proxying {} -> {} at {}/s per connection (burst {})",
        listener.local_addr()?,
        upstream,
        limits.limit_rate,
        limits.max_burst
    );

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (client, peer) = accepted.context("Failed to accept connection")?;
                let upstream = upstream.clone();
                tokio::spawn(async move {
                    if let Err(e) = relay_connection(client, peer, &upstream, limits, chunk_size).await {
                        log::warn!("connection from {} failed: {:#}", peer, e);
                    }
                });
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                log::info!("shutting down proxy");
                return Ok(());
            }
        }
    }
}

async fn relay_connection(
    client: TcpStream,
    peer: SocketAddr,
    upstream: &str,
    limits: Limits,
    chunk_size: usize,
) -> Result<()> {
    let server = TcpStream::connect(upstream)
        .await
        .with_context(|| format!("Failed to connect to upstream {}", upstream))?;
    log::debug!("{} connected, relaying to {}", peer, upstream);

    let client = RateLimiter::with_limits(IoStream::new(client), limits)?;
    let server = IoStream::new(server);

    let outbound = async {
        let sent = pump(&client, &server, chunk_size).await?;
        server.close().await?;
        Ok::<_, std::io::Error>(sent)
    };
    let inbound = pump(&server, &client, chunk_size);
    let (sent, received) = tokio::try_join!(outbound, inbound)?;

    client.close().await?;
    client.wait_closed().await?;

    log::info!("{} closed: {} bytes up, {} bytes down", peer, sent, received);
    Ok(())
}
