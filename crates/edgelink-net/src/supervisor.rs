//! Lifecycle supervisors: the Host side dials out and reconnects on a
//! fixed settle delay; the Client side accepts and pre-empts whatever
//! connection is currently active (single-active-connection policy).

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use edgelink_core::InputMessage;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::connection::Connection;

/// Delay between a dropped connection and the next attempt, on both the
/// Host's dial-out loop and as a floor on the Client's accept loop so a
/// flapping peer can't spin either side.
pub const SETTLE_DELAY: Duration = Duration::from_secs(3);

/// Host side: repeatedly dial `addr`, run the connection until it drops,
/// wait [`SETTLE_DELAY`], and try again. Runs until the process exits;
/// never returns `Ok`.
pub async fn run_host_connect_loop(addr: SocketAddr, inbound: mpsc::Sender<InputMessage>) -> Result<Connection> {
    loop {
        info!(%addr, "connecting to client");
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                stream.set_nodelay(true).ok();
                info!(%addr, "connection established");
                return Ok(Connection::spawn(stream, inbound));
            }
            Err(err) => {
                warn!(%addr, %err, "connect failed, retrying after settle delay");
                tokio::time::sleep(SETTLE_DELAY).await;
            }
        }
    }
}

/// Client side: a single-active-connection accept loop. Binds once, then
/// on every accepted connection tears down whatever connection preceded
/// it (the newest peer always wins) and hands the fresh [`Connection`] to
/// `on_connect`.
pub struct ClientAcceptLoop {
    listener: TcpListener,
}

impl ClientAcceptLoop {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        info!(%addr, "listening for host connections");
        Ok(Self { listener })
    }

    /// Accepts the next connection, pre-empting `current` if it is some.
    /// Returns the new `Connection`; the caller is expected to replace its
    /// held connection with the returned one, which drops (and thereby
    /// tears down the reader/writer tasks of) the previous connection.
    pub async fn accept_next(&self, inbound: mpsc::Sender<InputMessage>) -> Result<Connection> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    stream.set_nodelay(true).ok();
                    info!(%peer, "accepted host connection, pre-empting any prior connection");
                    return Ok(Connection::spawn(stream, inbound));
                }
                Err(err) => {
                    warn!(%err, "accept failed, retrying");
                    tokio::time::sleep(SETTLE_DELAY).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    #[tokio::test]
    async fn accept_loop_hands_back_a_live_connection() {
        let listener = ClientAcceptLoop::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.listener.local_addr().unwrap();

        let (inbound_tx, _inbound_rx) = mpsc::channel(8);
        let client_task = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });

        let conn = listener.accept_next(inbound_tx).await.unwrap();
        let _client_stream = client_task.await.unwrap();

        conn.send(InputMessage::ControlRelease).await;
    }

    #[tokio::test]
    async fn a_second_connection_preempts_the_first() {
        let listener = ClientAcceptLoop::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.listener.local_addr().unwrap();

        let (inbound_tx, _inbound_rx) = mpsc::channel(8);
        let mut first_client = TcpStream::connect(addr).await.unwrap();
        let first = listener.accept_next(inbound_tx.clone()).await.unwrap();

        let second_client = TcpStream::connect(addr).await.unwrap();
        let second = listener.accept_next(inbound_tx).await.unwrap();

        // Pre-empting the first connection is exactly this: drop it. That
        // aborts its reader/writer tasks, so its peer observes EOF rather
        // than continuing to exchange messages with an orphaned socket.
        drop(first);

        let mut buf = [0u8; 1];
        let n = tokio::time::timeout(Duration::from_secs(2), first_client.read(&mut buf))
            .await
            .expect("first connection's peer should observe closure promptly")
            .unwrap();
        assert_eq!(n, 0, "first connection's peer should see EOF once pre-empted");

        second.send(InputMessage::ControlRelease).await;
        drop(first_client);
        drop(second_client);
    }
}
