//! Framed TCP connection: read/write halves, a bounded outbound channel,
//! and an `Up`/`Down` lifecycle published over a `watch` channel (a
//! one-to-few broadcast for state that outlives any single reader).

use std::io;

use edgelink_core::{InputMessage, MAX_FRAME_BYTES};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Outbound channel depth. Generous enough that a burst of keyboard/button
/// events never blocks the capture thread under ordinary network jitter;
/// see the backpressure policy on [`InputMessage::is_droppable`].
const OUTBOUND_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Up,
    Down,
}

/// A live framed connection. Cloning `outbound` and sharing `state` lets
/// multiple parts of a binary (the capture thread's bridging task, the
/// control state machine) publish messages and observe liveness without
/// holding the socket itself.
pub struct Connection {
    outbound: mpsc::Sender<InputMessage>,
    state: watch::Receiver<ConnState>,
    reader_handle: JoinHandle<()>,
    writer_handle: JoinHandle<()>,
}

impl Connection {
    /// Splits `stream` and spawns its reader/writer tasks. `inbound` is
    /// where decoded messages from the peer are delivered; the returned
    /// `Connection` is how callers enqueue outbound messages and observe
    /// `Up`/`Down` transitions. Dropping the returned value aborts both
    /// tasks immediately, which is how the Client's accept loop cancels a
    /// pre-empted connection.
    pub fn spawn(stream: TcpStream, inbound: mpsc::Sender<InputMessage>) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnState::Up);

        let reader_handle = tokio::spawn(reader_task(read_half, inbound, state_tx.clone()));
        let writer_handle = tokio::spawn(writer_task(write_half, outbound_rx, state_tx));

        Self {
            outbound: outbound_tx,
            state: state_rx,
            reader_handle,
            writer_handle,
        }
    }

    /// Enqueues `msg` for sending. Droppable classes (plain motion,
    /// phase-0 scroll, mid-gesture updates) are silently dropped if the
    /// channel is full; everything else awaits capacity so it is never
    /// lost to a transient burst.
    pub async fn send(&self, msg: InputMessage) {
        if msg.is_droppable() {
            if let Err(err) = self.outbound.try_send(msg) {
                debug!(%err, "dropped droppable message under backpressure");
            }
        } else if self.outbound.send(msg).await.is_err() {
            warn!("connection writer gone, message lost");
        }
    }

    pub fn state(&self) -> watch::Receiver<ConnState> {
        self.state.clone()
    }

    /// Resolves once the connection has transitioned to `Down` (or
    /// immediately, if it already has).
    pub async fn until_down(&self) {
        let mut rx = self.state.clone();
        while *rx.borrow() != ConnState::Down {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader_handle.abort();
        self.writer_handle.abort();
    }
}

async fn reader_task(
    mut read_half: ReadHalf<TcpStream>,
    inbound: mpsc::Sender<InputMessage>,
    state_tx: watch::Sender<ConnState>,
) {
    loop {
        match read_frame(&mut read_half).await {
            Ok(Some(payload)) => match edgelink_core::decode_payload(&payload) {
                Ok(msg) => {
                    if inbound.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(edgelink_core::Error::UnknownVariant(kind)) => {
                    debug!(kind, "skipping unknown wire message");
                }
                Err(err) => {
                    warn!(%err, "fatal decode error, closing connection");
                    break;
                }
            },
            Ok(None) => {
                debug!("peer closed the connection");
                break;
            }
            Err(err) => {
                warn!(%err, "read error, closing connection");
                break;
            }
        }
    }
    let _ = state_tx.send(ConnState::Down);
}

async fn read_frame(read_half: &mut ReadHalf<TcpStream>) -> io::Result<Option<Vec<u8>>> {
    let len = match read_half.read_u32().await {
        Ok(len) => len,
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err),
    };
    if len > MAX_FRAME_BYTES {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "frame exceeds MAX_FRAME_BYTES"));
    }
    let mut buf = vec![0u8; len as usize];
    read_half.read_exact(&mut buf).await?;
    Ok(Some(buf))
}

async fn writer_task(
    mut write_half: WriteHalf<TcpStream>,
    mut outbound_rx: mpsc::Receiver<InputMessage>,
    state_tx: watch::Sender<ConnState>,
) {
    while let Some(msg) = outbound_rx.recv().await {
        let frame = match edgelink_core::encode(&msg) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(%err, "failed to encode outbound message, dropping it");
                continue;
            }
        };
        if let Err(err) = write_half.write_all(&frame).await {
            warn!(%err, "write error, closing connection");
            break;
        }
    }
    let _ = state_tx.send(ConnState::Down);
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgelink_core::{InputMessage, KeyEvent};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn roundtrips_a_message_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });
        let client_stream = TcpStream::connect(addr).await.unwrap();
        let server_stream = accept.await.unwrap();

        let (client_inbound_tx, mut client_inbound_rx) = mpsc::channel(8);
        let (server_inbound_tx, _server_inbound_rx) = mpsc::channel(8);

        let client = Connection::spawn(client_stream, client_inbound_tx);
        let server = Connection::spawn(server_stream, server_inbound_tx);

        let sent = InputMessage::Keyboard {
            key_code: 0x04,
            event: KeyEvent::KeyDown,
            flags: 0,
        };
        server.send(sent.clone()).await;

        let received = client_inbound_rx.recv().await.unwrap();
        assert_eq!(received, sent);
    }

    #[tokio::test]
    async fn state_goes_down_when_peer_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });
        let client_stream = TcpStream::connect(addr).await.unwrap();
        let server_stream = accept.await.unwrap();

        let (client_inbound_tx, _rx) = mpsc::channel(8);
        let client = Connection::spawn(client_stream, client_inbound_tx);

        drop(server_stream);

        tokio::time::timeout(std::time::Duration::from_secs(2), client.until_down())
            .await
            .expect("connection should observe peer close");
    }
}
