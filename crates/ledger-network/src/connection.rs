//! Per-connection I/O tasks.
//!
//! Each accepted or dialed `TcpStream` gets a reader task and a writer
//! task. The reader only does I/O and hands decoded messages back to the
//! single-threaded node loop over a channel; the writer only drains an
//! outbound channel and writes frames. Neither task ever touches the peer
//! table or any algorithm state directly — that stays the event loop's job,
//! per the node's single-threaded concurrency model.

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::debug;

use crate::frame::{read_frame, write_frame};
use crate::message::Message;
use crate::peer::PeerHandle;

/// An opaque identifier for a connection before its peer's `NodeId` is
/// known (revealed only once a `Ping`/`Pong` handshake completes).
pub type ConnId = u64;

/// What a connection's reader task reports to the event loop.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// A frame arrived and decoded cleanly.
    Message(ConnId, Message),
    /// The connection closed or failed; the loop should forget this
    /// connection and, if it had been promoted to a known peer, remove it
    /// from the peer table.
    Disconnected(ConnId),
}

/// Split `stream` into a reader task (feeding `events`) and a writer task
/// (draining the returned handle), tagged with `id`.
pub fn spawn_connection(
    id: ConnId,
    stream: TcpStream,
    events: mpsc::UnboundedSender<ConnectionEvent>,
) -> PeerHandle {
    let (read_half, mut write_half) = stream.into_split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if let Err(err) = write_frame(&mut write_half, &msg).await {
                debug!(conn = id, %err, "write failed, closing connection");
                break;
            }
        }
    });

    tokio::spawn(async move {
        let mut read_half = read_half;
        loop {
            match read_frame(&mut read_half).await {
                Ok(msg) => {
                    if events.send(ConnectionEvent::Message(id, msg)).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    debug!(conn = id, %err, "read failed, closing connection");
                    let _ = events.send(ConnectionEvent::Disconnected(id));
                    break;
                }
            }
        }
    });

    outbound_tx
}
