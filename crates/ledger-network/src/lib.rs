//! # Ledger Network
//!
//! Length-prefixed TCP transport, the peer table, and the tagged wire
//! [`Message`] every peer connection exchanges. Ported from the teacher's
//! `MyProto`/`MyFactory` connection and broadcast model, with JSON-over-
//! newlines swapped for a 4-byte length prefix plus `bincode`.

mod connection;
mod error;
mod frame;
mod message;
mod peer;

pub use connection::{spawn_connection, ConnId, ConnectionEvent};
pub use error::{NetworkError, Result};
pub use frame::{encode_frame, read_frame, write_frame, MAX_FRAME_LEN};
pub use message::{AcsPayload, BrachaPhase, Envelope, Message, Mo14Phase};
pub use peer::{PeerHandle, PeerTable};
