//! The tagged wire message every peer connection exchanges.

use serde::{Deserialize, Serialize};

use ledger_chain::{CompactBlock, Cons, CpBlock, Signature, TxHalf};
use shared_types::{NodeId, PublicKey};

/// One ACS-layer sub-message: a Bracha vote for a promoter's proposed
/// checkpoint, or a MO14 vote for an inclusion-agreement round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcsPayload {
    BrachaInit { proposer: usize, cp: CpBlock },
    BrachaEcho { proposer: usize, cp: CpBlock },
    BrachaReady { proposer: usize, cp: CpBlock },
    Mo14Est { ba: usize, round: u64, bit: bool },
    Mo14Aux { ba: usize, round: u64, bit: bool },
}

/// A Bracha message for the standalone test harness (`test=bracha` in the
/// teacher's config).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrachaPhase {
    Init,
    Echo,
    Ready,
}

/// A MO14 message for the standalone test harness (`test=mo14`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mo14Phase {
    Est,
    Aux,
}

/// Every message the node's wire protocol understands, tagged by variant
/// per `bincode`'s standard enum encoding (a leading `u32` discriminant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    Ping { vk: PublicKey, port: u16 },
    Pong { vk: PublicKey, port: u16 },

    /// Carries the initiator's own signed half so the responder can attach
    /// it immediately, symmetrically with how `TxResp` hands back the
    /// responder's half.
    TxReq { half: TxHalf },
    TxResp { half: TxHalf },

    ValidationReq { seq: u64 },
    ValidationResp { pieces: Vec<CompactBlock> },

    SigWithRound { round: u64, sig: Signature },

    CpBlock { cp: CpBlock },
    Cons { cons: Cons },
    AskCons { round: u64 },

    Acs { round: u64, payload: AcsPayload },

    /// Test-only: drives `ledger-bracha` directly, bypassing ACS.
    Bracha { instance_tag: String, phase: BrachaPhase, value: Vec<u8> },
    /// Test-only: drives `ledger-mo14` directly, bypassing ACS.
    Mo14 { instance_tag: String, round: u64, phase: Mo14Phase, bit: bool },

    /// Test driver payload, otherwise inert.
    Dummy,
}

impl Message {
    /// A short tag for logging, matching the wire table's names.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Ping { .. } => "Ping",
            Message::Pong { .. } => "Pong",
            Message::TxReq { .. } => "TxReq",
            Message::TxResp { .. } => "TxResp",
            Message::ValidationReq { .. } => "ValidationReq",
            Message::ValidationResp { .. } => "ValidationResp",
            Message::SigWithRound { .. } => "SigWithRound",
            Message::CpBlock { .. } => "CpBlock",
            Message::Cons { .. } => "Cons",
            Message::AskCons { .. } => "AskCons",
            Message::Acs { .. } => "Acs",
            Message::Bracha { .. } => "Bracha",
            Message::Mo14 { .. } => "Mo14",
            Message::Dummy => "Dummy",
        }
    }
}

/// Who a message came from, paired with the message itself — the shape
/// every inbound channel moves around.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub from: NodeId,
    pub message: Message,
}
