//! # Ledger Bracha
//!
//! Bracha's reliable broadcast: one designated sender, three phases
//! (`Init`/`Echo`/`Ready`), tolerating `t` Byzantine participants out of
//! `n`. Used directly by the node for checkpoint/proposal dissemination,
//! and as the sub-broadcast MO14 runs its `EST`/`AUX` rounds over.

mod egress;
mod instance;

pub use egress::{BrachaEgress, RecordingEgress};
pub use instance::{BrachaEvent, BrachaInstance, BrachaMessage, BrachaParams};
