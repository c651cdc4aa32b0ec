//! # Ledger MO14
//!
//! The Mostefaoui–Moin–Raynal binary Byzantine agreement protocol: rounds
//! of `EST`/`AUX` broadcasts over `{0,1}` with a pluggable shared coin as
//! fallback, guaranteeing every correct node decides the same bit and, if
//! every correct node starts with the same bit, decides that bit.

mod coin;
mod egress;
mod instance;

pub use coin::{CommonCoin, ParityCoin};
pub use egress::{Mo14Egress, RecordingEgress};
pub use instance::{Mo14Event, Mo14Instance, Mo14Params};
