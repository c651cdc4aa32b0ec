//! # Ledger ACS
//!
//! Asynchronous Common Subset: `n` parallel Bracha proposal broadcasts
//! feeding `n` parallel MO14 inclusion votes, producing a set of at least
//! `n − t` agreed proposals that is identical at every correct node.

mod egress;
mod instance;

pub use egress::{AcsEgress, RecordingEgress};
pub use instance::{AcsEvent, AcsInstance};
