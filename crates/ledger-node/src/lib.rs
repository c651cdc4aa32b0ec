//! # Ledger Node
//!
//! The TrustChain runner: the transaction handshake, checkpoint
//! construction over ACS output, promoter rotation, the validation
//! exchange, and the replay queue that holds messages for a round or
//! instance not yet open.

mod config;
mod error;
mod queue;
mod runner;
mod trust_chain;

pub use config::{FailureMode, NodeConfig, TestMode};
pub use error::{NodeError, Result};
pub use queue::{QueuedMessage, ReplayQueue};
pub use runner::TrustChainRunner;
pub use trust_chain::{hash_pointers_ok, TrustChain};
