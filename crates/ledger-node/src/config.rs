//! Runtime configuration for one node, mirroring the teacher reference's
//! `Config` object but as a typed `clap` struct instead of stringly-typed
//! argv.

use clap::{Parser, ValueEnum};

/// A fault-injection mode for local testing. `Byzantine` is reserved: the
/// protocol is required to tolerate `t < n/3` arbitrary faults, but no
/// concrete byzantine behavior is wired up in this reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FailureMode {
    /// Silently drop a selected class of outbound messages.
    Omission,
    /// Reserved; the protocol must tolerate it, nothing triggers it yet.
    Byzantine,
}

/// Which standalone test harness to run instead of the reactive node, if
/// any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TestMode {
    Dummy,
    Bracha,
    Mo14,
    Acs,
    Tc,
    Bootstrap,
}

/// All the static settings a running node needs.
#[derive(Debug, Clone, Parser)]
#[command(name = "ledger-node", about = "A TrustChain BFT ledger node")]
pub struct NodeConfig {
    /// TCP port this node listens on.
    #[arg(long)]
    pub port: u16,

    /// Total number of participants in the network.
    #[arg(long)]
    pub n: usize,

    /// Byzantine fault bound; must satisfy `t < n/3`.
    #[arg(long)]
    pub t: usize,

    /// Run a standalone test harness instead of the reactive node.
    #[arg(long, value_enum)]
    pub test: Option<TestMode>,

    /// This node's initial proposal bit for bracha/mo14 test harnesses.
    #[arg(long, default_value_t = 0)]
    pub value: u8,

    /// Fault injection mode, if any.
    #[arg(long, value_enum)]
    pub failure: Option<FailureMode>,

    /// Mean transactions issued per second by the synthetic load driver.
    #[arg(long, default_value_t = 0.0)]
    pub tx_rate: f64,

    /// Seconds between the end of one consensus round and the start of
    /// the next checkpoint round.
    #[arg(long, default_value_t = 1)]
    pub consensus_delay: u64,

    /// Number of peers to gossip a message to, for gossip-style sends.
    #[arg(long, default_value_t = 3)]
    pub fan_out: usize,

    /// Whether to actively request validation for unknown transactions.
    #[arg(long, default_value_t = false)]
    pub validate: bool,

    /// Skip registering as a promoter candidate even when eligible.
    #[arg(long, default_value_t = false)]
    pub ignore_promoter: bool,

    /// `host:port` of a peer to dial at startup. Repeatable. Static
    /// bootstrap in place of the reference's discovery-server lookup.
    #[arg(long = "peer")]
    pub peers: Vec<String>,
}

impl NodeConfig {
    /// `t < n/3`, the Byzantine fault bound every algorithm in this crate
    /// assumes.
    pub fn is_within_fault_bound(&self) -> bool {
        3 * self.t < self.n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_bound_rejects_too_large_t() {
        let cfg = NodeConfig {
            port: 9000,
            n: 4,
            t: 2,
            test: None,
            value: 0,
            failure: None,
            tx_rate: 0.0,
            consensus_delay: 1,
            fan_out: 3,
            validate: false,
            ignore_promoter: false,
            peers: vec![],
        };
        assert!(!cfg.is_within_fault_bound());
    }

    #[test]
    fn fault_bound_accepts_standard_four_node_setup() {
        let cfg = NodeConfig {
            port: 9000,
            n: 4,
            t: 1,
            test: None,
            value: 0,
            failure: None,
            tx_rate: 0.0,
            consensus_delay: 1,
            fan_out: 3,
            validate: false,
            ignore_promoter: false,
            peers: vec![],
        };
        assert!(cfg.is_within_fault_bound());
    }
}
