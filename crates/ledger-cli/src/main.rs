//! Process entry point for one TrustChain node: binds the listener, dials
//! any statically configured peers, and drives the single-threaded event
//! loop described in the node's concurrency model — connection I/O, the
//! replay-queue tick, and checkpoint-round scheduling all funnel through
//! one `tokio::select!`.
//!
//! Grounded on `node.py`'s `run`/`got_discovery` wiring, with the
//! discovery-server lookup replaced by a static `--peer host:port` list.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use shared_crypto::Ed25519KeyPair;
use shared_types::NodeId;

use ledger_network::{spawn_connection, ConnId, ConnectionEvent, Message, PeerHandle};
use ledger_node::{NodeConfig, TrustChainRunner};
use ledger_telemetry::{init_telemetry, TelemetryConfig};

async fn dial(addr: &str) -> Result<TcpStream> {
    TcpStream::connect(addr).await.with_context(|| format!("dialing {addr}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::parse();
    let _telemetry = init_telemetry(TelemetryConfig::for_node(&config.port.to_string()))
        .map_err(|err| anyhow!(err.to_string()))?;

    if !config.is_within_fault_bound() {
        return Err(anyhow!(
            "fault bound violated: t={} must satisfy 3t < n={}",
            config.t,
            config.n
        ));
    }

    let keypair = Ed25519KeyPair::generate();
    let mut runner = TrustChainRunner::new(config.clone(), keypair);
    info!(node = %runner.self_id(), port = config.port, "starting node");

    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    let local_port = listener.local_addr()?.port();

    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<ConnectionEvent>();
    let mut next_conn_id: ConnId = 0;
    let mut pending: HashMap<ConnId, PeerHandle> = HashMap::new();
    let mut conn_to_node: HashMap<ConnId, NodeId> = HashMap::new();

    for addr in &config.peers {
        match dial(addr).await {
            Ok(stream) => {
                let id = next_conn_id;
                next_conn_id += 1;
                let handle = spawn_connection(id, stream, events_tx.clone());
                let _ = handle.send(Message::Ping { vk: *runner.self_id().as_bytes(), port: local_port });
                pending.insert(id, handle);
            }
            Err(err) => warn!(%addr, %err, "failed to dial bootstrap peer"),
        }
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(config.consensus_delay.max(1)));
    let mut last_started_round = 0u64;

    // One-shot delay giving peers a chance to register before the promoter
    // committee is seeded, mirroring `call_later(5, tc_runner.bootstrap_promoters)`.
    let bootstrap_sleep = tokio::time::sleep(Duration::from_secs(5));
    tokio::pin!(bootstrap_sleep);
    let mut bootstrap_done = false;

    loop {
        tokio::select! {
            _ = &mut bootstrap_sleep, if !bootstrap_done => {
                runner.bootstrap_promoters();
                bootstrap_done = true;
            }

            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        let id = next_conn_id;
                        next_conn_id += 1;
                        debug!(%addr, conn = id, "accepted connection");
                        let handle = spawn_connection(id, stream, events_tx.clone());
                        let _ = handle.send(Message::Ping { vk: *runner.self_id().as_bytes(), port: local_port });
                        pending.insert(id, handle);
                    }
                    Err(err) => error!(%err, "accept failed"),
                }
            }

            Some(event) = events_rx.recv() => {
                match event {
                    ConnectionEvent::Message(id, msg) => {
                        if let Some(node_id) = conn_to_node.get(&id).copied() {
                            runner.handle_inbound(node_id, msg);
                        } else if let Message::Ping { vk, port: _ } | Message::Pong { vk, port: _ } = msg {
                            let node_id = NodeId::new(vk);
                            if let Some(handle) = pending.remove(&id) {
                                runner.peers_mut().insert(node_id, handle);
                                conn_to_node.insert(id, node_id);
                                info!(peer = %node_id, conn = id, "peer registered");
                            }
                        } else {
                            warn!(conn = id, kind = msg.kind(), "message from an unregistered connection, dropping");
                        }
                    }
                    ConnectionEvent::Disconnected(id) => {
                        pending.remove(&id);
                        if let Some(node_id) = conn_to_node.remove(&id) {
                            runner.peers_mut().remove(&node_id);
                            info!(peer = %node_id, "peer disconnected");
                        }
                    }
                }
            }

            _ = ticker.tick() => {
                runner.drain_replay_queue();
                let target = runner.chain().latest_round() + 1;
                if target > last_started_round {
                    if let Err(err) = runner.start_round(target) {
                        warn!(round = target, %err, "failed to start consensus round");
                    } else {
                        last_started_round = target;
                    }
                }
                if config.validate {
                    if let Err(err) = runner.request_validations() {
                        warn!(%err, "failed to send validation requests");
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    Ok(())
}
