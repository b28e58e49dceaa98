//! Line-oriented operator console on stdin
//!
//! Meant for poking a running node during development and demos:
//!
//! ```text
//! propose <key> <value>   start consensus on a keyed value
//! state                   print the committed store
//! peers                   print the neighbor set
//! status                  print quorum and proposal counters
//! quit                    leave the console (the node keeps running)
//! ```
//!
//! Values parse as JSON first, falling back to a plain string.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;

use super::ConsensusNode;
use crate::error::Result;

pub async fn run(node: Arc<ConsensusNode>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    stdout.write_all(b"kvora console ready (help for commands)\n> ").await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let reply = match dispatch(&node, line.trim()).await {
            Ok(Some(reply)) => reply,
            Ok(None) => break,
            Err(e) => {
                warn!("Console command failed: {}", e);
                format!("error: {}", e)
            }
        };
        stdout.write_all(reply.as_bytes()).await?;
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;
    }
    Ok(())
}

/// Run one command. `Ok(None)` means quit.
async fn dispatch(node: &ConsensusNode, line: &str) -> Result<Option<String>> {
    let mut parts = line.splitn(3, ' ');
    let command = parts.next().unwrap_or("");

    let reply = match command {
        "" => String::new(),
        "propose" => {
            let (Some(key), Some(raw)) = (parts.next(), parts.next()) else {
                return Ok(Some("usage: propose <key> <value>".into()));
            };
            let value = parse_value(raw);
            match node.propose(key.to_string(), value).await? {
                Some(proposal_id) => format!("proposal {} started", proposal_id),
                None => format!("'{}' is already committed", key),
            }
        }
        "state" => {
            let snapshot = node.committed_snapshot()?;
            if snapshot.is_empty() {
                "(empty)".into()
            } else {
                let mut entries: Vec<(String, Value)> = snapshot.into_iter().collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                entries
                    .into_iter()
                    .map(|(k, v)| format!("{} = {}", k, v))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
        "peers" => {
            let peers = node.peers()?;
            if peers.is_empty() {
                "(no neighbors)".into()
            } else {
                peers
                    .iter()
                    .map(|p| format!("{} @ {}", p.node_id, p.addr))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
        "status" => {
            let status = node.status()?;
            format!(
                "node {} | cluster {} | quorum {} | neighbors {} | pending {} | committed {}",
                status.node_id,
                status.cluster_size,
                status.quorum,
                status.neighbor_count,
                status.pending_proposals,
                status.committed_entries
            )
        }
        "help" => "commands: propose <key> <value> | state | peers | status | quit".into(),
        "quit" | "exit" => return Ok(None),
        other => format!("unknown command '{}' (help for commands)", other),
    };
    Ok(Some(reply))
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
