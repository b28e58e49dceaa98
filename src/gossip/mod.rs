//! Gossip dissemination for threshold consensus
//!
//! The wire protocol is a small tagged object per message (PROPOSE, VOTE,
//! COMMIT, TOPOLOGY). Dissemination is flood gossip over the bounded
//! neighbor set: re-broadcast to all-but-the-sender until every reachable
//! node has seen the value, trading duplicate messages for robustness. The
//! engine's idempotence absorbs the duplicates.

pub mod dissemination;
pub mod messages;

pub use dissemination::{handle_message, plan_local_propose, Outbound, Recipient};
pub use messages::{unix_timestamp, WireMessage};
