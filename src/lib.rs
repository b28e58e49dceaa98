//! Kvora: threshold consensus for small clusters
//!
//! A proposal either gathers a quorum of accept votes and commits everywhere,
//! or it stalls and expires. Dissemination is flood gossip over UDP with a
//! bounded neighbor set; every handler is idempotent, so duplicate and stale
//! messages are harmless.

pub mod api;
pub mod cli;
pub mod consensus;
pub mod error;
pub mod gossip;
pub mod node;
pub mod settings;
pub mod transport;

pub use error::{KvoraError, Result};
