//! Kvora application settings
use std::net::SocketAddr;
use std::time::Duration;

use crate::config_error;
use crate::consensus::{EngineConfig, NodeId, PeerContact};
use crate::error::Result;

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const STANDARD_PORT_HTTP: u16 = 8520;
pub const DEFAULT_PORT_HTTP: &str = "8520";
pub const STANDARD_PORT_UDP: u16 = 8522;
pub const DEFAULT_PORT_UDP: &str = "8522";

#[derive(Clone, Debug)]
pub struct Settings {
    // Node identity; falls back to listen address + UDP port
    pub node_name: Option<String>,

    // Server listen address
    pub listen_address: String,

    // HTTP API listen port
    pub listen_port: u16,

    // UDP listen port for consensus gossip
    pub listen_port_udp: u16,

    // Quorum fraction f in threshold(N) = ceil(N * f)
    pub threshold_fraction: f64,

    // Target neighbor cardinality k
    pub neighbor_cardinality: usize,

    // Seconds a proposal may stall before the sweeper drops it
    pub proposal_timeout_secs: u64,

    // Seconds between expiry sweeps
    pub sweep_interval_secs: u64,

    // Static bootstrap topology entries, "name@host:port"
    pub topology: Vec<String>,

    // Known cluster size override (defaults to topology size + self)
    pub cluster_size: Option<usize>,

    // Run the line-oriented operator console on stdin
    pub console: bool,
}

impl Settings {
    pub fn node_id(&self) -> NodeId {
        match &self.node_name {
            Some(name) => NodeId::new(name.clone()),
            None => NodeId::new(format!("{}:{}", self.listen_address, self.listen_port_udp)),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            threshold_fraction: self.threshold_fraction,
            proposal_timeout: Duration::from_secs(self.proposal_timeout_secs),
            neighbor_cardinality: self.neighbor_cardinality,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn http_bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.listen_address, self.listen_port)
            .parse()
            .map_err(|e| config_error!("Invalid HTTP listen address: {}", e))
    }

    pub fn udp_bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.listen_address, self.listen_port_udp)
            .parse()
            .map_err(|e| config_error!("Invalid UDP listen address: {}", e))
    }

    /// Parse the static bootstrap topology ("name@host:port" per entry).
    pub fn initial_contacts(&self) -> Result<Vec<PeerContact>> {
        self.topology
            .iter()
            .map(|entry| {
                let (name, addr) = entry
                    .split_once('@')
                    .ok_or_else(|| config_error!("Invalid topology entry '{}': expected name@host:port", entry))?;
                let addr: SocketAddr = addr
                    .parse()
                    .map_err(|e| config_error!("Invalid topology address '{}': {}", addr, e))?;
                Ok(PeerContact {
                    node_id: NodeId::new(name),
                    addr,
                })
            })
            .collect()
    }

    /// Cluster size including self, unless explicitly overridden.
    pub fn initial_cluster_size(&self) -> usize {
        self.cluster_size.unwrap_or(self.topology.len() + 1).max(1)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.threshold_fraction > 0.0 && self.threshold_fraction <= 1.0) {
            return Err(config_error!(
                "Threshold fraction must be in (0, 1], got {}",
                self.threshold_fraction
            ));
        }
        if self.neighbor_cardinality == 0 {
            return Err(config_error!("Neighbor cardinality must be at least 1"));
        }
        if self.sweep_interval_secs == 0 {
            return Err(config_error!("Sweep interval must be at least 1 second"));
        }
        Ok(())
    }
}
