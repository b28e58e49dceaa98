//! CLI for this application
//!
use crate::settings;

#[derive(Clone, Debug, clap::Parser)]
#[clap(name = settings::APP_NAME, version = settings::APP_VERSION)]
pub struct Cli {
    // Node identity used in the vote ledger and gossip messages
    #[clap(
        long,
        env("KVORA_NODE_NAME"),
        help = "Node name (defaults to listen address + UDP port)"
    )]
    pub node_name: Option<String>,

    // Server listen address
    #[clap(
        long,
        default_value = "0.0.0.0",
        env("KVORA_LISTEN_ADDRESS"),
        help = "IP Address to listen on"
    )]
    pub listen_address: String,

    // HTTP API listen port
    #[clap(
        long,
        default_value = settings::DEFAULT_PORT_HTTP,
        env("KVORA_HTTP_LISTEN_PORT"),
        help = "Port to bind Kvora HTTP API server to"
    )]
    pub listen_port: u16,

    // UDP listen port for consensus gossip
    #[clap(
        long,
        default_value = settings::DEFAULT_PORT_UDP,
        env("KVORA_UDP_LISTEN_PORT"),
        help = "Port to bind Kvora UDP server to"
    )]
    pub listen_port_udp: u16,

    // Quorum fraction f in threshold(N) = ceil(N * f)
    #[clap(
        long,
        default_value = "0.6666666666666666",
        env("KVORA_THRESHOLD_FRACTION"),
        help = "Quorum fraction of the cluster required to commit"
    )]
    pub threshold_fraction: f64,

    // Target neighbor cardinality
    #[clap(
        long,
        default_value = "7",
        env("KVORA_NEIGHBOR_CARDINALITY"),
        help = "Max neighbors to gossip with directly"
    )]
    pub neighbor_cardinality: usize,

    // Proposal expiry
    #[clap(
        long,
        default_value = "10",
        env("KVORA_PROPOSAL_TIMEOUT_SECONDS"),
        help = "Seconds before a stalled proposal is dropped"
    )]
    pub proposal_timeout_seconds: u64,

    // Sweep cadence
    #[clap(
        long,
        default_value = "5",
        env("KVORA_SWEEP_INTERVAL_SECONDS"),
        help = "Seconds between proposal expiry sweeps"
    )]
    pub sweep_interval_seconds: u64,

    // Cluster configuration information: topology
    #[clap(
        long,
        env("KVORA_TOPOLOGY"),
        value_delimiter = ',',
        help = "Peer UDP addresses as name@host:port (e.g., node1@10.0.0.1:8522,node2@10.0.0.2:8522). If empty, runs in single-node mode."
    )]
    pub topology: Vec<String>,

    // Known cluster size override
    #[clap(
        long,
        env("KVORA_CLUSTER_SIZE"),
        help = "Cluster size for quorum math (defaults to topology size + 1)"
    )]
    pub cluster_size: Option<usize>,

    // Operator console
    #[clap(
        long,
        env("KVORA_CONSOLE"),
        help = "Run the line-oriented operator console on stdin"
    )]
    pub console: bool,
}

impl Cli {
    pub fn into_settings(self) -> settings::Settings {
        settings::Settings {
            node_name: self.node_name,
            listen_address: self.listen_address,
            listen_port: self.listen_port,
            listen_port_udp: self.listen_port_udp,
            threshold_fraction: self.threshold_fraction,
            neighbor_cardinality: self.neighbor_cardinality,
            proposal_timeout_secs: self.proposal_timeout_seconds,
            sweep_interval_secs: self.sweep_interval_seconds,
            topology: self.topology,
            cluster_size: self.cluster_size,
            console: self.console,
        }
    }
}
