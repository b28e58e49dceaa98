use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kvora::api;
use kvora::cli;
use kvora::consensus::ConsensusEngine;
use kvora::node::{console, ConsensusNode};
use kvora::transport::{PeerSender, UdpTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kvora=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse args and env vars
    let args = cli::Cli::parse();
    let settings = args.into_settings();
    settings.validate()?;

    // Consensus engine seeded with the static bootstrap topology
    let node_id = settings.node_id();
    let mut engine = ConsensusEngine::new(node_id.clone(), settings.engine_config());
    let contacts = settings.initial_contacts()?;
    engine.apply_topology_update(contacts, settings.initial_cluster_size());

    // UDP transport for gossip
    let transport = UdpTransport::bind(settings.udp_bind_addr()?).await?;
    info!("Node {} gossiping on {}", node_id, transport.local_addr());
    let message_rx = transport.receiver().into_message_channel();
    let sender: Arc<dyn PeerSender> = Arc::new(transport);

    // Node binding plus its background loops
    let node = Arc::new(ConsensusNode::new(engine, sender));
    node.spawn_receive_loop(message_rx);
    node.spawn_sweeper(settings.sweep_interval());

    if settings.console {
        let console_node = Arc::clone(&node);
        tokio::spawn(async move {
            if let Err(e) = console::run(console_node).await {
                tracing::warn!("Console exited with error: {}", e);
            }
        });
    }

    // Build Axum Router
    let api = api::api(Arc::clone(&node)).await?;

    // Start server
    let socket_address = settings.http_bind_addr()?;
    info!("Starting Kvora on {}", socket_address);
    axum::Server::bind(&socket_address)
        .serve(api.into_make_service())
        .await?;

    Ok(())
}
