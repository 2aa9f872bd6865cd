use anyhow::Result;
use clap::{Parser, Subcommand};
use quiver_client::QuiverClient;
use quiver_cluster::{PeerSelector, ShardRebalancer};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::rebalance::RunOptions;

#[derive(Parser, Debug)]
#[command(name = "quiver")]
#[command(about = "Quiver CLI - shard rebalancing for vector search clusters")]
#[command(version)]
struct Cli {
    /// Cluster HTTP API URL (any peer)
    #[arg(long, global = true, env = "QUIVER_URL")]
    url: Option<String>,

    /// API key sent with every request
    #[arg(long, global = true, env = "QUIVER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Config file (default: ~/.quiver/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replicate every shard a peer is missing onto it
    Replicate {
        /// Target peer id or address substring (`id:` / `addr:` to force either)
        target: PeerSelector,

        /// Limit to these collections (repeatable; default: all)
        #[arg(short, long = "collection")]
        collections: Vec<String>,

        /// Skip shards that already reached the collection's replication factor
        #[arg(long)]
        respect_replication_factor: bool,

        /// Only print the planned transfers
        #[arg(long)]
        dry_run: bool,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Move every shard off a peer onto the remaining peers
    Drain {
        /// Source peer id or address substring (`id:` / `addr:` to force either)
        source: PeerSelector,

        /// Limit to these collections (repeatable; default: all)
        #[arg(short, long = "collection")]
        collections: Vec<String>,

        /// Only print the planned transfers
        #[arg(long)]
        dry_run: bool,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replicate shards onto an empty peer until it matches a populated one
    Equalize {
        /// Populated peer id or address substring (`id:` / `addr:` to force either)
        source: PeerSelector,

        /// Empty peer id or address substring (`id:` / `addr:` to force either)
        empty_target: PeerSelector,

        /// Collections to equalize (repeatable)
        #[arg(short, long = "collection", required = true)]
        collections: Vec<String>,

        /// Only print the planned transfers
        #[arg(long)]
        dry_run: bool,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check whether a peer holds no shards at all
    IsEmpty {
        /// Peer id or address substring (`id:` / `addr:` to force either)
        peer: PeerSelector,
    },

    /// Resolve a peer selector and show the peer table
    Peer {
        /// Peer id or address substring (`id:` / `addr:` to force either)
        selector: PeerSelector,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List all peers of the cluster
    Peers {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = config::Config::load(cli.config.as_deref())?;
    config.apply_overrides(cli.url, cli.api_key);

    tracing::debug!("Connecting to {}", config.client.url);
    let client = QuiverClient::new(&config.client)?;
    let rebalancer = ShardRebalancer::new(client, config.rebalancing);

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling; transfers already issued are kept");
            on_ctrl_c.cancel();
        }
    });

    match cli.command {
        Commands::Replicate {
            target,
            collections,
            respect_replication_factor,
            dry_run,
            json,
        } => {
            commands::run_replicate(
                &rebalancer,
                &target,
                &collections,
                respect_replication_factor,
                RunOptions { dry_run, json },
                &cancel,
            )
            .await?;
        }
        Commands::Drain {
            source,
            collections,
            dry_run,
            json,
        } => {
            commands::run_drain(
                &rebalancer,
                &source,
                &collections,
                RunOptions { dry_run, json },
                &cancel,
            )
            .await?;
        }
        Commands::Equalize {
            source,
            empty_target,
            collections,
            dry_run,
            json,
        } => {
            commands::run_equalize(
                &rebalancer,
                &source,
                &empty_target,
                &collections,
                RunOptions { dry_run, json },
                &cancel,
            )
            .await?;
        }
        Commands::IsEmpty { peer } => {
            commands::run_is_empty(&rebalancer, &peer, &cancel).await?;
        }
        Commands::Peer { selector, json } => {
            commands::run_peer(&rebalancer, &selector, json, &cancel).await?;
        }
        Commands::Peers { json } => {
            commands::run_peers(&rebalancer, json, &cancel).await?;
        }
    }

    Ok(())
}
