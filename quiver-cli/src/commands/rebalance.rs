use anyhow::Result;
use quiver_client::QuiverClient;
use quiver_cluster::{PeerSelector, RebalanceOutcome, ShardRebalancer};
use tokio_util::sync::CancellationToken;

/// Shared flags of the replicate, drain and equalize commands
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub dry_run: bool,
    pub json: bool,
}

fn collection_filter(collections: &[String]) -> Option<&[String]> {
    if collections.is_empty() {
        None
    } else {
        Some(collections)
    }
}

/// Copy missing shards onto a peer
pub async fn run_replicate(
    rebalancer: &ShardRebalancer<QuiverClient>,
    target: &PeerSelector,
    collections: &[String],
    respect_replication_factor: bool,
    options: RunOptions,
    cancel: &CancellationToken,
) -> Result<()> {
    let ignore_replication_factor =
        !respect_replication_factor && rebalancer.config().ignore_replication_factor;

    let outcome = rebalancer
        .replicate_shards_to_peer(
            target,
            collection_filter(collections),
            ignore_replication_factor,
            options.dry_run,
            cancel,
        )
        .await?;
    report("Replicate", &outcome, options)
}

/// Move every shard off a peer
pub async fn run_drain(
    rebalancer: &ShardRebalancer<QuiverClient>,
    source: &PeerSelector,
    collections: &[String],
    options: RunOptions,
    cancel: &CancellationToken,
) -> Result<()> {
    let outcome = rebalancer
        .drain_peer(source, collection_filter(collections), options.dry_run, cancel)
        .await?;
    report("Drain", &outcome, options)
}

/// Fill an empty peer up to a populated peer's shard count
pub async fn run_equalize(
    rebalancer: &ShardRebalancer<QuiverClient>,
    source: &PeerSelector,
    empty_target: &PeerSelector,
    collections: &[String],
    options: RunOptions,
    cancel: &CancellationToken,
) -> Result<()> {
    let outcome = rebalancer
        .equalize_shard_replication(collections, source, empty_target, options.dry_run, cancel)
        .await?;
    report("Equalize", &outcome, options)
}

fn report(operation: &str, outcome: &RebalanceOutcome, options: RunOptions) -> Result<()> {
    if options.json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else {
        let prefix = if options.dry_run { "[dry run] " } else { "" };
        println!(
            "{}{} {}: {}",
            prefix,
            operation,
            if outcome.success { "succeeded" } else { "failed" },
            outcome.status
        );
        println!(
            "Transfers: {} planned, {} issued",
            outcome.planned_transfers, outcome.issued_transfers
        );
        println!("Elapsed:   {:.2}s", outcome.elapsed.as_secs_f64());
        if let Some(error) = &outcome.error {
            println!("Error:     {}", error);
        }
    }

    if !outcome.success {
        anyhow::bail!("{} failed: {}", operation, outcome.status);
    }
    Ok(())
}
