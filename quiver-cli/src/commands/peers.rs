use anyhow::Result;
use quiver_client::QuiverClient;
use quiver_cluster::{PeerDirectory, PeerSelector, ShardRebalancer};
use tokio_util::sync::CancellationToken;

/// Print whether a peer holds no shard of any collection
pub async fn run_is_empty(
    rebalancer: &ShardRebalancer<QuiverClient>,
    selector: &PeerSelector,
    cancel: &CancellationToken,
) -> Result<()> {
    let empty = rebalancer.check_is_peer_empty(selector, cancel).await?;
    println!("{}", empty);
    Ok(())
}

/// Resolve a selector and print the peer table around it
pub async fn run_peer(
    rebalancer: &ShardRebalancer<QuiverClient>,
    selector: &PeerSelector,
    json: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let peer = rebalancer.resolve_peer_info(selector, cancel).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&peer)?);
        return Ok(());
    }

    println!("Peer {} at {}", peer.peer_id, peer.address);
    println!();
    print_table(peer.address_by_peer_id.iter().map(|(id, uri)| {
        (*id, uri.as_str(), *id == peer.peer_id)
    }));
    Ok(())
}

/// List every peer of the cluster
pub async fn run_peers(
    rebalancer: &ShardRebalancer<QuiverClient>,
    json: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let cluster = PeerDirectory::new(rebalancer.api()).peers(cancel).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&cluster)?);
        return Ok(());
    }

    print_table(cluster.peers.iter().map(|(id, peer)| {
        (*id, peer.uri.as_str(), Some(*id) == cluster.peer_id)
    }));
    Ok(())
}

fn print_table<'a>(rows: impl Iterator<Item = (u64, &'a str, bool)>) {
    println!("{:<22} {}", "PEER", "ADDRESS");
    println!("{}", "-".repeat(60));
    for (id, address, marked) in rows {
        let marker = if marked { " *" } else { "" };
        println!("{:<22} {}{}", id, address, marker);
    }
}
