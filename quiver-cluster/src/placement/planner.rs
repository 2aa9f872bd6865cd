//! Shard transfer planning
//!
//! Pure functions over already fetched accounting: no I/O happens here, so
//! every planning mode can be exercised against synthetic topologies.
//!
//! - **Replicate**: copy shards missing from a target peer, optionally
//!   bounded by the collection's configured replication factor.
//! - **Drain**: move every shard off a source peer, spread round-robin
//!   across the remaining peers.
//! - **Equalize**: copy shards onto an empty peer until it holds as many as
//!   a populated source peer.

use super::accounting::ShardAccounting;
use super::selector::{CircularPeerSelector, CycleExhausted};
use crate::error::{RebalanceError, Result};
use crate::rebalance::ShardTransfer;
use quiver_client::{PeerId, ShardId, ShardTransferMethod};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// Everything the planner needs to know about one collection
#[derive(Debug, Clone)]
pub struct CollectionTopology {
    pub name: String,

    /// Configured replication factor; 0 when unknown
    pub replication_factor: u32,

    /// Active replicas only
    pub accounting: ShardAccounting,
}

impl CollectionTopology {
    pub fn new(name: impl Into<String>, replication_factor: u32, accounting: ShardAccounting) -> Self {
        Self {
            name: name.into(),
            replication_factor,
            accounting,
        }
    }

    fn no_qualifying_peer(&self, shard_id: ShardId, exhausted: CycleExhausted) -> RebalanceError {
        RebalanceError::NoQualifyingPeerFound {
            collection: self.name.clone(),
            shard_id,
            candidates: exhausted.candidates,
        }
    }
}

/// Plan copies of every shard the target peer is missing
///
/// `sources` holds every peer except the target. Each source is picked
/// round-robin among the peers that actually hold the shard. Unless
/// `ignore_replication_factor` is set, shards that already reached the
/// configured factor are skipped, and collections with an unknown factor
/// are skipped entirely.
pub fn plan_replicate_to_peer(
    topology: &CollectionTopology,
    target_peer_id: PeerId,
    ignore_replication_factor: bool,
    method: ShardTransferMethod,
    sources: &mut CircularPeerSelector,
) -> Result<Vec<ShardTransfer>> {
    let accounting = &topology.accounting;
    let configured = topology.replication_factor as usize;

    if !ignore_replication_factor && configured == 0 {
        warn!(
            "Replication factor of collection '{}' is unknown, skipping it",
            topology.name
        );
        return Ok(Vec::new());
    }

    sources.reset();
    let mut guard = sources.start_cycle_detection();
    let mut transfers = Vec::new();

    for (&shard_id, &effective) in accounting.replication_per_shard() {
        if !ignore_replication_factor && effective >= configured {
            info!(
                "Shard {} of '{}' already has {} of {} replicas, skipping",
                shard_id, topology.name, effective, configured
            );
            continue;
        }

        if accounting.holds(target_peer_id, shard_id) {
            info!(
                "Shard {} of '{}' is already on peer {}, skipping",
                shard_id, topology.name, target_peer_id
            );
            continue;
        }

        let source = guard
            .find(|peer| accounting.holds(peer, shard_id))
            .map_err(|exhausted| topology.no_qualifying_peer(shard_id, exhausted))?;

        let transfer = ShardTransfer {
            collection: topology.name.clone(),
            shard_id,
            from_peer_id: source,
            to_peer_id: target_peer_id,
            method,
            is_move: false,
        };
        debug!("Planned {}", transfer);
        transfers.push(transfer);
    }

    Ok(transfers)
}

/// Plan moves of every shard on the source peer onto the other peers
///
/// `destinations` holds every peer except the source. Each round hands the
/// next destination up to `ceil(shards / destinations)` queued shards it does
/// not already hold; rounds continue until the queue is empty. A full round
/// in which no destination can take any queued shard means the remaining
/// shards are already replicated everywhere, which fails the plan.
pub fn plan_drain_peer(
    topology: &CollectionTopology,
    source_peer_id: PeerId,
    method: ShardTransferMethod,
    destinations: &mut CircularPeerSelector,
) -> Result<Vec<ShardTransfer>> {
    let accounting = &topology.accounting;
    let shards = accounting.shards_on(source_peer_id);

    if shards.is_empty() {
        info!(
            "Peer {} holds no shards of '{}', nothing to drain",
            source_peer_id, topology.name
        );
        return Ok(Vec::new());
    }

    let per_round = shards.len().div_ceil(destinations.len()).max(1);
    let mut queue: VecDeque<ShardId> = shards.iter().copied().collect();
    let mut transfers = Vec::with_capacity(queue.len());

    destinations.reset();
    let mut guard = destinations.start_cycle_detection();

    while let Some(&head) = queue.front() {
        let destination = guard
            .next_peer()
            .map_err(|exhausted| topology.no_qualifying_peer(head, exhausted))?;

        let mut taken = 0;
        let mut deferred = VecDeque::with_capacity(queue.len());
        while let Some(shard_id) = queue.pop_front() {
            if taken < per_round && !accounting.holds(destination, shard_id) {
                let transfer = ShardTransfer {
                    collection: topology.name.clone(),
                    shard_id,
                    from_peer_id: source_peer_id,
                    to_peer_id: destination,
                    method,
                    is_move: true,
                };
                debug!("Planned {}", transfer);
                transfers.push(transfer);
                taken += 1;
            } else {
                deferred.push_back(shard_id);
            }
        }
        queue = deferred;

        if taken > 0 {
            guard.accept();
        }
    }

    Ok(transfers)
}

/// Plan copies from a populated peer onto an empty one until both hold the
/// same number of shards
pub fn plan_equalize(
    topology: &CollectionTopology,
    source_peer_id: PeerId,
    target_peer_id: PeerId,
    method: ShardTransferMethod,
) -> Vec<ShardTransfer> {
    let accounting = &topology.accounting;
    let source_shards = accounting.shards_on(source_peer_id);
    let mut target_count = accounting.shard_count(target_peer_id);

    if target_count > 0 {
        warn!(
            "Peer {} already holds {} shards of '{}'",
            target_peer_id, target_count, topology.name
        );
    }

    let mut transfers = Vec::new();
    for &shard_id in source_shards {
        if target_count >= source_shards.len() {
            break;
        }
        if accounting.holds(target_peer_id, shard_id) {
            continue;
        }

        let transfer = ShardTransfer {
            collection: topology.name.clone(),
            shard_id,
            from_peer_id: source_peer_id,
            to_peer_id: target_peer_id,
            method,
            is_move: false,
        };
        debug!("Planned {}", transfer);
        transfers.push(transfer);
        target_count += 1;
    }

    if transfers.is_empty() {
        info!(
            "Peers {} and {} already hold equal shard counts of '{}'",
            source_peer_id, target_peer_id, topology.name
        );
    }

    transfers
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: ShardTransferMethod = ShardTransferMethod::StreamRecords;

    fn topology(rf: u32, assignments: &[(PeerId, ShardId)]) -> CollectionTopology {
        CollectionTopology::new(
            "X",
            rf,
            ShardAccounting::from_assignments(1, assignments.iter().copied()),
        )
    }

    fn selector(peers: &[PeerId]) -> CircularPeerSelector {
        CircularPeerSelector::new(peers.iter().copied()).unwrap()
    }

    fn summary(transfers: &[ShardTransfer]) -> Vec<(ShardId, PeerId, PeerId)> {
        transfers
            .iter()
            .map(|t| (t.shard_id, t.from_peer_id, t.to_peer_id))
            .collect()
    }

    #[test]
    fn test_replicate_respects_replication_factor() {
        // Shard 0 on {1, 2}, shard 1 on {1}
        let topo = topology(2, &[(1, 0), (2, 0), (1, 1)]);
        let transfers = plan_replicate_to_peer(&topo, 3, false, STREAM, &mut selector(&[1, 2])).unwrap();

        assert_eq!(summary(&transfers), vec![(1, 1, 3)]);
        assert!(!transfers[0].is_move);
    }

    #[test]
    fn test_replicate_ignoring_factor_copies_everything_missing() {
        let topo = topology(2, &[(1, 0), (2, 0), (1, 1), (3, 2)]);
        let transfers = plan_replicate_to_peer(&topo, 3, true, STREAM, &mut selector(&[1, 2])).unwrap();

        // Shard 2 is already on the target
        assert_eq!(summary(&transfers), vec![(0, 1, 3), (1, 1, 3)]);
    }

    #[test]
    fn test_replicate_rotates_sources() {
        let topo = topology(3, &[(1, 0), (2, 0), (1, 1), (2, 1), (1, 2), (2, 2)]);
        let transfers = plan_replicate_to_peer(&topo, 3, false, STREAM, &mut selector(&[1, 2])).unwrap();

        assert_eq!(summary(&transfers), vec![(0, 1, 3), (1, 2, 3), (2, 1, 3)]);
    }

    #[test]
    fn test_replicate_unknown_factor_skipped() {
        let topo = topology(0, &[(1, 0)]);
        let transfers = plan_replicate_to_peer(&topo, 3, false, STREAM, &mut selector(&[1, 2])).unwrap();
        assert!(transfers.is_empty());

        let transfers = plan_replicate_to_peer(&topo, 3, true, STREAM, &mut selector(&[1, 2])).unwrap();
        assert_eq!(summary(&transfers), vec![(0, 1, 3)]);
    }

    #[test]
    fn test_replicate_inconsistent_topology_fails() {
        // Shard 0 is held only by peer 9, which is not a source candidate
        let topo = topology(2, &[(9, 0)]);
        let err = plan_replicate_to_peer(&topo, 3, false, STREAM, &mut selector(&[1, 2])).unwrap_err();

        match err {
            RebalanceError::NoQualifyingPeerFound {
                collection,
                shard_id,
                candidates,
            } => {
                assert_eq!(collection, "X");
                assert_eq!(shard_id, 0);
                assert_eq!(candidates, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_drain_round_robin_bound() {
        let topo = topology(1, &[(1, 0), (1, 1), (1, 2)]);
        let transfers = plan_drain_peer(&topo, 1, STREAM, &mut selector(&[2, 3])).unwrap();

        assert_eq!(summary(&transfers), vec![(0, 1, 2), (1, 1, 2), (2, 1, 3)]);
        assert!(transfers.iter().all(|t| t.is_move));
        assert!(transfers.iter().all(|t| t.method == STREAM));
    }

    #[test]
    fn test_drain_skips_destinations_holding_shard() {
        // Peer 2 already has shards 0 and 1
        let topo = topology(2, &[(1, 0), (1, 1), (1, 2), (1, 3), (2, 0), (2, 1)]);
        let transfers = plan_drain_peer(&topo, 1, STREAM, &mut selector(&[2, 3])).unwrap();

        assert_eq!(
            summary(&transfers),
            vec![(2, 1, 2), (3, 1, 2), (0, 1, 3), (1, 1, 3)]
        );
    }

    #[test]
    fn test_drain_empty_source_is_noop() {
        let topo = topology(1, &[(2, 0)]);
        let transfers = plan_drain_peer(&topo, 1, STREAM, &mut selector(&[2, 3])).unwrap();
        assert!(transfers.is_empty());
    }

    #[test]
    fn test_drain_fully_replicated_shard_fails() {
        let topo = topology(3, &[(1, 0), (2, 0), (3, 0)]);
        let err = plan_drain_peer(&topo, 1, STREAM, &mut selector(&[2, 3])).unwrap_err();
        assert!(matches!(
            err,
            RebalanceError::NoQualifyingPeerFound { shard_id: 0, .. }
        ));
    }

    #[test]
    fn test_drain_more_destinations_than_shards() {
        let topo = topology(1, &[(1, 5)]);
        let transfers = plan_drain_peer(&topo, 1, STREAM, &mut selector(&[2, 3, 4])).unwrap();
        assert_eq!(summary(&transfers), vec![(5, 1, 2)]);
    }

    #[test]
    fn test_equalize_fills_empty_peer() {
        let topo = topology(1, &[(1, 0), (1, 1), (1, 2)]);
        let transfers = plan_equalize(&topo, 1, 2, STREAM);

        assert_eq!(summary(&transfers), vec![(0, 1, 2), (1, 1, 2), (2, 1, 2)]);
        assert!(transfers.iter().all(|t| !t.is_move));
    }

    #[test]
    fn test_equalize_stops_at_equal_counts() {
        let topo = topology(1, &[(1, 0), (1, 1), (1, 2), (2, 1)]);
        let transfers = plan_equalize(&topo, 1, 2, STREAM);

        assert_eq!(summary(&transfers), vec![(0, 1, 2), (2, 1, 2)]);
    }

    #[test]
    fn test_equalize_nothing_to_do() {
        let topo = topology(1, &[(1, 0), (2, 3)]);
        assert!(plan_equalize(&topo, 1, 2, STREAM).is_empty());
    }
}
