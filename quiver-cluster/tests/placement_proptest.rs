//! Property tests for transfer planning over random topologies.
//!
//! The planners are pure, so every property runs directly against synthetic
//! accounting without a cluster behind it.

use proptest::prelude::*;
use quiver_client::{PeerId, ShardId, ShardTransferMethod};
use quiver_cluster::placement::{
    plan_drain_peer, plan_equalize, plan_replicate_to_peer, CircularPeerSelector,
    CollectionTopology, ShardAccounting,
};
use quiver_cluster::RebalanceError;
use std::collections::{BTreeMap, BTreeSet};

const STREAM: ShardTransferMethod = ShardTransferMethod::StreamRecords;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// `(peer count, (peer, shard) assignments, configured replication factor)`
///
/// Peers are numbered from 1. Every shard is held by a random subset of
/// peers, possibly none.
fn topology() -> impl Strategy<Value = (u64, Vec<(PeerId, ShardId)>, u32)> {
    (2u64..=5)
        .prop_flat_map(|peers| {
            let holders = proptest::collection::vec(any::<bool>(), peers as usize);
            (
                Just(peers),
                proptest::collection::vec(holders, 1..8),
                1u32..=peers as u32,
            )
        })
        .prop_map(|(peers, shards, rf)| {
            let assignments = shards
                .iter()
                .enumerate()
                .flat_map(|(shard_id, holders)| {
                    holders
                        .iter()
                        .enumerate()
                        .filter(|(_, held)| **held)
                        .map(move |(peer, _)| (peer as PeerId + 1, shard_id as ShardId))
                })
                .collect();
            (peers, assignments, rf)
        })
}

fn collection(rf: u32, assignments: Vec<(PeerId, ShardId)>) -> CollectionTopology {
    CollectionTopology::new("X", rf, ShardAccounting::from_assignments(1, assignments))
}

fn ring_without(peers: u64, excluded: PeerId) -> CircularPeerSelector {
    CircularPeerSelector::new((1..=peers).filter(|p| *p != excluded))
        .expect("at least two peers")
}

fn pick(peers: u64, index: usize) -> PeerId {
    index as PeerId % peers + 1
}

// ---------------------------------------------------------------------------
// Replicate
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn test_replicate_never_targets_holder(
        (peers, assignments, rf) in topology(),
        index in 0usize..5,
        ignore_rf in any::<bool>(),
    ) {
        let target = pick(peers, index);
        let topology = collection(rf, assignments);
        let accounting = &topology.accounting;

        let transfers = plan_replicate_to_peer(
            &topology, target, ignore_rf, STREAM, &mut ring_without(peers, target),
        );
        prop_assert!(transfers.is_ok());
        let transfers = transfers.unwrap();

        let mut seen = BTreeSet::new();
        for transfer in &transfers {
            prop_assert_eq!(transfer.to_peer_id, target);
            prop_assert!(!transfer.is_move);
            prop_assert!(!accounting.holds(target, transfer.shard_id));
            prop_assert!(accounting.holds(transfer.from_peer_id, transfer.shard_id));
            prop_assert!(seen.insert(transfer.shard_id), "shard planned twice");
        }

        if ignore_rf {
            let missing: BTreeSet<ShardId> = accounting
                .replication_per_shard()
                .keys()
                .copied()
                .filter(|shard| !accounting.holds(target, *shard))
                .collect();
            prop_assert_eq!(seen, missing);
        }
    }

    #[test]
    fn test_replicate_respects_ceiling(
        (peers, assignments, rf) in topology(),
        index in 0usize..5,
    ) {
        let target = pick(peers, index);
        let topology = collection(rf, assignments);

        let transfers = plan_replicate_to_peer(
            &topology, target, false, STREAM, &mut ring_without(peers, target),
        ).unwrap();

        let mut added: BTreeMap<ShardId, usize> = BTreeMap::new();
        for transfer in &transfers {
            *added.entry(transfer.shard_id).or_insert(0) += 1;
        }
        for (shard, count) in added {
            let effective = topology.accounting.replication_factor(shard);
            prop_assert!(effective + count <= rf as usize);
        }
    }
}

// ---------------------------------------------------------------------------
// Drain
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn test_drain_moves_every_shard_once(
        (peers, assignments, _rf) in topology(),
        index in 0usize..5,
    ) {
        let source = pick(peers, index);
        let topology = collection(0, assignments);
        let accounting = &topology.accounting;
        let source_shards = accounting.shards_on(source).clone();

        let stuck = source_shards.iter().any(|shard| {
            (1..=peers).filter(|p| *p != source).all(|p| accounting.holds(p, *shard))
        });

        let result = plan_drain_peer(&topology, source, STREAM, &mut ring_without(peers, source));

        match result {
            Ok(transfers) => {
                prop_assert!(!stuck);

                let mut remaining: BTreeMap<PeerId, BTreeSet<ShardId>> =
                    accounting.shards_per_peer().clone();
                for transfer in &transfers {
                    prop_assert!(transfer.is_move);
                    prop_assert_eq!(transfer.from_peer_id, source);
                    let on_source = remaining.entry(source).or_default();
                    prop_assert!(on_source.remove(&transfer.shard_id));
                    prop_assert!(
                        remaining.entry(transfer.to_peer_id).or_default().insert(transfer.shard_id),
                        "destination already held the shard"
                    );
                }
                prop_assert!(remaining.get(&source).map_or(true, |shards| shards.is_empty()));
                prop_assert_eq!(transfers.len(), source_shards.len());
            }
            Err(err) => {
                prop_assert!(stuck);
                let is_no_qualifying_peer = matches!(err, RebalanceError::NoQualifyingPeerFound { .. });
                prop_assert!(is_no_qualifying_peer);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Equalize
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn test_equalize_never_overshoots(
        (peers, assignments, _rf) in topology(),
        source_index in 0usize..5,
        target_index in 0usize..5,
    ) {
        let source = pick(peers, source_index);
        let target = pick(peers, target_index);
        prop_assume!(source != target);

        let topology = collection(0, assignments);
        let accounting = &topology.accounting;
        let source_count = accounting.shard_count(source);
        let target_count = accounting.shard_count(target);

        let transfers = plan_equalize(&topology, source, target, STREAM);

        for transfer in &transfers {
            prop_assert_eq!(transfer.from_peer_id, source);
            prop_assert_eq!(transfer.to_peer_id, target);
            prop_assert!(!accounting.holds(target, transfer.shard_id));
        }
        prop_assert!(target_count + transfers.len() <= source_count.max(target_count));
    }
}
