//! Per-collection shard accounting
//!
//! Derived fresh from a single clustering-info read on every compound
//! operation. Cluster state changes between reads, so accounting is never
//! cached.

use crate::error::Result;
use crate::remote::guarded;
use quiver_client::{ClusterApi, CollectionClusterInfo, PeerId, ShardId};
use std::collections::{BTreeMap, BTreeSet};
use tokio_util::sync::CancellationToken;
use tracing::debug;

static NO_SHARDS: BTreeSet<ShardId> = BTreeSet::new();

/// Which peer holds which shard, and how many replicas each shard has
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardAccounting {
    serving_peer_id: PeerId,
    shards_per_peer: BTreeMap<PeerId, BTreeSet<ShardId>>,
    replication_per_shard: BTreeMap<ShardId, usize>,
}

impl ShardAccounting {
    /// Derive accounting from a clustering-info response
    ///
    /// With `active_only`, replicas in any state other than `Active` are
    /// left out. The serving peer is always present as a key, even when it
    /// holds nothing.
    pub fn build(collection: &str, info: &CollectionClusterInfo, active_only: bool) -> Self {
        let local = info
            .local_shards
            .iter()
            .map(|shard| (info.peer_id, shard.shard_id, shard.state));
        let remote = info
            .remote_shards
            .iter()
            .map(|shard| (shard.peer_id, shard.shard_id, shard.state));

        let mut accounting = Self::empty(info.peer_id);
        for (peer_id, shard_id, state) in local.chain(remote) {
            if active_only && !state.is_active() {
                debug!(
                    "Skipping shard {} of '{}' on peer {}: state is {:?}",
                    shard_id, collection, peer_id, state
                );
                continue;
            }
            accounting.insert(peer_id, shard_id);
        }
        accounting
    }

    /// Build accounting from `(peer, shard)` pairs, as if every replica were active
    pub fn from_assignments(
        serving_peer_id: PeerId,
        assignments: impl IntoIterator<Item = (PeerId, ShardId)>,
    ) -> Self {
        let mut accounting = Self::empty(serving_peer_id);
        for (peer_id, shard_id) in assignments {
            accounting.insert(peer_id, shard_id);
        }
        accounting
    }

    fn empty(serving_peer_id: PeerId) -> Self {
        let mut shards_per_peer = BTreeMap::new();
        shards_per_peer.insert(serving_peer_id, BTreeSet::new());
        Self {
            serving_peer_id,
            shards_per_peer,
            replication_per_shard: BTreeMap::new(),
        }
    }

    fn insert(&mut self, peer_id: PeerId, shard_id: ShardId) {
        if self.shards_per_peer.entry(peer_id).or_default().insert(shard_id) {
            *self.replication_per_shard.entry(shard_id).or_insert(0) += 1;
        }
    }

    /// Peer that served the clustering-info request
    pub fn serving_peer_id(&self) -> PeerId {
        self.serving_peer_id
    }

    pub fn shards_per_peer(&self) -> &BTreeMap<PeerId, BTreeSet<ShardId>> {
        &self.shards_per_peer
    }

    /// Effective replication factor of every known shard
    pub fn replication_per_shard(&self) -> &BTreeMap<ShardId, usize> {
        &self.replication_per_shard
    }

    /// Shards held by `peer_id`; empty for unknown peers
    pub fn shards_on(&self, peer_id: PeerId) -> &BTreeSet<ShardId> {
        self.shards_per_peer.get(&peer_id).unwrap_or(&NO_SHARDS)
    }

    pub fn shard_count(&self, peer_id: PeerId) -> usize {
        self.shards_on(peer_id).len()
    }

    pub fn holds(&self, peer_id: PeerId, shard_id: ShardId) -> bool {
        self.shards_on(peer_id).contains(&shard_id)
    }

    /// Number of peers currently holding `shard_id`
    pub fn replication_factor(&self, shard_id: ShardId) -> usize {
        self.replication_per_shard.get(&shard_id).copied().unwrap_or(0)
    }

    /// Peers holding `shard_id`, ascending by id
    pub fn peers_holding(&self, shard_id: ShardId) -> Vec<PeerId> {
        self.shards_per_peer
            .iter()
            .filter(|(_, shards)| shards.contains(&shard_id))
            .map(|(peer_id, _)| *peer_id)
            .collect()
    }
}

/// Whether `peer_id` holds no replica of any state in this collection
///
/// The serving peer reports its own replicas as local shards; every other
/// peer only shows up in the remote shard list.
pub fn is_peer_empty_in(info: &CollectionClusterInfo, peer_id: PeerId) -> bool {
    if info.peer_id == peer_id {
        info.local_shards.is_empty()
    } else {
        !info.remote_shards.iter().any(|shard| shard.peer_id == peer_id)
    }
}

/// Fetch clustering info for `collection` and derive its accounting
pub async fn fetch_shard_accounting<A: ClusterApi + ?Sized>(
    api: &A,
    collection: &str,
    active_only: bool,
    cancel: &CancellationToken,
) -> Result<ShardAccounting> {
    let info = guarded(cancel, api.get_collection_cluster_info(collection)).await?;
    Ok(ShardAccounting::build(collection, &info, active_only))
}
