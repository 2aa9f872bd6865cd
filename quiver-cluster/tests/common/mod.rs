//! In-memory cluster used by the integration tests
//!
//! Accepted transfers are applied to the fake's own topology, so a drain can
//! be checked against the state it leaves behind.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use quiver_client::{
    ClientError, ClusterApi, ClusterInfo, ClusterOperation, CollectionClusterInfo,
    CollectionConfig, CollectionInfo, CollectionParams, LocalShardInfo, PeerAddress, PeerId,
    RemoteShardInfo, ShardId, ShardState, UpdateAck,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct FakeCollection {
    pub replication_factor: Option<u32>,
    pub replicas: Vec<(PeerId, ShardId, ShardState)>,
}

pub struct FakeCluster {
    serving_peer_id: PeerId,
    peers: BTreeMap<PeerId, String>,
    collections: Mutex<BTreeMap<String, FakeCollection>>,
    updates: Mutex<Vec<(String, ClusterOperation)>>,
    fail_update_at: Option<usize>,
    reject_update_at: Option<usize>,
    cancel_after_updates: Option<(usize, CancellationToken)>,
    unreachable: bool,
    cluster_info_calls: AtomicUsize,
}

impl FakeCluster {
    pub fn new(peers: &[(PeerId, &str)]) -> Self {
        Self {
            serving_peer_id: peers.first().map(|(id, _)| *id).unwrap_or(1),
            peers: peers
                .iter()
                .map(|(id, uri)| (*id, uri.to_string()))
                .collect(),
            collections: Mutex::new(BTreeMap::new()),
            updates: Mutex::new(Vec::new()),
            fail_update_at: None,
            reject_update_at: None,
            cancel_after_updates: None,
            unreachable: false,
            cluster_info_calls: AtomicUsize::new(0),
        }
    }

    /// Add a collection whose replicas are all active
    pub fn with_collection(
        self,
        name: &str,
        replication_factor: Option<u32>,
        assignments: &[(PeerId, ShardId)],
    ) -> Self {
        let replicas = assignments
            .iter()
            .map(|(peer, shard)| (*peer, *shard, ShardState::Active))
            .collect();
        self.with_replicas(name, replication_factor, replicas)
    }

    pub fn with_replicas(
        self,
        name: &str,
        replication_factor: Option<u32>,
        replicas: Vec<(PeerId, ShardId, ShardState)>,
    ) -> Self {
        self.collections.lock().insert(
            name.to_string(),
            FakeCollection {
                replication_factor,
                replicas,
            },
        );
        self
    }

    pub fn serving_peer(mut self, peer_id: PeerId) -> Self {
        self.serving_peer_id = peer_id;
        self
    }

    /// Answer the update with this zero-based index with an API error
    pub fn fail_update_at(mut self, index: usize) -> Self {
        self.fail_update_at = Some(index);
        self
    }

    /// Answer the update with this zero-based index with `result: false`
    pub fn reject_update_at(mut self, index: usize) -> Self {
        self.reject_update_at = Some(index);
        self
    }

    /// Cancel `token` once this many updates were accepted
    pub fn cancel_after_updates(mut self, count: usize, token: CancellationToken) -> Self {
        self.cancel_after_updates = Some((count, token));
        self
    }

    /// Every call fails as if the connection was refused
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn updates(&self) -> Vec<(String, ClusterOperation)> {
        self.updates.lock().clone()
    }

    pub fn cluster_info_calls(&self) -> usize {
        self.cluster_info_calls.load(Ordering::SeqCst)
    }

    /// Shards currently on `peer_id`, ascending
    pub fn shards_on(&self, collection: &str, peer_id: PeerId) -> Vec<ShardId> {
        let collections = self.collections.lock();
        let mut shards: Vec<ShardId> = collections[collection]
            .replicas
            .iter()
            .filter(|(peer, _, _)| *peer == peer_id)
            .map(|(_, shard, _)| *shard)
            .collect();
        shards.sort_unstable();
        shards
    }

    fn check_reachable(&self) -> quiver_client::Result<()> {
        if self.unreachable {
            return Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        Ok(())
    }

    fn not_found(collection: &str) -> ClientError {
        ClientError::Api {
            status: 404,
            message: format!("Not found: Collection `{}` doesn't exist!", collection),
        }
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn list_collections(&self) -> quiver_client::Result<Vec<String>> {
        self.check_reachable()?;
        Ok(self.collections.lock().keys().cloned().collect())
    }

    async fn get_collection_info(&self, collection: &str) -> quiver_client::Result<CollectionInfo> {
        self.check_reachable()?;
        let collections = self.collections.lock();
        let entry = collections
            .get(collection)
            .ok_or_else(|| Self::not_found(collection))?;

        Ok(CollectionInfo {
            status: Some("green".to_string()),
            points_count: None,
            config: CollectionConfig {
                params: CollectionParams {
                    replication_factor: entry.replication_factor,
                    ..Default::default()
                },
            },
        })
    }

    async fn get_collection_cluster_info(
        &self,
        collection: &str,
    ) -> quiver_client::Result<CollectionClusterInfo> {
        self.check_reachable()?;
        let collections = self.collections.lock();
        let entry = collections
            .get(collection)
            .ok_or_else(|| Self::not_found(collection))?;

        let (local, remote): (Vec<_>, Vec<_>) = entry
            .replicas
            .iter()
            .copied()
            .partition(|(peer, _, _)| *peer == self.serving_peer_id);

        Ok(CollectionClusterInfo {
            peer_id: self.serving_peer_id,
            shard_count: entry
                .replicas
                .iter()
                .map(|(_, shard, _)| *shard)
                .collect::<BTreeSet<_>>()
                .len() as u32,
            local_shards: local
                .into_iter()
                .map(|(_, shard_id, state)| LocalShardInfo {
                    shard_id,
                    points_count: 0,
                    state,
                })
                .collect(),
            remote_shards: remote
                .into_iter()
                .map(|(peer_id, shard_id, state)| RemoteShardInfo {
                    shard_id,
                    peer_id,
                    state,
                })
                .collect(),
            shard_transfers: vec![],
        })
    }

    async fn update_collection_cluster_setup(
        &self,
        collection: &str,
        operation: &ClusterOperation,
    ) -> quiver_client::Result<UpdateAck> {
        self.check_reachable()?;
        let index = {
            let mut updates = self.updates.lock();
            updates.push((collection.to_string(), operation.clone()));
            updates.len() - 1
        };

        if self.fail_update_at == Some(index) {
            return Err(ClientError::Api {
                status: 400,
                message: format!(
                    "Bad request: Shard {} is not found",
                    operation.transfer().shard_id
                ),
            });
        }
        if self.reject_update_at == Some(index) {
            return Ok(UpdateAck::rejected(format!(
                "Shard {} is already being transferred",
                operation.transfer().shard_id
            )));
        }

        {
            let mut collections = self.collections.lock();
            let entry = collections
                .get_mut(collection)
                .ok_or_else(|| Self::not_found(collection))?;
            let transfer = operation.transfer();

            if operation.is_move() {
                entry.replicas.retain(|(peer, shard, _)| {
                    !(*peer == transfer.from_peer_id && *shard == transfer.shard_id)
                });
            }
            entry
                .replicas
                .push((transfer.to_peer_id, transfer.shard_id, ShardState::Active));
        }

        if let Some((count, token)) = &self.cancel_after_updates {
            if index + 1 >= *count {
                token.cancel();
            }
        }
        Ok(UpdateAck::accepted())
    }

    async fn get_cluster_info(&self) -> quiver_client::Result<ClusterInfo> {
        self.check_reachable()?;
        self.cluster_info_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ClusterInfo {
            status: "enabled".to_string(),
            peer_id: Some(self.serving_peer_id),
            peers: self
                .peers
                .iter()
                .map(|(id, uri)| (*id, PeerAddress { uri: uri.clone() }))
                .collect(),
        })
    }
}
