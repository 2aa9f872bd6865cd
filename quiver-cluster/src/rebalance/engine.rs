//! Compound rebalancing operations
//!
//! Each operation resolves peers, reads fresh topology for every affected
//! collection, plans all transfers up front and only then hands the plan to
//! the [`RebalanceExecutor`]. Selector and topology errors therefore surface
//! before anything is sent to the cluster.

use super::executor::{failure_status, RebalanceExecutor};
use super::{RebalanceKind, RebalanceOutcome, RebalancePlan};
use crate::config::RebalancingConfig;
use crate::error::{RebalanceError, Result};
use crate::metrics;
use crate::peers::{resolve_peer, PeerDirectory, PeerSelector, ResolvedPeer};
use crate::placement::{
    fetch_shard_accounting, is_peer_empty_in, plan_drain_peer, plan_equalize,
    plan_replicate_to_peer, validate_collections, CircularPeerSelector, CollectionTopology,
};
use crate::remote::guarded;
use quiver_client::ClusterApi;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Orchestrates replicate, drain and equalize operations against one cluster
pub struct ShardRebalancer<A: ClusterApi> {
    api: A,
    config: RebalancingConfig,
}

impl<A: ClusterApi> ShardRebalancer<A> {
    pub fn new(api: A, config: RebalancingConfig) -> Self {
        Self { api, config }
    }

    pub fn with_defaults(api: A) -> Self {
        Self::new(api, RebalancingConfig::default())
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn config(&self) -> &RebalancingConfig {
        &self.config
    }

    /// Resolve a peer selector to a single peer with its address
    pub async fn resolve_peer_info(
        &self,
        selector: &PeerSelector,
        cancel: &CancellationToken,
    ) -> Result<ResolvedPeer> {
        PeerDirectory::new(&self.api).resolve(selector, cancel).await
    }

    /// Whether the peer holds no replica of any collection
    ///
    /// Stops at the first collection where the peer holds something.
    pub async fn check_is_peer_empty(
        &self,
        selector: &PeerSelector,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let peer = self.resolve_peer_info(selector, cancel).await?;
        let collections = guarded(cancel, self.api.list_collections()).await?;

        for collection in &collections {
            let info = guarded(cancel, self.api.get_collection_cluster_info(collection)).await?;
            if !is_peer_empty_in(&info, peer.peer_id) {
                debug!(
                    "Peer {} holds shards of '{}'",
                    peer.label(peer.peer_id),
                    collection
                );
                return Ok(false);
            }
        }

        info!(
            "Peer {} holds no shards in {} collections",
            peer.label(peer.peer_id),
            collections.len()
        );
        Ok(true)
    }

    /// Plan copies of every missing shard onto the target peer
    pub async fn plan_replicate_shards_to_peer(
        &self,
        target: &PeerSelector,
        collections: Option<&[String]>,
        ignore_replication_factor: bool,
        cancel: &CancellationToken,
    ) -> Result<RebalancePlan> {
        let target = self.resolve_peer_info(target, cancel).await?;
        let collections = self.select_collections(collections, cancel).await?;
        let mut sources = peer_ring(&target)?;

        let mut plan = RebalancePlan::new(RebalanceKind::Replicate);
        for collection in &collections {
            let replication_factor = if ignore_replication_factor {
                0
            } else {
                guarded(cancel, self.api.get_collection_info(collection))
                    .await?
                    .replication_factor()
            };
            let topology = self
                .fetch_topology(collection, replication_factor, cancel)
                .await?;

            plan.extend(plan_replicate_to_peer(
                &topology,
                target.peer_id,
                ignore_replication_factor,
                self.config.replicate_transfer_method,
                &mut sources,
            )?);
        }

        log_plan(&plan, &target);
        Ok(plan)
    }

    /// Copy every shard the target peer is missing from the peers holding it
    pub async fn replicate_shards_to_peer(
        &self,
        target: &PeerSelector,
        collections: Option<&[String]>,
        ignore_replication_factor: bool,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> Result<RebalanceOutcome> {
        let started = Instant::now();
        let plan = self
            .plan_replicate_shards_to_peer(target, collections, ignore_replication_factor, cancel)
            .await;
        self.run(RebalanceKind::Replicate, plan, dry_run, started, cancel)
            .await
    }

    /// Plan moves of every shard off the source peer
    pub async fn plan_drain_peer(
        &self,
        source: &PeerSelector,
        collections: Option<&[String]>,
        cancel: &CancellationToken,
    ) -> Result<RebalancePlan> {
        let source = self.resolve_peer_info(source, cancel).await?;
        let collections = self.select_collections(collections, cancel).await?;
        let mut destinations = peer_ring(&source)?;

        let mut plan = RebalancePlan::new(RebalanceKind::Drain);
        for collection in &collections {
            let topology = self.fetch_topology(collection, 0, cancel).await?;
            plan.extend(plan_drain_peer(
                &topology,
                source.peer_id,
                self.config.drain_transfer_method,
                &mut destinations,
            )?);
        }

        log_plan(&plan, &source);
        Ok(plan)
    }

    /// Move every shard off the source peer onto the remaining peers
    pub async fn drain_peer(
        &self,
        source: &PeerSelector,
        collections: Option<&[String]>,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> Result<RebalanceOutcome> {
        let started = Instant::now();
        let plan = self.plan_drain_peer(source, collections, cancel).await;
        self.run(RebalanceKind::Drain, plan, dry_run, started, cancel)
            .await
    }

    /// Plan copies from the source peer until the empty peer matches it
    pub async fn plan_equalize_shard_replication(
        &self,
        collections: &[String],
        source: &PeerSelector,
        empty_target: &PeerSelector,
        cancel: &CancellationToken,
    ) -> Result<RebalancePlan> {
        let cluster = PeerDirectory::new(&self.api).peers(cancel).await?;
        let source = resolve_peer(&cluster, source)?;
        let target = resolve_peer(&cluster, empty_target)?;
        let collections = self.select_collections(Some(collections), cancel).await?;

        if source.peer_id == target.peer_id {
            warn!(
                "Source and target are the same peer {}",
                source.label(source.peer_id)
            );
        }

        let mut plan = RebalancePlan::new(RebalanceKind::Equalize);
        for collection in &collections {
            let topology = self.fetch_topology(collection, 0, cancel).await?;
            plan.extend(plan_equalize(
                &topology,
                source.peer_id,
                target.peer_id,
                self.config.replicate_transfer_method,
            ));
        }

        log_plan(&plan, &source);
        Ok(plan)
    }

    /// Replicate shards from a populated peer onto an empty one until both
    /// hold as many shards per collection
    pub async fn equalize_shard_replication(
        &self,
        collections: &[String],
        source: &PeerSelector,
        empty_target: &PeerSelector,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> Result<RebalanceOutcome> {
        let started = Instant::now();
        let plan = self
            .plan_equalize_shard_replication(collections, source, empty_target, cancel)
            .await;
        self.run(RebalanceKind::Equalize, plan, dry_run, started, cancel)
            .await
    }

    async fn select_collections(
        &self,
        requested: Option<&[String]>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let existing = guarded(cancel, self.api.list_collections()).await?;
        validate_collections(requested, &existing)
    }

    async fn fetch_topology(
        &self,
        collection: &str,
        replication_factor: u32,
        cancel: &CancellationToken,
    ) -> Result<CollectionTopology> {
        let accounting = fetch_shard_accounting(&self.api, collection, true, cancel).await?;
        Ok(CollectionTopology::new(collection, replication_factor, accounting))
    }

    /// Execute a plan, folding runtime faults into a failed outcome
    async fn run(
        &self,
        kind: RebalanceKind,
        plan: Result<RebalancePlan>,
        dry_run: bool,
        started: Instant,
        cancel: &CancellationToken,
    ) -> Result<RebalanceOutcome> {
        let outcome = match plan {
            Ok(plan) => {
                metrics::record_planned_transfers(kind.as_str(), plan.len());
                RebalanceExecutor::new(&self.api)
                    .execute(&plan, dry_run, started, cancel)
                    .await
            }
            Err(err) if err.is_fatal() => {
                metrics::record_rebalance_completion(kind.as_str(), false, started.elapsed());
                return Err(err);
            }
            Err(err) => {
                warn!("Failed to plan {}: {}", kind.as_str(), err);
                RebalanceOutcome::failed(failure_status(&err), err.to_string(), started.elapsed())
            }
        };

        metrics::record_rebalance_completion(kind.as_str(), outcome.success, outcome.elapsed);
        Ok(outcome)
    }
}

/// Round-robin selector over every peer except `peer`
fn peer_ring(peer: &ResolvedPeer) -> Result<CircularPeerSelector> {
    CircularPeerSelector::new(peer.other_peer_ids.iter().copied())
        .ok_or(RebalanceError::EmptyPeerSet(peer.peer_id))
}

fn log_plan(plan: &RebalancePlan, peer: &ResolvedPeer) {
    info!(
        "Planned {} {} transfers around peer {}",
        plan.len(),
        plan.kind.as_str(),
        peer.label(peer.peer_id)
    );
    for transfer in &plan.transfers {
        debug!(
            "  shard {} of '{}': {} -> {}",
            transfer.shard_id,
            transfer.collection,
            peer.label(transfer.from_peer_id),
            peer.label(transfer.to_peer_id)
        );
    }
}
