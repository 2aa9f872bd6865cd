//! Shard rebalancing module
//!
//! Plans produced by [`crate::placement`] are executed here, one transfer at
//! a time, and every compound operation reports a [`RebalanceOutcome`].

mod engine;
mod executor;

pub use engine::ShardRebalancer;
pub use executor::RebalanceExecutor;

use quiver_client::{ClusterOperation, PeerId, ShardId, ShardTransferMethod, ShardTransferOperation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Which compound operation produced a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceKind {
    /// Copy missing shards onto a target peer
    Replicate,
    /// Move every shard off a source peer
    Drain,
    /// Copy shards onto an empty peer until it matches a populated one
    Equalize,
}

impl RebalanceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RebalanceKind::Replicate => "replicate",
            RebalanceKind::Drain => "drain",
            RebalanceKind::Equalize => "equalize",
        }
    }
}

/// A single planned shard transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardTransfer {
    pub collection: String,
    pub shard_id: ShardId,
    pub from_peer_id: PeerId,
    pub to_peer_id: PeerId,
    pub method: ShardTransferMethod,

    /// Source replica is dropped once the copy completes
    pub is_move: bool,
}

impl ShardTransfer {
    /// Request body for the collection's cluster-update endpoint
    pub fn to_operation(&self) -> ClusterOperation {
        let transfer = ShardTransferOperation {
            shard_id: self.shard_id,
            from_peer_id: self.from_peer_id,
            to_peer_id: self.to_peer_id,
            method: Some(self.method),
        };
        if self.is_move {
            ClusterOperation::MoveShard(transfer)
        } else {
            ClusterOperation::ReplicateShard(transfer)
        }
    }
}

impl fmt::Display for ShardTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} shard {} of '{}' from peer {} to peer {} ({})",
            if self.is_move { "move" } else { "replicate" },
            self.shard_id,
            self.collection,
            self.from_peer_id,
            self.to_peer_id,
            self.method
        )
    }
}

/// Ordered transfers for one compound operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalancePlan {
    pub kind: RebalanceKind,
    pub transfers: Vec<ShardTransfer>,
}

impl RebalancePlan {
    pub fn new(kind: RebalanceKind) -> Self {
        Self {
            kind,
            transfers: Vec::new(),
        }
    }

    pub fn extend(&mut self, transfers: impl IntoIterator<Item = ShardTransfer>) {
        self.transfers.extend(transfers);
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.transfers.len()
    }
}

/// Result of a compound rebalancing operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceOutcome {
    pub success: bool,

    /// Human-readable status; the remote status verbatim on transfer failure
    pub status: String,

    /// Wall-clock time since the operation began
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,

    /// Transfers in the computed plan
    pub planned_transfers: usize,

    /// Transfers sent to the cluster, including a failed one
    pub issued_transfers: usize,

    /// Failure detail, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RebalanceOutcome {
    pub fn succeeded(status: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            success: true,
            status: status.into(),
            elapsed,
            planned_transfers: 0,
            issued_transfers: 0,
            error: None,
        }
    }

    pub fn failed(status: impl Into<String>, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            success: false,
            status: status.into(),
            elapsed,
            planned_transfers: 0,
            issued_transfers: 0,
            error: Some(error.into()),
        }
    }

    pub fn with_counts(mut self, planned: usize, issued: usize) -> Self {
        self.planned_transfers = planned;
        self.issued_transfers = issued;
        self
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}
