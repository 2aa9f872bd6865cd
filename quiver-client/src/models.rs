//! Wire types for the cluster management endpoints
//!
//! Only the subset of the HTTP API needed to inspect shard placement and
//! issue shard transfers is modelled here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Numeric identity of a cluster peer
pub type PeerId = u64;

/// Numeric identity of a shard within a collection
pub type ShardId = u32;

/// Envelope wrapping every API response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiResponse<T> {
    /// Payload, absent on errors
    pub result: Option<T>,

    /// `"ok"` or an error object
    #[serde(default)]
    pub status: ApiStatus,

    /// Server-side processing time in seconds
    #[serde(default)]
    pub time: f64,
}

/// Status field of the response envelope
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ApiStatus {
    /// Plain status string, normally `"ok"`
    Ok(String),
    /// Error object carrying the server's message
    Error { error: String },
}

impl Default for ApiStatus {
    fn default() -> Self {
        ApiStatus::Ok("ok".to_string())
    }
}

impl ApiStatus {
    /// Error message if the status describes a failure
    pub fn error_message(&self) -> Option<&str> {
        match self {
            ApiStatus::Ok(_) => None,
            ApiStatus::Error { error } => Some(error),
        }
    }

    /// Status text as sent by the server
    pub fn as_str(&self) -> &str {
        match self {
            ApiStatus::Ok(status) => status,
            ApiStatus::Error { error } => error,
        }
    }
}

/// Answer to a cluster-update command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateAck {
    /// `result` of the envelope; `false` means the server did not take the command
    pub accepted: bool,

    /// Envelope status, verbatim
    pub status: String,
}

impl UpdateAck {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            status: "ok".to_string(),
        }
    }

    pub fn rejected(status: impl Into<String>) -> Self {
        Self {
            accepted: false,
            status: status.into(),
        }
    }
}

/// Replica state as reported by the clustering endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum ShardState {
    Active,
    Dead,
    Partial,
    Initializing,
    Listener,
    PartialSnapshot,
    Recovery,
    Resharding,
    /// A state this client does not know about
    #[serde(other)]
    Unknown,
}

impl ShardState {
    /// Only active replicas take part in rebalancing decisions
    pub fn is_active(&self) -> bool {
        matches!(self, ShardState::Active)
    }
}

/// How shard data is copied between peers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShardTransferMethod {
    /// Stream points in batches; works on shards under write load
    #[default]
    StreamRecords,
    /// Ship a point-in-time snapshot of the shard
    Snapshot,
    /// Replay only the write-ahead-log difference
    WalDelta,
}

impl std::fmt::Display for ShardTransferMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ShardTransferMethod::StreamRecords => "stream_records",
            ShardTransferMethod::Snapshot => "snapshot",
            ShardTransferMethod::WalDelta => "wal_delta",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for ShardTransferMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stream_records" => Ok(ShardTransferMethod::StreamRecords),
            "snapshot" => Ok(ShardTransferMethod::Snapshot),
            "wal_delta" => Ok(ShardTransferMethod::WalDelta),
            other => Err(format!("unknown shard transfer method '{}'", other)),
        }
    }
}

/// Result of `GET /collections`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollectionsResponse {
    pub collections: Vec<CollectionDescription>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollectionDescription {
    pub name: String,
}

/// Result of `GET /collections/{name}`, reduced to the parameters we use
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollectionInfo {
    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub points_count: Option<u64>,

    pub config: CollectionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollectionConfig {
    pub params: CollectionParams,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CollectionParams {
    #[serde(default)]
    pub shard_number: Option<u32>,

    #[serde(default)]
    pub replication_factor: Option<u32>,

    #[serde(default)]
    pub write_consistency_factor: Option<u32>,
}

impl CollectionInfo {
    /// Configured replication factor; 0 means the server did not report one
    pub fn replication_factor(&self) -> u32 {
        self.config.params.replication_factor.unwrap_or(0)
    }
}

/// Result of `GET /collections/{name}/cluster`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollectionClusterInfo {
    /// Peer that served this request
    pub peer_id: PeerId,

    /// Total number of shards in the collection
    #[serde(default)]
    pub shard_count: u32,

    /// Replicas held by the serving peer
    #[serde(default)]
    pub local_shards: Vec<LocalShardInfo>,

    /// Replicas held by every other peer
    #[serde(default)]
    pub remote_shards: Vec<RemoteShardInfo>,

    /// Transfers currently in flight
    #[serde(default)]
    pub shard_transfers: Vec<ShardTransferInfo>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocalShardInfo {
    pub shard_id: ShardId,

    #[serde(default)]
    pub points_count: u64,

    pub state: ShardState,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteShardInfo {
    pub shard_id: ShardId,
    pub peer_id: PeerId,
    pub state: ShardState,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShardTransferInfo {
    pub shard_id: ShardId,
    pub from: PeerId,
    pub to: PeerId,

    /// `true` for replication, `false` for a move
    #[serde(default)]
    pub sync: bool,

    #[serde(default)]
    pub method: Option<ShardTransferMethod>,
}

/// Result of `GET /cluster`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClusterInfo {
    /// `"enabled"` or `"disabled"`
    #[serde(default)]
    pub status: String,

    /// Peer that served this request
    #[serde(default)]
    pub peer_id: Option<PeerId>,

    /// Every known peer keyed by id
    #[serde(default)]
    pub peers: BTreeMap<PeerId, PeerAddress>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PeerAddress {
    pub uri: String,
}

/// Body of `POST /collections/{name}/cluster`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterOperation {
    /// Copy a replica, keeping the source
    ReplicateShard(ShardTransferOperation),
    /// Copy a replica, then drop it from the source
    MoveShard(ShardTransferOperation),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ShardTransferOperation {
    pub shard_id: ShardId,
    pub from_peer_id: PeerId,
    pub to_peer_id: PeerId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<ShardTransferMethod>,
}

impl ClusterOperation {
    /// Transfer details regardless of kind
    pub fn transfer(&self) -> &ShardTransferOperation {
        match self {
            ClusterOperation::ReplicateShard(op) | ClusterOperation::MoveShard(op) => op,
        }
    }

    pub fn is_move(&self) -> bool {
        matches!(self, ClusterOperation::MoveShard(_))
    }
}
