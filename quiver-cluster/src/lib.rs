//! Quiver Cluster - shard rebalancing for vector search clusters
//!
//! Reads live topology through [`quiver_client::ClusterApi`], plans shard
//! transfers and executes them one at a time.
//!
//! # Architecture
//!
//! - **Peers**: resolve a peer id or address substring to exactly one peer
//! - **Placement**: per-collection shard accounting, round-robin peer
//!   selection with cycle detection, and pure transfer planners
//! - **Rebalancing**: sequential fail-fast execution with dry-run support
//!
//! # Key Operations
//!
//! - Replicate: copy missing shards onto a peer
//! - Drain: move every shard off a peer
//! - Equalize: fill an empty peer up to a populated peer's shard count
//! - Emptiness check: whether a peer holds any replica at all

pub mod config;
pub mod error;
pub mod metrics;
pub mod peers;
pub mod placement;
pub mod rebalance;

mod remote;

pub use config::RebalancingConfig;
pub use error::{RebalanceError, Result};
pub use peers::{resolve_peer, ParsePeerSelectorError, PeerDirectory, PeerSelector, ResolvedPeer};
pub use placement::{
    CircularPeerSelector, CollectionTopology, CycleExhausted, CycleGuard, ShardAccounting,
};
pub use rebalance::{
    RebalanceExecutor, RebalanceKind, RebalanceOutcome, RebalancePlan, ShardRebalancer,
    ShardTransfer,
};
