//! Shard placement module: topology accounting and transfer planning
//!
//! Everything here except [`fetch_shard_accounting`] is pure computation over
//! data fetched once per compound operation.
//!
//! # Flow
//!
//! 1. [`validate_collections`] checks caller-supplied names against the
//!    live collection list.
//! 2. [`ShardAccounting`] is derived per collection from one clustering-info read.
//! 3. The planners turn accounting plus a [`CircularPeerSelector`] into an
//!    ordered list of transfers.

mod accounting;
mod planner;
mod selector;
mod validate;

pub use accounting::{fetch_shard_accounting, is_peer_empty_in, ShardAccounting};
pub use planner::{plan_drain_peer, plan_equalize, plan_replicate_to_peer, CollectionTopology};
pub use selector::{CircularPeerSelector, CycleExhausted, CycleGuard};
pub use validate::validate_collections;
