//! Rebalancing error types

use quiver_client::{ClientError, PeerId, ShardId};
use thiserror::Error;

/// Errors that can occur while resolving peers, planning or executing transfers
#[derive(Error, Debug)]
pub enum RebalanceError {
    #[error("No peer matches '{selector}'; known peers: {}", .known_addresses.join(", "))]
    NoPeersFoundForSelector {
        selector: String,
        known_addresses: Vec<String>,
    },

    #[error("Peer selector '{selector}' is ambiguous, it matches: {}", .candidates.join(", "))]
    AmbiguousPeerSelector {
        selector: String,
        candidates: Vec<String>,
    },

    #[error("Collections not found: {}", .0.join(", "))]
    UnknownCollections(Vec<String>),

    #[error("No peer qualifies for shard {shard_id} of collection '{collection}' after a full cycle over {candidates} candidates")]
    NoQualifyingPeerFound {
        collection: String,
        shard_id: ShardId,
        candidates: usize,
    },

    #[error("Peer {0} has no other peers to work with")]
    EmptyPeerSet(PeerId),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Operation cancelled")]
    Cancelled,
}

impl RebalanceError {
    /// Get the error type as a string for metrics labeling
    pub fn error_type(&self) -> &'static str {
        match self {
            RebalanceError::NoPeersFoundForSelector { .. } => "no_peers_found",
            RebalanceError::AmbiguousPeerSelector { .. } => "ambiguous_peer_selector",
            RebalanceError::UnknownCollections(_) => "unknown_collections",
            RebalanceError::NoQualifyingPeerFound { .. } => "no_qualifying_peer",
            RebalanceError::EmptyPeerSet(_) => "empty_peer_set",
            RebalanceError::Client(_) => "client",
            RebalanceError::Cancelled => "cancelled",
        }
    }

    /// Errors raised to the caller instead of being folded into a failed outcome
    ///
    /// Communication faults and cancellation are expected at runtime and
    /// become a failed [`crate::RebalanceOutcome`]; everything else is a
    /// caller mistake or a broken topology invariant.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RebalanceError::Client(_) | RebalanceError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, RebalanceError>;
