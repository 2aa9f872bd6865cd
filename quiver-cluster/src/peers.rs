//! Peer resolution
//!
//! Every compound operation names peers through a [`PeerSelector`]: either a
//! numeric peer id or a substring of the peer's address. Resolution always
//! reads the live peer table; nothing is cached between calls.

use crate::error::{RebalanceError, Result};
use crate::remote::guarded;
use quiver_client::{ClusterApi, ClusterInfo, PeerId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// How a caller names a peer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PeerSelector {
    /// Exact peer id
    Id(PeerId),
    /// Substring of the peer's address; must match exactly one peer
    Address(String),
}

impl PeerSelector {
    pub fn address(substring: impl Into<String>) -> Self {
        PeerSelector::Address(substring.into())
    }
}

impl From<PeerId> for PeerSelector {
    fn from(id: PeerId) -> Self {
        PeerSelector::Id(id)
    }
}

/// Prefix forcing a selector to be read as a peer id
pub const ID_PREFIX: &str = "id:";

/// Prefix forcing a selector to be read as an address substring
pub const ADDRESS_PREFIX: &str = "addr:";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid peer id '{0}'")]
pub struct ParsePeerSelectorError(String);

/// `id:<n>` and `addr:<substring>` are explicit; otherwise all-digit input
/// is a peer id and anything else an address substring
impl FromStr for PeerSelector {
    type Err = ParsePeerSelectorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(id) = s.strip_prefix(ID_PREFIX) {
            let id = id.trim();
            return id
                .parse()
                .map(PeerSelector::Id)
                .map_err(|_| ParsePeerSelectorError(id.to_string()));
        }
        if let Some(substring) = s.strip_prefix(ADDRESS_PREFIX) {
            return Ok(PeerSelector::Address(substring.to_string()));
        }
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = s.parse() {
                return Ok(PeerSelector::Id(id));
            }
        }
        Ok(PeerSelector::Address(s.to_string()))
    }
}

impl fmt::Display for PeerSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerSelector::Id(id) => write!(f, "{}", id),
            PeerSelector::Address(s) => f.write_str(s),
        }
    }
}

/// A peer resolved against the live peer table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPeer {
    pub peer_id: PeerId,
    pub address: String,

    /// Every other peer, ascending by id
    pub other_peer_ids: Vec<PeerId>,

    /// Full peer table, used for readable log lines
    pub address_by_peer_id: BTreeMap<PeerId, String>,
}

impl ResolvedPeer {
    pub fn address_of(&self, peer_id: PeerId) -> Option<&str> {
        self.address_by_peer_id.get(&peer_id).map(String::as_str)
    }

    /// `"<id> (<address>)"`, or just the id for peers missing from the table
    pub fn label(&self, peer_id: PeerId) -> String {
        match self.address_of(peer_id) {
            Some(address) => format!("{} ({})", peer_id, address),
            None => peer_id.to_string(),
        }
    }
}

/// Resolve a selector against an already fetched peer table
pub fn resolve_peer(cluster: &ClusterInfo, selector: &PeerSelector) -> Result<ResolvedPeer> {
    let address_by_peer_id: BTreeMap<PeerId, String> = cluster
        .peers
        .iter()
        .map(|(id, peer)| (*id, peer.uri.clone()))
        .collect();

    let peer_id = match selector {
        PeerSelector::Id(id) if address_by_peer_id.contains_key(id) => *id,
        PeerSelector::Id(_) => {
            return Err(RebalanceError::NoPeersFoundForSelector {
                selector: selector.to_string(),
                known_addresses: address_by_peer_id.values().cloned().collect(),
            });
        }
        PeerSelector::Address(substring) => {
            let matches: Vec<PeerId> = address_by_peer_id
                .iter()
                .filter(|(_, address)| address.contains(substring.as_str()))
                .map(|(id, _)| *id)
                .collect();

            match matches.as_slice() {
                [] => {
                    return Err(RebalanceError::NoPeersFoundForSelector {
                        selector: substring.clone(),
                        known_addresses: address_by_peer_id.values().cloned().collect(),
                    });
                }
                [single] => *single,
                _ => {
                    return Err(RebalanceError::AmbiguousPeerSelector {
                        selector: substring.clone(),
                        candidates: matches
                            .iter()
                            .map(|id| address_by_peer_id[id].clone())
                            .collect(),
                    });
                }
            }
        }
    };

    debug!("Resolved peer selector '{}' to peer {}", selector, peer_id);

    Ok(ResolvedPeer {
        peer_id,
        address: address_by_peer_id[&peer_id].clone(),
        other_peer_ids: address_by_peer_id
            .keys()
            .copied()
            .filter(|id| *id != peer_id)
            .collect(),
        address_by_peer_id,
    })
}

/// Resolves peer selectors against the cluster's live peer table
pub struct PeerDirectory<'a, A: ClusterApi + ?Sized> {
    api: &'a A,
}

impl<'a, A: ClusterApi + ?Sized> PeerDirectory<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// Fetch the current peer table
    pub async fn peers(&self, cancel: &CancellationToken) -> Result<ClusterInfo> {
        guarded(cancel, self.api.get_cluster_info()).await
    }

    /// Fetch the peer table and resolve one selector against it
    pub async fn resolve(
        &self,
        selector: &PeerSelector,
        cancel: &CancellationToken,
    ) -> Result<ResolvedPeer> {
        let cluster = self.peers(cancel).await?;
        resolve_peer(&cluster, selector)
    }
}
