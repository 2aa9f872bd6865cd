//! Round-robin peer selection with cycle detection
//!
//! Planners repeatedly ask for "the next peer that holds this shard" or "the
//! next peer that can take this shard". The selector is a plain state
//! machine (candidate list + cursor); a [`CycleGuard`] adds a revolution
//! counter so a search that can never succeed ends in a typed
//! [`CycleExhausted`] instead of spinning forever.

use quiver_client::PeerId;

/// Round-robin cursor over a fixed, non-empty list of peers
#[derive(Debug, Clone)]
pub struct CircularPeerSelector {
    peers: Vec<PeerId>,
    cursor: usize,
}

/// A guarded search visited every candidate without accepting any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleExhausted {
    /// Size of the candidate list that was exhausted
    pub candidates: usize,
}

impl CircularPeerSelector {
    /// Returns `None` when `peers` is empty
    pub fn new(peers: impl IntoIterator<Item = PeerId>) -> Option<Self> {
        let peers: Vec<PeerId> = peers.into_iter().collect();
        if peers.is_empty() {
            return None;
        }
        Some(Self { peers, cursor: 0 })
    }

    pub fn peers(&self) -> &[PeerId] {
        &self.peers
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Never true: construction rejects empty peer lists
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Current peer; advances the cursor, wrapping at the end
    pub fn next_peer(&mut self) -> PeerId {
        let peer = self.peers[self.cursor];
        self.cursor = (self.cursor + 1) % self.peers.len();
        peer
    }

    /// Rewind to the first candidate
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Begin a bounded search
    ///
    /// While the guard is alive, asking for more than one full revolution of
    /// peers without accepting one fails with [`CycleExhausted`].
    pub fn start_cycle_detection(&mut self) -> CycleGuard<'_> {
        CycleGuard {
            selector: self,
            unaccepted: 0,
        }
    }
}

/// Scoped cycle detection over a [`CircularPeerSelector`]
#[derive(Debug)]
pub struct CycleGuard<'a> {
    selector: &'a mut CircularPeerSelector,
    unaccepted: usize,
}

impl CycleGuard<'_> {
    /// Next candidate, or `CycleExhausted` once a full revolution passed
    /// since the last [`accept`](Self::accept)
    pub fn next_peer(&mut self) -> Result<PeerId, CycleExhausted> {
        if self.unaccepted >= self.selector.len() {
            return Err(CycleExhausted {
                candidates: self.selector.len(),
            });
        }
        self.unaccepted += 1;
        Ok(self.selector.next_peer())
    }

    /// Mark the last candidate as used, restarting the revolution count
    pub fn accept(&mut self) {
        self.unaccepted = 0;
    }

    /// Next candidate satisfying `predicate`, accepted on success
    pub fn find(
        &mut self,
        mut predicate: impl FnMut(PeerId) -> bool,
    ) -> Result<PeerId, CycleExhausted> {
        loop {
            let peer = self.next_peer()?;
            if predicate(peer) {
                self.accept();
                return Ok(peer);
            }
        }
    }
}
