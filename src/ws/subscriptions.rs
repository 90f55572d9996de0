//! Group membership tracking.
//!
//! One push connection is shared by every screen observing an auction, so
//! membership is reference counted: only the first join and the last leave
//! for an auction go over the wire.

use crate::shared::AuctionId;
use crate::ws::MessageOut;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct GroupMemberships {
    counts: HashMap<AuctionId, usize>,
}

impl GroupMemberships {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when this is the first join for the auction.
    pub fn join(&mut self, auction_id: &AuctionId) -> bool {
        let count = self.counts.entry(auction_id.clone()).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Returns `true` when this was the last member. Leaving a group that was
    /// never joined is a no-op.
    pub fn leave(&mut self, auction_id: &AuctionId) -> bool {
        match self.counts.get_mut(auction_id) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                self.counts.remove(auction_id);
                true
            }
            None => false,
        }
    }

    /// Update the counts for an outbound message and report whether it
    /// needs to reach the server.
    pub fn track(&mut self, msg: &MessageOut) -> bool {
        match msg {
            MessageOut::JoinGroup { auction_id } => self.join(auction_id),
            MessageOut::LeaveGroup { auction_id } => self.leave(auction_id),
            MessageOut::Ping => true,
        }
    }

    pub fn count(&self, auction_id: &AuctionId) -> usize {
        self.counts.get(auction_id).copied().unwrap_or(0)
    }

    pub fn is_member(&self, auction_id: &AuctionId) -> bool {
        self.counts.contains_key(auction_id)
    }

    /// Joined groups, sorted for a deterministic re-join order.
    pub fn groups(&self) -> Vec<AuctionId> {
        let mut ids: Vec<_> = self.counts.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
