//! Bid-log state container: one auction's ordered log plus its price view.

use super::BidLogEntry;
use crate::domain::auction::AuctionView;
use crate::shared::AuctionId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Live bid-log state for one observed auction.
///
/// Entries are kept newest first. The container has no opinion about where
/// writes come from; `reconcile::ViewStateStore` is the only writer.
#[derive(Debug, Clone)]
pub struct BidLogState {
    entries: Vec<BidLogEntry>,
    auction: AuctionView,
    is_loading: bool,
    generation: u64,
}

impl BidLogState {
    pub fn new(auction_id: AuctionId) -> Self {
        Self {
            entries: Vec::new(),
            auction: AuctionView::new(auction_id),
            is_loading: false,
            generation: 0,
        }
    }

    pub fn auction_id(&self) -> &AuctionId {
        &self.auction.auction_id
    }

    pub fn entries(&self) -> &[BidLogEntry] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&BidLogEntry> {
        self.entries.first()
    }

    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.latest().map(|e| e.date_time_update)
    }

    pub fn auction(&self) -> &AuctionView {
        &self.auction
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Bumped on every reset; writers holding an older value are stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a provisional entry unless one with the same `date_time_update`
    /// is already present (duplicate delivery). Returns whether it was inserted.
    ///
    /// In-order pushes land at the head; a late one is placed behind every
    /// newer entry so the log stays newest first.
    pub fn insert_optimistic(&mut self, entry: BidLogEntry) -> bool {
        let at = entry.date_time_update;
        if self.entries.iter().any(|e| e.date_time_update == at) {
            return false;
        }
        let index = self.entries.partition_point(|e| e.date_time_update > at);
        self.entries.insert(index, entry);
        true
    }

    /// Whether `at` is not older than the current head (true when empty).
    pub fn is_at_or_after_head(&self, at: DateTime<Utc>) -> bool {
        self.latest_timestamp().map_or(true, |head| at >= head)
    }

    /// Replace the whole log with an authoritative list. No per-entry merge.
    pub fn replace(&mut self, entries: Vec<BidLogEntry>) {
        self.entries = entries;
    }

    pub fn set_current_price(&mut self, price: Decimal) {
        self.auction.current_price = Some(price);
    }

    pub fn auction_mut(&mut self) -> &mut AuctionView {
        &mut self.auction
    }

    pub fn set_auction(&mut self, auction: AuctionView) {
        self.auction = auction;
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
    }

    /// Drop everything and start a new generation.
    pub fn reset(&mut self) {
        let auction_id = self.auction.auction_id.clone();
        self.entries.clear();
        self.auction = AuctionView::new(auction_id);
        self.is_loading = false;
        self.generation += 1;
    }

    pub fn view(&self) -> BidLogView {
        BidLogView {
            bid_log_entries: self.entries.clone(),
            is_loading: self.is_loading,
            auction: self.auction.clone(),
        }
    }
}

/// Read-only snapshot handed to the display layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BidLogView {
    pub bid_log_entries: Vec<BidLogEntry>,
    pub is_loading: bool,
    pub auction: AuctionView,
}
