//! View state store: the single writer of one auction's `BidLogState`.
//!
//! Every transition goes through here and is published on a `watch` channel,
//! so the display layer only ever reads snapshots. Writers that captured a
//! generation before a reset are ignored afterwards.

use super::optimistic::build_optimistic_entry;
use super::staleness::Baseline;
use crate::domain::auction::{AuctionStatus, AuctionView, Bidder, BuyNowEvent};
use crate::domain::bid_log::{BidLogEntry, BidLogState, BidLogView, BidPlacedEvent};
use crate::shared::AuctionId;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone)]
pub struct ViewStateStore {
    tx: Arc<watch::Sender<BidLogState>>,
}

impl ViewStateStore {
    pub fn new(auction_id: AuctionId) -> Self {
        let (tx, _) = watch::channel(BidLogState::new(auction_id));
        Self { tx: Arc::new(tx) }
    }

    // ── Reads ────────────────────────────────────────────────────────────

    pub fn auction_id(&self) -> AuctionId {
        self.tx.borrow().auction_id().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BidLogState> {
        self.tx.subscribe()
    }

    pub fn view(&self) -> BidLogView {
        self.tx.borrow().view()
    }

    pub fn snapshot(&self) -> BidLogState {
        self.tx.borrow().clone()
    }

    pub fn generation(&self) -> u64 {
        self.tx.borrow().generation()
    }

    pub fn baseline(&self) -> Baseline {
        Baseline::capture(&self.tx.borrow())
    }

    // ── Writes ───────────────────────────────────────────────────────────

    /// Optimistic path: move the price and insert a provisional entry.
    /// Returns whether an entry was inserted (false on duplicate delivery).
    pub fn apply_bid_placed(&self, event: &BidPlacedEvent) -> bool {
        let mut inserted = false;
        self.tx.send_if_modified(|state| {
            if state.auction_id() != &event.auction_id {
                return false;
            }
            // A late event must not roll the price back past a newer bid.
            let price_changed = state.is_at_or_after_head(event.placed_at)
                && state.auction().current_price != Some(event.new_price);
            if price_changed {
                state.set_current_price(event.new_price);
            }
            inserted = state.insert_optimistic(build_optimistic_entry(event));
            price_changed || inserted
        });
        if !inserted {
            tracing::debug!(
                auction_id = %event.auction_id,
                bid_id = %event.bid_id,
                "Skipping duplicate bid event"
            );
        }
        inserted
    }

    /// Mark the auction sold to the buyer at the purchase price.
    pub fn apply_buy_now(&self, event: &BuyNowEvent) -> bool {
        self.tx.send_if_modified(|state| {
            if state.auction_id() != &event.auction_id {
                return false;
            }
            let auction = state.auction_mut();
            auction.status = AuctionStatus::Sold;
            auction.winning_bidder = Some(Bidder {
                user_id: event.user_id.clone(),
                user_name: event.user_name.clone(),
            });
            if let Some(price) = event.price {
                auction.current_price = Some(price);
            }
            if event.purchased_at.is_some() {
                auction.updated_at = event.purchased_at;
            }
            true
        })
    }

    /// Replace the log with a reconciled list, unless a reset happened since
    /// `generation` was read.
    pub fn adopt(&self, generation: u64, entries: Vec<BidLogEntry>) -> bool {
        self.tx.send_if_modified(|state| {
            if state.generation() != generation {
                tracing::debug!(
                    auction_id = %state.auction_id(),
                    "Dropping bid log from a previous observation"
                );
                return false;
            }
            state.replace(entries);
            true
        })
    }

    /// Take a fetched auction record. Once the auction shows as closed (from a
    /// buy-now push), a lagging record does not reopen it or drop the winner.
    pub fn apply_auction_record(&self, generation: u64, mut record: AuctionView) -> bool {
        self.tx.send_if_modified(|state| {
            if state.generation() != generation || state.auction_id() != &record.auction_id {
                return false;
            }
            let current = state.auction();
            if !current.status.is_open() {
                if record.status.is_open() {
                    record.status = current.status.clone();
                }
                if record.winning_bidder.is_none() {
                    record.winning_bidder = current.winning_bidder.clone();
                }
            }
            if *current == record {
                return false;
            }
            state.set_auction(record);
            true
        })
    }

    pub fn set_loading(&self, generation: u64, loading: bool) -> bool {
        self.tx.send_if_modified(|state| {
            if state.generation() != generation || state.is_loading() == loading {
                return false;
            }
            state.set_loading(loading);
            true
        })
    }

    /// Clear everything and return the new generation.
    pub fn reset(&self) -> u64 {
        let mut generation = 0;
        self.tx.send_modify(|state| {
            state.reset();
            generation = state.generation();
        });
        generation
    }
}

impl std::fmt::Debug for ViewStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let state = self.tx.borrow();
        f.debug_struct("ViewStateStore")
            .field("auction_id", state.auction_id())
            .field("entries", &state.len())
            .field("generation", &state.generation())
            .finish()
    }
}
