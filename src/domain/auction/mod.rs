//! Auction domain: current price and status of one auction.

#[cfg(feature = "http")]
pub mod client;
mod convert;
pub mod wire;

use crate::shared::{AuctionId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use wire::BuyNowEvent;

// ─── AuctionStatus ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionStatus {
    #[default]
    Active,
    /// Closed by a buy-now purchase.
    Sold,
    Ended,
    Other(String),
}

impl AuctionStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, AuctionStatus::Active)
    }
}

// ─── Bidder ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bidder {
    pub user_id: UserId,
    pub user_name: String,
}

// ─── AuctionView ─────────────────────────────────────────────────────────────

/// Current price/status for one auction.
///
/// Written by the optimistic path (price from push payloads) and by auction
/// record refreshes. Last writer wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionView {
    pub auction_id: AuctionId,
    pub current_price: Option<Decimal>,
    pub status: AuctionStatus,
    pub winning_bidder: Option<Bidder>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl AuctionView {
    pub fn new(auction_id: AuctionId) -> Self {
        Self {
            auction_id,
            current_price: None,
            status: AuctionStatus::default(),
            winning_bidder: None,
            updated_at: None,
        }
    }
}
