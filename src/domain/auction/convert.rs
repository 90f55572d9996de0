//! Conversions from wire types to domain types for auctions.

use super::wire::AuctionResponse;
use super::{AuctionStatus, AuctionView, Bidder};

impl From<&str> for AuctionStatus {
    fn from(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "ACTIVE" | "OPEN" | "ONGOING" => AuctionStatus::Active,
            "SOLD" => AuctionStatus::Sold,
            "ENDED" | "CLOSED" | "EXPIRED" => AuctionStatus::Ended,
            _ => AuctionStatus::Other(s.to_string()),
        }
    }
}

impl From<AuctionResponse> for AuctionView {
    fn from(r: AuctionResponse) -> Self {
        let winning_bidder = r.winner_id.map(|user_id| Bidder {
            user_id,
            user_name: r.winner_name.unwrap_or_default(),
        });
        Self {
            auction_id: r.id,
            current_price: r.current_price,
            status: r
                .status
                .as_deref()
                .map(AuctionStatus::from)
                .unwrap_or_default(),
            winning_bidder,
            updated_at: r.updated_at,
        }
    }
}
