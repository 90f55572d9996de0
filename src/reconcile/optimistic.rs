//! Optimistic entries synthesized from `BidPlaced` pushes.

use crate::domain::bid_log::{BidLogEntry, BidLogType, BidPlacedEvent};
use crate::shared::BidId;
use serde_json::json;

pub const OPTIMISTIC_ID_SUFFIX: &str = "-optimistic";

pub fn optimistic_id(bid_id: &BidId) -> String {
    format!("{}{}", bid_id, OPTIMISTIC_ID_SUFFIX)
}

/// Build the provisional entry for a pushed bid.
///
/// `placed_at` becomes `date_time_update`, so duplicate deliveries of the
/// same event collide on it and are dropped by the state container.
pub fn build_optimistic_entry(event: &BidPlacedEvent) -> BidLogEntry {
    BidLogEntry {
        id: optimistic_id(&event.bid_id),
        bid_id: event.bid_id.clone(),
        user_id: event.user_id.clone(),
        user_name: event.user_name.clone(),
        kind: BidLogType::Create,
        is_auto_bidding: event.is_auto_bidding,
        date_time_update: event.placed_at,
        old_state: json!({
            "currentPrice": event.previous_price,
        }),
        new_state: json!({
            "bidId": event.bid_id,
            "userId": event.user_id,
            "userName": event.user_name,
            "bidAmount": event.bid_amount,
            "currentPrice": event.new_price,
        }),
        created_at: Some(event.placed_at),
        updated_at: Some(event.placed_at),
        optimistic: true,
    }
}
