//! Wire types for bid logs (REST pull + WS push).

use crate::shared::serde_util::{lenient_datetime, string_or_number};
use crate::shared::{AuctionId, BidId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// REST response for a single bid-log entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BidLogEntryResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub bid_id: BidId,
    pub user_id: UserId,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub is_auto_bidding: bool,
    #[serde(deserialize_with = "lenient_datetime::deserialize")]
    pub date_time_update: DateTime<Utc>,
    #[serde(default)]
    pub old_entity: serde_json::Value,
    #[serde(default)]
    pub new_entity: serde_json::Value,
    #[serde(default, deserialize_with = "lenient_datetime::option::deserialize")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_datetime::option::deserialize")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// REST response for an auction's bid log, newest first.
///
/// Some deployments return the bare array, others wrap it in `{ "data": [...] }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BidLogsResponse {
    List(Vec<BidLogEntryResponse>),
    Envelope { data: Vec<BidLogEntryResponse> },
}

/// WS push: a bid was placed on some auction.
///
/// The channel is not per-auction; consumers must check `auction_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BidPlacedEvent {
    pub auction_id: AuctionId,
    pub bid_id: BidId,
    pub user_id: UserId,
    #[serde(default)]
    pub user_name: String,
    pub bid_amount: Decimal,
    pub previous_price: Decimal,
    pub new_price: Decimal,
    #[serde(deserialize_with = "lenient_datetime::deserialize")]
    pub placed_at: DateTime<Utc>,
    #[serde(default)]
    pub is_auto_bidding: bool,
}
