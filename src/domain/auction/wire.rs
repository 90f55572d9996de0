//! Wire types for auctions (REST record + WS buy-now push).

use crate::shared::serde_util::lenient_datetime;
use crate::shared::{AuctionId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// REST response for an auction record.
///
/// Only the fields this crate reads; the full record carries much more.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuctionResponse {
    pub id: AuctionId,
    #[serde(default)]
    pub current_price: Option<Decimal>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub winner_id: Option<UserId>,
    #[serde(default)]
    pub winner_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_datetime::option::deserialize")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// WS push: an auction was bought outright.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuyNowEvent {
    pub auction_id: AuctionId,
    pub user_id: UserId,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_datetime::option::deserialize")]
    pub purchased_at: Option<DateTime<Utc>>,
}
