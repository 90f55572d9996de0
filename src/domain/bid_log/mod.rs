//! Bid-log domain: the per-auction history of price/winning-bid mutations.

#[cfg(feature = "http")]
pub mod client;
mod convert;
pub mod state;
pub mod wire;

use crate::shared::{BidId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use state::{BidLogState, BidLogView};
pub use wire::BidPlacedEvent;

// ─── BidLogType ──────────────────────────────────────────────────────────────

/// Distinguishes bid creation from bid update events.
///
/// Wire values are matched case-insensitively; anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BidLogType {
    Create,
    Update,
    Other(String),
}

impl BidLogType {
    pub fn as_str(&self) -> &str {
        match self {
            BidLogType::Create => "CREATE",
            BidLogType::Update => "UPDATE",
            BidLogType::Other(s) => s,
        }
    }
}

impl From<String> for BidLogType {
    fn from(s: String) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "CREATE" => BidLogType::Create,
            "UPDATE" => BidLogType::Update,
            _ => BidLogType::Other(s),
        }
    }
}

impl From<BidLogType> for String {
    fn from(t: BidLogType) -> Self {
        t.as_str().to_string()
    }
}

impl std::fmt::Display for BidLogType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── BidLogEntry ─────────────────────────────────────────────────────────────

/// One observable mutation of an auction's price/winning-bid state.
///
/// `date_time_update` is the only ordering key: lists are newest first and
/// index 0 is "latest". `old_state`/`new_state` are opaque snapshots that the
/// display layer renders as a diff.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BidLogEntry {
    /// Backend id, or `{bid_id}-optimistic` for locally synthesized entries.
    pub id: String,
    pub bid_id: BidId,
    pub user_id: UserId,
    pub user_name: String,
    #[serde(rename = "type")]
    pub kind: BidLogType,
    pub is_auto_bidding: bool,
    pub date_time_update: DateTime<Utc>,
    pub old_state: serde_json::Value,
    pub new_state: serde_json::Value,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// True only until the next successful reconciliation replaces the list.
    pub optimistic: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bid_log_type_case_insensitive() {
        assert_eq!(BidLogType::from("create".to_string()), BidLogType::Create);
        assert_eq!(BidLogType::from("Update".to_string()), BidLogType::Update);
        assert_eq!(
            BidLogType::from("AUTO_BID".to_string()),
            BidLogType::Other("AUTO_BID".into())
        );
    }

    #[test]
    fn test_bid_log_type_serializes_as_string() {
        let json = serde_json::to_string(&BidLogType::Create).unwrap();
        assert_eq!(json, "\"CREATE\"");
        let parsed: BidLogType = serde_json::from_str("\"update\"").unwrap();
        assert_eq!(parsed, BidLogType::Update);
    }
}
