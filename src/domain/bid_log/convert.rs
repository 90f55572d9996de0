//! Conversions from wire types to domain types for bid logs.

use super::wire::{BidLogEntryResponse, BidLogsResponse};
use super::{BidLogEntry, BidLogType};

impl From<BidLogEntryResponse> for BidLogEntry {
    fn from(r: BidLogEntryResponse) -> Self {
        Self {
            id: r.id,
            bid_id: r.bid_id,
            user_id: r.user_id,
            user_name: r.user_name.unwrap_or_default(),
            kind: r
                .kind
                .map(BidLogType::from)
                .unwrap_or(BidLogType::Update),
            is_auto_bidding: r.is_auto_bidding,
            date_time_update: r.date_time_update,
            old_state: r.old_entity,
            new_state: r.new_entity,
            created_at: r.created_at,
            updated_at: r.updated_at,
            optimistic: false,
        }
    }
}

impl BidLogsResponse {
    /// Domain entries in backend order (newest first by contract).
    pub fn into_entries(self) -> Vec<BidLogEntry> {
        let raw = match self {
            BidLogsResponse::List(v) => v,
            BidLogsResponse::Envelope { data } => data,
        };
        raw.into_iter().map(BidLogEntry::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{BidId, UserId};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn sample_response(id: &str, secs: i64) -> BidLogEntryResponse {
        BidLogEntryResponse {
            id: id.to_string(),
            bid_id: BidId::from("b1"),
            user_id: UserId::from("u1"),
            user_name: Some("Minh".to_string()),
            kind: Some("create".to_string()),
            is_auto_bidding: true,
            date_time_update: Utc.timestamp_opt(secs, 0).unwrap(),
            old_entity: json!({"currentPrice": 100}),
            new_entity: json!({"currentPrice": 110}),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_entry_response_conversion() {
        let entry: BidLogEntry = sample_response("log-1", 1_700_000_000).into();
        assert_eq!(entry.id, "log-1");
        assert_eq!(entry.kind, BidLogType::Create);
        assert_eq!(entry.user_name, "Minh");
        assert!(entry.is_auto_bidding);
        assert!(!entry.optimistic);
        assert_eq!(entry.new_state["currentPrice"], 110);
    }

    #[test]
    fn test_missing_type_defaults_to_update() {
        let mut resp = sample_response("log-2", 1_700_000_000);
        resp.kind = None;
        resp.user_name = None;
        let entry: BidLogEntry = resp.into();
        assert_eq!(entry.kind, BidLogType::Update);
        assert_eq!(entry.user_name, "");
    }

    #[test]
    fn test_into_entries_keeps_backend_order() {
        let resp = BidLogsResponse::Envelope {
            data: vec![
                sample_response("newer", 1_700_000_100),
                sample_response("older", 1_700_000_000),
            ],
        };
        let ids: Vec<_> = resp.into_entries().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, ["newer", "older"]);
    }
}
