//! Bid-log reconciliation engine.
//!
//! Three sources feed one auction's bid log:
//!
//! 1. **Push**: at-least-once, possibly out-of-order `BidPlaced` events,
//!    turned into provisional entries by [`optimistic`] and applied at once.
//! 2. **Pull**: the authoritative list, fetched by [`fetcher::Reconciler`]
//!    with a short linear backoff to ride out backend replication lag.
//! 3. **Teardown**: a reset when the screen stops observing.
//!
//! [`staleness`] decides whether a pull result supersedes what is shown;
//! [`store::ViewStateStore`] is the only place the state is written; and
//! [`BidLogController`] wires the paths together for one auction.
//!
//! The two paths race. Writes are last-writer-wins in completion order, and
//! a pull result is adopted wholesale (no per-entry merge).

mod controller;
pub mod fetcher;
pub mod optimistic;
pub mod staleness;
pub mod store;

use std::time::Duration;

pub use controller::BidLogController;
pub use fetcher::{AuctionBackend, ReconcileOutcome, Reconciler};
pub use staleness::{has_newer_data, Baseline};
pub use store::ViewStateStore;

/// Whether a reconciliation shows a loading indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Manual or initial loads: `is_loading` is set for the duration.
    Loud,
    /// After an optimistic insert or a background refresh: never touches `is_loading`.
    Quiet,
}

impl std::fmt::Display for FetchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FetchMode::Loud => write!(f, "loud"),
            FetchMode::Quiet => write!(f, "quiet"),
        }
    }
}

/// How the newest fetched timestamp is compared to the local baseline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimestampComparison {
    /// Fetched must be strictly later (`>`). An optimistic entry whose
    /// confirmed twin carries the identical timestamp is never replaced by it.
    #[default]
    Strict,
    /// Equal timestamps also count as newer (`>=`).
    Inclusive,
}

/// Reconciliation tuning.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Retries after the first attempt when the pull shows nothing newer.
    pub max_retries: u32,
    /// Retry `n` waits `retry_step * n` before fetching.
    pub retry_step: Duration,
    pub comparison: TimestampComparison,
    /// Push events buffered per subscriber before it counts as lagging.
    /// Used by `MarketplaceClient::push_manager`.
    pub push_buffer: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_step: Duration::from_millis(300),
            comparison: TimestampComparison::Strict,
            push_buffer: crate::push::DEFAULT_PUSH_BUFFER,
        }
    }
}

impl ReconcileConfig {
    /// Delay before retry number `retry` (1-based); zero for the first attempt.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        self.retry_step * retry
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::fetcher::AuctionBackend;
    use crate::domain::auction::AuctionView;
    use crate::domain::bid_log::{BidLogEntry, BidLogType};
    use crate::error::SdkError;
    use crate::shared::{AuctionId, BidId, UserId};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    pub fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    pub fn entry(id: &str, bid: &str, secs: i64) -> BidLogEntry {
        BidLogEntry {
            id: id.to_string(),
            bid_id: BidId::from(bid),
            user_id: UserId::from("u1"),
            user_name: "Phuong".to_string(),
            kind: BidLogType::Create,
            is_auto_bidding: false,
            date_time_update: ts(secs),
            old_state: serde_json::Value::Null,
            new_state: serde_json::Value::Null,
            created_at: None,
            updated_at: None,
            optimistic: false,
        }
    }

    /// Backend that serves queued responses, then repeats `fallback`.
    pub struct ScriptedBackend {
        script: Mutex<VecDeque<Result<Vec<BidLogEntry>, String>>>,
        fallback: Mutex<Result<Vec<BidLogEntry>, String>>,
        auction: Mutex<Option<AuctionView>>,
        latency: Option<Duration>,
        pub calls: AtomicUsize,
    }

    impl ScriptedBackend {
        pub fn always(result: Result<Vec<BidLogEntry>, String>) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                fallback: Mutex::new(result),
                auction: Mutex::new(None),
                latency: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = Some(latency);
            self
        }

        pub fn then(self, result: Result<Vec<BidLogEntry>, String>) -> Self {
            self.script.lock().push_back(result);
            self
        }

        pub fn with_auction(self, view: AuctionView) -> Self {
            *self.auction.lock() = Some(view);
            self
        }

        pub fn set_fallback(&self, result: Result<Vec<BidLogEntry>, String>) {
            *self.fallback.lock() = result;
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AuctionBackend for ScriptedBackend {
        async fn fetch_bid_logs(&self, _auction_id: &AuctionId) -> Result<Vec<BidLogEntry>, SdkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            let next = self
                .script
                .lock()
                .pop_front()
                .unwrap_or_else(|| self.fallback.lock().clone());
            next.map_err(SdkError::Other)
        }

        async fn fetch_auction(&self, auction_id: &AuctionId) -> Result<AuctionView, SdkError> {
            self.auction
                .lock()
                .clone()
                .ok_or_else(|| SdkError::Other(format!("no record for {}", auction_id)))
        }
    }
}
