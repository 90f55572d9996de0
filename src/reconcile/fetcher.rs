//! Pull path: fetch the authoritative bid log, retrying while the backend lags.

use super::staleness::{has_newer_data, Baseline};
use super::ReconcileConfig;
use crate::domain::auction::AuctionView;
use crate::domain::bid_log::BidLogEntry;
use crate::error::SdkError;
use crate::shared::AuctionId;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Source of authoritative auction data.
///
/// Implemented by [`MarketplaceClient`](crate::client::MarketplaceClient) over
/// HTTP; tests plug in scripted backends.
#[async_trait]
pub trait AuctionBackend: Send + Sync {
    /// Full bid log for the auction, newest first.
    async fn fetch_bid_logs(&self, auction_id: &AuctionId) -> Result<Vec<BidLogEntry>, SdkError>;

    async fn fetch_auction(&self, auction_id: &AuctionId) -> Result<AuctionView, SdkError>;
}

/// How one reconciliation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// The fetched list supersedes local state and should replace it.
    Adopt {
        entries: Vec<BidLogEntry>,
        attempts: u32,
    },
    /// Retries exhausted without newer data; local state stays as is.
    Keep { attempts: u32 },
    /// A fetch failed. Local state stays as is; no further retries.
    Failed { attempts: u32, error: String },
    /// Observation ended while the reconciliation was in flight.
    Cancelled { attempts: u32 },
}

impl ReconcileOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            ReconcileOutcome::Adopt { attempts, .. }
            | ReconcileOutcome::Keep { attempts }
            | ReconcileOutcome::Failed { attempts, .. }
            | ReconcileOutcome::Cancelled { attempts } => *attempts,
        }
    }

    pub fn is_adopt(&self) -> bool {
        matches!(self, ReconcileOutcome::Adopt { .. })
    }
}

pub struct Reconciler {
    backend: Arc<dyn AuctionBackend>,
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(backend: Arc<dyn AuctionBackend>, config: ReconcileConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn AuctionBackend> {
        &self.backend
    }

    /// Fetch until the result is newer than `baseline`, the retry budget runs
    /// out, a fetch fails, or `cancel` fires.
    ///
    /// Attempt `n` (0-based) waits `retry_step * n` first. An empty result
    /// against an empty baseline is adopted immediately: there is nothing
    /// newer to wait for.
    pub async fn run(
        &self,
        auction_id: &AuctionId,
        baseline: Baseline,
        cancel: &CancellationToken,
    ) -> ReconcileOutcome {
        let mut attempts = 0u32;

        for retry in 0..=self.config.max_retries {
            if retry > 0 {
                let delay = self.config.delay_for_retry(retry);
                tracing::debug!(
                    auction_id = %auction_id,
                    retry,
                    delay_ms = delay.as_millis() as u64,
                    "Bid log not newer yet, retrying"
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return ReconcileOutcome::Cancelled { attempts },
                    _ = tokio::time::sleep(delay) => {}
                }
            } else if cancel.is_cancelled() {
                return ReconcileOutcome::Cancelled { attempts };
            }

            attempts += 1;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return ReconcileOutcome::Cancelled { attempts },
                result = self.backend.fetch_bid_logs(auction_id) => result,
            };

            let fetched = match result {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(
                        auction_id = %auction_id,
                        attempts,
                        error = %e,
                        "Bid log fetch failed, keeping current state"
                    );
                    return ReconcileOutcome::Failed {
                        attempts,
                        error: e.to_string(),
                    };
                }
            };

            if fetched.is_empty() && baseline.count == 0 {
                return ReconcileOutcome::Adopt {
                    entries: fetched,
                    attempts,
                };
            }

            if has_newer_data(&fetched, &baseline, self.config.comparison) {
                tracing::debug!(
                    auction_id = %auction_id,
                    attempts,
                    count = fetched.len(),
                    "Adopting newer bid log"
                );
                return ReconcileOutcome::Adopt {
                    entries: fetched,
                    attempts,
                };
            }
        }

        tracing::debug!(auction_id = %auction_id, attempts, "No newer bid log after retries");
        ReconcileOutcome::Keep { attempts }
    }
}
