//! Per-auction controller wiring push, reconciliation and teardown together.

use super::fetcher::{AuctionBackend, ReconcileOutcome, Reconciler};
use super::store::ViewStateStore;
use super::{FetchMode, ReconcileConfig};
use crate::domain::auction::BuyNowEvent;
use crate::domain::bid_log::{BidLogState, BidLogView, BidPlacedEvent};
use crate::push::PushSubscriptionManager;
use crate::shared::AuctionId;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Keeps one auction's bid log current while a screen observes it.
///
/// `start` resets state, joins the auction's push group, listens for pushes
/// and runs a loud initial load. Each `BidPlaced` for this auction is applied
/// optimistically and followed by a quiet reconciliation; a `BuyNow` marks
/// the auction sold and refreshes both the log and the auction record.
/// `stop` cancels everything in flight, leaves the group, and resets.
///
/// Must be used inside a tokio runtime.
pub struct BidLogController {
    inner: Arc<Inner>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

struct Inner {
    auction_id: AuctionId,
    store: ViewStateStore,
    reconciler: Reconciler,
    push: Arc<PushSubscriptionManager>,
    /// Cancelled whenever the controller is not observing.
    session: Mutex<CancellationToken>,
}

impl BidLogController {
    pub fn new(
        auction_id: AuctionId,
        backend: Arc<dyn AuctionBackend>,
        push: Arc<PushSubscriptionManager>,
        config: ReconcileConfig,
    ) -> Self {
        let session = CancellationToken::new();
        session.cancel();
        Self {
            inner: Arc::new(Inner {
                store: ViewStateStore::new(auction_id.clone()),
                auction_id,
                reconciler: Reconciler::new(backend, config),
                push,
                session: Mutex::new(session),
            }),
            listener: Mutex::new(None),
        }
    }

    pub fn auction_id(&self) -> &AuctionId {
        &self.inner.auction_id
    }

    pub fn is_observing(&self) -> bool {
        !self.inner.session.lock().is_cancelled()
    }

    pub fn view(&self) -> BidLogView {
        self.inner.store.view()
    }

    pub fn subscribe(&self) -> watch::Receiver<BidLogState> {
        self.inner.store.subscribe()
    }

    /// Begin observing. Restarting an observing controller starts a fresh session.
    pub async fn start(&self) -> ReconcileOutcome {
        let (token, was_observing) = {
            let mut session = self.inner.session.lock();
            let observing = !session.is_cancelled();
            session.cancel();
            *session = CancellationToken::new();
            (session.clone(), observing)
        };
        self.inner.store.reset();
        // Group membership is ref-counted; keep at most one join per controller.
        if was_observing {
            self.inner.push.leave(&self.inner.auction_id);
        }
        self.inner.push.join(&self.inner.auction_id);

        let bids = self.inner.push.on_bid_placed();
        let buys = self.inner.push.on_buy_now();
        let reconnected = self.inner.push.on_reconnected();
        let handle = tokio::spawn(listen(
            self.inner.clone(),
            token,
            bids,
            buys,
            reconnected,
        ));
        if let Some(previous) = self.listener.lock().replace(handle) {
            previous.abort();
        }

        tracing::info!(auction_id = %self.inner.auction_id, "Observing auction bid log");
        self.inner.reconcile(FetchMode::Loud).await
    }

    /// Stop observing. In-flight reconciliations are cancelled and any
    /// result they would have written is discarded.
    pub fn stop(&self) {
        let was_observing = {
            let session = self.inner.session.lock();
            let observing = !session.is_cancelled();
            session.cancel();
            observing
        };
        if let Some(handle) = self.listener.lock().take() {
            handle.abort();
        }
        if was_observing {
            self.inner.push.leave(&self.inner.auction_id);
            tracing::info!(auction_id = %self.inner.auction_id, "Stopped observing auction bid log");
        }
        self.inner.store.reset();
    }

    /// Apply a pushed bid. Returns whether it was for this auction while observing.
    pub fn handle_bid_placed(&self, event: &BidPlacedEvent) -> bool {
        self.inner.handle_bid_placed(event)
    }

    pub fn handle_buy_now(&self, event: &BuyNowEvent) -> bool {
        self.inner.handle_buy_now(event)
    }

    /// Manual refresh with a loading indicator.
    pub async fn refresh(&self) -> ReconcileOutcome {
        self.inner.reconcile(FetchMode::Loud).await
    }

    pub async fn refresh_quietly(&self) -> ReconcileOutcome {
        self.inner.reconcile(FetchMode::Quiet).await
    }

    /// Re-read the auction record. Returns whether the view changed.
    pub async fn refresh_auction(&self) -> bool {
        self.inner.refresh_auction().await
    }
}

impl Drop for BidLogController {
    fn drop(&mut self) {
        self.inner.session.lock().cancel();
        if let Some(handle) = self.listener.get_mut().take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for BidLogController {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("BidLogController")
            .field("auction_id", &self.inner.auction_id)
            .field("observing", &self.is_observing())
            .finish()
    }
}

impl Inner {
    fn session(&self) -> CancellationToken {
        self.session.lock().clone()
    }

    fn handle_bid_placed(self: &Arc<Self>, event: &BidPlacedEvent) -> bool {
        if event.auction_id != self.auction_id || self.session().is_cancelled() {
            return false;
        }
        tracing::debug!(
            auction_id = %event.auction_id,
            bid_id = %event.bid_id,
            new_price = %event.new_price,
            "Bid placed"
        );
        self.store.apply_bid_placed(event);
        self.spawn_reconcile();
        true
    }

    fn handle_buy_now(self: &Arc<Self>, event: &BuyNowEvent) -> bool {
        if event.auction_id != self.auction_id || self.session().is_cancelled() {
            return false;
        }
        tracing::info!(
            auction_id = %event.auction_id,
            user_id = %event.user_id,
            "Auction bought out"
        );
        self.store.apply_buy_now(event);
        self.spawn_reconcile();
        let inner = self.clone();
        tokio::spawn(async move {
            inner.refresh_auction().await;
        });
        true
    }

    fn spawn_reconcile(self: &Arc<Self>) {
        let inner = self.clone();
        tokio::spawn(async move {
            inner.reconcile(FetchMode::Quiet).await;
        });
    }

    async fn reconcile(&self, mode: FetchMode) -> ReconcileOutcome {
        let token = self.session();
        if token.is_cancelled() {
            return ReconcileOutcome::Cancelled { attempts: 0 };
        }
        let generation = self.store.generation();
        let baseline = self.store.baseline();

        if mode == FetchMode::Loud {
            self.store.set_loading(generation, true);
        }
        let outcome = self.reconciler.run(&self.auction_id, baseline, &token).await;
        if let ReconcileOutcome::Adopt { entries, .. } = &outcome {
            if !token.is_cancelled() {
                self.store.adopt(generation, entries.clone());
            }
        }
        if mode == FetchMode::Loud {
            self.store.set_loading(generation, false);
        }

        tracing::debug!(
            auction_id = %self.auction_id,
            mode = %mode,
            attempts = outcome.attempts(),
            adopted = outcome.is_adopt(),
            "Reconciliation finished"
        );
        outcome
    }

    async fn refresh_auction(&self) -> bool {
        let token = self.session();
        if token.is_cancelled() {
            return false;
        }
        let generation = self.store.generation();
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => return false,
            result = self.reconciler.backend().fetch_auction(&self.auction_id) => result,
        };
        match result {
            Ok(record) => self.store.apply_auction_record(generation, record),
            Err(e) => {
                tracing::warn!(auction_id = %self.auction_id, error = %e, "Auction refresh failed");
                false
            }
        }
    }
}

async fn listen(
    inner: Arc<Inner>,
    token: CancellationToken,
    mut bids: broadcast::Receiver<BidPlacedEvent>,
    mut buys: broadcast::Receiver<BuyNowEvent>,
    mut reconnected: broadcast::Receiver<()>,
) {
    use broadcast::error::RecvError;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            result = bids.recv() => match result {
                Ok(event) => {
                    inner.handle_bid_placed(&event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(auction_id = %inner.auction_id, skipped, "Bid events lagged, reconciling");
                    inner.spawn_reconcile();
                }
                Err(RecvError::Closed) => break,
            },
            result = buys.recv() => match result {
                Ok(event) => {
                    inner.handle_buy_now(&event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(auction_id = %inner.auction_id, skipped, "Buy-now events lagged, reconciling");
                    inner.spawn_reconcile();
                }
                Err(RecvError::Closed) => break,
            },
            result = reconnected.recv() => match result {
                Ok(()) | Err(RecvError::Lagged(_)) => {
                    tracing::debug!(auction_id = %inner.auction_id, "Push reconnected, reconciling");
                    inner.spawn_reconcile();
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
}
