//! Push subscription manager: auction group membership plus typed event fan-out.
//!
//! The push channel is shared and not per-auction: every subscriber sees
//! events for every auction the process has joined, and must filter on
//! `auction_id` itself. Join/leave failures are logged and swallowed; a
//! screen without push keeps working from reconciliation alone.

use crate::domain::auction::BuyNowEvent;
use crate::domain::bid_log::BidPlacedEvent;
use crate::shared::AuctionId;
use crate::ws::{GroupTransport, Kind, WsEvent};
use futures_util::stream::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Events buffered per subscriber before it starts lagging.
pub const DEFAULT_PUSH_BUFFER: usize = 256;

pub struct PushSubscriptionManager {
    transport: Arc<dyn GroupTransport>,
    bid_placed_tx: broadcast::Sender<BidPlacedEvent>,
    buy_now_tx: broadcast::Sender<BuyNowEvent>,
    reconnected_tx: broadcast::Sender<()>,
}

impl PushSubscriptionManager {
    pub fn new(transport: Arc<dyn GroupTransport>) -> Self {
        Self::with_capacity(transport, DEFAULT_PUSH_BUFFER)
    }

    pub fn with_capacity(transport: Arc<dyn GroupTransport>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (bid_placed_tx, _) = broadcast::channel(capacity);
        let (buy_now_tx, _) = broadcast::channel(capacity);
        let (reconnected_tx, _) = broadcast::channel(16);
        Self {
            transport,
            bid_placed_tx,
            buy_now_tx,
            reconnected_tx,
        }
    }

    // ── Group membership ─────────────────────────────────────────────────

    /// Join the auction's group. Returns whether the request was queued.
    pub fn join(&self, auction_id: &AuctionId) -> bool {
        match self.transport.join_group(auction_id) {
            Ok(()) => {
                tracing::debug!(auction_id = %auction_id, "Joined auction group");
                true
            }
            Err(e) => {
                tracing::warn!(
                    auction_id = %auction_id,
                    error = %e,
                    "Failed to join auction group, falling back to reconciliation-only updates"
                );
                false
            }
        }
    }

    /// Leave the auction's group. Returns whether the request was queued.
    pub fn leave(&self, auction_id: &AuctionId) -> bool {
        match self.transport.leave_group(auction_id) {
            Ok(()) => {
                tracing::debug!(auction_id = %auction_id, "Left auction group");
                true
            }
            Err(e) => {
                tracing::warn!(auction_id = %auction_id, error = %e, "Failed to leave auction group");
                false
            }
        }
    }

    // ── Subscriptions ────────────────────────────────────────────────────

    /// Every `BidPlaced` received from now on, for all auctions.
    pub fn on_bid_placed(&self) -> broadcast::Receiver<BidPlacedEvent> {
        self.bid_placed_tx.subscribe()
    }

    /// Every `BuyNow` received from now on, for all auctions.
    pub fn on_buy_now(&self) -> broadcast::Receiver<BuyNowEvent> {
        self.buy_now_tx.subscribe()
    }

    /// Fires each time the push connection is (re-)established.
    pub fn on_reconnected(&self) -> broadcast::Receiver<()> {
        self.reconnected_tx.subscribe()
    }

    /// `on_bid_placed` as a `Stream`; lagged gaps are logged and skipped.
    pub fn bid_placed_stream(&self) -> impl Stream<Item = BidPlacedEvent> + Send + 'static {
        receiver_stream(self.on_bid_placed())
    }

    /// `on_buy_now` as a `Stream`; lagged gaps are logged and skipped.
    pub fn buy_now_stream(&self) -> impl Stream<Item = BuyNowEvent> + Send + 'static {
        receiver_stream(self.on_buy_now())
    }

    // ── Inbound ──────────────────────────────────────────────────────────

    pub fn publish_bid_placed(&self, event: BidPlacedEvent) {
        // No subscribers is not an error.
        let _ = self.bid_placed_tx.send(event);
    }

    pub fn publish_buy_now(&self, event: BuyNowEvent) {
        let _ = self.buy_now_tx.send(event);
    }

    /// Route one transport event to the typed subscribers.
    pub fn dispatch(&self, event: WsEvent) {
        match event {
            WsEvent::Message(Kind::BidPlaced(payload)) => self.publish_bid_placed(payload.data),
            WsEvent::Message(Kind::BuyNow(payload)) => self.publish_buy_now(payload.data),
            WsEvent::Message(Kind::Pong) => {}
            WsEvent::Message(Kind::Error(e)) => {
                tracing::warn!(code = ?e.code, "Push server error: {}", e.message);
            }
            WsEvent::Connected => {
                tracing::info!("Push channel connected");
                let _ = self.reconnected_tx.send(());
            }
            WsEvent::Disconnected { code, reason } => {
                tracing::warn!(code = ?code, "Push channel disconnected: {}", reason);
            }
            WsEvent::Error(e) => {
                tracing::warn!("Dropping malformed push event: {}", e);
            }
            WsEvent::MaxReconnectReached => {
                tracing::error!("Push channel gave up reconnecting; updates are reconciliation-only");
            }
        }
    }

    /// Drive `dispatch` from a transport event stream until it ends.
    pub async fn pump<S>(&self, events: S)
    where
        S: Stream<Item = WsEvent>,
    {
        futures_util::pin_mut!(events);
        while let Some(event) = events.next().await {
            self.dispatch(event);
        }
        tracing::debug!("Push event stream ended");
    }
}

fn receiver_stream<T>(mut rx: broadcast::Receiver<T>) -> impl Stream<Item = T> + Send + 'static
where
    T: Clone + Send + 'static,
{
    async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => yield event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Push subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
