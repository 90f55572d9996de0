//! End-to-end reconciliation over the public API, fully offline.
//!
//! Push frames are parsed from JSON the way the WS task parses them, pumped
//! through `PushSubscriptionManager`, and reconciled against an in-memory
//! backend that lags behind the push channel.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::mpsc;

use auction_bidlog::prelude::*;
use auction_bidlog::reconcile::ReconcileOutcome;

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_714_557_600 + secs, 0).unwrap()
}

fn confirmed(id: &str, bid: &str, secs: i64) -> BidLogEntry {
    BidLogEntry {
        id: id.into(),
        bid_id: BidId::from(bid),
        user_id: UserId::from("u1"),
        user_name: "Thao".into(),
        kind: BidLogType::Create,
        is_auto_bidding: false,
        date_time_update: at(secs),
        old_state: serde_json::Value::Null,
        new_state: serde_json::Value::Null,
        created_at: Some(at(secs)),
        updated_at: Some(at(secs)),
        optimistic: false,
    }
}

/// Backend whose bid log only shows what has "replicated" so far.
#[derive(Default)]
struct LaggingBackend {
    log: Mutex<Vec<BidLogEntry>>,
    auction: Mutex<Option<AuctionView>>,
    fail: Mutex<bool>,
    calls: AtomicUsize,
}

impl LaggingBackend {
    fn replicate(&self, entry: BidLogEntry) {
        self.log.lock().insert(0, entry);
    }
}

#[async_trait]
impl AuctionBackend for LaggingBackend {
    async fn fetch_bid_logs(&self, _auction_id: &AuctionId) -> Result<Vec<BidLogEntry>, SdkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail.lock() {
            return Err(SdkError::Http(HttpError::Timeout));
        }
        Ok(self.log.lock().clone())
    }

    async fn fetch_auction(&self, auction_id: &AuctionId) -> Result<AuctionView, SdkError> {
        self.auction
            .lock()
            .clone()
            .ok_or_else(|| SdkError::Http(HttpError::NotFound(auction_id.to_string())))
    }
}

#[derive(Default)]
struct RecordingTransport {
    frames: Mutex<Vec<MessageOut>>,
}

impl GroupTransport for RecordingTransport {
    fn join_group(&self, auction_id: &AuctionId) -> Result<(), WsError> {
        self.frames.lock().push(MessageOut::join_group(auction_id.clone()));
        Ok(())
    }

    fn leave_group(&self, auction_id: &AuctionId) -> Result<(), WsError> {
        self.frames.lock().push(MessageOut::leave_group(auction_id.clone()));
        Ok(())
    }
}

struct Screen {
    controller: BidLogController,
    backend: Arc<LaggingBackend>,
    transport: Arc<RecordingTransport>,
    frames: mpsc::UnboundedSender<WsEvent>,
}

/// One observed auction wired to a push pump fed from a channel.
fn screen(auction: &str) -> Screen {
    let backend = Arc::new(LaggingBackend::default());
    let transport = Arc::new(RecordingTransport::default());
    let push = Arc::new(PushSubscriptionManager::new(transport.clone()));

    let (tx, mut rx) = mpsc::unbounded_channel::<WsEvent>();
    let pump = push.clone();
    tokio::spawn(async move {
        let events = async_stream::stream! {
            while let Some(ev) = rx.recv().await {
                yield ev;
            }
        };
        pump.pump(events).await;
    });

    let controller = BidLogController::new(
        AuctionId::from(auction),
        backend.clone(),
        push,
        ReconcileConfig::default(),
    );
    Screen {
        controller,
        backend,
        transport,
        frames: tx,
    }
}

fn push_frame(screen: &Screen, text: &str) {
    let msg: MessageIn = serde_json::from_str(text).expect("valid push frame");
    screen.frames.send(WsEvent::Message(msg.kind)).unwrap();
}

fn bid_frame(auction: &str, bid: &str, price: i64, placed_at: &str) -> String {
    format!(
        r#"{{"type":"bid_placed","data":{{"auctionId":"{auction}","bidId":"{bid}","userId":"u2","userName":"Quang","bidAmount":{price},"previousPrice":{prev},"newPrice":{price},"placedAt":"{placed_at}"}}}}"#,
        prev = price - 10,
    )
}

fn ids(controller: &BidLogController) -> Vec<String> {
    controller
        .view()
        .bid_log_entries
        .iter()
        .map(|e| e.id.clone())
        .collect()
}

async fn settle() {
    tokio::time::sleep(Duration::from_secs(3)).await;
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn empty_auction_loads_without_retries() {
    let s = screen("42");
    let outcome = s.controller.start().await;
    assert_eq!(outcome.attempts(), 1);
    assert!(s.controller.view().bid_log_entries.is_empty());
    assert_eq!(
        *s.transport.frames.lock(),
        vec![MessageOut::join_group(AuctionId::from("42"))]
    );
}

#[tokio::test(start_paused = true)]
async fn pushed_bid_shows_before_backend_catches_up() {
    let s = screen("42");
    s.backend.replicate(confirmed("log-1", "b1", 0));
    s.controller.start().await;

    push_frame(&s, &bid_frame("42", "b2", 150, "2024-05-01T10:00:30Z"));
    tokio::time::sleep(Duration::from_millis(1)).await;

    let view = s.controller.view();
    assert_eq!(ids(&s.controller), ["b2-optimistic", "log-1"]);
    assert_eq!(view.auction.current_price, Some(Decimal::from(150)));

    // Replication lands while the quiet reconcile is backing off.
    s.backend.replicate(confirmed("log-2", "b2", 45));
    settle().await;
    assert_eq!(ids(&s.controller), ["log-2", "log-1"]);
}

#[tokio::test(start_paused = true)]
async fn optimistic_entry_kept_when_backend_never_catches_up() {
    let s = screen("42");
    s.backend.replicate(confirmed("log-1", "b1", 0));
    s.controller.start().await;
    let before = s.backend.calls.load(Ordering::SeqCst);

    push_frame(&s, &bid_frame("42", "b2", 150, "2024-05-01T10:00:30Z"));
    settle().await;

    assert_eq!(ids(&s.controller), ["b2-optimistic", "log-1"]);
    assert_eq!(s.backend.calls.load(Ordering::SeqCst) - before, 3);
}

#[tokio::test(start_paused = true)]
async fn other_auctions_and_redeliveries_are_ignored() {
    let s = screen("42");
    s.controller.start().await;

    push_frame(&s, &bid_frame("99", "x1", 900, "2024-05-01T10:00:10Z"));
    push_frame(&s, &bid_frame("42", "b1", 120, "2024-05-01T10:00:20Z"));
    push_frame(&s, &bid_frame("42", "b1", 120, "2024-05-01T10:00:20Z"));
    tokio::time::sleep(Duration::from_millis(1)).await;

    let view = s.controller.view();
    assert_eq!(ids(&s.controller), ["b1-optimistic"]);
    assert_eq!(view.auction.current_price, Some(Decimal::from(120)));
}

#[tokio::test(start_paused = true)]
async fn backend_failure_leaves_view_intact() {
    let s = screen("42");
    s.backend.replicate(confirmed("log-1", "b1", 0));
    s.controller.start().await;

    *s.backend.fail.lock() = true;
    let outcome = s.controller.refresh().await;
    assert!(matches!(outcome, ReconcileOutcome::Failed { attempts: 1, .. }));
    let view = s.controller.view();
    assert_eq!(ids(&s.controller), ["log-1"]);
    assert!(!view.is_loading);
}

#[tokio::test(start_paused = true)]
async fn buy_now_closes_auction() {
    let s = screen("42");
    s.controller.start().await;

    push_frame(
        &s,
        r#"{"type":"buy_now","data":{"auctionId":"42","userId":"u8","userName":"Vy","price":"999.50"}}"#,
    );
    tokio::time::sleep(Duration::from_millis(1)).await;

    let auction = s.controller.view().auction;
    assert_eq!(auction.status, AuctionStatus::Sold);
    assert_eq!(auction.current_price, Some(Decimal::new(99950, 2)));
    assert_eq!(auction.winning_bidder.unwrap().user_name, "Vy");
}

#[tokio::test(start_paused = true)]
async fn leaving_the_screen_discards_late_results() {
    let s = screen("42");
    s.controller.start().await;

    push_frame(&s, &bid_frame("42", "b1", 120, "2024-05-01T10:00:20Z"));
    tokio::time::sleep(Duration::from_millis(1)).await;
    s.backend.replicate(confirmed("log-1", "b1", 25));
    s.controller.stop();
    settle().await;

    assert!(s.controller.view().bid_log_entries.is_empty());
    assert_eq!(
        s.transport.frames.lock().last(),
        Some(&MessageOut::leave_group(AuctionId::from("42")))
    );

    // Pushes after leaving do nothing.
    push_frame(&s, &bid_frame("42", "b2", 130, "2024-05-01T10:00:40Z"));
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(s.controller.view().bid_log_entries.is_empty());
}

#[tokio::test(start_paused = true)]
async fn reconnect_catches_up_on_missed_bids() {
    let s = screen("42");
    s.controller.start().await;

    // Bids placed while the push channel was down.
    s.backend.replicate(confirmed("log-1", "b1", 5));
    s.backend.replicate(confirmed("log-2", "b2", 9));
    s.frames.send(WsEvent::Connected).unwrap();
    settle().await;

    assert_eq!(ids(&s.controller), ["log-2", "log-1"]);
}

#[tokio::test(start_paused = true)]
async fn subscribers_see_every_transition() {
    let s = screen("42");
    let mut rx = s.controller.subscribe();
    s.controller.start().await;
    rx.borrow_and_update();

    push_frame(&s, &bid_frame("42", "b1", 120, "2024-05-01T10:00:20Z"));
    tokio::time::timeout(Duration::from_secs(1), rx.changed())
        .await
        .expect("state change")
        .unwrap();
    assert_eq!(rx.borrow().len(), 1);
}
