//! WebSocket layer: push messages, group membership, events.
//!
//! The transport lives in `native.rs` (`ws-native` feature). This module
//! defines the shared message/event types and the `GroupTransport` seam the
//! push manager talks to.

pub mod subscriptions;

#[cfg(feature = "ws-native")]
pub mod native;

use crate::domain::auction::wire::BuyNowEvent;
use crate::domain::bid_log::wire::BidPlacedEvent;
use crate::error::WsError;
use crate::shared::AuctionId;
use serde::{Deserialize, Serialize};

pub use subscriptions::GroupMemberships;

// ─── Outbound messages ───────────────────────────────────────────────────────

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum MessageOut {
    #[serde(rename = "join_group")]
    JoinGroup {
        #[serde(rename = "auctionId")]
        auction_id: AuctionId,
    },
    #[serde(rename = "leave_group")]
    LeaveGroup {
        #[serde(rename = "auctionId")]
        auction_id: AuctionId,
    },
    #[serde(rename = "ping")]
    Ping,
}

impl MessageOut {
    pub fn join_group(auction_id: AuctionId) -> Self {
        MessageOut::JoinGroup { auction_id }
    }

    pub fn leave_group(auction_id: AuctionId) -> Self {
        MessageOut::LeaveGroup { auction_id }
    }

    pub fn ping() -> Self {
        MessageOut::Ping
    }
}

// ─── Inbound messages ────────────────────────────────────────────────────────

/// Raw inbound message from the server.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageIn {
    #[serde(flatten)]
    pub kind: Kind,
}

/// The type of inbound WebSocket message.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Kind {
    #[serde(rename = "bid_placed")]
    BidPlaced(BidPlacedPayload),
    #[serde(rename = "buy_now")]
    BuyNow(BuyNowPayload),
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "error")]
    Error(WsErrorPayload),
}

#[derive(Debug, Clone, Deserialize)]
pub struct BidPlacedPayload {
    pub data: BidPlacedEvent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuyNowPayload {
    pub data: BuyNowEvent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WsErrorPayload {
    pub message: String,
    pub code: Option<String>,
}

// ─── WsEvent ─────────────────────────────────────────────────────────────────

/// High-level events emitted by the WS client to the consumer.
#[derive(Debug, Clone)]
pub enum WsEvent {
    /// A parsed message from the server.
    Message(Kind),
    /// Connection established (groups have been re-joined).
    Connected,
    /// Connection lost (may trigger reconnect).
    Disconnected { code: Option<u16>, reason: String },
    /// A deserialization or protocol error.
    Error(String),
    /// Reconnection gave up.
    MaxReconnectReached,
}

// ─── ReadyState ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl From<u16> for ReadyState {
    fn from(v: u16) -> Self {
        match v {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

// ─── Config ──────────────────────────────────────────────────────────────────

/// Configuration for the WS client.
#[derive(Debug, Clone)]
pub struct WsConfig {
    pub url: String,
    pub reconnect: bool,
    pub max_reconnect_attempts: u32,
    pub base_reconnect_delay_ms: u32,
    pub ping_interval_ms: u32,
    pub pong_timeout_ms: u32,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: crate::network::DEFAULT_WS_URL.to_string(),
            reconnect: true,
            max_reconnect_attempts: 10,
            base_reconnect_delay_ms: 1000,
            ping_interval_ms: 30_000,
            pong_timeout_ms: 10_000,
        }
    }
}

// ─── GroupTransport ──────────────────────────────────────────────────────────

/// Group membership control on an already-connected push channel.
///
/// Both calls are fire-and-forget: `Ok` means the request was queued, not
/// that the server acknowledged it.
pub trait GroupTransport: Send + Sync {
    fn join_group(&self, auction_id: &AuctionId) -> Result<(), WsError>;
    fn leave_group(&self, auction_id: &AuctionId) -> Result<(), WsError>;
}
