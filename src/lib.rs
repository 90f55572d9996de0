//! # auction-bidlog
//!
//! Keeps an auction's bid log consistent on a marketplace client that sees
//! bids twice: once as real-time push events and once through the REST API,
//! which lags behind the push channel.
//!
//! ## Architecture
//!
//! The crate is organized in layers:
//!
//! 1. **Core**: ids, domain models, wire types, the bid-log state container
//! 2. **HTTP API**: `MarketplaceHttp` with per-endpoint retry policies
//! 3. **Push**: `tokio-tungstenite` connection with group membership and
//!    reconnect, fanned out by `PushSubscriptionManager`
//! 4. **Reconciliation**: optimistic inserts, staleness checks, bounded
//!    retry fetches, and the single-writer view store
//! 5. **High-Level Client**: `MarketplaceClient` with sub-clients and a
//!    factory for per-auction `BidLogController`s
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use auction_bidlog::prelude::*;
//! use std::sync::Arc;
//!
//! let client = MarketplaceClient::builder()
//!     .base_url("https://api.example.com")
//!     .ws_url("wss://api.example.com/ws/auctions")
//!     .build()?;
//!
//! let mut ws = client.ws_native();
//! ws.connect().await?;
//! let push = client.push_manager(Arc::new(ws.handle()));
//!
//! let controller = client.bid_log_controller(AuctionId::from("42"), push.clone());
//! controller.start().await;
//! let mut updates = controller.subscribe();
//! tokio::spawn(async move { push.pump(ws.events()).await });
//! ```

// ── Layer 1: Core ────────────────────────────────────────────────────────────

/// Shared id newtypes and lenient serde helpers.
pub mod shared;

/// Domain modules (vertical slices): types, wire types, conversions, state.
pub mod domain;

/// Unified error types.
pub mod error;

/// Default endpoint URLs.
pub mod network;

// ── Layer 2: HTTP API ────────────────────────────────────────────────────────

/// HTTP client with retry policies.
#[cfg(feature = "http")]
pub mod http;

// ── Layer 3: Push ────────────────────────────────────────────────────────────

/// WebSocket messages, group memberships, and the native client.
pub mod ws;

/// Typed push fan-out and auction group membership.
pub mod push;

// ── Layer 4: Reconciliation ──────────────────────────────────────────────────

pub mod reconcile;

// ── Layer 5: High-Level Client ───────────────────────────────────────────────

/// `MarketplaceClient`, the primary entry point.
#[cfg(feature = "http")]
pub mod client;

// ── Prelude ──────────────────────────────────────────────────────────────────

pub mod prelude {
    // Shared newtypes
    pub use crate::shared::{AuctionId, BidId, UserId};

    // Domain types
    pub use crate::domain::auction::{AuctionStatus, AuctionView, Bidder, BuyNowEvent};
    pub use crate::domain::bid_log::{
        BidLogEntry, BidLogState, BidLogType, BidLogView, BidPlacedEvent,
    };

    // Errors
    pub use crate::error::{HttpError, SdkError, WsError};

    // Network
    pub use crate::network::{DEFAULT_API_URL, DEFAULT_WS_URL};

    // Reconciliation
    pub use crate::reconcile::{
        AuctionBackend, BidLogController, FetchMode, ReconcileConfig, ReconcileOutcome,
        TimestampComparison,
    };

    // Push
    pub use crate::push::PushSubscriptionManager;
    pub use crate::ws::{GroupTransport, Kind, MessageIn, MessageOut, WsConfig, WsEvent};

    // HTTP client + sub-clients
    #[cfg(feature = "http")]
    pub use crate::client::{
        AuctionsClient, BidLogsClient, MarketplaceClient, MarketplaceClientBuilder,
    };
    #[cfg(feature = "http")]
    pub use crate::http::retry::{RetryConfig, RetryPolicy};

    #[cfg(feature = "ws-native")]
    pub use crate::ws::native::{WsClient, WsHandle};
}
