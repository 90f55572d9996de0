//! High-level client: `MarketplaceClient` with nested sub-client accessors.
//!
//! Each domain has its own sub-client in `domain/<name>/client.rs`.
//! This module keeps the builder, the shared config, and the factories that
//! wire HTTP, push, and reconciliation together.

use crate::domain::auction::client::Auctions;
use crate::domain::auction::AuctionView;
use crate::domain::bid_log::client::BidLogs;
use crate::domain::bid_log::BidLogEntry;
use crate::error::SdkError;
use crate::http::MarketplaceHttp;
use crate::push::PushSubscriptionManager;
use crate::reconcile::{AuctionBackend, BidLogController, ReconcileConfig};
use crate::shared::AuctionId;
use crate::ws::{GroupTransport, WsConfig};

use async_trait::async_trait;
use std::sync::Arc;

// Re-export sub-client types for convenience.
pub use crate::domain::auction::client::Auctions as AuctionsClient;
pub use crate::domain::bid_log::client::BidLogs as BidLogsClient;

/// The primary entry point.
///
/// Cheap to clone; clones share the HTTP connection pool and bearer token.
pub struct MarketplaceClient {
    pub(crate) http: MarketplaceHttp,
    pub(crate) ws_config: WsConfig,
    pub(crate) reconcile_config: ReconcileConfig,
}

impl MarketplaceClient {
    pub fn builder() -> MarketplaceClientBuilder {
        MarketplaceClientBuilder::default()
    }

    // ── Sub-client accessors ─────────────────────────────────────────────

    pub fn auctions(&self) -> Auctions<'_> {
        Auctions { client: self }
    }

    pub fn bid_logs(&self) -> BidLogs<'_> {
        BidLogs { client: self }
    }

    pub fn http(&self) -> &MarketplaceHttp {
        &self.http
    }

    /// Set (or clear) the bearer token used by every request.
    pub async fn set_auth_token(&self, token: Option<String>) {
        self.http.set_auth_token(token).await;
    }

    // ── Push + reconciliation ────────────────────────────────────────────

    /// WS config for the push connection.
    ///
    /// The WS client is not embedded here: its lifetime belongs to the app
    /// (one connection shared by every observed auction).
    pub fn ws_config(&self) -> &WsConfig {
        &self.ws_config
    }

    pub fn reconcile_config(&self) -> &ReconcileConfig {
        &self.reconcile_config
    }

    /// Create a new native WS client from the current config.
    #[cfg(feature = "ws-native")]
    pub fn ws_native(&self) -> crate::ws::native::WsClient {
        crate::ws::native::WsClient::new(self.ws_config.clone())
    }

    /// Push fan-out over `transport`, buffered per `ReconcileConfig::push_buffer`.
    ///
    /// Share one manager between every controller on the same connection.
    pub fn push_manager(&self, transport: Arc<dyn GroupTransport>) -> Arc<PushSubscriptionManager> {
        Arc::new(PushSubscriptionManager::with_capacity(
            transport,
            self.reconcile_config.push_buffer,
        ))
    }

    /// Controller for one auction's bid log, backed by this client's HTTP API.
    pub fn bid_log_controller(
        &self,
        auction_id: AuctionId,
        push: Arc<PushSubscriptionManager>,
    ) -> BidLogController {
        BidLogController::new(
            auction_id,
            Arc::new(self.clone()),
            push,
            self.reconcile_config.clone(),
        )
    }
}

#[async_trait]
impl AuctionBackend for MarketplaceClient {
    async fn fetch_bid_logs(&self, auction_id: &AuctionId) -> Result<Vec<BidLogEntry>, SdkError> {
        self.bid_logs().get(auction_id).await
    }

    async fn fetch_auction(&self, auction_id: &AuctionId) -> Result<AuctionView, SdkError> {
        self.auctions().get(auction_id).await
    }
}

impl Clone for MarketplaceClient {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            ws_config: self.ws_config.clone(),
            reconcile_config: self.reconcile_config.clone(),
        }
    }
}

impl std::fmt::Debug for MarketplaceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("MarketplaceClient")
            .field("base_url", &self.http.base_url())
            .field("ws_url", &self.ws_config.url)
            .field("reconcile", &self.reconcile_config)
            .finish()
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Builder
// ═════════════════════════════════════════════════════════════════════════════

pub struct MarketplaceClientBuilder {
    base_url: String,
    ws_url: String,
    auth_token: Option<String>,
    reconcile: ReconcileConfig,
}

impl Default for MarketplaceClientBuilder {
    fn default() -> Self {
        Self {
            base_url: crate::network::DEFAULT_API_URL.to_string(),
            ws_url: crate::network::DEFAULT_WS_URL.to_string(),
            auth_token: None,
            reconcile: ReconcileConfig::default(),
        }
    }
}

impl MarketplaceClientBuilder {
    pub fn base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    pub fn ws_url(mut self, url: &str) -> Self {
        self.ws_url = url.to_string();
        self
    }

    /// Pre-set the bearer token on construction.
    pub fn auth_token(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_string());
        self
    }

    pub fn reconcile(mut self, config: ReconcileConfig) -> Self {
        self.reconcile = config;
        self
    }

    pub fn build(self) -> Result<MarketplaceClient, SdkError> {
        if !self.ws_url.starts_with("ws://") && !self.ws_url.starts_with("wss://") {
            return Err(SdkError::Validation(format!(
                "push URL must use ws:// or wss://, got {}",
                self.ws_url
            )));
        }
        let http = MarketplaceHttp::with_token(&self.base_url, self.auth_token)?;
        Ok(MarketplaceClient {
            http,
            ws_config: WsConfig {
                url: self.ws_url,
                ..WsConfig::default()
            },
            reconcile_config: self.reconcile,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::TimestampComparison;

    #[test]
    fn test_builder_defaults() {
        let client = MarketplaceClient::builder().build().unwrap();
        assert_eq!(client.http().base_url(), crate::network::DEFAULT_API_URL);
        assert_eq!(client.ws_config().url, crate::network::DEFAULT_WS_URL);
        assert_eq!(client.reconcile_config().max_retries, 2);
    }

    #[test]
    fn test_builder_overrides() {
        let client = MarketplaceClient::builder()
            .base_url("https://api.example.test/")
            .ws_url("wss://push.example.test/ws/auctions")
            .reconcile(ReconcileConfig {
                comparison: TimestampComparison::Inclusive,
                ..Default::default()
            })
            .build()
            .unwrap();
        assert_eq!(client.http().base_url(), "https://api.example.test");
        assert_eq!(client.ws_config().url, "wss://push.example.test/ws/auctions");
        assert_eq!(
            client.reconcile_config().comparison,
            TimestampComparison::Inclusive
        );
    }

    #[test]
    fn test_builder_rejects_non_ws_push_url() {
        let err = tokio_test::assert_err!(MarketplaceClient::builder()
            .ws_url("http://localhost:5000/ws")
            .build());
        assert!(matches!(err, SdkError::Validation(_)));
        tokio_test::assert_ok!(MarketplaceClient::builder()
            .ws_url("wss://push.example.test")
            .build());
    }

    struct NoopTransport;

    impl GroupTransport for NoopTransport {
        fn join_group(&self, _: &AuctionId) -> Result<(), crate::error::WsError> {
            Ok(())
        }

        fn leave_group(&self, _: &AuctionId) -> Result<(), crate::error::WsError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_controller_factory_wires_push() {
        let client = MarketplaceClient::builder().build().unwrap();
        let push = client.push_manager(Arc::new(NoopTransport));
        let controller = client.bid_log_controller(AuctionId::from("7"), push);
        assert_eq!(controller.auction_id().as_str(), "7");
        assert!(!controller.is_observing());
        assert!(controller.view().bid_log_entries.is_empty());
    }

    #[tokio::test]
    async fn test_auth_token_preset() {
        let client = MarketplaceClient::builder().auth_token("t0k").build().unwrap();
        assert!(client.http().has_auth_token().await);
        client.set_auth_token(None).await;
        assert!(!client.http().has_auth_token().await);
    }
}
