//! Default endpoint URLs.

/// Default REST API base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:5000";

/// Default push WebSocket URL.
pub const DEFAULT_WS_URL: &str = "ws://localhost:5000/ws/auctions";
