//! HTTP client layer: `MarketplaceHttp` with per-request retry policies.

pub mod client;
pub mod retry;

pub use client::MarketplaceHttp;
pub use retry::{RetryConfig, RetryPolicy};
