//! Bid-log sub-client: authoritative bid history for an auction.

use crate::client::MarketplaceClient;
use crate::domain::bid_log::BidLogEntry;
use crate::error::SdkError;
use crate::shared::AuctionId;

pub struct BidLogs<'a> {
    pub(crate) client: &'a MarketplaceClient,
}

impl<'a> BidLogs<'a> {
    /// Full bid log for `auction_id`, newest first.
    pub async fn get(&self, auction_id: &AuctionId) -> Result<Vec<BidLogEntry>, SdkError> {
        let resp = self.client.http.get_bid_logs(auction_id).await?;
        Ok(resp.into_entries())
    }
}
