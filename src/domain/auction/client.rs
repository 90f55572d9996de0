//! Auctions sub-client: the auction record behind the price view.

use crate::client::MarketplaceClient;
use crate::domain::auction::AuctionView;
use crate::error::SdkError;
use crate::shared::AuctionId;

pub struct Auctions<'a> {
    pub(crate) client: &'a MarketplaceClient,
}

impl<'a> Auctions<'a> {
    pub async fn get(&self, auction_id: &AuctionId) -> Result<AuctionView, SdkError> {
        let resp = self.client.http.get_auction(auction_id).await?;
        if resp.id != *auction_id {
            return Err(SdkError::Validation(format!(
                "requested auction {} but backend returned {}",
                auction_id, resp.id
            )));
        }
        Ok(resp.into())
    }
}
