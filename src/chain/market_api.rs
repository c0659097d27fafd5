use reqwest::Client;

use super::types::{ApiMarket, MarketsResponse};
use super::{MarketSource, UpstreamError};

/// Client for the bulk market endpoint. One GET returns every market.
#[derive(Debug, Clone)]
pub struct MarketApiClient {
    http: Client,
    url: String,
}

impl MarketApiClient {
    pub fn new(http: Client, url: String) -> Self {
        Self { http, url }
    }

    pub async fn get_markets(&self) -> Result<Vec<ApiMarket>, UpstreamError> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?;

        let body: MarketsResponse = resp.json().await?;
        Ok(body.into_markets())
    }
}

impl MarketSource for MarketApiClient {
    async fn fetch_markets(&self) -> Result<Vec<ApiMarket>, UpstreamError> {
        self.get_markets().await
    }
}
