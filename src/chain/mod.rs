pub mod decoder;
pub mod market_api;
pub mod rpc_client;
pub mod types;

pub use decoder::{decode_position, decode_positions, DecodeError};
pub use market_api::MarketApiClient;
pub use rpc_client::RpcClient;
pub use types::{ApiMarket, RawRecord, RecordScan};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("undecodable account data for {address}: {reason}")]
    Encoding { address: String, reason: String },

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

/// Bulk source of every market, fetched wholesale.
#[allow(async_fn_in_trait)]
pub trait MarketSource {
    async fn fetch_markets(&self) -> Result<Vec<ApiMarket>, UpstreamError>;
}

/// Per-owner scan returning the raw position records of one account.
/// A single unreadable account is counted in the scan, not returned as `Err`.
#[allow(async_fn_in_trait)]
pub trait PositionSource {
    async fn fetch_position_records(&self, owner: &str) -> Result<RecordScan, UpstreamError>;
}
