use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Market (bulk source)
// ---------------------------------------------------------------------------

/// One market object as served by the bulk market source. Loosely typed on
/// purpose: normalization into [`crate::models::Market`] decides what is usable.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMarket {
    #[serde(default)]
    pub public_key: Option<String>,
    /// Number or numeric string.
    #[serde(default)]
    pub market_id: serde_json::Value,
    #[serde(default)]
    pub question: String,
    /// Epoch seconds, epoch milliseconds or RFC 3339.
    #[serde(default)]
    pub closing_time: Option<serde_json::Value>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub yes_percent: Option<Decimal>,
    #[serde(default)]
    pub no_percent: Option<Decimal>,
    #[serde(default)]
    pub total_pool_sol: Option<Decimal>,
    #[serde(default)]
    pub platform_fee_bps: Option<u16>,
    #[serde(default)]
    pub outcome: Option<String>,
}

/// The bulk endpoint answers either with a bare array or `{ "markets": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MarketsResponse {
    List(Vec<ApiMarket>),
    Wrapped { markets: Vec<ApiMarket> },
}

impl MarketsResponse {
    pub fn into_markets(self) -> Vec<ApiMarket> {
        match self {
            MarketsResponse::List(m) => m,
            MarketsResponse::Wrapped { markets } => markets,
        }
    }
}

// ---------------------------------------------------------------------------
// JSON-RPC
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RpcResponse<T> {
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<RpcErrorBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorBody {
    pub code: i64,
    pub message: String,
}

/// Entry of a `getProgramAccounts` result.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgramAccount {
    pub pubkey: String,
    pub account: AccountData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountData {
    /// `[payload, encoding]`, e.g. `["AAEC...", "base64"]`.
    pub data: (String, String),
}

/// Undecoded account bytes as returned by a per-account scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub address: String,
    pub data: Vec<u8>,
}

/// One per-owner scan. `skipped` counts accounts whose data could not be
/// read at all; they never reach the decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordScan {
    pub records: Vec<RawRecord>,
    pub skipped: usize,
}
