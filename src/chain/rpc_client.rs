use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::decoder::position_discriminator;
use super::types::{ProgramAccount, RawRecord, RecordScan, RpcResponse};
use super::{PositionSource, UpstreamError};

/// Offset of the owner address inside a position record.
const OWNER_FILTER_OFFSET: usize = 8;

/// Minimal JSON-RPC reader: only the calls the monitor needs.
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: Client,
    url: String,
    program_id: String,
}

impl RpcClient {
    pub fn new(http: Client, url: String, program_id: String) -> Self {
        Self {
            http,
            url,
            program_id,
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, UpstreamError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let resp: RpcResponse<T> = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = resp.error {
            return Err(UpstreamError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        resp.result
            .ok_or_else(|| UpstreamError::Unexpected(format!("{method}: missing result")))
    }

    /// Current slot; used as a connectivity probe at startup.
    pub async fn get_slot(&self) -> Result<u64, UpstreamError> {
        self.call("getSlot", json!([])).await
    }

    /// All position records owned by `owner`, filtered server-side by
    /// discriminator and owner bytes.
    pub async fn get_positions_by_owner(&self, owner: &str) -> Result<RecordScan, UpstreamError> {
        let disc = bs58::encode(position_discriminator()).into_string();
        let params = json!([
            self.program_id,
            {
                "encoding": "base64",
                "filters": [
                    { "memcmp": { "offset": 0, "bytes": disc } },
                    { "memcmp": { "offset": OWNER_FILTER_OFFSET, "bytes": owner } }
                ]
            }
        ]);

        let accounts: Vec<ProgramAccount> = self.call("getProgramAccounts", params).await?;
        Ok(collect_records(accounts))
    }
}

/// Keep every readable account; an unreadable one is logged, counted and dropped.
fn collect_records(accounts: Vec<ProgramAccount>) -> RecordScan {
    let mut scan = RecordScan::default();
    for acct in accounts {
        match decode_account_data(acct) {
            Ok(record) => scan.records.push(record),
            Err(e) => {
                scan.skipped += 1;
                metrics::counter!("records_skipped_total").increment(1);
                tracing::warn!(error = %e, "Skipping unreadable account data");
            }
        }
    }
    scan
}

fn decode_account_data(acct: ProgramAccount) -> Result<RawRecord, UpstreamError> {
    let (payload, encoding) = acct.account.data;
    if encoding != "base64" {
        return Err(UpstreamError::Encoding {
            address: acct.pubkey,
            reason: format!("unsupported encoding {encoding}"),
        });
    }
    let data = STANDARD.decode(payload).map_err(|e| UpstreamError::Encoding {
        address: acct.pubkey.clone(),
        reason: e.to_string(),
    })?;
    Ok(RawRecord {
        address: acct.pubkey,
        data,
    })
}

impl PositionSource for RpcClient {
    async fn fetch_position_records(&self, owner: &str) -> Result<RecordScan, UpstreamError> {
        self.get_positions_by_owner(owner).await
    }
}
