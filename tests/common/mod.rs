use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use tokio::sync::watch;

use claimwatch::chain::decoder::encode_position;
use claimwatch::chain::{ApiMarket, MarketSource, PositionSource, RawRecord, RecordScan, UpstreamError};
use claimwatch::services::market_cache::MarketCache;
use claimwatch::services::monitor::{Monitor, MonitorConfig};
use claimwatch::services::notifier::Notifier;
use claimwatch::services::state_store::StateStore;

/// In-memory bulk market source; clones share the same table.
#[derive(Clone, Default)]
pub struct FakeMarkets {
    markets: Arc<Mutex<Vec<ApiMarket>>>,
    failing: Arc<AtomicBool>,
    pub calls: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl FakeMarkets {
    pub fn set(&self, markets: Vec<ApiMarket>) {
        *self.markets.lock().unwrap() = markets;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl MarketSource for FakeMarkets {
    async fn fetch_markets(&self) -> Result<Vec<ApiMarket>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(UpstreamError::Unexpected("market source down".into()));
        }
        Ok(self.markets.lock().unwrap().clone())
    }
}

/// In-memory per-owner record scan; clones share the same table.
#[derive(Clone, Default)]
pub struct FakePositions {
    records: Arc<Mutex<HashMap<String, Vec<RawRecord>>>>,
    unreadable: Arc<Mutex<HashMap<String, usize>>>,
    failing_owners: Arc<Mutex<Vec<String>>>,
    shutdown_on_fetch: Arc<Mutex<Option<watch::Sender<bool>>>>,
}

#[allow(dead_code)]
impl FakePositions {
    pub fn set(&self, owner: &str, records: Vec<RawRecord>) {
        self.records.lock().unwrap().insert(owner.to_string(), records);
    }

    pub fn fail_for(&self, owner: &str) {
        self.failing_owners.lock().unwrap().push(owner.to_string());
    }

    /// Report `count` accounts of `owner` as unreadable in every scan.
    pub fn set_unreadable(&self, owner: &str, count: usize) {
        self.unreadable.lock().unwrap().insert(owner.to_string(), count);
    }

    /// Raise shutdown from inside the next scan, as a signal arriving mid-cycle would.
    pub fn shutdown_during_next_fetch(&self, tx: watch::Sender<bool>) {
        *self.shutdown_on_fetch.lock().unwrap() = Some(tx);
    }
}

impl PositionSource for FakePositions {
    async fn fetch_position_records(&self, owner: &str) -> Result<RecordScan, UpstreamError> {
        if let Some(tx) = self.shutdown_on_fetch.lock().unwrap().take() {
            tx.send(true).unwrap();
        }
        if self.failing_owners.lock().unwrap().iter().any(|o| o == owner) {
            return Err(UpstreamError::Rpc {
                code: -32005,
                message: "rate limited".into(),
            });
        }
        Ok(RecordScan {
            records: self.records.lock().unwrap().get(owner).cloned().unwrap_or_default(),
            skipped: self.unreadable.lock().unwrap().get(owner).copied().unwrap_or(0),
        })
    }
}

/// Deterministic 32-byte owner key for a test account.
pub fn owner_key(seed: u8) -> [u8; 32] {
    let mut key = [0u8; 32];
    key[0] = seed;
    key[31] = seed.wrapping_mul(7).wrapping_add(1);
    key
}

/// Base58 account address matching [`owner_key`].
pub fn account(seed: u8) -> String {
    bs58::encode(owner_key(seed)).into_string()
}

#[allow(dead_code)]
pub fn position_record(address: &str, owner_seed: u8, market_id: u64, side_a: u64, side_b: u64, claimed: bool) -> RawRecord {
    RawRecord {
        address: address.to_string(),
        data: encode_position(&owner_key(owner_seed), market_id, side_a, side_b, claimed),
    }
}

/// Bulk-source market object. `total_sol` is the whole pool in SOL.
#[allow(dead_code)]
pub fn api_market(
    id: u64,
    status: &str,
    outcome: Option<&str>,
    yes_percent: i64,
    total_sol: i64,
    fee_bps: u16,
    closing_time: DateTime<Utc>,
) -> ApiMarket {
    serde_json::from_value(json!({
        "publicKey": format!("Mkt{id}"),
        "marketId": id,
        "question": format!("Test market {id}?"),
        "closingTime": closing_time.to_rfc3339(),
        "status": status,
        "yesPercent": yes_percent,
        "noPercent": 100 - yes_percent,
        "totalPoolSol": total_sol,
        "platformFeeBps": fee_bps,
        "outcome": outcome,
    }))
    .expect("valid market json")
}

pub fn temp_state_path() -> PathBuf {
    std::env::temp_dir().join(format!("claimwatch-test-{}.json", uuid::Uuid::new_v4()))
}

pub fn monitor_config(accounts: Vec<String>) -> MonitorConfig {
    MonitorConfig {
        accounts,
        poll_interval: Duration::from_secs(300),
        claimable_threshold: 10_000_000,
        odds_shift_threshold: Decimal::from(10),
        closing_soon_minutes: 60,
        account_delay: Duration::ZERO,
        market_delay: Duration::ZERO,
    }
}

pub struct Harness {
    pub monitor: Monitor<FakeMarkets, FakePositions>,
    pub markets: FakeMarkets,
    pub positions: FakePositions,
    pub notifier: Arc<Notifier>,
    pub state_path: PathBuf,
}

/// Monitor wired to fakes, with a log-only notifier and a fresh state file.
#[allow(dead_code)]
pub fn harness(accounts: Vec<String>) -> Harness {
    harness_at(accounts, temp_state_path())
}

/// Like [`harness`], but reusing an existing state file (simulated restart).
pub fn harness_at(accounts: Vec<String>, state_path: PathBuf) -> Harness {
    let markets = FakeMarkets::default();
    let positions = FakePositions::default();
    let notifier = Arc::new(Notifier::log_only());
    let store = StateStore::open(&state_path).expect("state store opens");
    let cache = MarketCache::new(markets.clone(), Duration::ZERO);

    let monitor = Monitor::new(
        monitor_config(accounts),
        cache,
        positions.clone(),
        store,
        Arc::clone(&notifier),
    );

    Harness {
        monitor,
        markets,
        positions,
        notifier,
        state_path,
    }
}
