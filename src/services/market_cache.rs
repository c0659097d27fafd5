use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::chain::{ApiMarket, MarketSource, UpstreamError};
use crate::models::{Market, MarketStatus, Side, LAMPORTS_PER_SOL};

/// One immutable, fully-built view of every market.
#[derive(Debug, Default)]
pub struct MarketSnapshot {
    by_id: HashMap<u64, Market>,
    id_by_address: HashMap<String, u64>,
}

impl MarketSnapshot {
    pub fn from_markets(markets: Vec<Market>) -> Self {
        let mut by_id = HashMap::with_capacity(markets.len());
        let mut id_by_address = HashMap::with_capacity(markets.len());
        for m in markets {
            if !m.address.is_empty() {
                id_by_address.insert(m.address.clone(), m.id);
            }
            by_id.insert(m.id, m);
        }
        Self { by_id, id_by_address }
    }

    pub fn get(&self, id: u64) -> Option<&Market> {
        self.by_id.get(&id)
    }

    pub fn get_by_address(&self, address: &str) -> Option<&Market> {
        self.id_by_address.get(address).and_then(|id| self.by_id.get(id))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Read-through cache over the bulk market source.
///
/// The whole table is refetched once the TTL has elapsed and swapped in as a
/// new snapshot, so a lookup never sees a half-built table. A failed refresh
/// keeps serving the previous snapshot and is retried after another TTL.
pub struct MarketCache<S> {
    source: S,
    ttl: Duration,
    snapshot: Option<Arc<MarketSnapshot>>,
    next_refresh: Option<Instant>,
}

impl<S: MarketSource> MarketCache<S> {
    pub fn new(source: S, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            snapshot: None,
            next_refresh: None,
        }
    }

    pub fn is_populated(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Current snapshot without triggering a refresh.
    pub fn snapshot(&self) -> Option<Arc<MarketSnapshot>> {
        self.snapshot.clone()
    }

    fn is_due(&self, now: Instant) -> bool {
        match self.next_refresh {
            Some(at) => now >= at,
            None => true,
        }
    }

    /// Fetch and swap in a new snapshot unconditionally.
    pub async fn refresh(&mut self) -> Result<usize, UpstreamError> {
        let raw = self.source.fetch_markets().await?;
        let fetched = raw.len();
        let markets: Vec<Market> = raw.iter().filter_map(normalize_market).collect();
        let snapshot = MarketSnapshot::from_markets(markets);
        let count = snapshot.len();

        self.snapshot = Some(Arc::new(snapshot));
        self.next_refresh = Some(Instant::now() + self.ttl);

        metrics::gauge!("markets_cached").set(count as f64);
        tracing::info!(
            markets = count,
            dropped = fetched.saturating_sub(count),
            "Market snapshot refreshed"
        );
        Ok(count)
    }

    /// Refresh if the TTL has elapsed. Never fails: on error the previous
    /// snapshot (if any) stays in place.
    pub async fn ensure_fresh(&mut self) {
        if !self.is_due(Instant::now()) {
            return;
        }
        if let Err(e) = self.refresh().await {
            metrics::counter!("upstream_failures_total", "source" => "markets").increment(1);
            if self.snapshot.is_some() {
                self.next_refresh = Some(Instant::now() + self.ttl);
                tracing::warn!(error = %e, "Market refresh failed, serving stale snapshot");
            } else {
                tracing::error!(error = %e, "Market refresh failed and no snapshot is available");
            }
        }
    }

    pub async fn get_market(&mut self, id: u64) -> Option<Market> {
        self.ensure_fresh().await;
        self.snapshot.as_ref()?.get(id).cloned()
    }

    pub async fn get_market_by_address(&mut self, address: &str) -> Option<Market> {
        self.ensure_fresh().await;
        self.snapshot.as_ref()?.get_by_address(address).cloned()
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Convert a bulk-source market into a [`Market`]. Returns `None` (and logs)
/// when the id, status or odds are unusable.
pub fn normalize_market(api: &ApiMarket) -> Option<Market> {
    let Some(id) = parse_market_id(&api.market_id) else {
        tracing::warn!(market_id = %api.market_id, "Dropping market with unparseable id");
        return None;
    };

    let status_raw = api.status.as_deref().unwrap_or_default();
    let Some(status) = MarketStatus::from_api_str(status_raw) else {
        tracing::warn!(market_id = id, status = status_raw, "Dropping market with unknown status");
        return None;
    };

    let hundred = Decimal::ONE_HUNDRED;
    let clamp = |p: Decimal| p.clamp(Decimal::ZERO, hundred);
    let (side_a_percent, side_b_percent) = match (api.yes_percent.map(clamp), api.no_percent.map(clamp)) {
        (Some(a), Some(b)) => (a, b),
        (Some(a), None) => (a, hundred - a),
        (None, Some(b)) => (hundred - b, b),
        (None, None) => {
            tracing::warn!(market_id = id, "Dropping market without odds");
            return None;
        }
    };

    let total_sol = api.total_pool_sol.unwrap_or(Decimal::ZERO);
    let lamports = total_sol.checked_mul(Decimal::from(LAMPORTS_PER_SOL));
    let Some(total_pool) = lamports.and_then(|l| l.trunc().to_u64()) else {
        tracing::warn!(market_id = id, total = %total_sol, "Dropping market with invalid pool");
        return None;
    };
    let side_a_pool = (Decimal::from(total_pool) * side_a_percent / hundred)
        .round()
        .to_u64()
        .unwrap_or(0)
        .min(total_pool);
    let side_b_pool = total_pool - side_a_pool;

    let closing_time = api
        .closing_time
        .as_ref()
        .and_then(parse_timestamp)
        .unwrap_or_default();

    Some(Market {
        id,
        address: api.public_key.clone().unwrap_or_default(),
        question: api.question.clone(),
        closing_time,
        status,
        winning_outcome: api.outcome.as_deref().and_then(Side::from_api_str),
        side_a_pool,
        side_b_pool,
        total_pool,
        side_a_percent,
        side_b_percent,
        fee_bps: api.platform_fee_bps.unwrap_or(0),
    })
}

fn parse_market_id(v: &serde_json::Value) -> Option<u64> {
    match v {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Epoch seconds, epoch milliseconds (anything above 1e12) or RFC 3339.
fn parse_timestamp(ts: &serde_json::Value) -> Option<DateTime<Utc>> {
    fn from_epoch(n: i64) -> Option<DateTime<Utc>> {
        if n > 1_000_000_000_000 {
            DateTime::from_timestamp(n / 1000, ((n % 1000) * 1_000_000) as u32)
        } else {
            DateTime::from_timestamp(n, 0)
        }
    }

    match ts {
        serde_json::Value::Number(n) => from_epoch(n.as_i64()?),
        serde_json::Value::String(s) => {
            if let Ok(n) = s.parse::<i64>() {
                return from_epoch(n);
            }
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }
        _ => None,
    }
}
