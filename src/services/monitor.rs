//! The polling loop: one cycle visits every tracked account in order.
//!
//! Per account: scan position records, decode, evaluate claims, then for each
//! distinct market run the resolution, closing-soon and odds-shift checks.
//! Every check compares against timestamps and flags in the [`StateStore`],
//! so dedup is decided by stored state and `now`, never by timers.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::time::{interval, sleep, MissedTickBehavior};

use crate::chain::{decode_positions, MarketSource, PositionSource};
use crate::errors::MonitorError;
use crate::models::{
    AlertType, ClaimOutcome, ClaimablePosition, Market, MarketStatus, Notification, OddsSnapshot,
    Position, Severity,
};
use crate::services::claim_analyzer::{self, total_claimable, ComputeError};
use crate::services::market_cache::MarketCache;
use crate::services::notifier::{self, Notifier};
use crate::services::state_store::StateStore;

const HOUR_MS: i64 = 60 * 60 * 1000;
pub const CLAIMABLE_COOLDOWN_MS: i64 = HOUR_MS;
pub const CLOSING_COOLDOWN_MS: i64 = HOUR_MS;
pub const ODDS_COOLDOWN_MS: i64 = HOUR_MS / 2;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub accounts: Vec<String>,
    pub poll_interval: Duration,
    /// Lamports; the claimable total must exceed this to alert.
    pub claimable_threshold: u64,
    /// Percentage points of side-A movement.
    pub odds_shift_threshold: Decimal,
    pub closing_soon_minutes: i64,
    pub account_delay: Duration,
    pub market_delay: Duration,
}

/// What one account contributed to a cycle.
#[derive(Debug, Default, Clone)]
pub struct AccountReport {
    pub positions: usize,
    pub skipped_records: usize,
    pub claimable: Vec<ClaimablePosition>,
    pub total_claimable: u64,
    pub markets_checked: usize,
    pub alerts: usize,
}

#[derive(Debug, Default, Clone)]
pub struct CycleSummary {
    pub accounts_processed: usize,
    pub accounts_failed: usize,
    pub positions: usize,
    pub skipped_records: usize,
    pub alerts: usize,
    /// Shutdown was requested before every account was visited.
    pub interrupted: bool,
}

/// Claim outcome for one position; a position whose market is not in the
/// snapshot is a compute failure for this cycle.
fn evaluate(pos: &Position, market: Option<&Market>) -> Result<ClaimOutcome, MonitorError> {
    let market = market.ok_or_else(|| ComputeError::MissingMarket {
        position: pos.address.clone(),
        market_id: pos.market_id,
    })?;
    Ok(claim_analyzer::analyze(pos, market)?)
}

/// Cooldown key for per-market alerts of one account.
pub fn subject_key(account: &str, market_id: u64) -> String {
    format!("{account}:{market_id}")
}

pub struct Monitor<M, P> {
    config: MonitorConfig,
    cache: MarketCache<M>,
    positions: P,
    store: StateStore,
    notifier: Arc<Notifier>,
    odds_rounds: HashMap<u64, OddsRound>,
}

/// Odds a market had before the current round of checks. A round ends when
/// an account checks the market a second time, i.e. on the next cycle.
#[derive(Debug, Default)]
struct OddsRound {
    baseline: Option<OddsSnapshot>,
    checked: HashSet<String>,
}

impl<M: MarketSource, P: PositionSource> Monitor<M, P> {
    pub fn new(
        config: MonitorConfig,
        cache: MarketCache<M>,
        positions: P,
        store: StateStore,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            config,
            cache,
            positions,
            store,
            notifier,
            odds_rounds: HashMap::new(),
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn cache(&self) -> &MarketCache<M> {
        &self.cache
    }

    /// Run cycles on a fixed interval until `shutdown` flips to `true`.
    /// A cycle never overlaps the next one; a late tick is delayed, not doubled.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        metrics::gauge!("tracked_accounts").set(self.config.accounts.len() as f64);

        tracing::info!(
            accounts = self.config.accounts.len(),
            interval_secs = self.config.poll_interval.as_secs(),
            "Monitor started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => {}
            }
            if *shutdown.borrow() {
                break;
            }

            let summary = self.run_cycle(Utc::now(), &shutdown).await;
            if summary.interrupted {
                break;
            }
        }

        tracing::info!(alerts = self.notifier.alert_count(), "Monitor stopped");
    }

    /// One pass over every tracked account. Failures are contained per account.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>, shutdown: &watch::Receiver<bool>) -> CycleSummary {
        let started = Instant::now();
        let mut summary = CycleSummary::default();
        let accounts = self.config.accounts.clone();

        for (i, account) in accounts.iter().enumerate() {
            if *shutdown.borrow() {
                tracing::info!(remaining = accounts.len() - i, "Shutdown requested, ending cycle early");
                summary.interrupted = true;
                break;
            }
            if i > 0 && !self.config.account_delay.is_zero() {
                sleep(self.config.account_delay).await;
            }

            match self.process_account(account, now).await {
                Ok(report) => {
                    summary.accounts_processed += 1;
                    summary.positions += report.positions;
                    summary.skipped_records += report.skipped_records;
                    summary.alerts += report.alerts;
                }
                Err(e) => {
                    summary.accounts_failed += 1;
                    if matches!(e, MonitorError::UpstreamFetch(_)) {
                        metrics::counter!("upstream_failures_total", "source" => "rpc").increment(1);
                    }
                    tracing::error!(account = %account, kind = e.kind(), error = %e, "Account check failed");
                }
            }
        }

        let elapsed = started.elapsed();
        metrics::histogram!("cycle_duration_seconds").record(elapsed.as_secs_f64());
        metrics::counter!("cycles_completed_total").increment(1);
        tracing::info!(
            accounts = summary.accounts_processed,
            failed = summary.accounts_failed,
            positions = summary.positions,
            skipped = summary.skipped_records,
            alerts = summary.alerts,
            elapsed_ms = elapsed.as_millis() as u64,
            "Monitor cycle complete"
        );

        summary
    }

    pub async fn process_account(&mut self, account: &str, now: DateTime<Utc>) -> Result<AccountReport, MonitorError> {
        self.cache.ensure_fresh().await;

        let scan = self.positions.fetch_position_records(account).await?;
        let (decoded, undecodable) =
            decode_positions(scan.records.iter().map(|r| (r.address.as_str(), r.data.as_slice())));

        let positions: Vec<_> = decoded
            .into_iter()
            .filter(|p| {
                let ours = p.owner == account;
                if !ours {
                    tracing::warn!(account, position = %p.address, owner = %p.owner, "Ignoring position with foreign owner");
                }
                ours
            })
            .collect();

        let mut report = AccountReport {
            positions: positions.len(),
            skipped_records: scan.skipped + undecodable,
            ..Default::default()
        };

        let Some(snapshot) = self.cache.snapshot() else {
            tracing::warn!(account, "No market snapshot available, skipping market checks");
            return Ok(report);
        };

        for pos in &positions {
            match evaluate(pos, snapshot.get(pos.market_id)) {
                Ok(ClaimOutcome::Claimable(c)) => report.claimable.push(c),
                Ok(ClaimOutcome::NotClaimable(reason)) => {
                    tracing::debug!(account, position = %pos.address, ?reason, "Not claimable");
                }
                Err(e) => {
                    tracing::warn!(account, position = %pos.address, kind = e.kind(), error = %e, "Skipping claim check");
                }
            }
        }
        report.total_claimable = total_claimable(&report.claimable);

        match self.check_claimable(account, &report.claimable, now).await {
            Ok(true) => report.alerts += 1,
            Ok(false) => {}
            Err(e) => tracing::error!(account, alert_type = "claimable", kind = e.kind(), error = %e, "Claimable check failed"),
        }

        let market_ids: BTreeSet<u64> = positions.iter().map(|p| p.market_id).collect();
        for (i, market_id) in market_ids.iter().enumerate() {
            let Some(market) = snapshot.get(*market_id) else {
                continue;
            };
            if i > 0 && !self.config.market_delay.is_zero() {
                sleep(self.config.market_delay).await;
            }
            report.markets_checked += 1;
            report.alerts += self.check_market(account, market, now).await;
        }

        Ok(report)
    }

    /// Resolution, closing-soon and odds checks for one market; returns alerts fired.
    async fn check_market(&mut self, account: &str, market: &Market, now: DateTime<Utc>) -> usize {
        let results = [
            (AlertType::Resolved, self.check_resolution(account, market, now).await),
            (AlertType::Closing, self.check_closing_soon(account, market, now).await),
            (AlertType::Odds, self.check_odds_shift(account, market, now).await),
        ];

        let mut fired = 0;
        for (alert_type, result) in results {
            match result {
                Ok(true) => fired += 1,
                Ok(false) => {}
                Err(e) => tracing::error!(
                    account,
                    market_id = market.id,
                    alert_type = %alert_type,
                    kind = e.kind(),
                    error = %e,
                    "Market check failed"
                ),
            }
        }
        fired
    }

    /// Alert when the account's claimable total exceeds the threshold, at most
    /// once per cooldown window.
    pub async fn check_claimable(
        &mut self,
        account: &str,
        claims: &[ClaimablePosition],
        now: DateTime<Utc>,
    ) -> Result<bool, MonitorError> {
        let total = total_claimable(claims);
        metrics::gauge!("claimable_lamports", "account" => account.to_string()).set(total as f64);

        if total <= self.config.claimable_threshold {
            return Ok(false);
        }

        let now_ms = now.timestamp_millis();
        let last = self.store.last_alerted(account, AlertType::Claimable);
        if now_ms - last <= CLAIMABLE_COOLDOWN_MS {
            tracing::debug!(account, total, "Claimable alert in cooldown");
            return Ok(false);
        }

        let msg = notifier::format_claimable_alert(account, claims, total);
        self.notify(Severity::Alert, msg, account, account, now).await;
        self.store.set_last_alerted(account, AlertType::Claimable, now_ms)?;
        Ok(true)
    }

    /// Alert once per market, ever, when it resolves.
    pub async fn check_resolution(
        &mut self,
        account: &str,
        market: &Market,
        now: DateTime<Utc>,
    ) -> Result<bool, MonitorError> {
        if market.status != MarketStatus::Resolved || self.store.is_resolved(market.id) {
            return Ok(false);
        }

        let msg = notifier::format_resolution_alert(market);
        self.notify(Severity::Alert, msg, &market.id.to_string(), account, now).await;
        self.store.set_resolved(market.id)?;
        Ok(true)
    }

    pub async fn check_closing_soon(
        &mut self,
        account: &str,
        market: &Market,
        now: DateTime<Utc>,
    ) -> Result<bool, MonitorError> {
        let minutes = market.minutes_until_close(now);
        if minutes <= 0 || minutes > self.config.closing_soon_minutes {
            return Ok(false);
        }

        let key = subject_key(account, market.id);
        let now_ms = now.timestamp_millis();
        if now_ms - self.store.last_alerted(&key, AlertType::Closing) <= CLOSING_COOLDOWN_MS {
            return Ok(false);
        }

        let msg = notifier::format_closing_alert(market, minutes);
        self.notify(Severity::Warning, msg, &key, account, now).await;
        self.store.set_last_alerted(&key, AlertType::Closing, now_ms)?;
        Ok(true)
    }

    /// Compare side-A odds with the last observation. The stored snapshot is
    /// replaced with the current odds whether or not an alert fires.
    ///
    /// Every account holding the market in the same cycle is compared against
    /// the odds stored before that cycle, each under its own cooldown.
    pub async fn check_odds_shift(
        &mut self,
        account: &str,
        market: &Market,
        now: DateTime<Utc>,
    ) -> Result<bool, MonitorError> {
        let current = OddsSnapshot::of(market);
        let stored = self.store.odds(market.id);
        let round = self.odds_rounds.entry(market.id).or_default();
        if round.checked.is_empty() || round.checked.contains(account) {
            round.baseline = stored;
            round.checked.clear();
        }
        round.checked.insert(account.to_string());
        let previous = round.baseline;
        let key = subject_key(account, market.id);
        let now_ms = now.timestamp_millis();

        let mut fired = false;
        let mut cooldown_write = Ok(());
        if let Some(prev) = previous {
            let shift = (current.side_a_percent - prev.side_a_percent).abs();
            if shift >= self.config.odds_shift_threshold
                && now_ms - self.store.last_alerted(&key, AlertType::Odds) > ODDS_COOLDOWN_MS
            {
                let msg = notifier::format_odds_alert(market, &prev);
                self.notify(Severity::Warning, msg, &key, account, now).await;
                cooldown_write = self.store.set_last_alerted(&key, AlertType::Odds, now_ms);
                fired = true;
            }
        }

        let odds_write = if stored == Some(current) {
            Ok(())
        } else {
            self.store.set_odds(market.id, current)
        };

        cooldown_write.and(odds_write)?;
        Ok(fired)
    }

    async fn notify(
        &self,
        severity: Severity,
        message: String,
        subject_key: &str,
        account: &str,
        now: DateTime<Utc>,
    ) {
        let notification = Notification::new(severity, message, now)
            .with_subject(subject_key)
            .with_account(account);
        self.notifier.send(&notification).await;
    }
}
