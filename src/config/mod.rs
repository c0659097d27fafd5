use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::models::LAMPORTS_PER_SOL;
use crate::services::monitor::MonitorConfig;
use crate::services::notifier::Sink;

const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
const DEFAULT_STATE_FILE: &str = "claimwatch-state.json";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,

    // Upstreams
    pub rpc_url: String,
    pub program_id: String,
    pub markets_api_url: String,

    // Delivery
    pub webhook_url: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,

    pub state_file: PathBuf,
    pub log_json: bool,

    // Monitor
    pub tracked_accounts: Vec<String>,
    pub poll_interval_secs: u64,
    pub market_cache_ttl_secs: u64,
    pub claimable_threshold_sol: Decimal,
    pub odds_shift_threshold: Decimal,
    pub closing_soon_minutes: i64,
    pub account_delay_ms: u64,
    pub market_delay_ms: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_vars<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let tracked_accounts: Vec<String> = var("TRACKED_ACCOUNTS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if tracked_accounts.is_empty() {
            anyhow::bail!("TRACKED_ACCOUNTS must list at least one account");
        }

        let required = |key: &str| {
            var(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("{key} must be set"))
        };

        let claimable_threshold_sol: Decimal = parse_or(&var, "CLAIMABLE_THRESHOLD_SOL", Decimal::new(1, 2))?;
        if claimable_threshold_sol.is_sign_negative() {
            anyhow::bail!("CLAIMABLE_THRESHOLD_SOL must not be negative");
        }

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&var, "PORT", 8080)?,

            rpc_url: var("RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.into()),
            program_id: required("PROGRAM_ID")?,
            markets_api_url: required("MARKETS_API_URL")?,

            webhook_url: var("WEBHOOK_URL").filter(|v| !v.is_empty()),
            telegram_bot_token: var("TELEGRAM_BOT_TOKEN").filter(|v| !v.is_empty()),
            telegram_chat_id: var("TELEGRAM_CHAT_ID").filter(|v| !v.is_empty()),

            state_file: var("STATE_FILE")
                .unwrap_or_else(|| DEFAULT_STATE_FILE.into())
                .into(),
            log_json: var("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),

            tracked_accounts,
            poll_interval_secs: parse_or(&var, "POLL_INTERVAL_SECS", 300)?,
            market_cache_ttl_secs: parse_or(&var, "MARKET_CACHE_TTL_SECS", 60)?,
            claimable_threshold_sol,
            odds_shift_threshold: parse_or(&var, "ODDS_SHIFT_THRESHOLD", Decimal::from(10))?,
            closing_soon_minutes: parse_or(&var, "CLOSING_SOON_MINUTES", 60)?,
            account_delay_ms: parse_or(&var, "ACCOUNT_DELAY_MS", 1_500)?,
            market_delay_ms: parse_or(&var, "MARKET_DELAY_MS", 250)?,
        })
    }

    /// Claimable threshold in lamports.
    pub fn claimable_threshold_lamports(&self) -> u64 {
        self.claimable_threshold_sol
            .checked_mul(Decimal::from(LAMPORTS_PER_SOL))
            .and_then(|l| l.trunc().to_u64())
            .unwrap_or(u64::MAX)
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            accounts: self.tracked_accounts.clone(),
            poll_interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            claimable_threshold: self.claimable_threshold_lamports(),
            odds_shift_threshold: self.odds_shift_threshold,
            closing_soon_minutes: self.closing_soon_minutes,
            account_delay: Duration::from_millis(self.account_delay_ms),
            market_delay: Duration::from_millis(self.market_delay_ms),
        }
    }

    pub fn market_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.market_cache_ttl_secs)
    }

    /// Delivery sinks; Telegram needs both token and chat id.
    pub fn sinks(&self) -> Vec<Sink> {
        let mut sinks = Vec::new();
        if let Some(url) = &self.webhook_url {
            sinks.push(Sink::Webhook { url: url.clone() });
        }
        match (&self.telegram_bot_token, &self.telegram_chat_id) {
            (Some(token), Some(chat)) => sinks.push(Sink::Telegram {
                bot_token: token.clone(),
                chat_id: chat.clone(),
            }),
            (None, None) => {}
            _ => tracing::warn!("Telegram sink needs both TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID, ignoring"),
        }
        sinks
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key}={raw}: {e}")),
        _ => Ok(default),
    }
}
