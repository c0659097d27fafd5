use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;

use crate::models::{
    lamports_to_sol, short_address, ClaimType, ClaimablePosition, Market, Notification, OddsSnapshot,
};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{sink} returned {status}")]
    Status { sink: &'static str, status: StatusCode },
}

/// Where alerts go besides the audit log.
#[derive(Debug, Clone)]
pub enum Sink {
    /// POST of the JSON notification payload.
    Webhook { url: String },
    /// Telegram `sendMessage` with Markdown.
    Telegram { bot_token: String, chat_id: String },
}

impl Sink {
    fn name(&self) -> &'static str {
        match self {
            Sink::Webhook { .. } => "webhook",
            Sink::Telegram { .. } => "telegram",
        }
    }
}

/// Alert fan-out. Every alert is written to the audit log; delivery to each
/// configured sink is attempted independently and failures are logged, never
/// returned to the caller.
#[derive(Debug)]
pub struct Notifier {
    http: reqwest::Client,
    sinks: Vec<Sink>,
    seq: AtomicU64,
}

impl Notifier {
    pub fn new(http: reqwest::Client, sinks: Vec<Sink>) -> Self {
        Self {
            http,
            sinks,
            seq: AtomicU64::new(0),
        }
    }

    /// Audit log only, no delivery.
    pub fn log_only() -> Self {
        Self::new(reqwest::Client::new(), Vec::new())
    }

    /// Number of alerts sent since startup.
    pub fn alert_count(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    pub async fn send(&self, notification: &Notification) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;

        tracing::info!(
            target: "claimwatch::audit",
            seq,
            severity = %notification.severity,
            subject_key = notification.subject_key.as_deref().unwrap_or("-"),
            related_account = notification.related_account.as_deref().unwrap_or("-"),
            timestamp = %notification.timestamp.to_rfc3339(),
            message = %notification.message,
            "Alert"
        );
        metrics::counter!("alerts_sent_total", "severity" => notification.severity.to_string())
            .increment(1);

        for sink in &self.sinks {
            if let Err(e) = self.deliver(sink, notification).await {
                metrics::counter!("alert_delivery_failures_total", "sink" => sink.name()).increment(1);
                tracing::warn!(
                    seq,
                    sink = sink.name(),
                    error = %e,
                    subject_key = notification.subject_key.as_deref().unwrap_or("-"),
                    "Alert delivery failed"
                );
            }
        }
    }

    async fn deliver(&self, sink: &Sink, notification: &Notification) -> Result<(), DeliveryError> {
        let resp = match sink {
            Sink::Webhook { url } => self.http.post(url).json(notification).send().await?,
            Sink::Telegram { bot_token, chat_id } => {
                let url = format!("https://api.telegram.org/bot{bot_token}/sendMessage");
                let body = json!({
                    "chat_id": chat_id,
                    "text": notification.message,
                    "parse_mode": "Markdown",
                });
                self.http.post(&url).json(&body).send().await?
            }
        };

        if !resp.status().is_success() {
            return Err(DeliveryError::Status {
                sink: sink.name(),
                status: resp.status(),
            });
        }
        Ok(())
    }
}

fn question_line(market: &Market) -> String {
    if market.question.is_empty() {
        format!("#{}", market.id)
    } else {
        market.question.clone()
    }
}

/// Claimable winnings/refunds summary for one account.
pub fn format_claimable_alert(account: &str, claims: &[ClaimablePosition], total_lamports: u64) -> String {
    let mut msg = format!(
        "*Claimable Payouts*\nAccount: `{}`\nTotal: {} SOL across {} position(s)",
        short_address(account),
        lamports_to_sol(total_lamports),
        claims.len(),
    );
    for c in claims {
        let label = match c.claim_type {
            ClaimType::Winnings => format!(
                "winnings on {}",
                c.winning_side.map(|s| s.to_string()).unwrap_or_default()
            ),
            ClaimType::Refund => "refund (void)".to_string(),
            ClaimType::Cancelled => "refund (cancelled)".to_string(),
        };
        msg.push_str(&format!(
            "\n- {}: {} SOL ({})",
            if c.market_question.is_empty() {
                format!("#{}", c.market_id)
            } else {
                c.market_question.clone()
            },
            lamports_to_sol(c.estimated_payout),
            label,
        ));
    }
    msg
}

pub fn format_resolution_alert(market: &Market) -> String {
    let outcome = market
        .winning_outcome
        .map(|s| s.to_string())
        .unwrap_or_else(|| "VOID (refunds)".into());
    format!(
        "*Market Resolved*\nMarket: {}\nOutcome: {}\nPool: {} SOL",
        question_line(market),
        outcome,
        lamports_to_sol(market.total_pool),
    )
}

pub fn format_closing_alert(market: &Market, minutes_left: i64) -> String {
    format!(
        "*Market Closing Soon*\nMarket: {}\nCloses in: {} min\nOdds: YES {}% / NO {}%",
        question_line(market),
        minutes_left,
        market.side_a_percent.round_dp(1),
        market.side_b_percent.round_dp(1),
    )
}

pub fn format_odds_alert(market: &Market, previous: &OddsSnapshot) -> String {
    let delta: Decimal = market.side_a_percent - previous.side_a_percent;
    let sign = if delta.is_sign_negative() { "" } else { "+" };
    format!(
        "*Odds Shift*\nMarket: {}\nYES: {}% -> {}% ({}{} pts)\nNO: {}% -> {}%",
        question_line(market),
        previous.side_a_percent.round_dp(1),
        market.side_a_percent.round_dp(1),
        sign,
        delta.round_dp(1),
        previous.side_b_percent.round_dp(1),
        market.side_b_percent.round_dp(1),
    )
}
