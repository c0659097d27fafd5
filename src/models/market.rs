use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketStatus {
    Active,
    Closed,
    Resolved,
    Cancelled,
    Paused,
    ResolvedPending,
    Disputed,
}

impl MarketStatus {
    /// Case-insensitive, ignoring `_` and `-` so `resolved_pending`,
    /// `resolvedPending` and `RESOLVED-PENDING` all match.
    pub fn from_api_str(s: &str) -> Option<Self> {
        let norm: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        match norm.as_str() {
            "active" | "open" => Some(MarketStatus::Active),
            "closed" => Some(MarketStatus::Closed),
            "resolved" => Some(MarketStatus::Resolved),
            "cancelled" | "canceled" => Some(MarketStatus::Cancelled),
            "paused" => Some(MarketStatus::Paused),
            "resolvedpending" => Some(MarketStatus::ResolvedPending),
            "disputed" => Some(MarketStatus::Disputed),
            _ => None,
        }
    }
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MarketStatus::Active => "active",
            MarketStatus::Closed => "closed",
            MarketStatus::Resolved => "resolved",
            MarketStatus::Cancelled => "cancelled",
            MarketStatus::Paused => "paused",
            MarketStatus::ResolvedPending => "resolved_pending",
            MarketStatus::Disputed => "disputed",
        };
        f.write_str(s)
    }
}

/// Aggregate state of one market, normalized from the bulk source.
/// Pool amounts are lamports; `total_pool == side_a_pool + side_b_pool`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub id: u64,
    pub address: String,
    pub question: String,
    pub closing_time: DateTime<Utc>,
    pub status: MarketStatus,
    /// `None` while undecided, or a void outcome once resolved.
    pub winning_outcome: Option<Side>,
    pub side_a_pool: u64,
    pub side_b_pool: u64,
    pub total_pool: u64,
    pub side_a_percent: Decimal,
    pub side_b_percent: Decimal,
    /// Fee on net profit, in basis points.
    pub fee_bps: u16,
}

impl Market {
    pub fn pool_for(&self, side: Side) -> u64 {
        match side {
            Side::SideA => self.side_a_pool,
            Side::SideB => self.side_b_pool,
        }
    }

    /// Whole minutes until close; negative once closed.
    pub fn minutes_until_close(&self, now: DateTime<Utc>) -> i64 {
        (self.closing_time - now).num_minutes()
    }
}
