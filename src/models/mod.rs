pub mod alert;
pub mod claim;
pub mod market;
pub mod position;

pub use alert::{AlertType, Notification, Severity};
pub use claim::{ClaimOutcome, ClaimType, ClaimablePosition, NotClaimableReason};
pub use market::{Market, MarketStatus};
pub use position::{Position, PositionSide};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lamports per SOL; every on-chain amount is an integer count of lamports.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Decimal places used when showing SOL amounts in messages.
pub const DISPLAY_DP: u32 = 4;

/// Convert lamports to SOL rounded to display precision.
pub fn lamports_to_sol(lamports: u64) -> Decimal {
    (Decimal::from(lamports) / Decimal::from(LAMPORTS_PER_SOL)).round_dp(DISPLAY_DP)
}

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    SideA,
    SideB,
}

impl Side {
    /// Parse an outcome label from the bulk market source.
    /// `None` means the label names no winning side (void, invalid, unset).
    pub fn from_api_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "yes" | "sidea" | "side_a" | "a" => Some(Side::SideA),
            "no" | "sideb" | "side_b" | "b" => Some(Side::SideB),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::SideA => write!(f, "YES"),
            Side::SideB => write!(f, "NO"),
        }
    }
}

// ---------------------------------------------------------------------------
// OddsSnapshot — persisted per market for shift detection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OddsSnapshot {
    pub side_a_percent: Decimal,
    pub side_b_percent: Decimal,
}

impl OddsSnapshot {
    pub fn of(market: &Market) -> Self {
        Self {
            side_a_percent: market.side_a_percent,
            side_b_percent: market.side_b_percent,
        }
    }
}

/// Shorten a base58 address for display: `AbCd...WxYz`.
pub fn short_address(addr: &str) -> String {
    if addr.len() > 10 {
        format!("{}...{}", &addr[..4], &addr[addr.len() - 4..])
    } else {
        addr.to_string()
    }
}
