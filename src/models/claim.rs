use serde::{Deserialize, Serialize};
use std::fmt;

use super::{MarketStatus, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimType {
    Winnings,
    Refund,
    Cancelled,
}

impl fmt::Display for ClaimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimType::Winnings => write!(f, "winnings"),
            ClaimType::Refund => write!(f, "refund"),
            ClaimType::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A position whose payout can be withdrawn. Derived each cycle, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimablePosition {
    pub position_address: String,
    pub market_id: u64,
    pub market_question: String,
    /// `None` for refunds and cancellations.
    pub winning_side: Option<Side>,
    /// Stake the payout is computed from, in lamports.
    pub staked_amount: u64,
    pub claim_type: ClaimType,
    /// Net of fees, in lamports.
    pub estimated_payout: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotClaimableReason {
    AlreadyClaimed,
    /// Only the losing side was staked.
    Lost,
    /// Market has not settled.
    Unsettled(MarketStatus),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimable(ClaimablePosition),
    NotClaimable(NotClaimableReason),
}

impl ClaimOutcome {
    pub fn claimable(self) -> Option<ClaimablePosition> {
        match self {
            ClaimOutcome::Claimable(c) => Some(c),
            ClaimOutcome::NotClaimable(_) => None,
        }
    }
}
