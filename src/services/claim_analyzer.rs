//! Pari-mutuel claim evaluation.
//!
//! Winners split the total pool in proportion to their share of the winning
//! side's pool; the platform fee is charged on profit only. Void outcomes and
//! cancelled markets return the full stake with no fee.

use thiserror::Error;

use crate::models::{
    ClaimOutcome, ClaimType, ClaimablePosition, Market, MarketStatus, NotClaimableReason, Position,
    Side,
};

const BPS_DENOMINATOR: u128 = 10_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComputeError {
    #[error("market {market_id} has an empty {side:?} pool")]
    EmptyPool { market_id: u64, side: Side },

    #[error("position {position} references market {expected}, got market {actual}")]
    MarketMismatch {
        position: String,
        expected: u64,
        actual: u64,
    },

    #[error("no market {market_id} for position {position}")]
    MissingMarket { position: String, market_id: u64 },

    #[error("payout overflow for position {0}")]
    Overflow(String),
}

/// Decide whether `position` can be claimed against `market` and for how much.
pub fn analyze(position: &Position, market: &Market) -> Result<ClaimOutcome, ComputeError> {
    if position.market_id != market.id {
        return Err(ComputeError::MarketMismatch {
            position: position.address.clone(),
            expected: position.market_id,
            actual: market.id,
        });
    }

    if position.claimed {
        return Ok(ClaimOutcome::NotClaimable(NotClaimableReason::AlreadyClaimed));
    }

    match market.status {
        MarketStatus::Resolved => match market.winning_outcome {
            Some(winner) => analyze_winner(position, market, winner),
            None => Ok(full_refund(position, market, ClaimType::Refund)),
        },
        MarketStatus::Cancelled => Ok(full_refund(position, market, ClaimType::Cancelled)),
        other => Ok(ClaimOutcome::NotClaimable(NotClaimableReason::Unsettled(other))),
    }
}

fn analyze_winner(
    position: &Position,
    market: &Market,
    winner: Side,
) -> Result<ClaimOutcome, ComputeError> {
    let stake = position.amount_on(winner);
    if stake == 0 {
        // Any remaining stake sits on the losing side.
        return Ok(ClaimOutcome::NotClaimable(NotClaimableReason::Lost));
    }

    let payout = winning_payout(
        stake,
        market.pool_for(winner),
        market.total_pool,
        market.fee_bps,
    )
    .map_err(|e| match e {
        PayoutError::EmptyPool => ComputeError::EmptyPool {
            market_id: market.id,
            side: winner,
        },
        PayoutError::Overflow => ComputeError::Overflow(position.address.clone()),
    })?;

    Ok(ClaimOutcome::Claimable(ClaimablePosition {
        position_address: position.address.clone(),
        market_id: market.id,
        market_question: market.question.clone(),
        winning_side: Some(winner),
        staked_amount: stake,
        claim_type: ClaimType::Winnings,
        estimated_payout: payout,
    }))
}

fn full_refund(position: &Position, market: &Market, claim_type: ClaimType) -> ClaimOutcome {
    let staked = position.total_staked();
    ClaimOutcome::Claimable(ClaimablePosition {
        position_address: position.address.clone(),
        market_id: market.id,
        market_question: market.question.clone(),
        winning_side: None,
        staked_amount: staked,
        claim_type,
        estimated_payout: staked,
    })
}

#[derive(Debug, PartialEq, Eq)]
enum PayoutError {
    EmptyPool,
    Overflow,
}

/// Net payout in lamports. Integer math with floor division at each step:
/// `gross = stake * total / side_pool`, `fee = (gross - stake) * bps / 10_000`.
fn winning_payout(stake: u64, side_pool: u64, total_pool: u64, fee_bps: u16) -> Result<u64, PayoutError> {
    if side_pool == 0 {
        return Err(PayoutError::EmptyPool);
    }

    let gross = (stake as u128)
        .checked_mul(total_pool as u128)
        .ok_or(PayoutError::Overflow)?
        / side_pool as u128;
    let profit = gross.saturating_sub(stake as u128);
    let fee = profit * fee_bps as u128 / BPS_DENOMINATOR;

    u64::try_from(gross - fee).map_err(|_| PayoutError::Overflow)
}

/// Sum of estimated payouts.
pub fn total_claimable(claims: &[ClaimablePosition]) -> u64 {
    claims
        .iter()
        .fold(0u64, |acc, c| acc.saturating_add(c.estimated_payout))
}
