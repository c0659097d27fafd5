use serde::{Deserialize, Serialize};

use super::Side;

/// A bettor's stake in one market, decoded from an on-chain position record.
/// Never mutated by this service; re-read every cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Address of the position record itself.
    pub address: String,
    /// Base58 owner address.
    pub owner: String,
    pub market_id: u64,
    pub side_a_amount: u64,
    pub side_b_amount: u64,
    pub claimed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    SideA,
    SideB,
    Both,
}

impl Position {
    /// Which side(s) hold a non-zero stake. `None` only for a record that
    /// violates the non-empty invariant, which the decoder rejects.
    pub fn side(&self) -> Option<PositionSide> {
        match (self.side_a_amount > 0, self.side_b_amount > 0) {
            (true, true) => Some(PositionSide::Both),
            (true, false) => Some(PositionSide::SideA),
            (false, true) => Some(PositionSide::SideB),
            (false, false) => None,
        }
    }

    pub fn amount_on(&self, side: Side) -> u64 {
        match side {
            Side::SideA => self.side_a_amount,
            Side::SideB => self.side_b_amount,
        }
    }

    /// Both sides' stakes summed.
    pub fn total_staked(&self) -> u64 {
        self.side_a_amount.saturating_add(self.side_b_amount)
    }
}
