//! Fixed-layout decoding of on-chain position records.
//!
//! Layout (little-endian):
//!
//! | bytes     | field            |
//! |-----------|------------------|
//! | `[0, 8)`  | discriminator    |
//! | `[8, 40)` | owner address    |
//! | `[40, 48)`| market id (u64)  |
//! | `[48, 56)`| side A stake     |
//! | `[56, 64)`| side B stake     |
//! | `[64, 65)`| claimed (0 / 1)  |

use std::sync::LazyLock;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::Position;

pub const DISCRIMINATOR_LEN: usize = 8;
pub const POSITION_RECORD_LEN: usize = 65;

/// Account name hashed into the position discriminator.
pub const POSITION_ACCOUNT_NAME: &str = "Position";

const OWNER_OFFSET: usize = 8;
const MARKET_ID_OFFSET: usize = 40;
const SIDE_A_OFFSET: usize = 48;
const SIDE_B_OFFSET: usize = 56;
const CLAIMED_OFFSET: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("record too short: {len} bytes, need {expected}")]
    TooShort { len: usize, expected: usize },

    #[error("unknown record type: discriminator {0:02x?}")]
    UnknownRecordType([u8; DISCRIMINATOR_LEN]),

    #[error("invalid claimed flag {0}")]
    InvalidFlag(u8),

    #[error("position {0} has no stake on either side")]
    EmptyStake(String),
}

/// Anchor-style account discriminator: `sha256("account:<Name>")[..8]`.
pub fn account_discriminator(name: &str) -> [u8; DISCRIMINATOR_LEN] {
    let digest = Sha256::digest(format!("account:{name}").as_bytes());
    let mut out = [0u8; DISCRIMINATOR_LEN];
    out.copy_from_slice(&digest[..DISCRIMINATOR_LEN]);
    out
}

static POSITION_DISCRIMINATOR: LazyLock<[u8; DISCRIMINATOR_LEN]> =
    LazyLock::new(|| account_discriminator(POSITION_ACCOUNT_NAME));

pub fn position_discriminator() -> [u8; DISCRIMINATOR_LEN] {
    *POSITION_DISCRIMINATOR
}

/// Decode one position record. Pure; no I/O.
pub fn decode_position(bytes: &[u8], record_address: &str) -> Result<Position, DecodeError> {
    if bytes.len() < POSITION_RECORD_LEN {
        return Err(DecodeError::TooShort {
            len: bytes.len(),
            expected: POSITION_RECORD_LEN,
        });
    }

    let mut disc = [0u8; DISCRIMINATOR_LEN];
    disc.copy_from_slice(&bytes[..DISCRIMINATOR_LEN]);
    if disc != position_discriminator() {
        return Err(DecodeError::UnknownRecordType(disc));
    }

    let owner = bs58::encode(&bytes[OWNER_OFFSET..MARKET_ID_OFFSET]).into_string();
    let market_id = read_u64(bytes, MARKET_ID_OFFSET);
    let side_a_amount = read_u64(bytes, SIDE_A_OFFSET);
    let side_b_amount = read_u64(bytes, SIDE_B_OFFSET);
    let claimed = match bytes[CLAIMED_OFFSET] {
        0 => false,
        1 => true,
        other => return Err(DecodeError::InvalidFlag(other)),
    };

    if side_a_amount == 0 && side_b_amount == 0 {
        return Err(DecodeError::EmptyStake(record_address.to_string()));
    }

    Ok(Position {
        address: record_address.to_string(),
        owner,
        market_id,
        side_a_amount,
        side_b_amount,
        claimed,
    })
}

/// Decode a batch of `(address, bytes)` records. Malformed or foreign records
/// are logged and dropped; the second value is how many were skipped.
pub fn decode_positions<'a, I>(records: I) -> (Vec<Position>, usize)
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut positions = Vec::new();
    let mut skipped = 0usize;

    for (address, bytes) in records {
        match decode_position(bytes, address) {
            Ok(p) => positions.push(p),
            Err(e) => {
                skipped += 1;
                metrics::counter!("records_skipped_total").increment(1);
                tracing::warn!(record = %address, error = %e, "Skipping undecodable record");
            }
        }
    }

    (positions, skipped)
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

/// Encode a position record; the inverse of [`decode_position`].
/// Used to build fixtures.
pub fn encode_position(
    owner: &[u8; 32],
    market_id: u64,
    side_a_amount: u64,
    side_b_amount: u64,
    claimed: bool,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(POSITION_RECORD_LEN);
    out.extend_from_slice(&position_discriminator());
    out.extend_from_slice(owner);
    out.extend_from_slice(&market_id.to_le_bytes());
    out.extend_from_slice(&side_a_amount.to_le_bytes());
    out.extend_from_slice(&side_b_amount.to_le_bytes());
    out.push(claimed as u8);
    out
}
