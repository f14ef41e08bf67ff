//! Target identity codec
//!
//! Within a single plate run every fiber observation is identified by
//! `plate * 10^9 + mjd * 10^4 + fiber`. The encoding is positional, so the
//! triple can be recovered from the id as long as each field stays inside its
//! digit budget.
//!
//! Multi-plate runs cannot rely on fiber-local numbering and use opaque
//! per-fiber `THING_ID`s instead (see [`FiberIdentity`]).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Weight of the plate field
pub const PLATE_WEIGHT: i64 = 1_000_000_000;
/// Weight of the mjd field
pub const MJD_WEIGHT: i64 = 10_000;
/// Exclusive upper bound for fiber numbers
pub const MAX_FIBER: i64 = MJD_WEIGHT;
/// Exclusive upper bound for mjd values
pub const MAX_MJD: i64 = PLATE_WEIGHT / MJD_WEIGHT;
/// Inclusive upper bound for plate numbers
pub const MAX_PLATE: i64 = i64::MAX / PLATE_WEIGHT - 1;

/// Errors raised when a triple cannot be encoded losslessly
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// A field is negative or exceeds its digit budget
    #[error("{field} = {value} is outside the encodable range 0..={max}")]
    OutOfRange {
        /// Field name
        field: &'static str,
        /// Offending value
        value: i64,
        /// Largest encodable value
        max: i64,
    },

    /// Fiber number has no entry in the companion identity table
    #[error("fiber {fiber} has no THING_ID (identity table has {available} rows)")]
    MissingThingId {
        /// 1-based fiber number
        fiber: i64,
        /// Rows in the identity table
        available: usize,
    },
}

/// A decoded `(plate, mjd, fiber)` observation key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObservationKey {
    /// Plate number
    pub plate: i64,
    /// Modified Julian date of the visit
    pub mjd: i64,
    /// 1-based fiber number
    pub fiber: i64,
}

impl ObservationKey {
    /// Create a key
    pub fn new(plate: i64, mjd: i64, fiber: i64) -> Self {
        Self { plate, mjd, fiber }
    }

    /// Encode as a target id
    pub fn target_id(&self) -> Result<i64, IdentityError> {
        encode_target_id(self.plate, self.mjd, self.fiber)
    }
}

fn check_range(field: &'static str, value: i64, max: i64) -> Result<(), IdentityError> {
    if (0..=max).contains(&value) {
        Ok(())
    } else {
        Err(IdentityError::OutOfRange { field, value, max })
    }
}

/// Encode `(plate, mjd, fiber)` into a single target id
pub fn encode_target_id(plate: i64, mjd: i64, fiber: i64) -> Result<i64, IdentityError> {
    check_range("plate", plate, MAX_PLATE)?;
    check_range("mjd", mjd, MAX_MJD - 1)?;
    check_range("fiber", fiber, MAX_FIBER - 1)?;
    Ok(plate * PLATE_WEIGHT + mjd * MJD_WEIGHT + fiber)
}

/// Decode a target id produced by [`encode_target_id`]
pub fn decode_target_id(target_id: i64) -> ObservationKey {
    ObservationKey {
        plate: target_id / PLATE_WEIGHT,
        mjd: (target_id / MJD_WEIGHT) % MAX_MJD,
        fiber: target_id % MJD_WEIGHT,
    }
}

/// How the fibers of one exposure are mapped to target ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FiberIdentity {
    /// Positional `(plate, mjd, fiber)` encoding
    PlateMjdFiber,
    /// `THING_ID` per fiber, indexed by `fiber - 1`
    ThingIds(Arc<Vec<i64>>),
}

impl FiberIdentity {
    /// Target id of one fiber observed on `(plate, mjd)`
    pub fn target_id(&self, plate: i64, mjd: i64, fiber: i64) -> Result<i64, IdentityError> {
        match self {
            FiberIdentity::PlateMjdFiber => encode_target_id(plate, mjd, fiber),
            FiberIdentity::ThingIds(ids) => usize::try_from(fiber - 1)
                .ok()
                .and_then(|i| ids.get(i).copied())
                .ok_or(IdentityError::MissingThingId {
                    fiber,
                    available: ids.len(),
                }),
        }
    }

    /// True for the positional encoding
    pub fn is_positional(&self) -> bool {
        matches!(self, FiberIdentity::PlateMjdFiber)
    }
}
