//! Epoch encoding.
//!
//! An epoch is a u64 counter stored little-endian in the low 8 bytes of a
//! 32-byte value. Read as a field element it equals the counter, which is
//! how it enters the share polynomial and the nullifier.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use pasta_curves::pallas;
use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

/// Encoded size of an epoch.
pub const EPOCH_SIZE: usize = 32;

const COUNTER_SIZE: usize = 8;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Epoch([u8; EPOCH_SIZE]);

impl Epoch {
    /// Encodes a counter. Total and injective.
    #[must_use]
    pub fn from_u64(counter: u64) -> Self {
        let mut bytes = [0u8; EPOCH_SIZE];
        bytes[..COUNTER_SIZE].copy_from_slice(&counter.to_le_bytes());
        Self(bytes)
    }

    /// Decodes the counter.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        let mut counter = [0u8; COUNTER_SIZE];
        counter.copy_from_slice(&self.0[..COUNTER_SIZE]);
        u64::from_le_bytes(counter)
    }

    /// Accepts only encodings produced by [`Epoch::from_u64`].
    #[must_use]
    pub fn from_bytes(bytes: [u8; EPOCH_SIZE]) -> Option<Self> {
        bytes[COUNTER_SIZE..]
            .iter()
            .all(|&b| b == 0)
            .then_some(Self(bytes))
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; EPOCH_SIZE] {
        self.0
    }

    #[must_use]
    pub fn to_field(&self) -> pallas::Base {
        pallas::Base::from(self.as_u64())
    }

    /// Epoch containing `time` for epochs of length `period`.
    ///
    /// Times before the Unix epoch map to epoch 0; a zero period is treated
    /// as one second.
    #[must_use]
    pub fn at(time: SystemTime, period: Duration) -> Self {
        let elapsed = time.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        let period_secs = period.as_secs().max(1);
        Self::from_u64(elapsed.as_secs() / period_secs)
    }

    #[must_use]
    pub fn current(period: Duration) -> Self {
        Self::at(SystemTime::now(), period)
    }
}

/// Signed distance `a - b` over the counter domain.
///
/// Computed with wrapping arithmetic, so `diff(a, b) == -diff(b, a)` holds
/// everywhere and neighbouring counters at the top of the range are `±1`
/// apart.
#[must_use]
pub fn diff(a: Epoch, b: Epoch) -> i64 {
    a.as_u64().wrapping_sub(b.as_u64()) as i64
}

impl From<u64> for Epoch {
    fn from(counter: u64) -> Self {
        Self::from_u64(counter)
    }
}

impl fmt::Debug for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Epoch({})", self.as_u64())
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u64())
    }
}

impl Serialize for Epoch {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Epoch {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        let mut bytes = [0u8; EPOCH_SIZE];
        hex::decode_to_slice(&s, &mut bytes).map_err(D::Error::custom)?;
        Self::from_bytes(bytes).ok_or_else(|| D::Error::custom("non-canonical epoch encoding"))
    }
}
