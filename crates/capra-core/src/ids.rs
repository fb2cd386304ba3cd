//! Strongly typed identifier wrappers.
//!
//! Both id types serialize as their human-readable wire form — `"b<N>"`
//! for bindings, 32-char lowercase hex for engrams — because snapshots key
//! maps by these strings and external tools grep for them.  The inner value
//! stays a plain integer / byte array so ids remain `Copy + Ord + Hash` and
//! can be used as map keys without ceremony.

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

// ── BindingId ─────────────────────────────────────────────────────────────────

/// Identity of one binding (node) in a world graph.
///
/// Allocated from a monotonically increasing per-graph counter starting at 1;
/// renders as `"b<N>"`.  Deserializing a snapshot advances the owning graph's
/// counter past the largest id seen, so ids never collide across a reload.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct BindingId(pub u32);

impl BindingId {
    /// Numeric part of the id (the `N` in `"b<N>"`).
    #[inline]
    pub fn number(self) -> u32 {
        self.0
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

impl FromStr for BindingId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix('b')
            .ok_or_else(|| CoreError::BadId(s.to_owned()))?;
        digits
            .parse::<u32>()
            .map(BindingId)
            .map_err(|_| CoreError::BadId(s.to_owned()))
    }
}

impl Serialize for BindingId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BindingId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|_| D::Error::custom(format!("bad binding id {s:?}")))
    }
}

// ── EngramId ──────────────────────────────────────────────────────────────────

/// Content-addressed record id in column memory: 16 random bytes, rendered
/// as 32 lowercase hex chars.
///
/// Ids are drawn from the run's seeded RNG, not from an OS entropy source,
/// so runs with the same seed produce the same ids.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct EngramId(pub [u8; 16]);

impl EngramId {
    /// Draw a fresh id from `rng`.
    pub fn random(rng: &mut impl RngCore) -> Self {
        let mut bytes = [0u8; 16];
        rng.fill_bytes(&mut bytes);
        EngramId(bytes)
    }
}

impl fmt::Display for EngramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for EngramId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 {
            return Err(CoreError::BadId(s.to_owned()));
        }
        let mut bytes = [0u8; 16];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hi = (chunk[0] as char)
                .to_digit(16)
                .ok_or_else(|| CoreError::BadId(s.to_owned()))?;
            let lo = (chunk[1] as char)
                .to_digit(16)
                .ok_or_else(|| CoreError::BadId(s.to_owned()))?;
            bytes[i] = ((hi << 4) | lo) as u8;
        }
        Ok(EngramId(bytes))
    }
}

impl Serialize for EngramId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EngramId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|_| D::Error::custom(format!("bad engram id {s:?}")))
    }
}
