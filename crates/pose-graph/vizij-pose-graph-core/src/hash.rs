//! Hash128: a 128-bit content hash with an append-style accumulator.
//!
//! BLAKE3 truncated to 16 bytes. Every `append_*` call writes a fixed-width
//! little-endian encoding (strings are length-prefixed) so that field
//! boundaries cannot alias: `("ab", "c")` and `("a", "bc")` hash differently.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A 128-bit content hash. `Hash128::ZERO` marks "no content" (the empty request).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash128(pub u128);

impl Hash128 {
    pub const ZERO: Hash128 = Hash128(0);

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Hash a single byte slice in one go.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut b = Hash128Builder::new();
        b.append_bytes(data);
        b.finish()
    }
}

impl fmt::Display for Hash128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl FromStr for Hash128 {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u128::from_str_radix(s, 16).map(Hash128)
    }
}

impl Serialize for Hash128 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash128 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Streaming accumulator producing a [`Hash128`].
#[derive(Clone, Debug)]
pub struct Hash128Builder {
    hasher: blake3::Hasher,
}

impl Default for Hash128Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Hash128Builder {
    pub fn new() -> Self {
        Self {
            hasher: blake3::Hasher::new(),
        }
    }

    pub fn append_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.hasher.update(&(data.len() as u64).to_le_bytes());
        self.hasher.update(data);
        self
    }

    pub fn append_str(&mut self, s: &str) -> &mut Self {
        self.append_bytes(s.as_bytes())
    }

    pub fn append_i32(&mut self, v: i32) -> &mut Self {
        self.hasher.update(&v.to_le_bytes());
        self
    }

    /// Floats hash by bit pattern; `-0.0` is folded into `0.0`.
    pub fn append_f32(&mut self, v: f32) -> &mut Self {
        let v = if v == 0.0 { 0.0f32 } else { v };
        self.hasher.update(&v.to_bits().to_le_bytes());
        self
    }

    pub fn append_bool(&mut self, v: bool) -> &mut Self {
        self.hasher.update(&[v as u8]);
        self
    }

    pub fn finish(&self) -> Hash128 {
        let digest = self.hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest.as_bytes()[..16]);
        Hash128(u128::from_le_bytes(bytes))
    }
}
