//! [`Hash32`]: a fixed-size SHA-256 digest, base64-encoded on the wire and in
//! storage per the wallet engine's encoded-formats contract.

use std::{fmt, str::FromStr};

use base64::Engine;
use ref_cast::RefCast;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// A raw 32-byte SHA-256 digest.
///
/// Displays and parses as base64, matching how hashes are carried on the wire
/// and in the persisted storage state.
#[derive(Copy, Clone, PartialEq, Eq, Hash, RefCast)]
#[repr(transparent)]
pub struct Hash32([u8; 32]);

impl Hash32 {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn into_bytes(self) -> [u8; 32] {
        self.0
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid base64-encoded 32-byte hash")]
pub struct Hash32ParseError;

impl FromStr for Hash32 {
    type Err = Hash32ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(|_| Hash32ParseError)?;
        let array: [u8; 32] =
            bytes.try_into().map_err(|_| Hash32ParseError)?;
        Ok(Self(array))
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = base64::engine::general_purpose::STANDARD.encode(self.0);
        f.write_str(&s)
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash32({self})")
    }
}

impl Serialize for Hash32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Hash32 {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash32::from_str(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrips_through_display_and_fromstr() {
        let hash = Hash32::new([7u8; 32]);
        let s = hash.to_string();
        let hash2 = Hash32::from_str(&s).unwrap();
        assert_eq!(hash, hash2);
    }

    #[test]
    fn roundtrips_through_serde() {
        let hash = Hash32::new([9u8; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        let hash2: Hash32 = serde_json::from_str(&json).unwrap();
        assert_eq!(hash, hash2);
    }
}
