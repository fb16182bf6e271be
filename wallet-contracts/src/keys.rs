//! Opaque key and signature newtypes.
//!
//! The wallet engine never performs elliptic-curve math itself (seed
//! derivation, public-key extraction, signing) — that's the job of the
//! external [`Crypto`](crate::crypto::Crypto) implementation. These types are
//! just byte-backed handles the core can hold, compare, and pass back to
//! `Crypto` methods.

use std::fmt;

use secrecy::{ExposeSecret, Secret};
use zeroize::Zeroize;

/// The length in bytes of an opaque private key handle.
pub const PRIVATE_KEY_LEN: usize = 32;
/// The length in bytes of an opaque public key.
pub const PUBLIC_KEY_LEN: usize = 32;
/// The length in bytes of an opaque signature.
pub const SIGNATURE_LEN: usize = 64;

#[derive(Clone, Zeroize)]
struct PrivateKeyBytes([u8; PRIVATE_KEY_LEN]);

/// A private key derived from the user's password seed.
///
/// Wrapped in [`Secret`] and zeroized on drop. Two `PrivateKey`s compare
/// equal iff their bytes match — this is used by `verify_password`'s "same
/// WIF" check via the `Crypto` contract, not by comparing these bytes
/// directly.
pub struct PrivateKey(Secret<PrivateKeyBytes>);

impl PrivateKey {
    pub fn from_bytes(bytes: [u8; PRIVATE_KEY_LEN]) -> Self {
        Self(Secret::new(PrivateKeyBytes(bytes)))
    }

    pub fn expose_bytes(&self) -> &[u8; PRIVATE_KEY_LEN] {
        &self.0.expose_secret().0
    }
}

impl Clone for PrivateKey {
    fn clone(&self) -> Self {
        Self::from_bytes(*self.expose_bytes())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// A public key, safe to log and pass around freely.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex_display(&self.0))
    }
}

/// A detached signature over an arbitrary byte buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex_display(&self.0))
    }
}

fn hex_display(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
