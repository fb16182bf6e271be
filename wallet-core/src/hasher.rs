//! The local hash. A thin, pure convenience wrapper around the external
//! `Crypto::hash` primitive.

use wallet_contracts::{Crypto, Hash32};

use crate::model;

/// SHA-256 of the base64-decoded `encrypted_wallet`, or `None` if no wallet
/// has been persisted yet. Deterministic; does no I/O.
pub fn local_hash(
    crypto: &impl Crypto,
    encrypted_wallet_b64: Option<&str>,
) -> Option<Hash32> {
    let ciphertext = model::decode_ciphertext(encrypted_wallet_b64?).ok()?;
    Some(crypto.sha256(&ciphertext))
}
