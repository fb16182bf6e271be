//! The [`Crypto`] contract.
//!
//! Elliptic-curve key derivation, symmetric encryption, hashing, and signing
//! are all external to the core; this trait is the entire surface the wallet
//! engine needs from them. Implementations wrap whatever EC library a given
//! deployment actually uses.

use serde_json::Value;
use thiserror::Error;

use crate::{
    hash::Hash32,
    keys::{PrivateKey, PublicKey, Signature},
};

/// Decryption of the persisted ciphertext failed.
///
/// Surfaced by the core as `InvalidPassword` when it happens during `login`.
#[derive(Debug, Error)]
pub enum DecryptError {
    #[error("wrong password or corrupted ciphertext")]
    WrongKeyOrCorrupted,
    #[error("decrypted payload was not valid wallet JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// The symmetric-encryption / key-derivation boundary the wallet engine
/// consumes. The actual EC primitives backing these operations are out of
/// scope for this trait — implementations supply whichever library a given
/// deployment uses.
#[allow(async_fn_in_trait)]
pub trait Crypto {
    /// Derive a private key from an arbitrary seed string.
    ///
    /// The core builds the seed as
    /// `lower(trim(email)) + "\t" + lower(trim(username)) + "\t" + password`;
    /// this method just turns that string into a key.
    fn private_key_from_seed(&self, seed: &str) -> PrivateKey;

    /// Derive the public key paired with `private_key`.
    fn public_key(&self, private_key: &PrivateKey) -> PublicKey;

    /// Encode `private_key` as a WIF string, used only for the
    /// constant-time-ish equality check in `verify_password`.
    fn to_wif(&self, private_key: &PrivateKey) -> String;

    /// Encrypt `value` under `public_key`, producing the ciphertext bytes
    /// that get base64-encoded into `encrypted_wallet`.
    async fn encrypt(
        &self,
        value: &Value,
        public_key: &PublicKey,
    ) -> Vec<u8>;

    /// Decrypt `ciphertext` with `private_key`, recovering the wallet JSON
    /// tree. Fails with [`DecryptError`] if `private_key` is wrong.
    async fn decrypt(
        &self,
        ciphertext: &[u8],
        private_key: &PrivateKey,
    ) -> Result<Value, DecryptError>;

    /// SHA-256 digest of `data`. Used to compute the local hash and to build
    /// the payload signed during save/create/change-password.
    fn sha256(&self, data: &[u8]) -> Hash32;

    /// Sign `data` with `private_key`.
    fn sign(&self, data: &[u8], private_key: &PrivateKey) -> Signature;
}
