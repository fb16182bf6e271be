//! A deterministic, reversible fake [`Crypto`] implementation for tests.
//!
//! Real key derivation and asymmetric encryption are deliberately out of
//! scope for the wallet engine; this fake uses real SHA-256 (via `ring`) and
//! a reversible XOR stream cipher standing in for real public-key
//! encryption — enough to exercise the reconciliation state machine without
//! a real EC/AEAD stack.

use ring::digest;
use serde_json::Value;
use wallet_contracts::{
    crypto::DecryptError,
    keys::{PrivateKey, PublicKey, Signature},
    Crypto, Hash32,
};

#[derive(Default, Clone, Copy)]
pub struct FakeCrypto;

impl FakeCrypto {
    pub fn new() -> Self {
        Self
    }
}

pub(crate) fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let hash = digest::digest(&digest::SHA256, data);
    let mut out = [0u8; 32];
    out.copy_from_slice(hash.as_ref());
    out
}

/// Repeating-key XOR. Calling this twice with the same key recovers the
/// original bytes.
fn xor_stream(data: &[u8], key: &[u8]) -> Vec<u8> {
    data.iter().zip(key.iter().cycle()).map(|(d, k)| d ^ k).collect()
}

impl Crypto for FakeCrypto {
    fn private_key_from_seed(&self, seed: &str) -> PrivateKey {
        PrivateKey::from_bytes(sha256_bytes(seed.as_bytes()))
    }

    fn public_key(&self, private_key: &PrivateKey) -> PublicKey {
        let mut buf = b"fake-pubkey:".to_vec();
        buf.extend_from_slice(private_key.expose_bytes());
        PublicKey::from_bytes(sha256_bytes(&buf))
    }

    fn to_wif(&self, private_key: &PrivateKey) -> String {
        hex_encode(private_key.expose_bytes())
    }

    async fn encrypt(&self, value: &Value, public_key: &PublicKey) -> Vec<u8> {
        let plaintext = serde_json::to_vec(value)
            .expect("wallet object tree is always valid JSON");
        xor_stream(&plaintext, public_key.as_bytes())
    }

    async fn decrypt(
        &self,
        ciphertext: &[u8],
        private_key: &PrivateKey,
    ) -> Result<Value, DecryptError> {
        let public_key = self.public_key(private_key);
        let plaintext = xor_stream(ciphertext, public_key.as_bytes());
        serde_json::from_slice(&plaintext).map_err(DecryptError::InvalidJson)
    }

    fn sha256(&self, data: &[u8]) -> Hash32 {
        Hash32::new(sha256_bytes(data))
    }

    fn sign(&self, data: &[u8], private_key: &PrivateKey) -> Signature {
        let mut buf = private_key.expose_bytes().to_vec();
        buf.extend_from_slice(data);
        Signature::from_bytes(sha256_bytes(&buf).to_vec())
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn encrypt_then_decrypt_round_trips() {
        let crypto = FakeCrypto::new();
        let key = crypto.private_key_from_seed("a\tb\tpw");
        let pub_key = crypto.public_key(&key);
        let value = json!({"chain_id": "x", "k": 1});

        let ciphertext = crypto.encrypt(&value, &pub_key).await;
        let decrypted = crypto.decrypt(&ciphertext, &key).await.unwrap();
        assert_eq!(decrypted, value);
    }

    #[tokio::test]
    async fn decrypt_with_wrong_key_fails() {
        let crypto = FakeCrypto::new();
        let key = crypto.private_key_from_seed("a\tb\tpw");
        let wrong_key = crypto.private_key_from_seed("a\tb\tother");
        let pub_key = crypto.public_key(&key);
        let value = json!({"k": 1});

        let ciphertext = crypto.encrypt(&value, &pub_key).await;
        assert!(crypto.decrypt(&ciphertext, &wrong_key).await.is_err());
    }

    #[test]
    fn seed_derivation_is_deterministic() {
        let crypto = FakeCrypto::new();
        let a = crypto.private_key_from_seed("a\tb\tpw");
        let b = crypto.private_key_from_seed("a\tb\tpw");
        assert_eq!(crypto.to_wif(&a), crypto.to_wif(&b));
    }
}
