//! Typed accessors over the two persisted/runtime data shapes: a small typed
//! read/write surface around an otherwise untyped, flat external store.

use base64::Engine;
use serde_json::{Map, Value};

use wallet_contracts::{store::StatePatch, Hash32, StateStore};

/// A small builder for [`StatePatch`]es over the named storage fields.
#[derive(Default)]
pub struct PatchBuilder(StatePatch);

impl PatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_owned(), Some(value.into()));
        self
    }

    pub fn delete(mut self, key: &str) -> Self {
        self.0.insert(key.to_owned(), None);
        self
    }

    pub fn build(self) -> StatePatch {
        self.0
    }
}

/// Field names reserved in the wallet object tree.
pub mod wallet_fields {
    pub const CHAIN_ID: &str = "chain_id";
    pub const CREATED: &str = "created";
    pub const LAST_MODIFIED: &str = "last_modified";
    pub const WEAK_PASSWORD: &str = "weak_password";
}

/// Field names in the persisted, plaintext storage state.
pub mod storage_fields {
    pub const ENCRYPTED_WALLET: &str = "encrypted_wallet";
    pub const REMOTE_URL: &str = "remote_url";
    pub const REMOTE_COPY: &str = "remote_copy";
    pub const REMOTE_TOKEN: &str = "remote_token";
    pub const REMOTE_HASH: &str = "remote_hash";
    pub const REMOTE_CREATED_DATE: &str = "remote_created_date";
    pub const REMOTE_UPDATED_DATE: &str = "remote_updated_date";
}

/// Read `chain_id` out of a wallet object tree, if present and a string.
pub fn chain_id(wallet: &Value) -> Option<&str> {
    wallet.get(wallet_fields::CHAIN_ID)?.as_str()
}

/// Read `weak_password` out of a wallet object tree.
pub fn weak_password(wallet: &Value) -> bool {
    wallet
        .get(wallet_fields::WEAK_PASSWORD)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Read `created` out of a wallet object tree, if present.
pub fn created(wallet: &Value) -> Option<&str> {
    wallet.get(wallet_fields::CREATED)?.as_str()
}

/// Set `last_modified` to `now` in place. `wallet` must be an object.
pub fn touch_last_modified(wallet: &mut Value, now: &str) {
    if let Value::Object(map) = wallet {
        map.insert(
            wallet_fields::LAST_MODIFIED.to_owned(),
            Value::String(now.to_owned()),
        );
    }
}

/// Initialize the reserved fields on a fresh wallet object, without
/// overwriting keys that are already present.
pub fn init_defaults(
    wallet: &mut Value,
    chain_id: &str,
    now: &str,
    weak_password: bool,
) {
    if !wallet.is_object() {
        *wallet = Value::Object(Map::new());
    }
    let Value::Object(map) = wallet else {
        unreachable!("just ensured this is an object")
    };
    map.entry(wallet_fields::CHAIN_ID)
        .or_insert_with(|| Value::String(chain_id.to_owned()));
    map.entry(wallet_fields::CREATED)
        .or_insert_with(|| Value::String(now.to_owned()));
    map.entry(wallet_fields::LAST_MODIFIED)
        .or_insert_with(|| Value::String(now.to_owned()));
    map.entry(wallet_fields::WEAK_PASSWORD)
        .or_insert_with(|| Value::Bool(weak_password));
}

/// Decode the persisted `encrypted_wallet` base64 string to raw bytes.
pub fn decode_ciphertext(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::engine::general_purpose::STANDARD.decode(encoded)
}

/// Encode raw ciphertext bytes for storage/the wire.
pub fn encode_ciphertext(ciphertext: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(ciphertext)
}

/// Decode a base64 `Hash32` storage field.
pub fn decode_hash(encoded: &str) -> Option<Hash32> {
    encoded.parse().ok()
}

/// Build the seed string fed to `Crypto::private_key_from_seed`.
pub fn derive_seed(email: &str, username: &str, password: &str) -> String {
    format!(
        "{}\t{}\t{password}",
        email.trim().to_lowercase(),
        username.trim().to_lowercase(),
    )
}

/// `weak_password := trim(email)=="" || trim(username)==""`.
pub fn is_weak_password(email: &str, username: &str) -> bool {
    email.trim().is_empty() || username.trim().is_empty()
}

/// Typed read-only view over the persisted storage state.
pub struct StorageView<'a, S>(pub &'a S);

impl<S: StateStore> StorageView<'_, S> {
    pub fn encrypted_wallet(&self) -> Option<String> {
        self.0
            .get(storage_fields::ENCRYPTED_WALLET)
            .and_then(|v| v.as_str().map(str::to_owned))
    }

    pub fn remote_copy(&self) -> bool {
        self.0
            .get(storage_fields::REMOTE_COPY)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn remote_url(&self) -> Option<String> {
        self.0
            .get(storage_fields::REMOTE_URL)
            .and_then(|v| v.as_str().map(str::to_owned))
    }

    pub fn remote_token(&self) -> Option<String> {
        self.0
            .get(storage_fields::REMOTE_TOKEN)
            .and_then(|v| v.as_str().map(str::to_owned))
    }

    pub fn remote_hash(&self) -> Option<Hash32> {
        self.0
            .get(storage_fields::REMOTE_HASH)
            .and_then(|v| v.as_str().and_then(decode_hash))
    }
}
