//! The [`StateStore`] contract.
//!
//! A flat, persisted key/value map holding the wallet's plaintext storage
//! state: the encrypted ciphertext, the remote endpoint, and the
//! reconciliation bookkeeping fields. The store itself never interprets its
//! values; it's the core's job to know which keys mean what.

use std::collections::BTreeMap;

use serde_json::Value;

/// A patch to apply to the [`StateStore`]. `None` for a key deletes it.
pub type StatePatch = BTreeMap<String, Option<Value>>;

#[allow(async_fn_in_trait)]
pub trait StateStore {
    /// Read a single field, if present.
    fn get(&self, key: &str) -> Option<Value>;

    /// True iff `key` is present.
    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// True iff the store holds no fields at all.
    fn is_empty(&self) -> bool;

    /// Merge `patch` into the persisted state: `Some(v)` sets the field to
    /// `v`, `None` deletes it.
    async fn set_state(&self, patch: StatePatch);

    /// Toggle whether the store durably persists to disk, vs. holding state
    /// in memory only.
    fn set_save_to_disk(&self, save: bool);
}
