//! An in-memory [`StateStore`] fake.
//!
//! A `Mutex`-guarded map standing in for a real platform credential/file
//! store.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use serde_json::Value;
use wallet_contracts::{store::StatePatch, StateStore};

#[derive(Default)]
pub struct InMemoryStore {
    fields: Mutex<BTreeMap<String, Value>>,
    save_to_disk: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current fields, for test assertions.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.fields.lock().unwrap().clone()
    }

    pub fn save_to_disk(&self) -> bool {
        self.save_to_disk.load(Ordering::SeqCst)
    }
}

impl StateStore for InMemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.fields.lock().unwrap().get(key).cloned()
    }

    fn is_empty(&self) -> bool {
        self.fields.lock().unwrap().is_empty()
    }

    async fn set_state(&self, patch: StatePatch) {
        let mut fields = self.fields.lock().unwrap();
        for (key, value) in patch {
            match value {
                Some(v) => {
                    fields.insert(key, v);
                }
                None => {
                    fields.remove(&key);
                }
            }
        }
    }

    fn set_save_to_disk(&self, save: bool) {
        self.save_to_disk.store(save, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn patch_sets_and_deletes() {
        let store = InMemoryStore::new();
        let mut patch = StatePatch::new();
        patch.insert("a".to_owned(), Some(json!(1)));
        patch.insert("b".to_owned(), Some(json!("x")));
        store.set_state(patch).await;
        assert_eq!(store.get("a"), Some(json!(1)));

        let mut patch = StatePatch::new();
        patch.insert("a".to_owned(), None);
        store.set_state(patch).await;
        assert_eq!(store.get("a"), None);
        assert_eq!(store.get("b"), Some(json!("x")));
    }

    #[test]
    fn starts_empty() {
        let store = InMemoryStore::new();
        assert!(store.is_empty());
        assert!(!store.save_to_disk());
    }
}
