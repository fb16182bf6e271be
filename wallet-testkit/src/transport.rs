//! An in-process fake remote wallet server.
//!
//! Rather than a real socket, this holds the "server" state directly and
//! fans pushes out over the same `mpsc` channels a real transport would use.
//!
//! Cloning an [`InMemoryTransport`] produces a second handle to the *same*
//! backing server — the way two real wallet containers, logged in with the
//! same credentials, talk to the same remote over independent connections.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use chrono::Utc;
use tokio::sync::mpsc;
use wallet_contracts::{
    keys::{PublicKey, Signature},
    transport::{
        CreateWalletResponse, SaveWalletResponse, ServerWalletRecord,
        Subscription, TransportError,
    },
    Hash32, Transport,
};

use crate::crypto::sha256_bytes;

const PUSH_CHANNEL_CAPACITY: usize = 16;

struct Subscriber {
    id: String,
    tx: mpsc::Sender<ServerWalletRecord>,
}

#[derive(Default)]
struct ServerState {
    ciphertext: Option<Vec<u8>>,
    hash: Option<Hash32>,
    created: Option<String>,
    updated: Option<String>,
    valid_tokens: HashSet<String>,
    subscribers: HashMap<PublicKey, Subscriber>,
    next_sub_id: u64,
}

#[derive(Clone)]
pub struct InMemoryTransport {
    inner: Arc<Mutex<ServerState>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(ServerState::default())) }
    }

    /// Register `token` as a valid single-use invitation, simulating the
    /// out-of-band invite flow `create_wallet` requires.
    pub fn issue_token(&self, token: impl Into<String>) {
        self.inner.lock().unwrap().valid_tokens.insert(token.into());
    }

    fn record(state: &ServerState) -> ServerWalletRecord {
        ServerWalletRecord {
            status_text: None,
            local_hash: state.hash,
            encrypted_data: state.ciphertext.clone(),
            created: state.created.clone(),
            updated: state.updated.clone(),
        }
    }

    fn broadcast(state: &ServerState) {
        let record = Self::record(state);
        for sub in state.subscribers.values() {
            let _ = sub.tx.try_send(record.clone());
        }
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for InMemoryTransport {
    async fn fetch_wallet(
        &self,
        pub_key: &PublicKey,
        local_hash: Option<Hash32>,
    ) -> Result<Subscription, TransportError> {
        let mut state = self.inner.lock().unwrap();

        let status_text = if state.ciphertext.is_none() {
            "No Content"
        } else if state.hash == local_hash {
            "Not Modified"
        } else {
            "OK"
        };
        let initial = ServerWalletRecord {
            status_text: Some(status_text.to_owned()),
            local_hash: state.hash,
            encrypted_data: if status_text == "OK" {
                state.ciphertext.clone()
            } else {
                None
            },
            created: state.created.clone(),
            updated: state.updated.clone(),
        };

        let (tx, rx) = mpsc::channel(PUSH_CHANNEL_CAPACITY);
        let id = state.next_sub_id;
        state.next_sub_id += 1;
        state
            .subscribers
            .insert(*pub_key, Subscriber { id: format!("sub-{id}"), tx });

        Ok(Subscription { initial, pushes: rx })
    }

    async fn fetch_wallet_unsubscribe(&self, pub_key: &PublicKey) {
        self.inner.lock().unwrap().subscribers.remove(pub_key);
    }

    async fn create_wallet(
        &self,
        token: &str,
        ciphertext: &[u8],
        _sig: &Signature,
    ) -> Result<CreateWalletResponse, TransportError> {
        let mut state = self.inner.lock().unwrap();
        if !state.valid_tokens.remove(token) {
            return Err(TransportError::Rejected {
                status_text: "invalid token".to_owned(),
                payload: None,
            });
        }

        let hash = Hash32::new(sha256_bytes(ciphertext));
        let now = Utc::now().to_rfc3339();
        state.ciphertext = Some(ciphertext.to_vec());
        state.hash = Some(hash);
        state.created = Some(now.clone());
        state.updated = Some(now.clone());
        Self::broadcast(&state);

        Ok(CreateWalletResponse { local_hash: hash, created: now })
    }

    async fn save_wallet(
        &self,
        prev_hash: Option<Hash32>,
        ciphertext: &[u8],
        _sig: &Signature,
    ) -> Result<SaveWalletResponse, TransportError> {
        let mut state = self.inner.lock().unwrap();
        if prev_hash != state.hash {
            return Ok(SaveWalletResponse {
                status_text: "Conflict".to_owned(),
                local_hash: state.hash,
                updated: state.updated.clone(),
            });
        }

        let hash = Hash32::new(sha256_bytes(ciphertext));
        let now = Utc::now().to_rfc3339();
        state.ciphertext = Some(ciphertext.to_vec());
        state.hash = Some(hash);
        state.updated = Some(now.clone());
        Self::broadcast(&state);

        Ok(SaveWalletResponse {
            status_text: "OK".to_owned(),
            local_hash: Some(hash),
            updated: Some(now),
        })
    }

    async fn delete_wallet(
        &self,
        hash: Hash32,
        _sig: &Signature,
    ) -> Result<(), TransportError> {
        let mut state = self.inner.lock().unwrap();
        if state.hash != Some(hash) {
            return Err(TransportError::Rejected {
                status_text: "hash mismatch".to_owned(),
                payload: None,
            });
        }
        state.ciphertext = None;
        state.hash = None;
        state.created = None;
        state.updated = None;
        Self::broadcast(&state);
        Ok(())
    }

    async fn change_password(
        &self,
        old_hash: Hash32,
        _old_sig: &Signature,
        new_ciphertext: &[u8],
        _new_sig: &Signature,
    ) -> Result<SaveWalletResponse, TransportError> {
        let mut state = self.inner.lock().unwrap();
        if state.hash != Some(old_hash) {
            return Ok(SaveWalletResponse {
                status_text: "Conflict".to_owned(),
                local_hash: state.hash,
                updated: state.updated.clone(),
            });
        }

        let hash = Hash32::new(sha256_bytes(new_ciphertext));
        let now = Utc::now().to_rfc3339();
        state.ciphertext = Some(new_ciphertext.to_vec());
        state.hash = Some(hash);
        state.updated = Some(now.clone());
        Self::broadcast(&state);

        Ok(SaveWalletResponse {
            status_text: "OK".to_owned(),
            local_hash: Some(hash),
            updated: Some(now),
        })
    }

    fn get_subscription_id(&self, pub_key: &PublicKey) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .subscribers
            .get(pub_key)
            .map(|sub| sub.id.clone())
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn create_then_fetch_sees_the_wallet() {
        let transport = InMemoryTransport::new();
        transport.issue_token("tok");
        let pub_key = PublicKey::from_bytes([1u8; 32]);
        let sig = Signature::from_bytes(vec![0u8; 4]);

        transport.create_wallet("tok", b"ciphertext", &sig).await.unwrap();

        let sub = transport.fetch_wallet(&pub_key, None).await.unwrap();
        assert_eq!(sub.initial.status_text.as_deref(), Some("OK"));
        assert_eq!(sub.initial.encrypted_data.as_deref(), Some(&b"ciphertext"[..]));
    }

    #[tokio::test]
    async fn save_with_stale_hash_conflicts() {
        let transport = InMemoryTransport::new();
        transport.issue_token("tok");
        let sig = Signature::from_bytes(vec![0u8; 4]);
        transport.create_wallet("tok", b"v1", &sig).await.unwrap();

        let response =
            transport.save_wallet(None, b"v2", &sig).await.unwrap();
        assert_eq!(response.status_text, "Conflict");
    }
}
