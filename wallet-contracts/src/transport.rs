//! The [`Transport`] contract.
//!
//! A bidirectional RPC channel to a single remote wallet backend.
//! `fetch_wallet` splits subscription into two halves: the initial response
//! resolves normally, and later server-pushed updates arrive over an `mpsc`
//! channel that the reconciliation engine's background task drains.

use thiserror::Error;
use tokio::sync::mpsc;

use crate::{hash::Hash32, keys::PublicKey};

/// A wallet record as reported by the server, either as the initial
/// `fetch_wallet` response or as a later unsolicited push.
///
/// `status_text` is only `Some` on the initial response; push events leave it
/// `None` and the reconciliation engine synthesizes one.
#[derive(Clone, Debug)]
pub struct ServerWalletRecord {
    pub status_text: Option<String>,
    pub local_hash: Option<Hash32>,
    pub encrypted_data: Option<Vec<u8>>,
    pub created: Option<String>,
    pub updated: Option<String>,
}

impl ServerWalletRecord {
    pub fn no_content() -> Self {
        Self {
            status_text: Some("No Content".to_owned()),
            local_hash: None,
            encrypted_data: None,
            created: None,
            updated: None,
        }
    }
}

/// The result of opening a `fetch_wallet` subscription: the server's initial
/// response, plus a channel that later push events arrive on.
pub struct Subscription {
    pub initial: ServerWalletRecord,
    pub pushes: mpsc::Receiver<ServerWalletRecord>,
}

/// Response to `create_wallet`.
#[derive(Clone, Debug)]
pub struct CreateWalletResponse {
    pub local_hash: Hash32,
    pub created: String,
}

/// Response to `save_wallet` and `change_password`. `status_text == "OK"`
/// means the write succeeded; anything else (typically `"Conflict"`) means it
/// was rejected.
#[derive(Clone, Debug)]
pub struct SaveWalletResponse {
    pub status_text: String,
    pub local_hash: Option<Hash32>,
    pub updated: Option<String>,
}

/// A non-OK response from a transport write operation, or a hard RPC failure.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("server rejected the write: {status_text}")]
    Rejected {
        status_text: String,
        payload: Option<String>,
    },
    #[error("transport RPC failed: {0}")]
    Rpc(String),
    #[error("no active subscription")]
    NotSubscribed,
}

/// The remote wallet RPC surface.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Open a push subscription for `pub_key`'s wallet, seeded with the
    /// caller's current `local_hash` so the server can decide whether to
    /// return the full ciphertext or just acknowledge "not modified".
    async fn fetch_wallet(
        &self,
        pub_key: &PublicKey,
        local_hash: Option<Hash32>,
    ) -> Result<Subscription, TransportError>;

    /// Close the push subscription for `pub_key`, if any.
    async fn fetch_wallet_unsubscribe(&self, pub_key: &PublicKey);

    /// First upload of a wallet, authorized by a single-use invitation token.
    async fn create_wallet(
        &self,
        token: &str,
        ciphertext: &[u8],
        sig: &crate::keys::Signature,
    ) -> Result<CreateWalletResponse, TransportError>;

    /// Save a new ciphertext, optimistically concurrent on `prev_hash`.
    async fn save_wallet(
        &self,
        prev_hash: Option<Hash32>,
        ciphertext: &[u8],
        sig: &crate::keys::Signature,
    ) -> Result<SaveWalletResponse, TransportError>;

    /// Delete the remote wallet.
    async fn delete_wallet(
        &self,
        hash: Hash32,
        sig: &crate::keys::Signature,
    ) -> Result<(), TransportError>;

    /// Atomically rotate the remote ciphertext's encryption key, proving
    /// ownership of both the old and new private keys via `old_sig`/`new_sig`.
    async fn change_password(
        &self,
        old_hash: Hash32,
        old_sig: &crate::keys::Signature,
        new_ciphertext: &[u8],
        new_sig: &crate::keys::Signature,
    ) -> Result<SaveWalletResponse, TransportError>;

    /// The opaque id of an active subscription for `pub_key`, if any. Mostly
    /// useful for diagnostics/tests.
    fn get_subscription_id(&self, pub_key: &PublicKey) -> Option<String>;

    /// Close the transport entirely. `use_backup_server` awaits this before
    /// opening (or not opening) a replacement.
    async fn close(&self);
}
