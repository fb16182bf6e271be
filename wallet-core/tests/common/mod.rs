use std::sync::{Arc, Mutex};

use wallet_contracts::store::StatePatch;
use wallet_contracts::transport::{
    CreateWalletResponse, SaveWalletResponse, Subscription, TransportError,
};
use wallet_contracts::{Hash32, PublicKey, Signature, StateStore, Transport};
use wallet_core::{SubscriberError, WalletContainer, WalletSnapshot, WalletSubscriber};
use wallet_testkit::{FakeCrypto, InMemoryStore, InMemoryTransport};

pub type TestContainer = WalletContainer<InMemoryStore, FakeCrypto, InMemoryTransport>;

/// A fresh container with no transport configured yet. Passing a URL to
/// `use_backup_server` later opens a transport via `factory`.
pub fn new_container() -> Arc<TestContainer> {
    wallet_logger::init_for_testing();
    WalletContainer::new(InMemoryStore::new(), FakeCrypto::new(), |_url| {
        InMemoryTransport::new()
    })
}

/// A container whose transport factory always hands back a clone of
/// `server` (simulating two containers pointed at the same remote), with
/// the store pre-populated with `seed` before the container ever sees it —
/// the way an app shell writes `remote_copy`/`remote_token` into its own
/// store instance before handing it to `WalletContainer::new`, since the
/// container exposes no direct setter for either.
pub async fn new_container_with_seed(
    server: &InMemoryTransport,
    seed: StatePatch,
) -> Arc<TestContainer> {
    wallet_logger::init_for_testing();
    let store = InMemoryStore::new();
    store.set_state(seed).await;
    let server = server.clone();
    WalletContainer::new(store, FakeCrypto::new(), move |_url| server.clone())
}

/// Wraps an [`InMemoryTransport`], delegating every call unchanged, while
/// recording the `local_hash` argument each `fetch_wallet` call carries.
/// Exists purely to pin down which value the reconciliation engine actually
/// passes at a given call site, since that's otherwise only observable
/// indirectly through the server's resulting response.
#[derive(Clone)]
pub struct RecordingTransport {
    inner: InMemoryTransport,
    fetch_wallet_hashes: Arc<Mutex<Vec<Option<Hash32>>>>,
}

impl RecordingTransport {
    pub fn new(inner: InMemoryTransport) -> Self {
        Self {
            inner,
            fetch_wallet_hashes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn fetch_wallet_hashes(&self) -> Vec<Option<Hash32>> {
        self.fetch_wallet_hashes.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    async fn fetch_wallet(
        &self,
        pub_key: &PublicKey,
        local_hash: Option<Hash32>,
    ) -> Result<Subscription, TransportError> {
        self.fetch_wallet_hashes.lock().unwrap().push(local_hash.clone());
        self.inner.fetch_wallet(pub_key, local_hash).await
    }

    async fn fetch_wallet_unsubscribe(&self, pub_key: &PublicKey) {
        self.inner.fetch_wallet_unsubscribe(pub_key).await
    }

    async fn create_wallet(
        &self,
        token: &str,
        ciphertext: &[u8],
        sig: &Signature,
    ) -> Result<CreateWalletResponse, TransportError> {
        self.inner.create_wallet(token, ciphertext, sig).await
    }

    async fn save_wallet(
        &self,
        prev_hash: Option<Hash32>,
        ciphertext: &[u8],
        sig: &Signature,
    ) -> Result<SaveWalletResponse, TransportError> {
        self.inner.save_wallet(prev_hash, ciphertext, sig).await
    }

    async fn delete_wallet(
        &self,
        hash: Hash32,
        sig: &Signature,
    ) -> Result<(), TransportError> {
        self.inner.delete_wallet(hash, sig).await
    }

    async fn change_password(
        &self,
        old_hash: Hash32,
        old_sig: &Signature,
        new_ciphertext: &[u8],
        new_sig: &Signature,
    ) -> Result<SaveWalletResponse, TransportError> {
        self.inner
            .change_password(old_hash, old_sig, new_ciphertext, new_sig)
            .await
    }

    fn get_subscription_id(&self, pub_key: &PublicKey) -> Option<String> {
        self.inner.get_subscription_id(pub_key)
    }

    async fn close(&self) {
        self.inner.close().await
    }
}

pub type RecordingContainer = WalletContainer<InMemoryStore, FakeCrypto, RecordingTransport>;

/// A fresh container whose transport factory always hands back a
/// [`RecordingTransport`] wrapping a fresh [`InMemoryTransport`], so callers
/// can inspect the `local_hash` arguments `fetch_wallet` was actually called
/// with.
pub fn new_recording_container() -> (Arc<RecordingContainer>, Arc<Mutex<Option<RecordingTransport>>>) {
    wallet_logger::init_for_testing();
    let last_transport = Arc::new(Mutex::new(None));
    let handle = last_transport.clone();
    let container = WalletContainer::new(InMemoryStore::new(), FakeCrypto::new(), move |_url| {
        let transport = RecordingTransport::new(InMemoryTransport::new());
        *handle.lock().unwrap() = Some(transport.clone());
        transport
    });
    (container, last_transport)
}

/// A test subscriber that records the last notification it observed.
#[derive(Default)]
pub struct Capture(Mutex<Option<WalletSnapshot>>);

impl Capture {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn last(&self) -> WalletSnapshot {
        self.0.lock().unwrap().clone().expect("no notification observed yet")
    }
}

impl WalletSubscriber for Capture {
    fn on_notify(
        &self,
        snapshot: &WalletSnapshot,
    ) -> Result<(), SubscriberError> {
        *self.0.lock().unwrap() = Some(snapshot.clone());
        Ok(())
    }
}
