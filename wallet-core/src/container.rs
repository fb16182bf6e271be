//! The Wallet Container: the top-level handle holding the store, the crypto
//! provider, the transport factory, and the runtime session state.
//!
//! Runtime fields are genuinely mutated by async operations that must hold
//! exclusivity across suspension points, so the runtime state lives behind a
//! [`tokio::sync::Mutex`] rather than a `std::sync::Mutex`.

use std::sync::{Arc, Weak};

use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use wallet_contracts::{Crypto, PrivateKey, PublicKey, StateStore, Transport};

use crate::{
    error::WalletError,
    notify::{Dispatcher, WalletSnapshot},
    status::{LocalStatus, RemoteStatus},
};

/// Runtime (non-persisted) session state.
pub(crate) struct RuntimeState {
    pub wallet_object: Value,
    pub private_key: Option<PrivateKey>,
    pub remote_status: Option<RemoteStatus>,
    pub local_status: LocalStatus,
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self {
            wallet_object: Value::Object(Default::default()),
            private_key: None,
            remote_status: None,
            local_status: LocalStatus::Clean,
        }
    }
}

/// An open transport plus the bookkeeping `sync` needs to decide whether to
/// open a fresh subscription or just poll state.
pub(crate) struct TransportHandle<T> {
    pub transport: Arc<T>,
    pub push_task: Option<JoinHandle<()>>,
    /// Set once `sync` has opened a `fetch_wallet` subscription for this
    /// transport, so later calls know whether to open one or just poll state.
    pub subscribed_pub_key: Option<PublicKey>,
}

/// Builds a fresh transport for a given remote URL. `WalletContainer` is
/// generic over a single concrete `T`, so opening a replacement transport at
/// runtime (`use_backup_server`) needs this factory rather than a `new()`
/// bound on `T` itself.
pub type TransportFactory<T> = Box<dyn Fn(&str) -> T + Send + Sync>;

/// Holds the in-memory wallet object, the unlock key, status fields, and the
/// subscriber registry. The reconciliation engine and session manager are
/// implemented as methods on this type in `reconcile.rs`/`session.rs`.
pub struct WalletContainer<S, C, T> {
    pub(crate) store: S,
    pub(crate) crypto: C,
    pub(crate) transport_factory: TransportFactory<T>,
    pub(crate) weak_self: Weak<Self>,
    pub(crate) transport: AsyncMutex<Option<TransportHandle<T>>>,
    pub(crate) state: AsyncMutex<RuntimeState>,
    /// Single-flight guard around `update_wallet` so overlapping callers
    /// can't interleave encrypt/persist phases.
    pub(crate) update_lock: AsyncMutex<()>,
    pub(crate) dispatcher: Dispatcher,
}

impl<S, C, T> WalletContainer<S, C, T>
where
    S: StateStore + Send + Sync + 'static,
    C: Crypto + Send + Sync + 'static,
    T: Transport + Send + Sync + 'static,
{
    pub fn new(
        store: S,
        crypto: C,
        transport_factory: impl Fn(&str) -> T + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            store,
            crypto,
            transport_factory: Box::new(transport_factory),
            weak_self: weak_self.clone(),
            transport: AsyncMutex::new(None),
            state: AsyncMutex::new(RuntimeState::default()),
            update_lock: AsyncMutex::new(()),
            dispatcher: Dispatcher::new(),
        })
    }

    fn upgrade(&self) -> Arc<Self> {
        self.weak_self
            .upgrade()
            .expect("container outlives its own weak handle")
    }

    /// True when no `encrypted_wallet` has ever been persisted.
    pub fn is_empty(&self) -> bool {
        !self.store.has(crate::model::storage_fields::ENCRYPTED_WALLET)
    }

    /// Toggle disk persistence on the external store. Idempotent, no
    /// notification.
    pub fn keep_local_copy(&self, save: bool) {
        self.store.set_save_to_disk(save);
    }

    /// Toggle the intent to keep a server copy. Persists `remote_copy`,
    /// then reconciles immediately if unlocked so
    /// turning it off triggers `delete_remote_wallet` without waiting for
    /// the next caller-driven sync.
    pub async fn keep_remote_copy(&self, keep: bool) -> Result<(), WalletError> {
        if keep
            && self
                .store
                .get(crate::model::storage_fields::REMOTE_URL)
                .is_none()
        {
            return Err(WalletError::ConfigurationError);
        }

        if keep {
            let state = self.state.lock().await;
            if crate::model::weak_password(&state.wallet_object) {
                return Err(WalletError::WeakPassword);
            }
        }

        let prior = self.store.get(crate::model::storage_fields::REMOTE_COPY);
        let prior = prior.as_ref().and_then(serde_json::Value::as_bool).unwrap_or(false);
        if prior != keep {
            self.store
                .set_state(
                    crate::model::PatchBuilder::new()
                        .set(crate::model::storage_fields::REMOTE_COPY, keep)
                        .build(),
                )
                .await;
            self.mark_dirty();
        }

        let private_key = {
            let state = self.state.lock().await;
            state.private_key.clone()
        };
        let Some(private_key) = private_key else {
            return Ok(());
        };

        let result = self.sync(&private_key).await;
        self.dispatch_if_dirty().await;
        result
    }

    /// Close any existing transport, then open a new one for `url` (or
    /// leave the transport closed if `url` is `None`). Writes `remote_url`
    /// and marks dirty iff it differs from what's persisted.
    /// Returns once the old transport's `close` completes.
    pub async fn use_backup_server(
        &self,
        url: Option<&str>,
    ) -> Result<(), WalletError> {
        {
            let mut transport = self.transport.lock().await;
            if let Some(handle) = transport.take() {
                if let Some(pub_key) = handle.subscribed_pub_key {
                    handle.transport.fetch_wallet_unsubscribe(&pub_key).await;
                }
                if let Some(task) = handle.push_task {
                    task.abort();
                }
                handle.transport.close().await;
            }

            *transport = url.map(|u| TransportHandle {
                transport: Arc::new((self.transport_factory)(u)),
                push_task: None,
                subscribed_pub_key: None,
            });
        }

        let prior_url = self.store.get(crate::model::storage_fields::REMOTE_URL);
        let prior_url = prior_url.as_ref().and_then(serde_json::Value::as_str);
        if prior_url != url {
            let patch = match url {
                Some(u) => crate::model::PatchBuilder::new().set(
                    crate::model::storage_fields::REMOTE_URL,
                    u.to_owned(),
                ),
                None => crate::model::PatchBuilder::new()
                    .delete(crate::model::storage_fields::REMOTE_URL),
            };
            self.store.set_state(patch.build()).await;
            self.mark_dirty();
        }

        self.dispatch_if_dirty().await;
        Ok(())
    }

    async fn snapshot(&self) -> WalletSnapshot {
        let state = self.state.lock().await;
        WalletSnapshot {
            wallet_object: state.wallet_object.clone(),
            unlocked: state.private_key.is_some(),
            remote_status: state.remote_status.clone(),
            local_status: state.local_status.clone(),
        }
    }

    /// Dispatch a notification cycle if any operation marked state dirty.
    /// Every public entry point calls this on its way out, success or
    /// failure.
    pub(crate) async fn dispatch_if_dirty(&self) {
        if self.dispatcher.is_dirty() {
            let snapshot = self.snapshot().await;
            self.dispatcher.dispatch(&snapshot);
        }
    }

    pub(crate) fn mark_dirty(&self) {
        self.dispatcher.mark_dirty();
    }

    pub fn subscribe(
        &self,
        subscriber: Arc<dyn crate::notify::WalletSubscriber>,
        completion: Option<
            tokio::sync::oneshot::Sender<
                Result<(), crate::notify::SubscriberError>,
            >,
        >,
    ) -> Result<crate::notify::SubscriberId, crate::notify::SubscribeError>
    {
        self.dispatcher.subscribe(subscriber, completion)
    }

    pub fn unsubscribe(
        &self,
        id: crate::notify::SubscriberId,
    ) -> Result<(), crate::notify::UnsubscribeError> {
        self.dispatcher.unsubscribe(id)
    }

    /// Returns the current wallet tree, triggering reconciliation first.
    /// Fails with [`WalletError::Locked`] if no private key is held.
    pub async fn get_state(&self) -> Result<Value, WalletError> {
        let private_key = {
            let state = self.state.lock().await;
            state.private_key.clone().ok_or(WalletError::Locked)?
        };

        let result = self.sync(&private_key).await;
        self.dispatch_if_dirty().await;
        result?;

        let state = self.state.lock().await;
        Ok(state.wallet_object.clone())
    }

    /// Deep-merge `partial` into the in-memory wallet object, then persist
    /// and reconcile. A structural no-op if the merge doesn't change
    /// anything.
    pub async fn set_state(&self, partial: Value) -> Result<(), WalletError> {
        let private_key = {
            let state = self.state.lock().await;
            state.private_key.clone().ok_or(WalletError::Locked)?
        };
        {
            let state = self.state.lock().await;
            if crate::model::created(&state.wallet_object).is_none() {
                return Err(WalletError::NotInitialized);
            }
        }

        let result = self.apply_state_patch(partial, &private_key).await;
        self.dispatch_if_dirty().await;
        result
    }

    /// Remove the value addressed by `path`, then persist and reconcile.
    /// `deep_merge` alone can't express field deletion, so this is the
    /// explicit complement to `set_state`.
    pub async fn delete_field(
        &self,
        path: &[&str],
    ) -> Result<(), WalletError> {
        let private_key = {
            let state = self.state.lock().await;
            state.private_key.clone().ok_or(WalletError::Locked)?
        };
        {
            let state = self.state.lock().await;
            if crate::model::created(&state.wallet_object).is_none() {
                return Err(WalletError::NotInitialized);
            }
        }

        let result = self.apply_delete_field(path, &private_key).await;
        self.dispatch_if_dirty().await;
        result
    }

    async fn apply_state_patch(
        &self,
        partial: Value,
        private_key: &PrivateKey,
    ) -> Result<(), WalletError> {
        let changed = {
            let mut state = self.state.lock().await;
            let before = state.wallet_object.clone();
            crate::value::deep_merge(&mut state.wallet_object, &partial);
            state.wallet_object != before
        };
        if !changed {
            return Ok(());
        }
        self.touch_and_push(private_key).await
    }

    async fn apply_delete_field(
        &self,
        path: &[&str],
        private_key: &PrivateKey,
    ) -> Result<(), WalletError> {
        {
            let mut state = self.state.lock().await;
            crate::value::delete_path(&mut state.wallet_object, path);
        }
        self.touch_and_push(private_key).await
    }

    async fn touch_and_push(
        &self,
        private_key: &PrivateKey,
    ) -> Result<(), WalletError> {
        let now = crate::time::now_iso8601();
        {
            let mut state = self.state.lock().await;
            crate::model::touch_last_modified(&mut state.wallet_object, &now);
            state.local_status = LocalStatus::Pending;
        }
        self.mark_dirty();
        self.update_wallet(private_key).await
    }

    pub(crate) fn container_arc(&self) -> Arc<Self> {
        self.upgrade()
    }
}
