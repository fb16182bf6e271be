//! The Reconciliation Engine: `sync`, the fetch handler, `update_wallet`,
//! `delete_remote_wallet`.

use tokio::sync::mpsc;
use wallet_contracts::{
    transport::{ServerWalletRecord, TransportError as ContractTransportError},
    Crypto, Hash32, PrivateKey, PublicKey, StateStore, Transport,
};

use crate::{
    container::WalletContainer,
    error::WalletError,
    hasher,
    model::{self, storage_fields, PatchBuilder, StorageView},
    status::{LocalStatus, RemoteStatus},
};

/// What to do once the three hashes and `remote_copy` are known.
enum Action {
    Done,
    Push,
    Pull,
    DeleteRemote,
    Conflict,
}

impl<S, C, T> WalletContainer<S, C, T>
where
    S: StateStore + Send + Sync + 'static,
    C: Crypto + Send + Sync + 'static,
    T: Transport + Send + Sync + 'static,
{
    /// Reconcile with the remote. No-op if no transport is configured.
    pub(crate) async fn sync(
        &self,
        key: &PrivateKey,
    ) -> Result<(), WalletError> {
        let pub_key = self.crypto.public_key(key);

        let (transport_arc, already_subscribed) = {
            let transport = self.transport.lock().await;
            match transport.as_ref() {
                Some(handle) => (
                    Some(handle.transport.clone()),
                    handle.subscribed_pub_key == Some(pub_key),
                ),
                None => (None, false),
            }
        };
        let Some(transport_arc) = transport_arc else {
            return Ok(());
        };

        if !already_subscribed {
            let local_hash = hasher::local_hash(
                &self.crypto,
                StorageView(&self.store).encrypted_wallet().as_deref(),
            );

            let subscription = transport_arc
                .fetch_wallet(&pub_key, local_hash)
                .await
                .map_err(map_transport_error)?;

            {
                let mut transport = self.transport.lock().await;
                if let Some(handle) = transport.as_mut() {
                    handle.subscribed_pub_key = Some(pub_key);
                    if let Some(old_task) = handle.push_task.take() {
                        old_task.abort();
                    }
                    handle.push_task = Some(
                        self.spawn_push_drain(subscription.pushes, pub_key),
                    );
                }
            }

            return self.fetch_handler(subscription.initial, key).await;
        }

        // Active subscription exists: the remote-status/remote_copy
        // combination fully determines what to do next.
        let remote_status = {
            let state = self.state.lock().await;
            state.remote_status.clone()
        };
        match remote_status {
            Some(RemoteStatus::NotModified)
                if !StorageView(&self.store).remote_copy() =>
                self.delete_remote_wallet(key, None).await,
            Some(RemoteStatus::NotModified) | Some(RemoteStatus::NoContent) =>
                self.update_wallet(key).await,
            _ => Ok(()),
        }
    }

    /// Background task draining server-pushed wallet updates into the fetch
    /// handler.
    fn spawn_push_drain(
        &self,
        mut pushes: mpsc::Receiver<ServerWalletRecord>,
        pub_key: PublicKey,
    ) -> tokio::task::JoinHandle<()> {
        let container = self.container_arc();
        tokio::spawn(async move {
            while let Some(record) = pushes.recv().await {
                let key = {
                    let state = container.state.lock().await;
                    state.private_key.clone()
                };
                let Some(key) = key else { break };
                let still_subscribed = {
                    let transport = container.transport.lock().await;
                    transport
                        .as_ref()
                        .is_some_and(|h| h.subscribed_pub_key == Some(pub_key))
                };
                if !still_subscribed {
                    break;
                }
                let _ = container.fetch_handler(record, &key).await;
                container.dispatch_if_dirty().await;
            }
        })
    }

    /// Fold a server record (initial response or later push) into
    /// reconciliation state.
    async fn fetch_handler(
        &self,
        server_wallet: ServerWalletRecord,
        key: &PrivateKey,
    ) -> Result<(), WalletError> {
        let storage = StorageView(&self.store);
        let has_local = storage.encrypted_wallet().is_some();
        let local_hash = hasher::local_hash(
            &self.crypto,
            storage.encrypted_wallet().as_deref(),
        );
        let old_hash = storage.remote_hash();
        let new_hash = server_wallet.local_hash;
        let has_remote = new_hash.is_some();
        let remote_copy = storage.remote_copy();

        // Persist remote_hash up front: it reflects server truth regardless
        // of what the decision table below ends up doing.
        let hash_patch = match new_hash {
            Some(h) => PatchBuilder::new().set(storage_fields::REMOTE_HASH, h.to_string()),
            None => PatchBuilder::new().delete(storage_fields::REMOTE_HASH),
        };
        self.store.set_state(hash_patch.build()).await;

        let status_text = server_wallet.status_text.unwrap_or_else(|| {
            if !has_remote {
                "No Content".to_owned()
            } else if local_hash == new_hash {
                "Not Modified".to_owned()
            } else {
                "OK".to_owned()
            }
        });
        debug_assert!(matches!(
            status_text.as_str(),
            "OK" | "No Content" | "Not Modified"
        ));

        self.set_remote_status(RemoteStatus::from_status_text(&status_text))
            .await;

        let local_mod = local_hash != old_hash;
        let server_mod = old_hash != new_hash;

        let action = match (has_remote, remote_copy, has_local) {
            (true, false, _) => Action::DeleteRemote,
            (false, _, false) => Action::Done,
            (false, _, true) => Action::Push,
            (true, true, false) => Action::Pull,
            (true, true, true) => match (local_mod, server_mod) {
                (false, false) => Action::Done,
                (true, true) => Action::Conflict,
                (true, false) => Action::Push,
                (false, true) => Action::Pull,
            },
        };

        match action {
            Action::Done => Ok(()),
            Action::DeleteRemote =>
                self.delete_remote_wallet(key, new_hash).await,
            Action::Push => {
                let result = self.update_wallet(key).await;
                if result.is_ok() {
                    self.set_remote_status(RemoteStatus::NotModified).await;
                }
                result
            }
            Action::Pull => {
                let result = self.pull_from_server(&server_wallet, key).await;
                if result.is_ok() {
                    self.set_remote_status(RemoteStatus::NotModified).await;
                }
                result
            }
            Action::Conflict => {
                self.set_remote_status(RemoteStatus::Conflict).await;
                Err(WalletError::Conflict)
            }
        }
    }

    async fn pull_from_server(
        &self,
        server_wallet: &ServerWalletRecord,
        key: &PrivateKey,
    ) -> Result<(), WalletError> {
        let Some(ciphertext) = server_wallet.encrypted_data.as_deref() else {
            return Ok(());
        };
        let decrypted = self
            .crypto
            .decrypt(ciphertext, key)
            .await
            .map_err(|_| WalletError::InvalidPassword)?;

        self.store
            .set_state(
                PatchBuilder::new()
                    .set(
                        storage_fields::ENCRYPTED_WALLET,
                        model::encode_ciphertext(ciphertext),
                    )
                    .build(),
            )
            .await;

        {
            let mut state = self.state.lock().await;
            state.wallet_object = decrypted;
            state.local_status = LocalStatus::Clean;
        }
        self.mark_dirty();
        Ok(())
    }

    /// Re-encrypt and persist the in-memory tree, then push to the server if
    /// configured. Single-flighted so overlapping callers don't interleave
    /// encrypt/persist phases.
    pub(crate) async fn update_wallet(
        &self,
        key: &PrivateKey,
    ) -> Result<(), WalletError> {
        let _guard = self.update_lock.lock().await;

        let plaintext = {
            let state = self.state.lock().await;
            state.wallet_object.clone()
        };
        let public_key = self.crypto.public_key(key);
        let ciphertext = self.crypto.encrypt(&plaintext, &public_key).await;

        self.store
            .set_state(
                PatchBuilder::new()
                    .set(
                        storage_fields::ENCRYPTED_WALLET,
                        model::encode_ciphertext(&ciphertext),
                    )
                    .build(),
            )
            .await;
        {
            let mut state = self.state.lock().await;
            state.local_status = LocalStatus::Clean;
        }
        self.mark_dirty();

        let transport_arc = {
            let transport = self.transport.lock().await;
            transport.as_ref().map(|h| h.transport.clone())
        };
        let Some(transport_arc) = transport_arc else {
            return Ok(());
        };

        let storage = StorageView(&self.store);
        if !storage.remote_copy() {
            return Ok(());
        }

        let remote_status = {
            let state = self.state.lock().await;
            state.remote_status.clone()
        };
        let remote_token = storage.remote_token();
        if remote_token.is_none()
            && remote_status == Some(RemoteStatus::NoContent)
        {
            return Ok(());
        }

        let hash = self.crypto.sha256(&ciphertext);
        let sig = self.crypto.sign(hash.as_bytes(), key);
        let remote_hash = storage.remote_hash();

        if remote_token.is_some()
            && remote_hash.is_none()
            && remote_status == Some(RemoteStatus::NoContent)
        {
            let response = transport_arc
                .create_wallet(
                    remote_token.as_deref().unwrap_or_default(),
                    &ciphertext,
                    &sig,
                )
                .await
                .map_err(map_transport_error)?;
            self.store
                .set_state(
                    PatchBuilder::new()
                        .set(
                            storage_fields::REMOTE_HASH,
                            response.local_hash.to_string(),
                        )
                        .set(
                            storage_fields::REMOTE_CREATED_DATE,
                            response.created.clone(),
                        )
                        .set(
                            storage_fields::REMOTE_UPDATED_DATE,
                            response.created,
                        )
                        .delete(storage_fields::REMOTE_TOKEN)
                        .build(),
                )
                .await;
            self.set_remote_status(RemoteStatus::NotModified).await;
            Ok(())
        } else if remote_hash.is_some()
            && matches!(
                remote_status,
                Some(RemoteStatus::Ok) | Some(RemoteStatus::NotModified)
            )
        {
            let response = transport_arc
                .save_wallet(remote_hash, &ciphertext, &sig)
                .await
                .map_err(map_transport_error)?;
            if response.status_text == "OK" {
                let mut patch = PatchBuilder::new().set(
                    storage_fields::REMOTE_HASH,
                    response.local_hash.unwrap_or(hash).to_string(),
                );
                if let Some(updated) = response.updated {
                    patch =
                        patch.set(storage_fields::REMOTE_UPDATED_DATE, updated);
                }
                self.store.set_state(patch.build()).await;
                self.set_remote_status(RemoteStatus::NotModified).await;
                Ok(())
            } else {
                self.set_remote_status(RemoteStatus::from_status_text(
                    &response.status_text,
                ))
                .await;
                Err(WalletError::TransportError {
                    status_text: response.status_text,
                    payload: None,
                })
            }
        } else {
            Ok(())
        }
    }

    /// Delete the remote wallet, then clear the local remote bookkeeping
    /// fields. Retains the local `encrypted_wallet`.
    pub(crate) async fn delete_remote_wallet(
        &self,
        key: &PrivateKey,
        hash: Option<Hash32>,
    ) -> Result<(), WalletError> {
        let transport_arc = {
            let transport = self.transport.lock().await;
            transport.as_ref().map(|h| h.transport.clone())
        };
        let Some(transport_arc) = transport_arc else {
            return Ok(());
        };

        let hash = match hash {
            Some(h) => h,
            None => {
                let storage = StorageView(&self.store);
                match hasher::local_hash(
                    &self.crypto,
                    storage.encrypted_wallet().as_deref(),
                ) {
                    Some(h) => h,
                    None => return Ok(()),
                }
            }
        };

        let sig = self.crypto.sign(hash.as_bytes(), key);
        transport_arc
            .delete_wallet(hash, &sig)
            .await
            .map_err(map_transport_error)?;

        self.store
            .set_state(
                PatchBuilder::new()
                    .delete(storage_fields::REMOTE_HASH)
                    .delete(storage_fields::REMOTE_CREATED_DATE)
                    .delete(storage_fields::REMOTE_UPDATED_DATE)
                    .build(),
            )
            .await;
        self.mark_dirty();
        Ok(())
    }

    async fn set_remote_status(&self, status: RemoteStatus) {
        let changed = {
            let mut state = self.state.lock().await;
            let changed = state.remote_status.as_ref() != Some(&status);
            if changed {
                state.remote_status = Some(status);
            }
            changed
        };
        if changed {
            self.mark_dirty();
        }
    }
}

fn map_transport_error(err: ContractTransportError) -> WalletError {
    match err {
        ContractTransportError::Rejected { status_text, payload } =>
            WalletError::TransportError { status_text, payload },
        ContractTransportError::Rpc(msg) =>
            WalletError::TransportError { status_text: msg, payload: None },
        ContractTransportError::NotSubscribed => WalletError::TransportError {
            status_text: "not subscribed".to_owned(),
            payload: None,
        },
    }
}
