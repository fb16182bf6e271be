//! The Notification Dispatcher.
//!
//! A generic `WalletContainer<S, C, T>` can't cheaply hand out a reference to
//! itself through a trait object without infecting every callback site with
//! its three type parameters, so subscribers instead get a flattened
//! [`WalletSnapshot`] of the observable state.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::warn;

use crate::status::{LocalStatus, RemoteStatus};

/// The observable state of a [`WalletContainer`] at the moment of dispatch.
///
/// [`WalletContainer`]: crate::container::WalletContainer
#[derive(Clone, Debug)]
pub struct WalletSnapshot {
    pub wallet_object: Value,
    pub unlocked: bool,
    pub remote_status: Option<RemoteStatus>,
    pub local_status: LocalStatus,
}

#[derive(Debug, Error)]
#[error("subscriber callback failed: {0}")]
pub struct SubscriberError(pub String);

/// A subscriber to wallet-state-changed notifications.
pub trait WalletSubscriber: Send + Sync {
    fn on_notify(
        &self,
        snapshot: &WalletSnapshot,
    ) -> Result<(), SubscriberError>;
}

type Completion = oneshot::Sender<Result<(), SubscriberError>>;

struct Entry {
    id: u64,
    subscriber: Arc<dyn WalletSubscriber>,
    /// Consumed on the first dispatch after registration, if a caller
    /// supplied an optional one-shot completion handle at subscribe time.
    completion: Mutex<Option<Completion>>,
}

/// Subscriber registry + dirty flag. Owned by [`WalletContainer`].
///
/// [`WalletContainer`]: crate::container::WalletContainer
#[derive(Default)]
pub struct Dispatcher {
    next_id: Mutex<u64>,
    entries: Mutex<Vec<Entry>>,
    notify: Mutex<bool>,
}

/// Raised on a double-subscribe. Non-fatal: callers may choose to ignore it.
#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("callback is already subscribed")]
    AlreadySubscribed,
}

#[derive(Debug, Error)]
pub enum UnsubscribeError {
    #[error("callback is not subscribed")]
    NotSubscribed,
}

/// An opaque handle identifying a registered subscriber, returned by
/// `subscribe` and passed back to `unsubscribe`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark observable state as dirty. The next dispatch will fan out.
    pub fn mark_dirty(&self) {
        *self.notify.lock().unwrap() = true;
    }

    pub fn is_dirty(&self) -> bool {
        *self.notify.lock().unwrap()
    }

    pub fn subscribe(
        &self,
        subscriber: Arc<dyn WalletSubscriber>,
        completion: Option<Completion>,
    ) -> Result<SubscriberId, SubscribeError> {
        let mut entries = self.entries.lock().unwrap();
        if entries
            .iter()
            .any(|e| Arc::ptr_eq(&e.subscriber, &subscriber))
        {
            return Err(SubscribeError::AlreadySubscribed);
        }
        let mut next_id = self.next_id.lock().unwrap();
        let id = *next_id;
        *next_id += 1;
        entries.push(Entry {
            id,
            subscriber,
            completion: Mutex::new(completion),
        });
        Ok(SubscriberId(id))
    }

    pub fn unsubscribe(
        &self,
        id: SubscriberId,
    ) -> Result<(), UnsubscribeError> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|e| e.id != id.0);
        if entries.len() == before {
            return Err(UnsubscribeError::NotSubscribed);
        }
        Ok(())
    }

    /// If dirty, clear the flag and fan out `snapshot` to every subscriber
    /// registered *before* this call. Subscribers added by a callback during
    /// dispatch are deferred to the next cycle, since we snapshot the
    /// registry up front.
    pub fn dispatch(&self, snapshot: &WalletSnapshot) {
        let mut notify = self.notify.lock().unwrap();
        if !*notify {
            return;
        }
        *notify = false;
        drop(notify);

        let ids: Vec<u64> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.id)
            .collect();

        for id in ids {
            let (subscriber, completion) = {
                let entries = self.entries.lock().unwrap();
                match entries.iter().find(|e| e.id == id) {
                    Some(entry) => (
                        entry.subscriber.clone(),
                        entry.completion.lock().unwrap().take(),
                    ),
                    None => continue, // unsubscribed mid-dispatch
                }
            };

            let result = subscriber.on_notify(snapshot);

            match completion {
                Some(tx) => {
                    let _ = tx.send(result);
                }
                None =>
                    if let Err(err) = result {
                        warn!("wallet subscriber callback failed: {err}");
                    },
            }
        }
    }
}
