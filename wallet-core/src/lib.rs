//! The encrypted wallet storage engine: the reconciliation state machine,
//! the session manager, and the notification dispatcher.
//!
//! This crate is implemented entirely against the external contracts defined
//! in `wallet-contracts`. It never touches real cryptography, real
//! persistence, or a real network socket — those are supplied by the three
//! generic parameters on [`WalletContainer`].

mod container;
mod error;
mod hasher;
mod model;
mod notify;
mod reconcile;
mod session;
mod status;
mod time;
mod value;

pub use container::{TransportFactory, WalletContainer};
pub use error::{CredentialField, WalletError};
pub use model::{storage_fields, wallet_fields, PatchBuilder};
pub use notify::{
    SubscribeError, SubscriberError, SubscriberId, UnsubscribeError,
    WalletSnapshot, WalletSubscriber,
};
pub use status::{LocalStatus, RemoteStatus};
pub use value::{deep_merge, delete_path};
