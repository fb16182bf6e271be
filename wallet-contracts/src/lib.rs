//! External-interface traits and wire types for the wallet storage engine.
//!
//! This crate describes the boundary only: the persisted key/value [`store`],
//! the key-derivation/encryption [`crypto`], and the remote RPC [`transport`].
//! None of it implements the reconciliation state machine — that's
//! `wallet-core`.

#![allow(async_fn_in_trait)]

pub mod crypto;
pub mod hash;
pub mod keys;
pub mod store;
pub mod transport;

pub use crypto::Crypto;
pub use hash::Hash32;
pub use keys::{PrivateKey, PublicKey, Signature};
pub use store::StateStore;
pub use transport::Transport;
