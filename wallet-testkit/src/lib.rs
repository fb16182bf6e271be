//! In-memory fake implementations of the wallet engine's three external
//! contracts, for exercising the reconciliation state machine in tests
//! without a real key/value store, EC library, or network socket.

pub mod crypto;
pub mod store;
pub mod transport;

pub use crypto::FakeCrypto;
pub use store::InMemoryStore;
pub use transport::InMemoryTransport;
