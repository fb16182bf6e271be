//! The error taxonomy. One stable identifier per kind, propagated as a
//! single `thiserror` enum.

use thiserror::Error;

/// Required credential field that the caller left empty.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CredentialField {
    Email,
    Username,
    Password,
}

impl std::fmt::Display for CredentialField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Email => "email",
            Self::Username => "username",
            Self::Password => "password",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("missing required field: {0}")]
    MissingField(CredentialField),

    #[error("operation requires an unlocked wallet")]
    Locked,

    #[error("decryption failed: wrong password")]
    InvalidPassword,

    #[error(
        "empty email or username combined with remote backup is not allowed"
    )]
    WeakPassword,

    #[error("chain id mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: String, actual: String },

    #[error("change_password requires a persisted wallet")]
    WalletEmpty,

    #[error(
        "change_password refused: local copy is not synced with the server"
    )]
    WalletModified,

    #[error("set_state called before login")]
    NotInitialized,

    #[error("remote_copy is set without a remote_url")]
    ConfigurationError,

    #[error("reconciliation detected a conflicting concurrent edit")]
    Conflict,

    #[error("server rejected the request: {status_text}")]
    TransportError {
        status_text: String,
        payload: Option<String>,
    },
}
