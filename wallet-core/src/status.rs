//! Runtime status fields tracked alongside the wallet object.

use std::fmt;

/// The container's view of the remote copy's state.
///
/// `None` at the call site means "absent" (no opinion yet, e.g. before the
/// first sync). [`Other`](RemoteStatus::Other) covers any server status text
/// outside the four named ones, e.g. a bespoke `TransportError` payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteStatus {
    Ok,
    NoContent,
    NotModified,
    Conflict,
    Other(String),
}

impl RemoteStatus {
    pub fn from_status_text(status_text: &str) -> Self {
        match status_text {
            "OK" => Self::Ok,
            "No Content" => Self::NoContent,
            "Not Modified" => Self::NotModified,
            "Conflict" => Self::Conflict,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Ok => "OK",
            Self::NoContent => "No Content",
            Self::NotModified => "Not Modified",
            Self::Conflict => "Conflict",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The container's view of the in-flight local mutation, if any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LocalStatus {
    Clean,
    Pending,
    Error(String),
}

impl LocalStatus {
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }
}
