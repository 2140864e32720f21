//! Error types for the client library.
//!
//! [`ApiError`] covers everything that can go wrong on a backend call,
//! [`StateError`] rejects events that are invalid in the current state of an
//! interaction machine, and [`SessionError`] reports token-store failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The backend rejected the bearer credential (HTTP 401).
    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// Any other non-2xx response.
    #[error("server error {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response (connection refused, timeout, ...).
    #[error("network error: {0}")]
    Transport(String),

    /// A 2xx response whose body could not be decoded.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// A local file could not be read for upload.
    #[error("cannot read file: {0}")]
    Io(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    /// Human-readable text suitable for an error bubble or banner.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Unauthorized(_) => "Your session has expired. Please sign in again.".into(),
            ApiError::Status { message, .. } if !message.is_empty() => message.clone(),
            ApiError::Status { status, .. } => format!("The server returned an error ({status})."),
            ApiError::Transport(_) => {
                "Could not reach the server. Check your connection and try again.".into()
            }
            ApiError::Decode(_) => "The server sent a response that could not be read.".into(),
            ApiError::Io(msg) => msg.clone(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("a request is already in progress")]
    Busy,

    #[error("not signed in; run `dq login` first")]
    NotAuthenticated,

    #[error("no document is selected for deletion")]
    NoDeleteTarget,

    #[error("nothing is awaiting confirmation")]
    NothingToConfirm,

    #[error("there is no example question #{0}")]
    UnknownExample(usize),

    #[error("new chat is only available in the chat transcript")]
    NotChat,

    #[error("{event} is not valid while {state}")]
    Unexpected {
        state: &'static str,
        event: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session store {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("session store {} is not valid JSON: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("session store lock poisoned")]
    Poisoned,
}
