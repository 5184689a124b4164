//! Error types for the request client.
//!
//! # Design
//! Serialization failures are kept apart from transport failures because the
//! former happen before any byte reaches the network. HTTP status codes are
//! never errors here: a 500 from the server under test still completes the
//! request.

use thiserror::Error;

use crate::state::RequestState;

/// Errors returned by `RequestClient` operations.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The payload could not be serialized to JSON. Nothing was sent.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The request could not be sent, or the response stream failed.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A lifecycle event arrived in a state that does not accept it.
    #[error("invalid request transition {from} -> {to}")]
    InvalidTransition { from: RequestState, to: RequestState },
}

/// Errors reading a `TargetConfig` from the environment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid port {value:?}")]
    InvalidPort { value: String },

    #[error("invalid boolean for {key}: {value:?}")]
    InvalidBool { key: String, value: String },
}
