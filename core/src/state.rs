//! Per-request lifecycle.
//!
//! # Design
//! A `PendingRequest` is created for every call and owned by it. It tracks
//! the request through `Created -> Sent -> Responding -> Completed`, with
//! `Errored` reachable from any non-terminal state, and it is the only place
//! that writes verbose log lines. When `verbose` is false it emits nothing.

use std::fmt;

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::RequestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Created,
    Sent,
    Responding,
    Completed,
    Errored,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestState::Completed | RequestState::Errored)
    }

    /// Whether `self -> next` is a legal lifecycle step.
    pub fn can_advance_to(self, next: RequestState) -> bool {
        use RequestState::*;
        match (self, next) {
            (Created, Sent) | (Sent, Responding) | (Responding, Completed) => true,
            (from, Errored) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestState::Created => "CREATED",
            RequestState::Sent => "SENT",
            RequestState::Responding => "RESPONDING",
            RequestState::Completed => "COMPLETED",
            RequestState::Errored => "ERRORED",
        };
        f.write_str(name)
    }
}

/// One in-flight request.
#[derive(Debug)]
pub struct PendingRequest {
    id: Uuid,
    path: String,
    verbose: bool,
    state: RequestState,
    chunks: usize,
}

impl PendingRequest {
    pub fn new(path: &str, verbose: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.to_string(),
            verbose,
            state: RequestState::Created,
            chunks: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Number of decoded body chunks seen so far.
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    fn advance(&mut self, next: RequestState) -> Result<(), RequestError> {
        if !self.state.can_advance_to(next) {
            return Err(RequestError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        if self.verbose {
            debug!(target: "request_core", id = %self.id, "{} -> {}", self.state, next);
        }
        self.state = next;
        Ok(())
    }

    /// The body (if any) has been handed to the transport and the request
    /// ended.
    pub fn sent(&mut self, body: Option<&str>) -> Result<(), RequestError> {
        if self.verbose {
            info!(target: "request_core", "[SENT]: {}", body.unwrap_or(""));
        }
        self.advance(RequestState::Sent)
    }

    /// Status line and headers have arrived.
    pub fn responding(&mut self, status: StatusCode, headers: &HeaderMap) -> Result<(), RequestError> {
        self.advance(RequestState::Responding)?;
        if self.verbose {
            info!(target: "request_core", "[RECV]: Status <{}>", status.as_u16());
            info!(target: "request_core", "[RECV]: Headers {}", headers_json(headers));
            info!(target: "request_core", "[RECV]: Path {}", self.path);
        }
        Ok(())
    }

    /// A decoded piece of the response body. Empty pieces are not logged.
    pub fn chunk(&mut self, text: &str) -> Result<(), RequestError> {
        if self.state != RequestState::Responding {
            return Err(RequestError::InvalidTransition {
                from: self.state,
                to: RequestState::Responding,
            });
        }
        if text.is_empty() {
            return Ok(());
        }
        self.chunks += 1;
        if self.verbose {
            info!(target: "request_core", "[RECV]: {}", text);
        }
        Ok(())
    }

    pub fn completed(&mut self) -> Result<(), RequestError> {
        self.advance(RequestState::Completed)
    }

    /// Move to `Errored` and hand back the transport error for propagation.
    pub fn errored(&mut self, err: reqwest::Error) -> RequestError {
        if self.verbose {
            info!(target: "request_core", "[ERROR]: {}", err);
        }
        if let Err(invalid) = self.advance(RequestState::Errored) {
            return invalid;
        }
        RequestError::Transport(err)
    }
}

/// Render response headers as a JSON object. Values that are not valid
/// visible ASCII are shown lossily.
pub fn headers_json(headers: &HeaderMap) -> String {
    let map: serde_json::Map<String, serde_json::Value> = headers
        .iter()
        .map(|(k, v)| {
            let value = String::from_utf8_lossy(v.as_bytes()).into_owned();
            (k.as_str().to_string(), serde_json::Value::String(value))
        })
        .collect();
    serde_json::Value::Object(map).to_string()
}
