//! JSON request helper for talking to a server under test.
//!
//! # Overview
//! Sends one HTTP or HTTPS request with a JSON body (POST) or no body (GET)
//! and resolves once the whole response has arrived. Nothing about the
//! response is returned: a test awaits completion and moves on.
//!
//! # Design
//! - `build_post` / `build_get` produce an `HttpRequest` as plain data, so
//!   the wire contract is checked without a network.
//! - `RequestClient::execute` drives one `PendingRequest` through its
//!   lifecycle and returns only after end-of-stream.
//! - Verbose diagnostics go through `tracing` under the `request_core`
//!   target; `logging::init` prints them to stdout.

pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod http;
pub mod logging;
pub mod state;

pub use client::{build_get, build_post, get, post, RequestClient};
pub use config::{Target, TargetConfig};
pub use error::{ConfigError, RequestError};
pub use http::{HttpMethod, HttpRequest, RequestOptions};
pub use state::{PendingRequest, RequestState};
