//! Request options and the plain-data request they turn into.
//!
//! # Design
//! `RequestOptions` is what a caller describes: where to send, which method,
//! extra headers and whether to log. `HttpRequest` is what actually goes on
//! the wire, built by `client::build_post` / `client::build_get` before any
//! I/O happens. Keeping the two apart lets tests check the wire contract
//! (body bytes, `Content-Length`) without a server.

use std::fmt;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        }
    }
}

/// Everything needed to address one request. Immutable once handed to the
/// client.
///
/// `host`, `port` and `path` are passed through untouched; the transport
/// decides what a malformed value means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub method: HttpMethod,
    pub headers: Vec<(String, String)>,
    pub use_https: bool,
    pub verbose: bool,
}

impl RequestOptions {
    pub fn new(host: &str, port: u16, path: &str, method: HttpMethod) -> Self {
        Self {
            host: host.to_string(),
            port,
            path: path.to_string(),
            method,
            headers: Vec::new(),
            use_https: false,
            verbose: false,
        }
    }

    pub fn with_https(mut self, use_https: bool) -> Self {
        self.use_https = use_https;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Add a header sent in addition to the JSON content headers.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn scheme(&self) -> &'static str {
        if self.use_https {
            "https"
        } else {
            "http"
        }
    }

    pub fn url(&self) -> String {
        format!("{}://{}:{}{}", self.scheme(), self.host, self.port, self.path)
    }
}

/// A request described as plain data, ready for `RequestClient::execute`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    /// The path as given by the caller, kept for log lines.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Look up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Number of body bytes that will be written. Zero when there is no body.
    pub fn content_length(&self) -> usize {
        self.body.as_ref().map_or(0, |b| b.len())
    }
}
