//! JSON request client.
//!
//! # Design
//! Each operation is split in two: a pure `build_*` function that turns
//! `RequestOptions` and a payload into an `HttpRequest`, and
//! `RequestClient::execute`, which performs the single round-trip. The
//! future returned by `execute` resolves only after the response stream has
//! ended; a transport failure at any point is returned as the error instead.

use serde::Serialize;
use tracing::{info_span, Instrument};

use crate::decode::Utf8ChunkDecoder;
use crate::error::RequestError;
use crate::http::{HttpMethod, HttpRequest, RequestOptions};
use crate::state::PendingRequest;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Build a POST carrying `data` serialized as JSON.
///
/// Fails with `RequestError::Serialization` before anything is sent if the
/// payload cannot be represented as JSON (for example a map with non-string
/// keys).
pub fn build_post<T: Serialize + ?Sized>(options: &RequestOptions, data: &T) -> Result<HttpRequest, RequestError> {
    let body = serde_json::to_string(data)?;
    Ok(build(options, HttpMethod::Post, Some(body)))
}

/// Build a GET. No body is written; `Content-Length` is 0.
pub fn build_get(options: &RequestOptions) -> HttpRequest {
    build(options, HttpMethod::Get, None)
}

fn build(options: &RequestOptions, method: HttpMethod, body: Option<String>) -> HttpRequest {
    let length = body.as_ref().map_or(0, |b| b.len());
    let mut headers = vec![
        ("content-type".to_string(), JSON_CONTENT_TYPE.to_string()),
        ("content-length".to_string(), length.to_string()),
    ];
    // The JSON content headers are fixed; caller copies of them are dropped.
    headers.extend(
        options
            .headers
            .iter()
            .filter(|(k, _)| !is_content_header(k))
            .cloned(),
    );
    HttpRequest {
        method,
        url: options.url(),
        path: options.path.clone(),
        headers,
        body,
    }
}

fn is_content_header(name: &str) -> bool {
    name.eq_ignore_ascii_case("content-length") || name.eq_ignore_ascii_case("content-type")
}

/// Sends one JSON request per call and waits for the full response.
///
/// Idle connections are not kept between calls, and no timeout is applied:
/// a request runs until the server finishes or the connection fails.
#[derive(Debug, Clone)]
pub struct RequestClient {
    http: reqwest::Client,
}

impl RequestClient {
    pub fn new() -> Result<Self, RequestError> {
        let http = reqwest::Client::builder().pool_max_idle_per_host(0).build()?;
        Ok(Self { http })
    }

    /// POST `data` as JSON. Verbose lines are `tracing` events; call
    /// `logging::init` first to see them on stdout.
    pub async fn post<T: Serialize + ?Sized>(
        &self,
        host: &str,
        path: &str,
        port: u16,
        data: &T,
        use_https: bool,
        verbose: bool,
    ) -> Result<(), RequestError> {
        let options = RequestOptions::new(host, port, path, HttpMethod::Post)
            .with_https(use_https)
            .with_verbose(verbose);
        self.send(&options, Some(data)).await
    }

    /// GET with no body. See `post` for where verbose lines go.
    pub async fn get(&self, host: &str, path: &str, port: u16, use_https: bool, verbose: bool) -> Result<(), RequestError> {
        let options = RequestOptions::new(host, port, path, HttpMethod::Get)
            .with_https(use_https)
            .with_verbose(verbose);
        self.send::<()>(&options, None).await
    }

    /// Build and execute a request from `options`. For POST a missing
    /// payload is sent as JSON `null`; for GET `data` is ignored.
    pub async fn send<T: Serialize + ?Sized>(&self, options: &RequestOptions, data: Option<&T>) -> Result<(), RequestError> {
        let request = match options.method {
            HttpMethod::Post => build_post(options, &data)?,
            HttpMethod::Get => build_get(options),
        };
        self.execute(&request, options.verbose).await
    }

    /// Perform the round-trip for an already built request.
    pub async fn execute(&self, request: &HttpRequest, verbose: bool) -> Result<(), RequestError> {
        let mut pending = PendingRequest::new(&request.path, verbose);
        let span = info_span!(
            target: "request_core",
            "request",
            id = %pending.id(),
            method = %request.method,
            path = %request.path
        );
        self.round_trip(request, &mut pending).instrument(span).await
    }

    async fn round_trip(&self, request: &HttpRequest, pending: &mut PendingRequest) -> Result<(), RequestError> {
        let mut builder = self.http.request(request.method.into(), request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        pending.sent(request.body.as_deref())?;
        let mut response = builder.send().await.map_err(|e| pending.errored(e))?;
        pending.responding(response.status(), response.headers())?;

        let mut decoder = Utf8ChunkDecoder::new();
        loop {
            match response.chunk().await {
                Ok(Some(bytes)) => pending.chunk(&decoder.push(&bytes))?,
                Ok(None) => break,
                Err(e) => return Err(pending.errored(e)),
            }
        }
        pending.chunk(&decoder.finish())?;
        pending.completed()
    }
}

/// POST `data` as JSON to `host:port` at `path` with a one-off client.
///
/// With `verbose` set, lifecycle lines are emitted through `tracing`; install
/// a subscriber (for example `logging::init`) to print them.
pub async fn post<T: Serialize + ?Sized>(
    host: &str,
    path: &str,
    port: u16,
    data: &T,
    use_https: bool,
    verbose: bool,
) -> Result<(), RequestError> {
    RequestClient::new()?
        .post(host, path, port, data, use_https, verbose)
        .await
}

/// GET `host:port` at `path` with a one-off client. Verbose output needs a
/// subscriber, as for `post`.
pub async fn get(host: &str, path: &str, port: u16, use_https: bool, verbose: bool) -> Result<(), RequestError> {
    RequestClient::new()?.get(host, path, port, use_https, verbose).await
}
