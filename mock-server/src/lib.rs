use std::{collections::BTreeMap, convert::Infallible, io, sync::Arc, time::Duration};

use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const DEFAULT_CHUNKS: usize = 3;
const CHUNK_DELAY: Duration = Duration::from_millis(10);

/// A request as the server saw it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordedRequest {
    pub id: Uuid,
    pub method: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

#[derive(Deserialize)]
pub struct StreamParams {
    pub chunks: Option<usize>,
}

pub type Journal = Arc<RwLock<Vec<RecordedRequest>>>;

pub fn app() -> Router {
    app_with_journal(Journal::default())
}

/// Build the router around an existing journal so callers can inspect it
/// directly.
pub fn app_with_journal(journal: Journal) -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/ping", get(ping))
        .route("/stream", get(chunked))
        .route("/broken", any(broken))
        .route("/requests", get(list_requests).delete(clear_requests))
        .with_state(journal)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn record(journal: &Journal, method: &Method, uri: &Uri, headers: &HeaderMap, body: &[u8]) {
    let entry = RecordedRequest {
        id: Uuid::new_v4(),
        method: method.as_str().to_string(),
        path: uri.path_and_query().map_or(uri.path(), |pq| pq.as_str()).to_string(),
        headers: headers
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect(),
        body: String::from_utf8_lossy(body).into_owned(),
    };
    tracing::info!(id = %entry.id, method = %entry.method, path = %entry.path, "recorded request");
    journal.write().await.push(entry);
}

async fn echo(State(journal): State<Journal>, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    record(&journal, &method, &uri, &headers, &body).await;
    (
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CONNECTION, "close"),
        ],
        body,
    )
        .into_response()
}

async fn ping(
    State(journal): State<Journal>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Json<serde_json::Value> {
    record(&journal, &method, &uri, &headers, &body).await;
    Json(serde_json::json!({ "pong": true }))
}

async fn chunked(
    State(journal): State<Journal>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(params): Query<StreamParams>,
) -> Response {
    record(&journal, &method, &uri, &headers, &[]).await;
    let count = params.chunks.unwrap_or(DEFAULT_CHUNKS);
    let body = stream::iter(0..count).then(|i| async move {
        tokio::time::sleep(CHUNK_DELAY).await;
        Ok::<_, Infallible>(Bytes::from(format!("chunk-{i}\n")))
    });
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], Body::from_stream(body)).into_response()
}

/// Starts a chunked body and then fails it, which aborts the connection
/// mid-response.
async fn broken(State(journal): State<Journal>, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    record(&journal, &method, &uri, &headers, &body).await;
    let body = stream::iter(vec![
        Ok(Bytes::from_static(b"partial")),
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "simulated reset")),
    ]);
    ([(header::CONTENT_TYPE, "application/json")], Body::from_stream(body)).into_response()
}

async fn list_requests(State(journal): State<Journal>) -> Json<Vec<RecordedRequest>> {
    Json(journal.read().await.clone())
}

async fn clear_requests(State(journal): State<Journal>) -> StatusCode {
    journal.write().await.clear();
    StatusCode::NO_CONTENT
}
