//! Request lifecycle tests against the live mock server.
//!
//! # Design
//! Each test starts its own mock server on a random port in a separate
//! thread with its own runtime, so the server's log output never reaches the
//! subscriber a test installs on its own thread. The server's request
//! journal is read back with ureq to check what actually went over the wire.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mock_server::RecordedRequest;
use request_core::{
    build_post, HttpMethod, RequestClient, RequestError, RequestOptions, Target, TargetConfig,
};
use tracing::Level;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;

const HOST: &str = "127.0.0.1";

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

/// Fetch what the server has recorded so far.
fn recorded(addr: SocketAddr) -> Vec<RecordedRequest> {
    let mut response = ureq::get(&format!("http://{addr}/requests"))
        .call()
        .expect("journal request failed");
    let body = response.body_mut().read_to_string().unwrap();
    serde_json::from_str(&body).unwrap()
}

/// Collects formatted `request_core` log lines written on the current thread.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(move || writer.clone()),
            )
            .with(Targets::new().with_target("request_core", Level::TRACE));
        tracing::subscriber::set_default(subscriber)
    }

    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

#[tokio::test]
async fn post_to_echo_resolves() {
    let addr = start_server();

    request_core::post("localhost", "/echo", addr.port(), &serde_json::json!({"a": 1}), false, false)
        .await
        .unwrap();

    assert_eq!(recorded(addr).len(), 1);
}

#[tokio::test]
async fn post_sends_json_body_with_exact_length() {
    let addr = start_server();
    let payload = serde_json::json!({"name": "café", "tags": ["🦀", "x"], "n": null});
    let expected = serde_json::to_string(&payload).unwrap();

    RequestClient::new()
        .unwrap()
        .post(HOST, "/echo", addr.port(), &payload, false, false)
        .await
        .unwrap();

    let journal = recorded(addr);
    assert_eq!(journal.len(), 1);
    let req = &journal[0];
    assert_eq!(req.method, "POST");
    assert_eq!(req.path, "/echo");
    assert_eq!(req.body, expected);
    assert_eq!(req.header("content-type"), Some("application/json"));
    assert_eq!(req.header("content-length"), Some(expected.len().to_string().as_str()));
    assert!(expected.len() > expected.chars().count());
}

#[tokio::test]
async fn get_resolves_without_body() {
    let addr = start_server();

    request_core::get(HOST, "/ping", addr.port(), false, false)
        .await
        .unwrap();

    let journal = recorded(addr);
    assert_eq!(journal.len(), 1);
    assert_eq!(journal[0].method, "GET");
    assert_eq!(journal[0].path, "/ping");
    assert_eq!(journal[0].body, "");
    assert_eq!(journal[0].header("content-length"), Some("0"));
    assert_eq!(journal[0].header("content-type"), Some("application/json"));
}

#[tokio::test]
async fn resolves_only_after_whole_response() {
    let addr = start_server();
    let started = Instant::now();

    // Five chunks, 10ms apart.
    request_core::get(HOST, "/stream?chunks=5", addr.port(), false, false)
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_millis(40));
}

#[tokio::test]
async fn error_status_still_completes() {
    let addr = start_server();

    request_core::get(HOST, "/missing", addr.port(), false, false)
        .await
        .unwrap();
}

#[tokio::test]
async fn broken_response_stream_is_an_error() {
    let addr = start_server();

    let err = request_core::post(HOST, "/broken", addr.port(), &1, false, false)
        .await
        .unwrap_err();

    assert!(matches!(err, RequestError::Transport(_)), "got {err:?}");
}

#[tokio::test]
async fn refused_connection_is_an_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let err = request_core::post(HOST, "/echo", port, &1, false, false)
        .await
        .unwrap_err();

    assert!(matches!(err, RequestError::Transport(_)), "got {err:?}");
}

#[tokio::test]
async fn serialization_error_sends_nothing() {
    let addr = start_server();
    let mut bad = HashMap::new();
    bad.insert((1, 2), 3);

    let err = request_core::post(HOST, "/echo", addr.port(), &bad, false, false)
        .await
        .unwrap_err();

    assert!(matches!(err, RequestError::Serialization(_)));
    assert!(recorded(addr).is_empty());
}

#[tokio::test]
async fn quiet_requests_log_nothing() {
    let addr = start_server();
    let logs = CapturedLogs::default();
    let _guard = logs.install();

    request_core::post(HOST, "/echo", addr.port(), &serde_json::json!({"a": 1}), false, false)
        .await
        .unwrap();
    request_core::get(HOST, "/stream", addr.port(), false, false)
        .await
        .unwrap();

    assert_eq!(logs.contents(), "");
}

#[tokio::test]
async fn verbose_post_logs_each_lifecycle_event() {
    let addr = start_server();
    let logs = CapturedLogs::default();
    let _guard = logs.install();

    request_core::post(HOST, "/echo", addr.port(), &serde_json::json!({"a": 1}), false, true)
        .await
        .unwrap();

    let out = logs.contents();
    assert!(out.contains(r#"[SENT]: {"a":1}"#), "{out}");
    assert!(out.contains("[RECV]: Status <200>"), "{out}");
    assert!(out.contains("[RECV]: Headers {"), "{out}");
    assert!(out.contains(r#""content-type":"application/json""#), "{out}");
    assert!(out.contains("[RECV]: Path /echo"), "{out}");
    assert!(out.contains(r#"[RECV]: {"a":1}"#), "{out}");
    assert!(out.contains("SENT -> RESPONDING"), "{out}");
    assert!(out.contains("RESPONDING -> COMPLETED"), "{out}");
}

#[tokio::test]
async fn verbose_get_logs_every_chunk() {
    let addr = start_server();
    let logs = CapturedLogs::default();
    let _guard = logs.install();

    request_core::get(HOST, "/stream?chunks=3", addr.port(), false, true)
        .await
        .unwrap();

    let out = logs.contents();
    assert!(out.contains("[SENT]"), "{out}");
    assert!(out.contains("[RECV]: Path /stream?chunks=3"), "{out}");
    for i in 0..3 {
        assert!(out.contains(&format!("chunk-{i}")), "missing chunk-{i} in {out}");
    }
}

#[tokio::test]
async fn verbose_failure_is_logged_before_returning() {
    let addr = start_server();
    let logs = CapturedLogs::default();
    let _guard = logs.install();

    let result = request_core::post(HOST, "/broken", addr.port(), &1, false, true).await;

    assert!(result.is_err());
    let out = logs.contents();
    assert!(out.contains("[ERROR]"), "{out}");
    assert!(out.contains("-> ERRORED"), "{out}");
}

#[tokio::test]
async fn extra_headers_reach_the_server() {
    let addr = start_server();
    let options = RequestOptions::new(HOST, addr.port(), "/echo", HttpMethod::Post)
        .with_header("x-harness", "suite-1")
        .with_header("Content-Type", "text/plain");
    let request = build_post(&options, &[1, 2, 3]).unwrap();

    RequestClient::new()
        .unwrap()
        .execute(&request, false)
        .await
        .unwrap();

    let journal = recorded(addr);
    assert_eq!(journal[0].header("x-harness"), Some("suite-1"));
    assert_eq!(journal[0].header("content-type"), Some("application/json"));
    assert_eq!(journal[0].header("content-length"), Some("7"));
    assert_eq!(journal[0].body, "[1,2,3]");
}

#[tokio::test]
async fn target_posts_and_gets() {
    let addr = start_server();
    let config = TargetConfig {
        host: HOST.to_string(),
        port: addr.port(),
        use_https: false,
        verbose: false,
    };
    let target = Target::new(config, RequestClient::new().unwrap());
    assert_eq!(target.config().port, addr.port());

    target.post("/echo", &serde_json::json!({"step": 1})).await.unwrap();
    target.get("/ping").await.unwrap();

    let methods: Vec<String> = recorded(addr).into_iter().map(|r| r.method).collect();
    assert_eq!(methods, vec!["POST", "GET"]);
}

#[tokio::test]
async fn https_against_plain_server_fails() {
    let addr = start_server();

    let err = request_core::get(HOST, "/ping", addr.port(), true, false)
        .await
        .unwrap_err();

    assert!(matches!(err, RequestError::Transport(_)));
}
