/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, StatusCode, Uri, header};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use g3_http_client::connect::{BoxHttpConnection, ConnectError, HttpConnector};
use g3_http_client::cookie::CookieJar;
use g3_http_client::transaction::ResponseTimeout;
use g3_http_client::{
    HttpBody, HttpClientError, HttpRequestSender, HttpTransaction, HttpTransactionOptions,
};

/// What the scripted peer does for one accepted connection.
struct Exchange {
    /// raw bytes written back once the request looks complete, None keeps
    /// the peer silent forever
    response: Option<&'static [u8]>,
}

/// A connector backed by in-memory duplex pipes, with one scripted
/// exchange consumed per connect. Captured requests and the number of
/// still-open connections are observable from the test body.
struct MockConnector {
    exchanges: Mutex<VecDeque<Exchange>>,
    requests: Arc<Mutex<Vec<Vec<u8>>>>,
    connect_count: Arc<AtomicUsize>,
    open_connections: Arc<AtomicUsize>,
}

impl MockConnector {
    fn new(exchanges: Vec<Exchange>) -> Self {
        MockConnector {
            exchanges: Mutex::new(exchanges.into()),
            requests: Arc::new(Mutex::new(Vec::new())),
            connect_count: Arc::new(AtomicUsize::new(0)),
            open_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn with_responses(responses: Vec<&'static [u8]>) -> Self {
        Self::new(
            responses
                .into_iter()
                .map(|r| Exchange { response: Some(r) })
                .collect(),
        )
    }

    fn request(&self, index: usize) -> Vec<u8> {
        self.requests.lock().unwrap()[index].clone()
    }

    fn request_count(&self) -> usize {
        self.connect_count.load(Ordering::SeqCst)
    }

    fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::SeqCst)
    }
}

/// Headers received in full, and any framed body received in full too.
fn request_is_complete(buf: &[u8]) -> bool {
    let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
        return false;
    };
    let head = String::from_utf8_lossy(&buf[..head_end + 4]).to_lowercase();
    let body = &buf[head_end + 4..];
    if head.contains("transfer-encoding: chunked") {
        return body.ends_with(b"0\r\n\r\n");
    }
    if let Some(pos) = head.find("content-length:") {
        let rest = &head[pos + "content-length:".len()..];
        let len: usize = rest
            .split_whitespace()
            .next()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        return body.len() >= len;
    }
    true
}

#[async_trait]
impl HttpConnector for MockConnector {
    async fn connect(&self, _uri: &Uri) -> Result<BoxHttpConnection, ConnectError> {
        let Some(exchange) = self.exchanges.lock().unwrap().pop_front() else {
            return Err(ConnectError::ConnectFailed(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "no scripted exchange left",
            )));
        };
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        self.open_connections.fetch_add(1, Ordering::SeqCst);

        let (client_side, mut server_side) = tokio::io::duplex(16 * 1024);

        let requests = self.requests.clone();
        let open_connections = self.open_connections.clone();
        let slot = {
            let mut guard = requests.lock().unwrap();
            guard.push(Vec::new());
            guard.len() - 1
        };

        tokio::spawn(async move {
            let mut captured = Vec::new();
            let mut responded = false;
            let mut buf = [0u8; 4096];
            loop {
                match server_side.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        captured.extend_from_slice(&buf[..n]);
                        requests.lock().unwrap()[slot] = captured.clone();
                        if !responded && request_is_complete(&captured) {
                            match exchange.response {
                                Some(data) => {
                                    responded = true;
                                    if server_side.write_all(data).await.is_err() {
                                        break;
                                    }
                                    let _ = server_side.shutdown().await;
                                }
                                None => {
                                    // scripted silence: wait for the peer
                                    // to give up and close
                                    responded = true;
                                }
                            }
                        }
                    }
                }
            }
            open_connections.fetch_sub(1, Ordering::SeqCst);
        });

        Ok(Box::new(client_side))
    }
}

fn get_request(uri: &str) -> Request<HttpBody> {
    Request::builder().uri(uri).body(HttpBody::Empty).unwrap()
}

#[tokio::test]
async fn simple_ok() {
    let connector = MockConnector::with_responses(vec![
        b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi" as &[u8],
    ]);
    let transaction = HttpTransaction::new(
        get_request("http://example.com/a"),
        HttpRequestSender::new(connector),
        HttpTransactionOptions::default(),
    );
    let response = transaction.run().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().into_buffered().await.unwrap();
    assert_eq!(&body[..], b"hi");
}

#[tokio::test]
async fn redirect_then_ok() {
    let connector = MockConnector::with_responses(vec![
        b"HTTP/1.1 301 Moved Permanently\r\nLocation: /b\r\nContent-Length: 0\r\n\r\n" as &[u8],
        b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi",
    ]);
    let transaction = HttpTransaction::new(
        get_request("http://example.com/a"),
        HttpRequestSender::new(connector),
        HttpTransactionOptions::default(),
    );
    let response = transaction.run().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    match response.body() {
        HttpBody::Buffered(data) => assert_eq!(&data[..], b"hi"),
        body => panic!("expected a buffered body, got {body:?}"),
    }
}

#[tokio::test]
async fn redirect_follow_up_request_wire_shape() {
    let connector = Arc::new(MockConnector::with_responses(vec![
        b"HTTP/1.1 302 Found\r\nLocation: /b\r\nContent-Length: 0\r\n\r\n" as &[u8],
        b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n",
    ]));
    let request = Request::builder()
        .method("POST")
        .uri("http://example.com/a")
        .header(header::CONTENT_TYPE, "text/plain")
        .header(header::AUTHORIZATION, "Bearer secret")
        .body(HttpBody::buffered("payload"))
        .unwrap();

    let transaction = HttpTransaction::new(
        request,
        HttpRequestSender::new(SharedConnector(connector.clone())),
        HttpTransactionOptions::default(),
    );
    transaction.run().await.unwrap();

    assert_eq!(connector.request_count(), 2);

    let first = String::from_utf8(connector.request(0)).unwrap();
    assert!(first.starts_with("POST /a HTTP/1.1\r\n"));
    assert!(first.contains("authorization: Bearer secret\r\n"));
    assert!(first.ends_with("payload"));

    let follow_up = String::from_utf8(connector.request(1)).unwrap();
    assert!(follow_up.starts_with("GET /b HTTP/1.1\r\n"));
    // same host: credentials are kept
    assert!(follow_up.contains("authorization: Bearer secret\r\n"));
    // message headers of the dropped body are stripped
    assert!(!follow_up.to_lowercase().contains("content-type"));
    assert!(!follow_up.to_lowercase().contains("content-length"));
    assert!(follow_up.ends_with("\r\n\r\n"));
}

#[tokio::test]
async fn redirect_to_other_host_strips_authorization() {
    let connector = Arc::new(MockConnector::with_responses(vec![
        b"HTTP/1.1 301 Moved Permanently\r\nLocation: http://other.org/\r\nContent-Length: 0\r\n\r\n" as &[u8],
        b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n",
    ]));
    let request = Request::builder()
        .uri("http://example.com/a")
        .header(header::AUTHORIZATION, "Bearer secret")
        .body(HttpBody::Empty)
        .unwrap();

    let transaction = HttpTransaction::new(
        request,
        HttpRequestSender::new(SharedConnector(connector.clone())),
        HttpTransactionOptions::default(),
    );
    transaction.run().await.unwrap();

    let follow_up = String::from_utf8(connector.request(1)).unwrap();
    assert!(follow_up.starts_with("GET / HTTP/1.1\r\n"));
    assert!(follow_up.contains("Host: other.org\r\n"));
    assert!(!follow_up.to_lowercase().contains("authorization"));
}

#[tokio::test]
async fn max_redirects_zero_fails_after_one_send() {
    let connector = Arc::new(MockConnector::with_responses(vec![
        b"HTTP/1.1 301 Moved Permanently\r\nLocation: /b\r\nContent-Length: 0\r\n\r\n" as &[u8],
    ]));
    let mut options = HttpTransactionOptions::default();
    options.set_max_redirects(0);
    let transaction = HttpTransaction::new(
        get_request("http://example.com/a"),
        HttpRequestSender::new(SharedConnector(connector.clone())),
        options,
    );
    let err = transaction.run().await.unwrap_err();
    assert!(matches!(err, HttpClientError::TooManyRedirects(0)));
    assert_eq!(connector.request_count(), 1);
}

#[tokio::test]
async fn redirect_limit_send_count() {
    const RESPONSE: &[u8] =
        b"HTTP/1.1 301 Moved Permanently\r\nLocation: /b\r\nContent-Length: 0\r\n\r\n";
    let connector = Arc::new(MockConnector::with_responses(vec![RESPONSE; 10]));
    let mut options = HttpTransactionOptions::default();
    options.set_max_redirects(3);
    let transaction = HttpTransaction::new(
        get_request("http://example.com/a"),
        HttpRequestSender::new(SharedConnector(connector.clone())),
        options,
    );
    let err = transaction.run().await.unwrap_err();
    assert!(matches!(err, HttpClientError::TooManyRedirects(3)));
    // a server that always redirects gets exactly max + 1 physical sends
    assert_eq!(connector.request_count(), 4);
}

#[tokio::test]
async fn redirect_without_location_is_terminal() {
    let connector = MockConnector::with_responses(vec![
        b"HTTP/1.1 301 Moved Permanently\r\nContent-Length: 0\r\n\r\n" as &[u8],
    ]);
    let transaction = HttpTransaction::new(
        get_request("http://example.com/a"),
        HttpRequestSender::new(connector),
        HttpTransactionOptions::default(),
    );
    let response = transaction.run().await.unwrap();
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
}

#[tokio::test]
async fn status_error_carries_buffered_response() {
    let connector = MockConnector::with_responses(vec![
        b"HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\n\r\nnot found" as &[u8],
    ]);
    let transaction = HttpTransaction::new(
        get_request("http://example.com/a"),
        HttpRequestSender::new(connector),
        HttpTransactionOptions::default(),
    );
    let err = transaction.run().await.unwrap_err();
    let response = err.into_response().expect("status error carries the response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    match response.body() {
        HttpBody::Buffered(data) => assert_eq!(&data[..], b"not found"),
        body => panic!("expected a buffered body, got {body:?}"),
    }
}

#[tokio::test]
async fn ignored_status_resolves() {
    let connector = MockConnector::with_responses(vec![
        b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n" as &[u8],
    ]);
    let mut options = HttpTransactionOptions::default();
    options.set_obey_success_code(false);
    let transaction = HttpTransaction::new(
        get_request("http://example.com/a"),
        HttpRequestSender::new(connector),
        options,
    );
    let response = transaction.run().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn streaming_option_keeps_body_streaming() {
    let connector = MockConnector::with_responses(vec![
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n" as &[u8],
    ]);
    let mut options = HttpTransactionOptions::default();
    options.set_streaming(true);
    let transaction = HttpTransaction::new(
        get_request("http://example.com/a"),
        HttpRequestSender::new(connector),
        options,
    );
    let response = transaction.run().await.unwrap();
    assert!(matches!(response.body(), HttpBody::Streaming(_)));
    let body = response.into_body().into_buffered().await.unwrap();
    assert_eq!(&body[..], b"hello");
}

#[tokio::test]
async fn buffered_post_sets_content_length() {
    let connector = Arc::new(MockConnector::with_responses(vec![
        b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n" as &[u8],
    ]));
    let request = Request::builder()
        .method("POST")
        .uri("http://example.com/submit")
        .body(HttpBody::buffered("hello world"))
        .unwrap();
    let transaction = HttpTransaction::new(
        request,
        HttpRequestSender::new(SharedConnector(connector.clone())),
        HttpTransactionOptions::default(),
    );
    transaction.run().await.unwrap();

    let wire = String::from_utf8(connector.request(0)).unwrap();
    assert!(wire.contains("Content-Length: 11\r\n"));
    assert!(wire.ends_with("\r\n\r\nhello world"));
}

#[tokio::test]
async fn streaming_post_goes_chunked() {
    let connector = Arc::new(MockConnector::with_responses(vec![
        b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n" as &[u8],
    ]));
    let stream = tokio_stream::iter(vec![
        io::Result::Ok(Bytes::from_static(b"hello ")),
        io::Result::Ok(Bytes::from_static(b"world")),
    ]);
    let request = Request::builder()
        .method("POST")
        .uri("http://example.com/submit")
        .body(HttpBody::streaming(stream))
        .unwrap();
    let transaction = HttpTransaction::new(
        request,
        HttpRequestSender::new(SharedConnector(connector.clone())),
        HttpTransactionOptions::default(),
    );
    transaction.run().await.unwrap();

    let wire = connector.request(0);
    let head_end = wire.windows(4).position(|w| w == b"\r\n\r\n").unwrap();
    let head = String::from_utf8_lossy(&wire[..head_end + 4]);
    assert!(head.contains("Transfer-Encoding: chunked\r\n"));
    assert!(!head.to_lowercase().contains("content-length"));
    assert_eq!(
        &wire[head_end + 4..],
        b"6\r\nhello \r\n5\r\nworld\r\n0\r\n\r\n"
    );
}

#[tokio::test(start_paused = true)]
async fn response_timeout() {
    let connector = MockConnector::new(vec![Exchange { response: None }]);
    let mut options = HttpTransactionOptions::default();
    options.set_response_timeout(ResponseTimeout::Fixed(Duration::from_millis(100)));
    let transaction = HttpTransaction::new(
        get_request("http://example.com/a"),
        HttpRequestSender::new(connector),
        options,
    );
    let err = transaction.run().await.unwrap_err();
    match err {
        HttpClientError::ResponseTimeout(duration) => {
            assert_eq!(duration, Duration::from_millis(100));
        }
        err => panic!("expected a timeout error, got {err}"),
    }
}

#[tokio::test(start_paused = true)]
async fn disabled_timeout_waits() {
    let connector = MockConnector::new(vec![Exchange { response: None }]);
    let mut options = HttpTransactionOptions::default();
    options.set_response_timeout(ResponseTimeout::Disabled);
    let token = CancellationToken::new();
    let transaction = HttpTransaction::new(
        get_request("http://example.com/a"),
        HttpRequestSender::new(connector),
        options,
    )
    .with_cancellation(token.clone());

    let handle = tokio::spawn(transaction.run());
    // well past any default timeout
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert!(!handle.is_finished());
    token.cancel();
    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, HttpClientError::Canceled));
}

#[tokio::test(start_paused = true)]
async fn cancellation_closes_connection() {
    let connector = Arc::new(MockConnector::new(vec![Exchange { response: None }]));
    let mut options = HttpTransactionOptions::default();
    options.set_response_timeout(ResponseTimeout::Disabled);
    let token = CancellationToken::new();
    let transaction = HttpTransaction::new(
        get_request("http://example.com/a"),
        HttpRequestSender::new(SharedConnector(connector.clone())),
        options,
    )
    .with_cancellation(token.clone());

    let handle = tokio::spawn(transaction.run());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(connector.open_connections(), 1);

    token.cancel();
    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, HttpClientError::Canceled));

    // the dropped send future closed its connection, observable once the
    // peer task has seen eof
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(connector.open_connections(), 0);
}

#[tokio::test]
async fn connector_error_passes_through() {
    let connector = MockConnector::with_responses(Vec::new());
    let transaction = HttpTransaction::new(
        get_request("http://example.com/a"),
        HttpRequestSender::new(connector),
        HttpTransactionOptions::default(),
    );
    let err = transaction.run().await.unwrap_err();
    assert!(matches!(
        err,
        HttpClientError::ConnectFailed(ConnectError::ConnectFailed(_))
    ));
}

#[tokio::test]
async fn relative_uri_rejected_without_connect() {
    let connector = Arc::new(MockConnector::with_responses(Vec::new()));
    let transaction = HttpTransaction::new(
        get_request("/relative/only"),
        HttpRequestSender::new(SharedConnector(connector.clone())),
        HttpTransactionOptions::default(),
    );
    let err = transaction.run().await.unwrap_err();
    assert!(matches!(err, HttpClientError::InvalidRequestUri(_)));
    // rejected before the connector was ever asked
    assert_eq!(connector.request_count(), 0);
}

#[tokio::test]
async fn cookies_round_trip_across_redirect() {
    let connector = Arc::new(MockConnector::with_responses(vec![
        b"HTTP/1.1 302 Found\r\nLocation: /b\r\nSet-Cookie: sid=abc123\r\nContent-Length: 0\r\n\r\n" as &[u8],
        b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n",
    ]));
    let jar = Arc::new(Mutex::new(CookieJar::new()));
    let transaction = HttpTransaction::new(
        get_request("http://example.com/a"),
        HttpRequestSender::new(SharedConnector(connector.clone())),
        HttpTransactionOptions::default(),
    )
    .with_cookie_jar(jar.clone());
    transaction.run().await.unwrap();

    let first = String::from_utf8(connector.request(0)).unwrap();
    assert!(!first.to_lowercase().contains("cookie"));

    let follow_up = String::from_utf8(connector.request(1)).unwrap();
    assert!(follow_up.contains("cookie: sid=abc123\r\n"));

    // the jar is shared state across transactions of the same client
    assert!(!jar.lock().unwrap().is_empty());
}

/// HttpConnector for an Arc-shared mock, so tests can keep inspecting the
/// mock after the sender took ownership.
struct SharedConnector(Arc<MockConnector>);

#[async_trait]
impl HttpConnector for SharedConnector {
    async fn connect(&self, uri: &Uri) -> Result<BoxHttpConnection, ConnectError> {
        self.0.connect(uri).await
    }
}
