//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::header::HOST;
use axum::http::{HeaderMap, Uri};
use axum::routing::{get, post};
use axum::Router;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;

use mock_proxy::lifecycle::Shutdown;
use mock_proxy::net::ConnectionTracker;
use mock_proxy::{HttpServer, ProxyConfig, RuleStore};

/// Upstream handle; `release` lets `/slow` send its second chunk.
pub struct Upstream {
    pub addr: SocketAddr,
    pub release: Arc<Notify>,
}

impl Upstream {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start an upstream on an ephemeral port.
///
/// - `POST /echo` returns the request body
/// - `GET /host` returns the Host header it received
/// - `GET /query` returns the raw query string
/// - `GET /slow` sends `first`, waits for `release`, then sends `second`
/// - `GET /hang` sends a chunk every 50ms until the connection goes away
/// - `GET /stall` waits 2s before sending any response
/// - `POST /early` answers `early` without reading the request body
pub async fn start_upstream() -> Upstream {
    let release = Arc::new(Notify::new());
    let gate = Arc::clone(&release);

    let app = Router::new()
        .route("/echo", post(|body: Bytes| async move { body }))
        .route(
            "/host",
            get(|headers: HeaderMap| async move {
                headers
                    .get(HOST)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string()
            }),
        )
        .route(
            "/query",
            get(|uri: Uri| async move { uri.query().unwrap_or_default().to_string() }),
        )
        .route(
            "/slow",
            get(move || {
                let gate = Arc::clone(&gate);
                async move {
                    let chunks = futures_util::stream::unfold(0u8, move |step| {
                        let gate = Arc::clone(&gate);
                        async move {
                            match step {
                                0 => Some((Ok::<_, Infallible>(Bytes::from_static(b"first")), 1)),
                                1 => {
                                    gate.notified().await;
                                    Some((Ok(Bytes::from_static(b"second")), 2))
                                }
                                _ => None,
                            }
                        }
                    });
                    Body::from_stream(chunks)
                }
            }),
        )
        .route(
            "/hang",
            get(|| async {
                let chunks = futures_util::stream::unfold((), |_| async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Some((Ok::<_, Infallible>(Bytes::from_static(b"tick\n")), ()))
                });
                Body::from_stream(chunks)
            }),
        );

    let app = app
        .route(
            "/stall",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                "late"
            }),
        )
        .route("/early", post(|| async { "early" }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Upstream { addr, release }
}

/// A running proxy.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub connections: ConnectionTracker,
    pub rules: RuleStore,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Client that sends everything through this proxy.
    pub fn client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .proxy(reqwest::Proxy::http(self.url("")).unwrap())
            .build()
            .unwrap()
    }
}

/// Start the proxy on an ephemeral port serving mocks from `mocks`.
pub async fn start_proxy(mocks: &Path) -> TestProxy {
    start_proxy_with(mocks, |_| {}).await
}

/// Like `start_proxy`, with a chance to adjust the config first.
pub async fn start_proxy_with(mocks: &Path, configure: impl FnOnce(&mut ProxyConfig)) -> TestProxy {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.mocks.dir = mocks.to_string_lossy().into_owned();
    config.timeouts.connect_secs = 2;
    configure(&mut config);

    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config);
    let shutdown = Shutdown::new();
    let connections = server.upstream_connections();
    let rules = server.rules();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });

    TestProxy {
        addr,
        shutdown,
        connections,
        rules,
    }
}

/// Client that talks to the proxy directly, without proxy semantics.
pub fn direct_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// An address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// POST `url` through the proxy over a raw socket with a chunked body,
/// writing one chunk per `interval`. The head and first chunk go out before
/// the proxy has had a chance to connect upstream.
///
/// Returns the response status and body. The upload keeps going in the
/// background if the response arrives first.
pub async fn post_chunked(
    proxy: SocketAddr,
    url: &str,
    chunks: Vec<Vec<u8>>,
    interval: Duration,
) -> (u16, Vec<u8>) {
    let stream = TcpStream::connect(proxy).await.unwrap();
    let (mut reader, mut writer) = stream.into_split();
    let host = url
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or_default()
        .to_string();
    let head = format!("POST {url} HTTP/1.1\r\nHost: {host}\r\nTransfer-Encoding: chunked\r\n\r\n");

    let upload = tokio::spawn(async move {
        writer.write_all(head.as_bytes()).await?;
        for chunk in chunks {
            writer.write_all(format!("{:x}\r\n", chunk.len()).as_bytes()).await?;
            writer.write_all(&chunk).await?;
            writer.write_all(b"\r\n").await?;
            tokio::time::sleep(interval).await;
        }
        writer.write_all(b"0\r\n\r\n").await?;
        Ok::<_, std::io::Error>(writer)
    });

    let response = read_response(&mut reader).await;
    upload.abort();
    response
}

/// Read one `Content-Length` delimited HTTP/1.1 response.
async fn read_response<R: AsyncRead + Unpin>(reader: &mut R) -> (u16, Vec<u8>) {
    let mut buf = Vec::new();
    let mut scratch = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = reader.read(&mut scratch).await.unwrap();
        assert!(n > 0, "connection closed before the response head");
        buf.extend_from_slice(&scratch[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let status = head
        .split(' ')
        .nth(1)
        .and_then(|code| code.parse().ok())
        .expect("status line");
    let length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .expect("content-length header");

    let body_start = head_end + 4;
    while buf.len() < body_start + length {
        let n = reader.read(&mut scratch).await.unwrap();
        assert!(n > 0, "connection closed mid-body");
        buf.extend_from_slice(&scratch[..n]);
    }
    (status, buf[body_start..body_start + length].to_vec())
}
