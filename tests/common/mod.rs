//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use api_gateway::http::{AppState, GatewayServer};
use api_gateway::identity::{IdentityError, IdentityExchanger};
use api_gateway::proxy::Forwarder;
use api_gateway::ratelimit::{InMemoryStrategy, Strategy};
use api_gateway::routing::RouteIndex;
use api_gateway::{Settings, Shutdown};

use clap::Parser;

/// Identity exchanger that returns a fixed identity token.
pub struct StaticIdentity(pub &'static str);

#[async_trait::async_trait]
impl IdentityExchanger for StaticIdentity {
    async fn exchange(&self, access_token: &str) -> Result<String, IdentityError> {
        if access_token == "expired" {
            return Err(IdentityError::InvalidSession);
        }

        Ok(self.0.to_string())
    }
}

pub struct TestGateway {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Start the gateway's shutdown sequence, as the signal handler would.
    pub fn trigger_shutdown(&self) {
        self.shutdown.trigger();
    }
}

/// Bind the gateway on an ephemeral port and serve the given routes.
pub async fn spawn_gateway(routes_yaml: &str) -> TestGateway {
    spawn_gateway_with(routes_yaml, |state| state).await
}

/// Same, with a hook to add a limiter or identity exchanger to the state.
/// The forwarder is wired here so it shares the gateway's shutdown.
pub async fn spawn_gateway_with<F>(routes_yaml: &str, configure: F) -> TestGateway
where
    F: FnOnce(AppState) -> AppState,
{
    let settings = Settings::parse_from(["api-gateway"]);
    let shutdown = Shutdown::new(Duration::from_secs(5));

    let state = configure(AppState {
        routes: Arc::new(RouteIndex::parse(routes_yaml).unwrap()),
        limiter: None,
        identity: None,
        forwarder: Arc::new(Forwarder::new(Duration::ZERO, shutdown.subscribe())),
        session_cookie: "blue-session".into(),
        welcome: r#"{"api":"test-gateway"}"#.into(),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let receiver = shutdown.subscribe();
    let server = GatewayServer::new(&settings, state);

    tokio::spawn(async move {
        let _ = server.run(listener, receiver).await;
    });

    // Let the accept loop come up before tests fire requests at it.
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestGateway { addr, shutdown }
}

pub fn with_limiter(mut state: AppState) -> AppState {
    let strategy: Arc<dyn Strategy> = Arc::new(InMemoryStrategy::new());
    state.limiter = Some(strategy);
    state
}

pub fn with_identity(mut state: AppState, token: &'static str) -> AppState {
    state.identity = Some(Arc::new(StaticIdentity(token)));
    state
}

async fn read_request_head(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];

    while !head.ends_with(b"\r\n\r\n") {
        match socket.read(&mut byte).await {
            Ok(0) | Err(_) => break,
            Ok(_) => head.extend_from_slice(&byte),
        }
    }

    String::from_utf8_lossy(&head).into_owned()
}

/// Backend that answers 200 with the received request head as the body,
/// so tests can assert exactly what crossed the proxy.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };

            tokio::spawn(async move {
                let head = read_request_head(&mut socket).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    head.len(),
                    head
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Backend that streams an event and then holds the connection open, so
/// only a flushing proxy lets the first chunk through promptly.
pub async fn start_sse_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };

            tokio::spawn(async move {
                let _ = read_request_head(&mut socket).await;
                let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\n\r\n";
                let _ = socket.write_all(head.as_bytes()).await;

                let chunk = "data: one\n\n";
                let _ = socket
                    .write_all(format!("{:x}\r\n{}\r\n", chunk.len(), chunk).as_bytes())
                    .await;

                // Keep the stream open well past the client's read.
                tokio::time::sleep(Duration::from_secs(5)).await;
                let _ = socket.write_all(b"0\r\n\r\n").await;
            });
        }
    });

    addr
}

/// Backend that sends a chunked body with a declared trailer.
pub async fn start_trailer_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };

            tokio::spawn(async move {
                let _ = read_request_head(&mut socket).await;
                let response = "HTTP/1.1 200 OK\r\n\
                    Content-Type: text/plain\r\n\
                    Trailer: X-Checksum\r\n\
                    Transfer-Encoding: chunked\r\n\r\n\
                    5\r\nhello\r\n\
                    0\r\nX-Checksum: abc123\r\n\r\n";
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Backend that accepts a websocket-style upgrade and echoes raw bytes.
pub async fn start_upgrade_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };

            tokio::spawn(async move {
                let _ = read_request_head(&mut socket).await;
                let head = "HTTP/1.1 101 Switching Protocols\r\n\
                    Connection: Upgrade\r\n\
                    Upgrade: websocket\r\n\r\n";
                let _ = socket.write_all(head.as_bytes()).await;

                let mut buf = [0u8; 1024];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if socket.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
    });

    addr
}

/// Minimal identity service speaking the exchange wire contract.
pub async fn start_identity_service(identity_token: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };

            tokio::spawn(async move {
                let head = read_request_head(&mut socket).await;

                let length = head
                    .lines()
                    .find_map(|l| {
                        let l = l.to_ascii_lowercase();
                        let v = l.strip_prefix("content-length:")?;
                        v.trim().parse::<usize>().ok()
                    })
                    .unwrap_or(0);

                let mut body = vec![0u8; length];
                let _ = socket.read_exact(&mut body).await;

                let payload = format!(r#"{{"identity_token":"{identity_token}"}}"#);
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    payload.len(),
                    payload
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}
