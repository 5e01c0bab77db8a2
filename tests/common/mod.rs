//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use axum::http::StatusCode;
use axum::Router;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use failover_proxy::backend::simulated::SimulatedBackend;
use failover_proxy::config::FailoverConfig;
use failover_proxy::{FailoverController, HttpServer, Shutdown};

/// A running controller bound to an ephemeral port.
pub struct TestController {
    pub addr: SocketAddr,
    pub controller: Arc<FailoverController>,
    pub shutdown: Shutdown,
}

impl TestController {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestController {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Config pointing at `primary`/`spare` with background detection off and a short forward timeout.
pub fn config(primary: SocketAddr, spare: SocketAddr) -> FailoverConfig {
    let mut config = FailoverConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.backends.primary = primary.to_string();
    config.backends.spare = spare.to_string();
    config.detection.enabled = false;
    config.forwarding.timeout_ms = 300;
    config.forwarding.control_timeout_ms = 500;
    config.observability.metrics_enabled = false;
    config
}

pub async fn spawn_controller(config: FailoverConfig) -> TestController {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();
    let controller = server.controller();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestController {
        addr,
        controller,
        shutdown,
    }
}

/// A simulated backend served on an ephemeral port.
pub struct SimBackend {
    pub node: Arc<SimulatedBackend>,
    pub addr: SocketAddr,
    _shutdown: Shutdown,
}

/// Start a simulated backend; it keeps running until the handle drops or it crashes.
pub async fn spawn_simulated(name: &str) -> SimBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let node = SimulatedBackend::new(name);
    let shutdown = Shutdown::new();
    tokio::spawn(node.clone().serve(listener, shutdown.subscribe()));
    SimBackend {
        node,
        addr,
        _shutdown: shutdown,
    }
}

pub async fn spawn_router(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// An address with nothing listening on it.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Start a programmable mock backend with async support.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;

                        let (status, body) = f().await;
                        let reason = StatusCode::from_u16(status)
                            .ok()
                            .and_then(|s| s.canonical_reason())
                            .unwrap_or("Unknown");
                        let response_str = format!(
                            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status,
                            reason,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

/// Accepts connections and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// Poll `condition` every 50ms until it holds or `deadline` passes.
pub async fn eventually<F: Fn() -> bool>(deadline: Duration, condition: F) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    condition()
}
