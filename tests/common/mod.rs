//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::codec::Decoder;

use switchyard::config::ServerConfig;
use switchyard::http::HttpHandler;
use switchyard::net::Listener;
use switchyard::websocket::{Frame, FrameCodec};
use switchyard::{app, HttpServer, Shutdown};

/// A server running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<()>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the accept loop to finish draining.
    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("server did not stop")
            .expect("server task panicked");
    }
}

pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.listener.max_connections = 16;
    config.timeouts.shutdown_grace_secs = 2;
    config
}

/// Serve the built-in routes.
pub async fn start_app() -> TestServer {
    let config = test_config();
    let router = app::router(&config);
    start_server(config, router).await
}

pub async fn start_server(config: ServerConfig, handler: impl HttpHandler) -> TestServer {
    let tcp = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let listener = Listener::from_tcp(tcp, config.listener.max_connections).unwrap();

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    let server = HttpServer::new(config, handler);
    let handle = tokio::spawn(async move {
        server.run(listener, receiver).await.unwrap();
    });

    TestServer {
        addr,
        shutdown,
        handle,
    }
}

/// Read until the end of an HTTP head; returns the head and any bytes after it.
pub async fn read_head<R: AsyncRead + Unpin>(reader: &mut R) -> (String, BytesMut) {
    let mut buf = BytesMut::new();
    loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = buf.split_to(end + 4);
            return (String::from_utf8(head.to_vec()).unwrap(), buf);
        }
        let read = reader.read_buf(&mut buf).await.unwrap();
        assert!(read > 0, "stream ended before the head was complete");
    }
}

/// Read one frame as a client, using `buf` for bytes already received.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut BytesMut) -> Option<Frame> {
    let mut codec = FrameCodec::client(1 << 20);
    loop {
        if let Some(frame) = codec.decode(buf).unwrap() {
            return Some(frame);
        }
        if reader.read_buf(buf).await.unwrap() == 0 {
            return codec.decode_eof(buf).unwrap();
        }
    }
}
