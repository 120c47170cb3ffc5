//! HTTP server: accept loop and per-connection serving.
//!
//! # Responsibilities
//! - Accept connections within the listener's limit
//! - Serve each connection's requests in order on its own task
//! - Map handler failures to `500 Internal Server Error`
//! - Close idle connections and drain on shutdown
//!
//! # Design Decisions
//! - One task per connection; requests on a connection are never concurrent
//! - Shutdown interrupts connections waiting for a request, never a request
//!   in flight or a WebSocket session
//! - Accept errors are logged and the loop keeps going

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::Instrument;

use crate::config::ServerConfig;
use crate::http::connection::HttpConnection;
use crate::http::error::HttpError;
use crate::http::handler::HttpHandler;
use crate::http::response::{Response, Status};
use crate::net::{ConnectionTracker, Listener, ListenerError, Transport};

/// HTTP/1.x server driving one [`HttpHandler`].
pub struct HttpServer {
    config: Arc<ServerConfig>,
    handler: Arc<dyn HttpHandler>,
    tracker: ConnectionTracker,
}

impl HttpServer {
    pub fn new(config: ServerConfig, handler: impl HttpHandler) -> Self {
        Self {
            config: Arc::new(config),
            handler: Arc::new(handler),
            tracker: ConnectionTracker::new(),
        }
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Accept connections until `shutdown` fires, then wait for open
    /// connections to finish within the configured grace period.
    pub async fn run(
        &self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        tracing::info!(
            address = ?listener.local_addr().ok(),
            idle_secs = self.config.timeouts.idle_secs,
            "HTTP server started"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting connections");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let guard = self.tracker.track();
                        let span = tracing::info_span!(
                            "connection",
                            connection_id = %guard.id(),
                            peer = %peer
                        );
                        let handler = Arc::clone(&self.handler);
                        let config = Arc::clone(&self.config);
                        let shutdown = shutdown.resubscribe();

                        tokio::spawn(
                            async move {
                                let _permit = permit;
                                let _guard = guard;
                                match serve_connection(stream, handler.as_ref(), &config, shutdown).await {
                                    Ok(()) => tracing::debug!("Connection finished"),
                                    Err(e) if e.is_disconnect() => {
                                        tracing::debug!(error = %e, "Peer disconnected")
                                    }
                                    Err(e) => tracing::warn!(error = %e, "Connection failed"),
                                }
                            }
                            .instrument(span),
                        );
                    }
                    Err(ListenerError::Accept(e)) => {
                        tracing::warn!(error = %e, "Failed to accept connection");
                    }
                    Err(e) => return Err(e),
                },
            }
        }

        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        if self.tracker.wait_idle(grace).await {
            tracing::info!("All connections drained");
        } else {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                grace_secs = grace.as_secs(),
                "Shutdown grace period elapsed with connections still open"
            );
        }
        Ok(())
    }
}

/// Serve every request on one transport, then close its write half.
///
/// A closed `shutdown` channel counts as a shutdown signal.
pub async fn serve_connection<T: Transport>(
    transport: T,
    handler: &dyn HttpHandler,
    config: &ServerConfig,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), HttpError> {
    let mut connection = HttpConnection::new(transport, &config.http, &config.websocket);
    let idle = Duration::from_secs(config.timeouts.idle_secs);

    let result = serve_requests(&mut connection, handler, idle, shutdown).await;
    if let Err(e) = connection.close().await {
        tracing::debug!(error = %e, "Failed to shut down connection");
    }
    result
}

async fn serve_requests<T: Transport>(
    connection: &mut HttpConnection<T>,
    handler: &dyn HttpHandler,
    idle: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), HttpError> {
    loop {
        let next = tokio::select! {
            _ = shutdown.recv() => {
                tracing::debug!("Closing idle connection for shutdown");
                return Ok(());
            }
            next = tokio::time::timeout(idle, connection.next_request()) => next,
        };

        let request = match next {
            Err(_) => {
                tracing::debug!(idle_secs = idle.as_secs(), "Idle timeout elapsed");
                return Ok(());
            }
            Ok(None) => return Ok(()),
            Ok(Some(request)) => request?,
        };

        let method = request.method.clone();
        let path = request.path.clone();
        let response = match handler.handle_request(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(%method, %path, error = %e, "Handler failed");
                Response::text(Status::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        };

        tracing::info!(
            %method,
            %path,
            status = response.status.code,
            peer = %connection.identifier(),
            "Request served"
        );
        connection.send_response(response).await?;
    }
}
