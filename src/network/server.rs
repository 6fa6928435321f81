//! HTTP server that answers live requests from the replay engine

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::LimitsConfig;
use crate::policy::LiveRequest;
use crate::replay::{ReplayEngine, ReplayResponse};
use crate::Result;

use super::SHUTDOWN_TIMEOUT_MS;

/// HTTP server serving one replay engine
pub struct ReplayServer {
    engine: Arc<ReplayEngine>,
    limits: LimitsConfig,
    listener: TcpListener,
    shutdown_tx: broadcast::Sender<()>,
}

impl ReplayServer {
    /// Bind a listener on the loopback interface
    ///
    /// Port 0 picks an ephemeral port; use [`local_addr`](Self::local_addr)
    /// to discover it.
    ///
    /// # Errors
    ///
    /// Returns error if the address cannot be bound
    pub async fn bind(engine: ReplayEngine, port: u16, limits: LimitsConfig) -> Result<Self> {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = TcpListener::bind(addr).await?;
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            engine: Arc::new(engine),
            limits,
            listener,
            shutdown_tx,
        })
    }

    /// Address the server is listening on
    ///
    /// # Errors
    ///
    /// Returns error if the local address cannot be read
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Sender that triggers graceful shutdown when signalled
    #[must_use]
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Accept and serve connections until shutdown or SIGINT
    ///
    /// # Errors
    ///
    /// Returns error if accepting connections fails fatally
    pub async fn run(self) -> Result<()> {
        let stats = self.engine.stats();
        info!(
            "Replaying on {} ({} responses under {} keys)",
            self.local_addr()?,
            stats.responses,
            stats.keys
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, _peer)) => {
                            let engine = Arc::clone(&self.engine);
                            let max_headers = self.limits.max_headers;

                            connections.spawn(async move {
                                let io = TokioIo::new(stream);
                                let service = service_fn(move |request: Request<Incoming>| {
                                    let response = handle_request(&engine, max_headers, &request);
                                    async move { Ok::<_, Infallible>(response) }
                                });

                                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                                    error!("Connection error: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                Some(result) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = result {
                        warn!("Connection task error: {}", e);
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received SIGINT, shutting down");
                    break;
                }
            }
        }

        // Let in-flight connections finish, bounded
        let shutdown_timeout = Duration::from_millis(SHUTDOWN_TIMEOUT_MS);
        tokio::time::timeout(shutdown_timeout, async {
            while let Some(result) = connections.join_next().await {
                if let Err(e) = result {
                    warn!("Connection cleanup error: {}", e);
                }
            }
        })
        .await
        .ok();

        info!("Shutdown complete");
        Ok(())
    }
}

/// Serve one hyper request through the engine
fn handle_request<B>(
    engine: &ReplayEngine,
    max_headers: usize,
    request: &Request<B>,
) -> Response<Full<Bytes>> {
    if request.headers().len() > max_headers {
        warn!(
            "Rejecting request with {} headers (limit {})",
            request.headers().len(),
            max_headers
        );
        return status_response(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE);
    }

    let replayed = engine.dispatch(&to_live_request(request));
    to_hyper_response(replayed)
}

/// Project the hyper request into the policy-facing view
fn to_live_request<B>(request: &Request<B>) -> LiveRequest {
    LiveRequest {
        method: request.method().to_string(),
        uri: request.uri().to_string(),
        headers: request
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect(),
    }
}

/// Convert a replayed response into the wire response
///
/// Status line, headers, and body are written verbatim. A response a hook
/// made unbuildable (bad status, bad header bytes) degrades to a 500 with
/// an empty body rather than tearing down the connection.
fn to_hyper_response(replayed: ReplayResponse) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(replayed.status);
    for (name, value) in &replayed.headers {
        builder = builder.header(name, value);
    }

    match builder.body(Full::new(Bytes::from(replayed.body))) {
        Ok(response) => response,
        Err(e) => {
            error!("Failed to build response: {}", e);
            status_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Empty-bodied response with the given status
fn status_response(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ReplayPolicy;

    fn empty_engine() -> ReplayEngine {
        ReplayEngine::new(ReplayPolicy::method_and_url())
    }

    fn engine_with_entry(url: &str, text: &str) -> ReplayEngine {
        use crate::har::{ArchivedRequest, ArchivedResponse, Content, Entry};

        let engine = empty_engine();
        engine.add_entry(&Entry {
            request: ArchivedRequest {
                method: "GET".to_string(),
                url: url.to_string(),
                headers: vec![],
            },
            response: ArchivedResponse {
                status: 200,
                headers: vec![],
                content: Content {
                    text: Some(text.to_string()),
                    ..Content::default()
                },
            },
        });
        engine
    }

    #[test]
    fn test_to_hyper_response_verbatim() {
        let response = to_hyper_response(ReplayResponse {
            status: 201,
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            body: b"done".to_vec(),
        });

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers().get("Content-Type").unwrap(),
            "text/plain"
        );
    }

    #[test]
    fn test_unbuildable_response_degrades_to_500() {
        let response = to_hyper_response(ReplayResponse {
            status: 99, // below the valid range
            headers: vec![],
            body: vec![],
        });

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_header_limit_rejects_without_consuming() {
        let engine = engine_with_entry("http://example.com/a", "payload");

        let request = Request::builder()
            .method("GET")
            .uri("/a")
            .header("X-One", "1")
            .header("X-Two", "2")
            .body(())
            .unwrap();

        let rejected = handle_request(&engine, 1, &request);
        assert_eq!(rejected.status(), StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE);
        // The rejected request never reached the store
        assert_eq!(engine.remaining("GET /a"), 1);

        // Same request under a sane limit still gets the queued response
        let served = handle_request(&engine, 128, &request);
        assert_eq!(served.status(), StatusCode::OK);
        assert_eq!(engine.remaining("GET /a"), 0);
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let server = ReplayServer::bind(empty_engine(), 0, LimitsConfig::default())
            .await
            .unwrap();

        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert!(addr.ip().is_loopback());
    }

    #[tokio::test]
    async fn test_shutdown_signal() {
        let server = ReplayServer::bind(empty_engine(), 0, LimitsConfig::default())
            .await
            .unwrap();
        let shutdown = server.shutdown_handle();

        let handle = tokio::spawn(async move { server.run().await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.send(()).ok();

        let result = tokio::time::timeout(Duration::from_secs(2), handle).await;
        assert!(result.is_ok());
    }
}
