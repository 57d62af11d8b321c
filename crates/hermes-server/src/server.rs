//! HTTP/1.1 listener.
//!
//! The server accepts connections until its [`ShutdownSignal`] fires, serves
//! `GET /health` and `GET /ready` itself and hands every other request to the
//! [`HttpFront`]. Each request is bounded by the configured request timeout;
//! a request that exceeds it is answered 504.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use hermes_core::Envelope;
use hermes_middleware::MiddlewareSet;
use hermes_router::DispatchTable;
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio::net::{TcpListener, TcpStream};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::front::{envelope_response, json_response, HttpFront, HttpResponse};
use crate::health::{HealthCheck, ReadinessCheck};
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// The Hermes HTTP server.
pub struct Server {
    config: ServerConfig,
    front: Arc<HttpFront>,
    health: HealthCheck,
    readiness: ReadinessCheck,
}

impl Server {
    /// Creates a server over `front`.
    #[must_use]
    pub fn new(config: ServerConfig, front: HttpFront) -> Self {
        let health = HealthCheck::new(config.service_name(), env!("CARGO_PKG_VERSION"));
        let units = Arc::clone(front.table());
        let readiness = ReadinessCheck::new().add_check("units_loaded", move || !units.is_empty());
        Self {
            config,
            front: Arc::new(front),
            health,
            readiness,
        }
    }

    /// Starts building a server.
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Liveness check.
    #[must_use]
    pub fn health(&self) -> &HealthCheck {
        &self.health
    }

    /// Readiness check.
    #[must_use]
    pub fn readiness(&self) -> &ReadinessCheck {
        &self.readiness
    }

    /// Runs until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Binds the configured address and runs until `shutdown` fires.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self.config.socket_addr().map_err(|e| {
            ServerError::Bind(format!("Invalid address '{}': {}", self.config.http_addr(), e))
        })?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(format!("Failed to bind to {addr}: {e}")))?;
        self.serve(listener, shutdown).await
    }

    /// Serves connections from an already bound listener.
    pub async fn serve(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let local = listener.local_addr()?;
        tracing::info!(addr = %local, units = self.front.table().len(), "server listening");

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                result = listener.accept() => match result {
                    Ok((stream, remote_addr)) => {
                        let server = Arc::clone(&server);
                        let token = tracker.acquire();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(e) = server.handle_connection(stream, remote_addr, shutdown).await {
                                tracing::debug!(%remote_addr, error = %e, "connection error");
                            }
                            drop(token);
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "failed to accept connection"),
                },
                () = shutdown.recv() => {
                    tracing::info!("shutdown signal received, no longer accepting");
                    break;
                }
            }
        }

        server.readiness.set_ready(false);

        let shutdown_timeout = server.config.shutdown_timeout();
        tracing::info!(
            timeout = ?shutdown_timeout,
            active = tracker.active_connections(),
            "draining connections"
        );
        tokio::select! {
            () = tracker.wait_for_shutdown() => tracing::info!("all connections closed"),
            () = tokio::time::sleep(shutdown_timeout) => tracing::warn!(
                active = tracker.active_connections(),
                "shutdown timeout reached"
            ),
        }

        tracing::info!("server stopped");
        Ok(())
    }

    async fn handle_connection(
        self: &Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);
        let server = Arc::clone(self);
        let service = service_fn(move |req: Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { Ok::<_, Infallible>(server.handle_request(req, remote_addr).await) }
        });

        let conn = http1::Builder::new().serve_connection(io, service);
        tokio::pin!(conn);
        tokio::select! {
            result = conn.as_mut() => result,
            () = shutdown.recv() => {
                conn.as_mut().graceful_shutdown();
                conn.await
            }
        }
    }

    async fn handle_request(&self, req: Request<Incoming>, remote_addr: SocketAddr) -> HttpResponse {
        match (req.method(), req.uri().path()) {
            (&Method::GET, "/health") => return health_reply(StatusCode::OK, &self.health.status()),
            (&Method::GET, "/ready") => {
                let status = self.readiness.status();
                let code = if status.is_ready() {
                    StatusCode::OK
                } else {
                    StatusCode::SERVICE_UNAVAILABLE
                };
                return health_reply(code, &status);
            }
            _ => {}
        }

        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let timeout = self.config.request_timeout();
        match tokio::time::timeout(timeout, self.serve_api(req, remote_addr)).await {
            Ok(response) => response,
            Err(_) => {
                tracing::warn!(%method, %path, ?timeout, "request timed out");
                envelope_response(
                    Envelope::error(StatusCode::GATEWAY_TIMEOUT, "Request timed out")
                        .with_error("Request timed out"),
                )
            }
        }
    }

    async fn serve_api(&self, req: Request<Incoming>, remote_addr: SocketAddr) -> HttpResponse {
        let (parts, body) = req.into_parts();
        let bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                tracing::debug!(error = %e, "failed to read request body");
                return envelope_response(
                    Envelope::error(StatusCode::BAD_REQUEST, "Failed to read request body")
                        .with_error("Failed to read request body"),
                );
            }
        };
        self.front
            .serve(Request::from_parts(parts, bytes), Some(remote_addr))
            .await
    }
}

fn health_reply<T: Serialize>(status: StatusCode, body: &T) -> HttpResponse {
    let value = serde_json::to_value(body).unwrap_or_else(|_| serde_json::json!({}));
    json_response(status, &value)
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("units", &self.front.table().len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Server`].
#[derive(Debug, Default)]
pub struct ServerBuilder {
    config: crate::config::ServerConfigBuilder,
    front: Option<HttpFront>,
}

impl ServerBuilder {
    /// Listen address.
    #[must_use]
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.config = self.config.http_addr(addr);
        self
    }

    /// Drain budget after shutdown.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.shutdown_timeout(timeout);
        self
    }

    /// Per-request budget.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.request_timeout(timeout);
        self
    }

    /// Service name reported by `/health`.
    #[must_use]
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.config = self.config.service_name(name);
        self
    }

    /// Dispatch front.
    #[must_use]
    pub fn front(mut self, front: HttpFront) -> Self {
        self.front = Some(front);
        self
    }

    /// Builds the server. Without a front every API call answers 404.
    #[must_use]
    pub fn build(self) -> Server {
        let front = self.front.unwrap_or_else(|| {
            HttpFront::new(Arc::new(DispatchTable::default()), MiddlewareSet::default())
        });
        Server::new(self.config.build(), front)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_router::{Outcome, Unit};
    use serde_json::{json, Value};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn echo_front() -> HttpFront {
        let unit = Unit::builder("echo")
            .expose("post=say")
            .expose("get=slow")
            .operation("say", "{ text }", |input| async move {
                let text = input.require_str("text")?.to_string();
                Ok::<_, hermes_core::DispatchError>(Outcome::Data(json!({ "text": text })))
            })
            .operation("slow", "{}", |_input| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(Outcome::Data(json!({})))
            })
            .build();
        let set = MiddlewareSet::default();
        let table = DispatchTable::build([Arc::new(unit)], &set).unwrap();
        HttpFront::new(Arc::new(table), set)
    }

    async fn raw_call(addr: SocketAddr, request: &str) -> (u16, Value) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let text = String::from_utf8(raw).unwrap();
        let status = text[9..12].parse().unwrap();
        let (_, body) = text.split_once("\r\n\r\n").unwrap();
        (status, serde_json::from_str(body).unwrap())
    }

    fn post(path: &str, body: &str) -> String {
        format!(
            "POST {path} HTTP/1.1\r\nhost: localhost\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    #[tokio::test]
    async fn test_run_invalid_address() {
        let server = Server::builder().http_addr("not-a-valid-address").build();
        match server.run_with_shutdown(ShutdownSignal::new()).await {
            Err(ServerError::Bind(msg)) => assert!(msg.contains("Invalid address")),
            other => panic!("expected bind error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_and_shutdown() {
        let server = Server::builder()
            .http_addr("127.0.0.1:0")
            .shutdown_timeout(Duration::from_millis(100))
            .build();
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();
        let result = tokio::time::timeout(Duration::from_secs(5), server.run_with_shutdown(shutdown)).await;
        assert!(matches!(result, Ok(Ok(()))));
    }

    #[test]
    fn test_readiness_follows_loaded_units() {
        assert!(!Server::builder().build().readiness().is_ready());
        assert!(Server::builder().front(echo_front()).build().readiness().is_ready());
    }

    #[tokio::test]
    async fn test_serves_api_and_health_checks() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = ShutdownSignal::new();
        let server = Server::builder()
            .front(echo_front())
            .request_timeout(Duration::from_millis(200))
            .shutdown_timeout(Duration::from_millis(100))
            .build();
        let handle = tokio::spawn(server.serve(listener, shutdown.clone()));

        let (status, body) = raw_call(addr, &post("/api/echo/say", r#"{"text":"hi"}"#)).await;
        assert_eq!(status, 200);
        assert_eq!(body, json!({ "ok": true, "data": { "text": "hi" }, "errors": [], "message": "" }));

        let (status, body) = raw_call(addr, &post("/api/echo/say", "{")).await;
        assert_eq!(status, 400);
        assert_eq!(body["message"], "Malformed JSON body");

        let (status, body) = raw_call(addr, &post("/api/nope/say", "")).await;
        assert_eq!(status, 404);
        assert_eq!(body["message"], "Module nope not found");

        let (status, body) = raw_call(
            addr,
            "GET /api/echo/slow HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n",
        )
        .await;
        assert_eq!(status, 504);
        assert_eq!(body["ok"], false);

        let (status, body) = raw_call(
            addr,
            "GET /health HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n",
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "healthy");

        shutdown.trigger();
        assert!(handle.await.unwrap().is_ok());
    }
}
