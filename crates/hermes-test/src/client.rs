//! In-memory client.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use hermes_server::HttpFront;
use http::{Method, Request};
use serde::Serialize;

use crate::error::TestError;
use crate::response::TestResponse;

/// Sends requests straight into an [`HttpFront`].
#[derive(Debug, Clone)]
#[must_use]
pub struct TestClient {
    front: Arc<HttpFront>,
    default_headers: Vec<(String, String)>,
    remote_addr: Option<SocketAddr>,
}

impl TestClient {
    /// Creates a client over `front`.
    pub fn new(front: HttpFront) -> Self {
        Self::shared(Arc::new(front))
    }

    /// Creates a client over a shared front.
    pub fn shared(front: Arc<HttpFront>) -> Self {
        Self {
            front,
            default_headers: Vec::new(),
            remote_addr: None,
        }
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Peer address reported for every request.
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Starts a GET request.
    pub fn get(&self, uri: impl Into<String>) -> TestClientRequest<'_> {
        self.request(Method::GET, uri)
    }

    /// Starts a POST request.
    pub fn post(&self, uri: impl Into<String>) -> TestClientRequest<'_> {
        self.request(Method::POST, uri)
    }

    /// Starts a PUT request.
    pub fn put(&self, uri: impl Into<String>) -> TestClientRequest<'_> {
        self.request(Method::PUT, uri)
    }

    /// Starts a PATCH request.
    pub fn patch(&self, uri: impl Into<String>) -> TestClientRequest<'_> {
        self.request(Method::PATCH, uri)
    }

    /// Starts a DELETE request.
    pub fn delete(&self, uri: impl Into<String>) -> TestClientRequest<'_> {
        self.request(Method::DELETE, uri)
    }

    /// Starts a request with any method.
    pub fn request(&self, method: Method, uri: impl Into<String>) -> TestClientRequest<'_> {
        TestClientRequest {
            client: self,
            method,
            uri: uri.into(),
            headers: self.default_headers.clone(),
            body: Ok(Bytes::new()),
        }
    }
}

/// A request being built by a [`TestClient`].
#[must_use]
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    method: Method,
    uri: String,
    headers: Vec<(String, String)>,
    body: Result<Bytes, TestError>,
}

impl TestClientRequest<'_> {
    /// Adds a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the `token` header.
    pub fn token(self, token: impl Into<String>) -> Self {
        self.header("token", token)
    }

    /// Sets a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.body = serde_json::to_vec(value).map(Bytes::from).map_err(TestError::from);
        self.header("content-type", "application/json")
    }

    /// Sets a raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Ok(body.into());
        self
    }

    /// Sends the request, failing on build errors.
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        let body = self.body?;
        let mut builder = Request::builder().method(self.method).uri(self.uri);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let request = builder
            .body(body)
            .map_err(|e| TestError::RequestBuild(e.to_string()))?;
        let response = self.client.front.serve(request, self.client.remote_addr).await;
        TestResponse::from_http(response).await
    }

    /// Sends the request.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body cannot be read.
    pub async fn send(self) -> TestResponse {
        match self.try_send().await {
            Ok(response) => response,
            Err(e) => panic!("test request failed: {e}"),
        }
    }
}
