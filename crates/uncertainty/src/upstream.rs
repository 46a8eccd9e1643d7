//! Forwarding pass-through traffic to a real upstream.

use crate::config::UpstreamConfig;
use crate::error::{BehaviourError, Result};
use crate::handler::{Handler, Request, Response};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, error};

pub type HttpClient = Client<HttpConnector, Full<Bytes>>;

/// Downstream handler that forwards requests to an HTTP upstream.
///
/// Behaviours run on blocking threads, so `handle` drives the async client by
/// blocking on the runtime it was created in. It must not be called from
/// inside an async task.
#[derive(Clone)]
pub struct UpstreamHandler {
    client: HttpClient,
    base_url: String,
    timeout: Duration,
    runtime: Handle,
}

impl UpstreamHandler {
    /// Create a handler bound to the current tokio runtime.
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            BehaviourError::configuration(format!("Upstream handler needs a tokio runtime: {e}"))
        })?;
        Ok(Self::with_runtime(config, runtime))
    }

    pub fn with_runtime(config: &UpstreamConfig, runtime: Handle) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_millis(config.timeout_ms)));

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .build(connector);

        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(config.timeout_ms),
            runtime,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn upstream_request(&self, request: &Request) -> Result<hyper::Request<Full<Bytes>>> {
        let path = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let full_uri = format!("{}{}", self.base_url, path);
        debug!("Forwarding to: {}", full_uri);

        let mut builder = hyper::Request::builder()
            .method(request.method().clone())
            .uri(full_uri);

        // Copy headers (skip host)
        for (key, value) in request.headers() {
            if key != hyper::header::HOST {
                builder = builder.header(key, value);
            }
        }

        Ok(builder.body(Full::new(request.body().clone()))?)
    }

    async fn forward(&self, request: hyper::Request<Full<Bytes>>) -> Result<Response> {
        let response = self.client.request(request).await.map_err(|e| {
            error!("Failed to forward request to upstream: {}", e);
            BehaviourError::downstream(format!("upstream request failed: {e}"))
        })?;

        let (parts, body) = response.into_parts();
        let body = body.collect().await.map_err(|e| {
            error!("Failed to collect upstream response body: {}", e);
            BehaviourError::downstream(format!("failed to read upstream response: {e}"))
        })?;
        Ok(Response::from_parts(parts, body.to_bytes()))
    }
}

impl std::fmt::Debug for UpstreamHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamHandler")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Handler for UpstreamHandler {
    fn handle(&self, request: &Request) -> Result<Response> {
        let upstream_request = self.upstream_request(request)?;
        let timeout = self.timeout;
        self.runtime.block_on(async {
            match tokio::time::timeout(timeout, self.forward(upstream_request)).await {
                Ok(result) => result,
                Err(_) => Err(BehaviourError::downstream(format!(
                    "upstream did not answer within {}ms",
                    timeout.as_millis()
                ))),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper_util::rt::TokioIo;
    use std::convert::Infallible;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    fn config(url: String, timeout_ms: u64) -> UpstreamConfig {
        UpstreamConfig { url, timeout_ms }
    }

    /// Echo server: answers with the method, path and a marker header.
    async fn spawn_echo() -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                tokio::spawn(async move {
                    let service = service_fn(|req: hyper::Request<hyper::body::Incoming>| async move {
                        let marker = req
                            .headers()
                            .get("x-marker")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("")
                            .to_string();
                        let body = format!(
                            "{} {} {}",
                            req.method(),
                            req.uri().path_and_query().map(|pq| pq.as_str()).unwrap_or("/"),
                            marker
                        );
                        Ok::<_, Infallible>(
                            hyper::Response::builder()
                                .status(201)
                                .header("x-echo", "true")
                                .body(Full::new(Bytes::from(body)))
                                .unwrap(),
                        )
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });
        addr
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_forwards_request_and_response() {
        let addr = spawn_echo().await;
        let handler = Arc::new(UpstreamHandler::new(&config(format!("http://{addr}/"), 2_000)).unwrap());
        assert_eq!(handler.base_url(), format!("http://{addr}"));

        let response = tokio::task::spawn_blocking(move || {
            let request = hyper::Request::builder()
                .method("PUT")
                .uri("/items/3?verbose=1")
                .header("x-marker", "abc")
                .body(Bytes::new())
                .unwrap();
            handler.handle(&request)
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(response.status(), 201);
        assert_eq!(response.headers().get("x-echo").unwrap(), "true");
        assert_eq!(response.body().as_ref(), b"PUT /items/3?verbose=1 abc");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unreachable_upstream_is_downstream_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let handler = UpstreamHandler::new(&config(format!("http://{addr}"), 500)).unwrap();
        let result = tokio::task::spawn_blocking(move || {
            let request = hyper::Request::builder()
                .uri("/")
                .body(Bytes::new())
                .unwrap();
            handler.handle(&request)
        })
        .await
        .unwrap();

        assert!(matches!(result, Err(BehaviourError::Downstream(_))));
    }

    #[test]
    fn test_new_requires_runtime() {
        let err = UpstreamHandler::new(&config("http://127.0.0.1:1".to_string(), 100)).unwrap_err();
        assert!(matches!(err, BehaviourError::Configuration(_)));
    }
}
