//! HTTP host for a behaviour dispatcher.

use crate::dispatch::Dispatcher;
use crate::handler::{Handler, Response};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::StatusCode;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Serves every incoming request through a [`Dispatcher`].
pub struct FaultServer {
    addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    downstream: Arc<dyn Handler>,
}

impl FaultServer {
    pub fn new(addr: SocketAddr, dispatcher: Dispatcher, downstream: Arc<dyn Handler>) -> Self {
        Self {
            addr,
            dispatcher: Arc::new(dispatcher),
            downstream,
        }
    }

    pub async fn run(self) -> Result<(), anyhow::Error> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), anyhow::Error> {
        info!(
            "Uncertainty listening on http://{} with {} route(s)",
            listener.local_addr()?,
            self.dispatcher.routes().len()
        );

        loop {
            let (stream, _) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let dispatcher = Arc::clone(&self.dispatcher);
            let downstream = Arc::clone(&self.downstream);

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let dispatcher = Arc::clone(&dispatcher);
                    let downstream = Arc::clone(&downstream);
                    async move { handle_request(req, dispatcher, downstream).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Connection error: {}", e);
                }
            });
        }
    }
}

/// Buffer the request, run the dispatcher on the blocking pool and render the
/// outcome. Failures become a 502 with a JSON error body.
pub async fn handle_request<B>(
    req: hyper::Request<B>,
    dispatcher: Arc<Dispatcher>,
    downstream: Arc<dyn Handler>,
) -> Result<hyper::Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Failed to read request body: {}", e);
            return Ok(error_response(StatusCode::BAD_REQUEST, "Failed to read request body"));
        }
    };
    let request = hyper::Request::from_parts(parts, body);
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let result = tokio::task::spawn_blocking(move || {
        dispatcher.dispatch(downstream.as_ref(), &request)
    })
    .await;

    let response = match result {
        Ok(Ok(response)) => into_full(response),
        Ok(Err(e)) => {
            warn!("{} {} failed: {}", method, path, e);
            error_response(StatusCode::BAD_GATEWAY, &e.to_string())
        }
        Err(e) => {
            warn!("{} {} behaviour task aborted: {}", method, path, e);
            error_response(StatusCode::BAD_GATEWAY, "Behaviour task aborted")
        }
    };
    Ok(response)
}

fn into_full(response: Response) -> hyper::Response<Full<Bytes>> {
    let (parts, body) = response.into_parts();
    hyper::Response::from_parts(parts, Full::new(body))
}

/// JSON error response rendered by the host.
pub fn error_response(status: StatusCode, message: &str) -> hyper::Response<Full<Bytes>> {
    let body = serde_json::json!({ "error": message }).to_string();
    let mut response = hyper::Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviours::{not_allowed, ok};
    use crate::error::BehaviourError;
    use crate::dispatch::PathPattern;
    use crate::handler::{Request, StaticHandler};
    use crate::response::ResponseOptions;
    use hyper::Method;

    fn dispatcher() -> Arc<Dispatcher> {
        Arc::new(
            Dispatcher::default()
                .route(
                    "get-only",
                    PathPattern::exact("/only-get"),
                    not_allowed(&[Method::GET], ResponseOptions::new()),
                )
                .route("ok", PathPattern::prefix("/ok"), ok(ResponseOptions::new())),
        )
    }

    fn request(method: &str, uri: &str, body: &'static str) -> hyper::Request<Full<Bytes>> {
        hyper::Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap()
    }

    async fn body_string(response: hyper::Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_routes_through_dispatcher() {
        let downstream: Arc<dyn Handler> = Arc::new(StaticHandler::default());

        let response = handle_request(request("POST", "/only-get", ""), dispatcher(), downstream.clone())
            .await
            .unwrap();
        assert_eq!(response.status(), 405);
        assert_eq!(response.headers().get("allow").unwrap(), "GET");

        let response = handle_request(request("GET", "/ok/1", ""), dispatcher(), downstream.clone())
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_unmatched_request_sees_body() {
        let echo = |req: &Request| -> crate::error::Result<Response> {
            Ok(hyper::Response::builder()
                .status(202)
                .body(req.body().clone())?)
        };
        let downstream: Arc<dyn Handler> = Arc::new(echo);

        let response = handle_request(request("PUT", "/other", "payload"), dispatcher(), downstream)
            .await
            .unwrap();
        assert_eq!(response.status(), 202);
        assert_eq!(body_string(response).await, "payload");
    }

    #[tokio::test]
    async fn test_errors_become_bad_gateway() {
        let failing = |_: &Request| -> crate::error::Result<Response> {
            Err(BehaviourError::downstream("connection refused"))
        };
        let downstream: Arc<dyn Handler> = Arc::new(failing);

        let response = handle_request(request("GET", "/unrouted", ""), dispatcher(), downstream)
            .await
            .unwrap();
        assert_eq!(response.status(), 502);
        assert_eq!(response.headers().get("content-type").unwrap(), "application/json");

        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(body["error"].as_str().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_error_response_escapes_message() {
        let response = error_response(StatusCode::BAD_GATEWAY, "bad \"quote\"");
        assert_eq!(response.status(), 502);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"], "bad \"quote\"");
    }
}
