//! Request/response descriptors and the downstream handler contract.

use crate::error::Result;
use bytes::Bytes;
use std::collections::HashMap;

/// Incoming request as seen by behaviours. Behaviours only ever borrow it.
pub type Request = hyper::Request<Bytes>;

/// Response produced by a behaviour or by the downstream handler.
pub type Response = hyper::Response<Bytes>;

/// The rest of the request pipeline.
///
/// Behaviours decide whether to call it, delay it, or bypass it entirely.
pub trait Handler: Send + Sync {
    fn handle(&self, request: &Request) -> Result<Response>;
}

impl<F> Handler for F
where
    F: Fn(&Request) -> Result<Response> + Send + Sync,
{
    fn handle(&self, request: &Request) -> Result<Response> {
        self(request)
    }
}

/// Parse the query string of a request into a map.
///
/// Values are percent-decoded; keys without `=` map to an empty string.
/// When a key repeats, the last value wins.
pub fn query_params(request: &Request) -> HashMap<String, String> {
    parse_query_string(request.uri().query())
}

pub fn parse_query_string(query: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    if let Some(q) = query {
        for pair in q.split('&') {
            if let Some((key, value)) = pair.split_once('=') {
                params.insert(decode(key), decode(value));
            } else if !pair.is_empty() {
                params.insert(decode(pair), String::new());
            }
        }
    }
    params
}

fn decode(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    urlencoding::decode(&raw)
        .map(|s| s.into_owned())
        .unwrap_or(raw)
}

/// Look up a single query parameter without building the whole map.
pub fn query_param(request: &Request, name: &str) -> Option<String> {
    let query = request.uri().query()?;
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| match pair.split_once('=') {
            Some((key, value)) => Some((decode(key), decode(value))),
            None => Some((decode(pair), String::new())),
        })
        .filter(|(key, _)| key == name)
        .last()
        .map(|(_, value)| value)
}

/// Downstream handler that always answers with the same body.
///
/// Used by the server when no upstream is configured.
#[derive(Debug, Clone)]
pub struct StaticHandler {
    status: hyper::StatusCode,
    body: Bytes,
}

impl StaticHandler {
    pub fn new(status: hyper::StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

impl Default for StaticHandler {
    fn default() -> Self {
        Self::new(hyper::StatusCode::OK, "OK")
    }
}

impl Handler for StaticHandler {
    fn handle(&self, _request: &Request) -> Result<Response> {
        let response = hyper::Response::builder()
            .status(self.status)
            .header(hyper::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(self.body.clone())?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str) -> Request {
        hyper::Request::builder().uri(uri).body(Bytes::new()).unwrap()
    }

    #[test]
    fn test_query_params_decoding() {
        let req = request("/search?q=hello%20world&flag&name=a+b");
        let params = query_params(&req);
        assert_eq!(params.get("q").map(String::as_str), Some("hello world"));
        assert_eq!(params.get("flag").map(String::as_str), Some(""));
        assert_eq!(params.get("name").map(String::as_str), Some("a b"));
    }

    #[test]
    fn test_query_param_last_value_wins() {
        let req = request("/?delay=1&delay=2");
        assert_eq!(query_param(&req, "delay").as_deref(), Some("2"));
        assert_eq!(query_param(&req, "missing"), None);
    }

    #[test]
    fn test_no_query_string() {
        let req = request("/plain");
        assert!(query_params(&req).is_empty());
        assert_eq!(query_param(&req, "x"), None);
    }

    #[test]
    fn test_closure_is_handler() {
        let handler = |_: &Request| -> Result<Response> {
            Ok(hyper::Response::builder()
                .status(204)
                .body(Bytes::new())
                .unwrap())
        };
        let response = handler.handle(&request("/")).unwrap();
        assert_eq!(response.status(), 204);
    }

    #[test]
    fn test_static_handler() {
        let handler = StaticHandler::default();
        let response = handler.handle(&request("/anything")).unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.body().as_ref(), b"OK");
    }
}
