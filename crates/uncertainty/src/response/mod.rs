//! Response construction.
//!
//! Behaviours never build `hyper` responses directly. They capture a
//! [`ResponseOptions`] record at construction time and hand it to an injected
//! [`ResponseFactory`] on every invocation, so hosts can swap in their own
//! response type conventions.

mod builder;

pub use builder::ResponseBuilder;

use crate::error::Result;
use crate::handler::Response;
use bytes::Bytes;
use hyper::StatusCode;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_CONTENT_TYPE: &str = "text/html; charset=utf-8";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Options forwarded verbatim to a [`ResponseFactory`].
///
/// Every field is optional so that two records can be layered with
/// [`ResponseOptions::merge`]. Header names are stored lowercased.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseOptions {
    pub status: Option<StatusCode>,
    pub body: Option<Bytes>,
    pub content_type: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl ResponseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Layer `overrides` on top of `self`.
    ///
    /// `self` holds the defaults; any field set in `overrides` wins, and
    /// override headers replace default headers with the same name.
    pub fn merge(mut self, overrides: ResponseOptions) -> ResponseOptions {
        if overrides.status.is_some() {
            self.status = overrides.status;
        }
        if overrides.body.is_some() {
            self.body = overrides.body;
        }
        if overrides.content_type.is_some() {
            self.content_type = overrides.content_type;
        }
        self.headers.extend(overrides.headers);
        self
    }
}

type FactoryFn = dyn Fn(ResponseOptions) -> Result<Response> + Send + Sync;

/// Injected response-constructor capability.
#[derive(Clone)]
pub struct ResponseFactory(Arc<FactoryFn>);

impl ResponseFactory {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(ResponseOptions) -> Result<Response> + Send + Sync + 'static,
    {
        ResponseFactory(Arc::new(f))
    }

    pub fn build(&self, options: ResponseOptions) -> Result<Response> {
        (self.0)(options)
    }
}

impl Default for ResponseFactory {
    fn default() -> Self {
        ResponseFactory::new(standard_response)
    }
}

impl fmt::Debug for ResponseFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResponseFactory(..)")
    }
}

/// Default factory: 200 with an HTML content type unless told otherwise.
pub fn standard_response(options: ResponseOptions) -> Result<Response> {
    let mut builder = ResponseBuilder::new(options.status.unwrap_or(StatusCode::OK))
        .body(options.body.unwrap_or_default())
        .merge_headers(&options.headers)?;
    if let Some(content_type) = &options.content_type {
        builder = builder.header("content-type", content_type)?;
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_overrides_win() {
        let defaults = ResponseOptions::new()
            .status(StatusCode::NOT_FOUND)
            .header("X-Source", "default")
            .header("X-Keep", "yes");
        let overrides = ResponseOptions::new()
            .status(StatusCode::GONE)
            .header("x-source", "caller");

        let merged = defaults.merge(overrides);
        assert_eq!(merged.status, Some(StatusCode::GONE));
        assert_eq!(merged.headers.get("x-source").unwrap(), "caller");
        assert_eq!(merged.headers.get("x-keep").unwrap(), "yes");
    }

    #[test]
    fn test_merge_keeps_defaults_when_unset() {
        let defaults = ResponseOptions::new()
            .status(StatusCode::NOT_FOUND)
            .body("missing");
        let merged = defaults.clone().merge(ResponseOptions::new());
        assert_eq!(merged, defaults);
    }

    #[test]
    fn test_standard_response() {
        let response = standard_response(
            ResponseOptions::new()
                .status(StatusCode::ACCEPTED)
                .body("queued")
                .content_type("text/plain")
                .header("Retry-After", "5"),
        )
        .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.body().as_ref(), b"queued");
        assert_eq!(response.headers().get("content-type").unwrap(), "text/plain");
        assert_eq!(response.headers().get("retry-after").unwrap(), "5");
    }

    #[test]
    fn test_custom_factory_receives_options() {
        let factory = ResponseFactory::new(|options: ResponseOptions| {
            let status = options.status.unwrap_or(StatusCode::IM_A_TEAPOT);
            Ok(hyper::Response::builder()
                .status(status)
                .body(Bytes::from_static(b"custom"))?)
        });

        let response = factory.build(ResponseOptions::new()).unwrap();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(response.body().as_ref(), b"custom");
    }
}
