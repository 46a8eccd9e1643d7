//! Fixed-outcome behaviours.
//!
//! Every constructor here follows the same rule for its options: the
//! outcome's own defaults (status, content type, `Allow` header, ...) are laid
//! down first and the caller's [`ResponseOptions`] are merged on top, so an
//! explicit caller value always wins. `not_found` with an explicit status of
//! 410 answers 410.

use super::Behaviour;
use crate::error::Result;
use crate::handler::Response;
use crate::response::{ResponseFactory, ResponseOptions, JSON_CONTENT_TYPE};
use bytes::Bytes;
use hyper::{Method, StatusCode};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

type RenderFn = dyn Fn() -> serde_json::Result<Vec<u8>> + Send + Sync;

/// A JSON body serialized on every invocation.
#[derive(Clone)]
struct JsonBody(Arc<RenderFn>);

impl fmt::Debug for JsonBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JsonBody(..)")
    }
}

/// Answers with a response built from captured options; never calls the
/// downstream handler.
#[derive(Debug, Clone)]
pub struct HttpOutcome {
    factory: ResponseFactory,
    options: ResponseOptions,
    json: Option<JsonBody>,
}

impl HttpOutcome {
    pub fn new(factory: ResponseFactory, options: ResponseOptions) -> Self {
        Self {
            factory,
            options,
            json: None,
        }
    }

    /// Standard factory with `defaults` merged under `options`.
    pub fn with_defaults(defaults: ResponseOptions, options: ResponseOptions) -> Self {
        Self::new(ResponseFactory::default(), defaults.merge(options))
    }

    pub fn options(&self) -> &ResponseOptions {
        &self.options
    }

    pub fn respond(&self) -> Result<Response> {
        let mut options = self.options.clone();
        if let Some(json) = &self.json {
            options.body = Some(Bytes::from((json.0)()?));
        }
        self.factory.build(options)
    }
}

pub fn html(options: ResponseOptions) -> Behaviour {
    HttpOutcome::with_defaults(ResponseOptions::new().status(StatusCode::OK), options).into()
}

pub fn ok(options: ResponseOptions) -> Behaviour {
    html(options)
}

pub fn status(code: StatusCode, options: ResponseOptions) -> Behaviour {
    HttpOutcome::with_defaults(ResponseOptions::new().status(code), options).into()
}

pub fn bad_request(options: ResponseOptions) -> Behaviour {
    status(StatusCode::BAD_REQUEST, options)
}

pub fn forbidden(options: ResponseOptions) -> Behaviour {
    status(StatusCode::FORBIDDEN, options)
}

/// 405 with an `Allow` header listing `permitted`.
pub fn not_allowed(permitted: &[Method], options: ResponseOptions) -> Behaviour {
    let allow = permitted
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let defaults = ResponseOptions::new()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header("allow", allow);
    HttpOutcome::with_defaults(defaults, options).into()
}

pub fn server_error(options: ResponseOptions) -> Behaviour {
    status(StatusCode::INTERNAL_SERVER_ERROR, options)
}

pub fn not_found(options: ResponseOptions) -> Behaviour {
    status(StatusCode::NOT_FOUND, options)
}

/// JSON body with an `application/json` content type.
///
/// `value` is serialized on each invocation; a value that cannot be
/// represented as JSON fails the request with a serialization error. The
/// serialized value replaces any body given in `options`.
pub fn json<T>(value: T, options: ResponseOptions) -> Behaviour
where
    T: Serialize + Send + Sync + 'static,
{
    let defaults = ResponseOptions::new()
        .status(StatusCode::OK)
        .content_type(JSON_CONTENT_TYPE);
    let mut outcome = HttpOutcome::with_defaults(defaults, options);
    outcome.json = Some(JsonBody(Arc::new(move || serde_json::to_vec(&value))));
    outcome.into()
}

/// A truncated JSON document served as `application/json`.
pub fn malformed_json(options: ResponseOptions) -> Behaviour {
    let defaults = ResponseOptions::new()
        .status(StatusCode::OK)
        .content_type(JSON_CONTENT_TYPE)
        .body(Bytes::from_static(br#"{"data": [{"id": 1, "name": "#));
    HttpOutcome::with_defaults(defaults, options).into()
}
