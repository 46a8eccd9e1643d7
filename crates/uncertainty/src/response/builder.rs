use crate::error::{BehaviourError, Result};
use crate::handler::Response;
use bytes::Bytes;
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE};
use hyper::http::{HeaderName, HeaderValue};
use hyper::{HeaderMap, StatusCode};

pub struct ResponseBuilder {
    status: StatusCode,
    body: Bytes,
    headers: HeaderMap,
}

impl ResponseBuilder {
    pub fn new(status_code: StatusCode) -> Self {
        ResponseBuilder {
            status: status_code,
            body: Bytes::new(),
            headers: Default::default(),
        }
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a header, replacing any previous value under the same name.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::try_from(name)
            .map_err(|e| BehaviourError::InvalidResponse(format!("header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| BehaviourError::InvalidResponse(format!("header '{name}': {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn merge_headers<'a, H>(mut self, headers: H) -> Result<Self>
    where
        H: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (key, value) in headers {
            self = self.header(key, value)?;
        }
        Ok(self)
    }

    /// Build the response. Content-Length always reflects the actual body.
    pub fn build(self) -> Result<Response> {
        let content_length = self.body.len();
        let mut response = hyper::Response::builder()
            .status(self.status)
            .body(self.body)?;

        let headers = response.headers_mut();
        headers.extend(self.headers);
        headers.insert(CONTENT_LENGTH, HeaderValue::from(content_length));
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static(super::DEFAULT_CONTENT_TYPE),
            );
        }
        Ok(response)
    }
}
