//! Request predicates used by conditional behaviours.
//!
//! A predicate is anything that can look at a [`Request`] and answer yes or
//! no. Plain closures `Fn(&Request) -> bool` are predicates; closures that can
//! fail are wrapped with [`fallible`]. The built-in [`RequestPredicate`]
//! covers the common checks (method, path, query, headers) and is what the
//! YAML configuration compiles to.
//!
//! Predicates must be cheap and side-effect free: a multi-conditional
//! evaluates every preceding predicate on each request.

use crate::error::{BehaviourError, Result};
use crate::handler::{query_param, Request};
use hyper::header::HeaderName;
use hyper::Method;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

pub trait Predicate: Send + Sync {
    fn evaluate(&self, request: &Request) -> Result<bool>;
}

impl<F> Predicate for F
where
    F: Fn(&Request) -> bool + Send + Sync,
{
    fn evaluate(&self, request: &Request) -> Result<bool> {
        Ok(self(request))
    }
}

/// Shared, type-erased predicate as stored by behaviours.
pub type SharedPredicate = Arc<dyn Predicate>;

/// Wrap a closure whose evaluation can fail.
///
/// Errors are reported as [`BehaviourError::Predicate`] and abort the request.
pub fn fallible<F, E>(f: F) -> Fallible<F>
where
    F: Fn(&Request) -> std::result::Result<bool, E> + Send + Sync,
    E: fmt::Display,
{
    Fallible(f)
}

pub struct Fallible<F>(F);

impl<F, E> Predicate for Fallible<F>
where
    F: Fn(&Request) -> std::result::Result<bool, E> + Send + Sync,
    E: fmt::Display,
{
    fn evaluate(&self, request: &Request) -> Result<bool> {
        (self.0)(request).map_err(|e| BehaviourError::predicate(e.to_string()))
    }
}

/// Built-in request checks.
#[derive(Debug, Clone)]
pub enum RequestPredicate {
    Always,
    Never,
    Method(Method),
    PathIs(String),
    PathPrefix(String),
    PathMatches(Arc<Regex>),
    HasQueryParam(String),
    QueryEquals { name: String, value: String },
    HasHeader(HeaderName),
    HeaderEquals { name: HeaderName, value: String },
}

impl Predicate for RequestPredicate {
    fn evaluate(&self, request: &Request) -> Result<bool> {
        let matched = match self {
            RequestPredicate::Always => true,
            RequestPredicate::Never => false,
            RequestPredicate::Method(method) => request.method() == method,
            RequestPredicate::PathIs(path) => request.uri().path() == path,
            RequestPredicate::PathPrefix(prefix) => request.uri().path().starts_with(prefix),
            RequestPredicate::PathMatches(regex) => regex.is_match(request.uri().path()),
            RequestPredicate::HasQueryParam(name) => query_param(request, name).is_some(),
            RequestPredicate::QueryEquals { name, value } => {
                query_param(request, name).as_deref() == Some(value.as_str())
            }
            RequestPredicate::HasHeader(name) => request.headers().contains_key(name),
            RequestPredicate::HeaderEquals { name, value } => request
                .headers()
                .get_all(name)
                .iter()
                .any(|v| v.to_str().ok() == Some(value.as_str())),
        };
        Ok(matched)
    }
}

pub fn always() -> RequestPredicate {
    RequestPredicate::Always
}

pub fn never() -> RequestPredicate {
    RequestPredicate::Never
}

pub fn is_method(method: Method) -> RequestPredicate {
    RequestPredicate::Method(method)
}

pub fn is_get() -> RequestPredicate {
    is_method(Method::GET)
}

pub fn is_post() -> RequestPredicate {
    is_method(Method::POST)
}

pub fn is_put() -> RequestPredicate {
    is_method(Method::PUT)
}

pub fn is_patch() -> RequestPredicate {
    is_method(Method::PATCH)
}

pub fn is_delete() -> RequestPredicate {
    is_method(Method::DELETE)
}

pub fn is_head() -> RequestPredicate {
    is_method(Method::HEAD)
}

pub fn is_options() -> RequestPredicate {
    is_method(Method::OPTIONS)
}

pub fn path_is(path: impl Into<String>) -> RequestPredicate {
    RequestPredicate::PathIs(path.into())
}

pub fn path_starts_with(prefix: impl Into<String>) -> RequestPredicate {
    RequestPredicate::PathPrefix(prefix.into())
}

/// Fails with a configuration error when the pattern does not compile.
pub fn path_matches(pattern: &str) -> Result<RequestPredicate> {
    let regex = Regex::new(pattern).map_err(|e| {
        BehaviourError::configuration(format!("Invalid path regex '{pattern}': {e}"))
    })?;
    Ok(RequestPredicate::PathMatches(Arc::new(regex)))
}

pub fn has_query_param(name: impl Into<String>) -> RequestPredicate {
    RequestPredicate::HasQueryParam(name.into())
}

pub fn query_equals(name: impl Into<String>, value: impl Into<String>) -> RequestPredicate {
    RequestPredicate::QueryEquals {
        name: name.into(),
        value: value.into(),
    }
}

pub fn has_header(name: &str) -> Result<RequestPredicate> {
    Ok(RequestPredicate::HasHeader(header_name(name)?))
}

pub fn header_equals(name: &str, value: impl Into<String>) -> Result<RequestPredicate> {
    Ok(RequestPredicate::HeaderEquals {
        name: header_name(name)?,
        value: value.into(),
    })
}

fn header_name(name: &str) -> Result<HeaderName> {
    HeaderName::try_from(name)
        .map_err(|e| BehaviourError::configuration(format!("Invalid header name '{name}': {e}")))
}

/// Matches when every inner predicate matches. Stops at the first miss.
pub struct All(pub Vec<SharedPredicate>);

/// Matches when any inner predicate matches. Stops at the first hit.
pub struct Any(pub Vec<SharedPredicate>);

pub struct Not(pub SharedPredicate);

impl Predicate for All {
    fn evaluate(&self, request: &Request) -> Result<bool> {
        for predicate in &self.0 {
            if !predicate.evaluate(request)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl Predicate for Any {
    fn evaluate(&self, request: &Request) -> Result<bool> {
        for predicate in &self.0 {
            if predicate.evaluate(request)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Predicate for Not {
    fn evaluate(&self, request: &Request) -> Result<bool> {
        Ok(!self.0.evaluate(request)?)
    }
}

pub trait PredicateExt: Predicate + Sized + 'static {
    fn and<P: Predicate + 'static>(self, other: P) -> All {
        All(vec![Arc::new(self), Arc::new(other)])
    }

    fn or<P: Predicate + 'static>(self, other: P) -> Any {
        Any(vec![Arc::new(self), Arc::new(other)])
    }

    fn not(self) -> Not {
        Not(Arc::new(self))
    }

    fn shared(self) -> SharedPredicate {
        Arc::new(self)
    }
}

impl<P: Predicate + Sized + 'static> PredicateExt for P {}
