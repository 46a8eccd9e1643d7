use crate::behaviours::Behaviour;
use crate::error::{BehaviourError, Result};
use crate::handler::{Handler, Request, Response};
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub enum PathPattern {
    Exact(String),
    Prefix(String),
    Regex(Arc<Regex>),
}

impl PathPattern {
    pub fn exact(path: impl Into<String>) -> Self {
        PathPattern::Exact(path.into())
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        PathPattern::Prefix(prefix.into())
    }

    pub fn regex(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| {
            BehaviourError::configuration(format!("Invalid route regex '{pattern}': {e}"))
        })?;
        Ok(PathPattern::Regex(Arc::new(regex)))
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(p) => path == p,
            PathPattern::Prefix(p) => path.starts_with(p.as_str()),
            PathPattern::Regex(r) => r.is_match(path),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Route {
    pub name: String,
    pub pattern: PathPattern,
    pub behaviour: Arc<Behaviour>,
}

impl Route {
    pub fn new(name: impl Into<String>, pattern: PathPattern, behaviour: Behaviour) -> Self {
        Self {
            name: name.into(),
            pattern,
            behaviour: Arc::new(behaviour),
        }
    }
}

/// Maps request paths to behaviours
///
/// Routes are checked in the order they were added; the first whose pattern
/// matches the request path handles it. Requests matching no route go straight
/// to the downstream handler.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    routes: Vec<Route>,
}

impl Dispatcher {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    pub fn route(mut self, name: impl Into<String>, pattern: PathPattern, behaviour: Behaviour) -> Self {
        self.routes.push(Route::new(name, pattern, behaviour));
        self
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn match_path(&self, path: &str) -> Option<&Route> {
        // First-match-wins
        self.routes.iter().find(|route| route.pattern.matches(path))
    }

    pub fn dispatch(&self, next: &dyn Handler, request: &Request) -> Result<Response> {
        match self.match_path(request.uri().path()) {
            Some(route) => {
                debug!("{} {} matched route '{}'", request.method(), request.uri().path(), route.name);
                route.behaviour.invoke(next, request)
            }
            None => next.handle(request),
        }
    }
}
