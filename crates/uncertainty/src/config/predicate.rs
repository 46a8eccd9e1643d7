//! Predicate configuration.

use crate::dispatch::PathPattern;
use crate::error::{BehaviourError, Result};
use crate::predicate::{self, All, Any, Not, PredicateExt, RequestPredicate, SharedPredicate};
use hyper::Method;
use serde::{Deserialize, Serialize};

/// Declarative request predicate.
///
/// ```yaml
/// when:
///   all:
///     - method: GET
///     - path: { prefix: /api }
///     - not: { has_header: authorization }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PredicateConfig {
    Always,
    Never,
    Method(String),
    Path(PathConfig),
    HasQuery(String),
    QueryEquals { name: String, value: String },
    HasHeader(String),
    HeaderEquals { name: String, value: String },
    All(Vec<PredicateConfig>),
    Any(Vec<PredicateConfig>),
    Not(Box<PredicateConfig>),
}

/// Path match used by both predicates and routes.
///
/// A bare string is an exact match, unless it ends with `*` (prefix) or starts
/// with `~` (regex).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum PathConfig {
    Exact { exact: String },
    Prefix { prefix: String },
    Regex { regex: String },
    Shorthand(String),
}

impl PathConfig {
    pub fn compile(&self) -> Result<PathPattern> {
        match self {
            PathConfig::Exact { exact } => Ok(PathPattern::exact(exact.clone())),
            PathConfig::Prefix { prefix } => Ok(PathPattern::prefix(prefix.clone())),
            PathConfig::Regex { regex } => PathPattern::regex(regex),
            PathConfig::Shorthand(p) => {
                if let Some(regex) = p.strip_prefix('~') {
                    PathPattern::regex(regex)
                } else if let Some(prefix) = p.strip_suffix('*') {
                    Ok(PathPattern::prefix(prefix))
                } else {
                    Ok(PathPattern::exact(p.clone()))
                }
            }
        }
    }
}

impl PredicateConfig {
    pub fn build(&self) -> Result<SharedPredicate> {
        let built = match self {
            PredicateConfig::Always => predicate::always().shared(),
            PredicateConfig::Never => predicate::never().shared(),
            PredicateConfig::Method(method) => {
                let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                    .map_err(|_| {
                        BehaviourError::configuration(format!("Invalid HTTP method '{method}'"))
                    })?;
                predicate::is_method(method).shared()
            }
            PredicateConfig::Path(path) => match path.compile()? {
                PathPattern::Exact(exact) => predicate::path_is(exact).shared(),
                PathPattern::Prefix(prefix) => predicate::path_starts_with(prefix).shared(),
                PathPattern::Regex(regex) => RequestPredicate::PathMatches(regex).shared(),
            },
            PredicateConfig::HasQuery(name) => predicate::has_query_param(name.clone()).shared(),
            PredicateConfig::QueryEquals { name, value } => {
                predicate::query_equals(name.clone(), value.clone()).shared()
            }
            PredicateConfig::HasHeader(name) => predicate::has_header(name)?.shared(),
            PredicateConfig::HeaderEquals { name, value } => {
                predicate::header_equals(name, value.clone())?.shared()
            }
            PredicateConfig::All(inner) => All(build_all(inner)?).shared(),
            PredicateConfig::Any(inner) => Any(build_all(inner)?).shared(),
            PredicateConfig::Not(inner) => Not(inner.build()?).shared(),
        };
        Ok(built)
    }
}

fn build_all(configs: &[PredicateConfig]) -> Result<Vec<SharedPredicate>> {
    configs.iter().map(PredicateConfig::build).collect()
}
