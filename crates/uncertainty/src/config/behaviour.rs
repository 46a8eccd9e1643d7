//! Behaviour tree configuration.

use super::predicate::PredicateConfig;
use crate::behaviours::{
    self, Behaviour, Conditional, Delay, DelayPhase, DelaySource, MultiConditional, RandomChoice,
};
use crate::error::{BehaviourError, Result};
use crate::response::ResponseOptions;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declarative behaviour tree, selected by its `type` field.
///
/// ```yaml
/// type: multi_conditional
/// cases:
///   - when: { method: GET }
///     then:
///       type: random_choice
///       choices:
///         - { weight: 9, behaviour: { type: default } }
///         - { weight: 1, behaviour: { type: server_error } }
/// default:
///   type: not_allowed
///   permitted: [GET]
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BehaviourConfig {
    /// Forward to the downstream handler
    #[serde(alias = "pass_through")]
    Default,
    Ok(ResponseConfig),
    Html(ResponseConfig),
    /// Arbitrary status; `status` is required
    Status(ResponseConfig),
    BadRequest(ResponseConfig),
    Forbidden(ResponseConfig),
    NotAllowed(NotAllowedConfig),
    ServerError(ResponseConfig),
    NotFound(ResponseConfig),
    Json(JsonConfig),
    MalformedJson(ResponseConfig),
    Delay(DelayBehaviourConfig),
    Conditional(ConditionalConfig),
    MultiConditional(MultiConditionalConfig),
    RandomChoice(RandomChoiceConfig),
}

/// Caller options for fixed outcomes.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ResponseConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct NotAllowedConfig {
    #[serde(default)]
    pub permitted: Vec<String>,
    #[serde(flatten)]
    pub response: ResponseConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct JsonConfig {
    pub value: serde_json::Value,
    #[serde(flatten)]
    pub response: ResponseConfig,
}

/// Delay length: seconds, `{min, max}`, `{query, default}` or `{header, default}`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum DelayConfig {
    Seconds(f64),
    Uniform {
        min: f64,
        max: f64,
    },
    Query {
        query: String,
        #[serde(default)]
        default: f64,
    },
    Header {
        header: String,
        #[serde(default)]
        default: f64,
    },
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseConfig {
    #[default]
    Before,
    After,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DelayBehaviourConfig {
    pub seconds: DelayConfig,
    #[serde(default)]
    pub phase: PhaseConfig,
    /// Wrapped behaviour; pass-through when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behaviour: Option<Box<BehaviourConfig>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ConditionalConfig {
    pub when: PredicateConfig,
    pub then: Box<BehaviourConfig>,
    #[serde(default, rename = "else", skip_serializing_if = "Option::is_none")]
    pub otherwise: Option<Box<BehaviourConfig>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CaseConfig {
    pub when: PredicateConfig,
    pub then: BehaviourConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MultiConditionalConfig {
    pub cases: Vec<CaseConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Box<BehaviourConfig>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ChoiceConfig {
    pub weight: f64,
    pub behaviour: BehaviourConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RandomChoiceConfig {
    pub choices: Vec<ChoiceConfig>,
}

impl ResponseConfig {
    pub fn to_options(&self) -> Result<ResponseOptions> {
        let mut options = ResponseOptions::new();
        if let Some(code) = self.status {
            let status = StatusCode::from_u16(code).map_err(|_| {
                BehaviourError::configuration(format!("Invalid status code {code}"))
            })?;
            options = options.status(status);
        }
        if let Some(body) = &self.body {
            options = options.body(body.clone());
        }
        if let Some(content_type) = &self.content_type {
            HeaderValue::from_str(content_type).map_err(|e| {
                BehaviourError::configuration(format!("Invalid content type '{content_type}': {e}"))
            })?;
            options = options.content_type(content_type.clone());
        }
        for (name, value) in &self.headers {
            HeaderName::try_from(name.as_str()).map_err(|e| {
                BehaviourError::configuration(format!("Invalid header name '{name}': {e}"))
            })?;
            HeaderValue::from_str(value).map_err(|e| {
                BehaviourError::configuration(format!("Invalid value for header '{name}': {e}"))
            })?;
            options = options.header(name, value.clone());
        }
        Ok(options)
    }
}

fn finite_seconds(field: &str, seconds: f64) -> Result<f64> {
    if seconds.is_finite() {
        Ok(seconds)
    } else {
        Err(BehaviourError::configuration(format!(
            "Delay {field} must be a finite number of seconds, got {seconds}"
        )))
    }
}

impl DelayConfig {
    pub fn to_source(&self) -> Result<DelaySource> {
        let source = match self {
            DelayConfig::Seconds(seconds) => {
                DelaySource::Fixed(finite_seconds("seconds", *seconds)?)
            }
            DelayConfig::Uniform { min, max } => {
                let min = finite_seconds("min", *min)?;
                let max = finite_seconds("max", *max)?;
                if min > max {
                    return Err(BehaviourError::configuration(format!(
                        "Delay min ({min}) is greater than max ({max})"
                    )));
                }
                DelaySource::Uniform { min, max }
            }
            DelayConfig::Query { query, default } => DelaySource::Query {
                param: query.clone(),
                default: finite_seconds("default", *default)?,
            },
            DelayConfig::Header { header, default } => DelaySource::Header {
                name: HeaderName::try_from(header.as_str()).map_err(|e| {
                    BehaviourError::configuration(format!("Invalid header name '{header}': {e}"))
                })?,
                default: finite_seconds("default", *default)?,
            },
        };
        Ok(source)
    }
}

impl BehaviourConfig {
    /// Compile the configuration into a behaviour tree.
    ///
    /// All validation (weights, delay bounds, status codes, regexes, header
    /// names and values) happens
    /// here so that a tree that builds cannot fail for configuration reasons
    /// at request time.
    pub fn build(&self) -> Result<Behaviour> {
        let behaviour = match self {
            BehaviourConfig::Default => behaviours::default(),
            BehaviourConfig::Ok(response) => behaviours::ok(response.to_options()?),
            BehaviourConfig::Html(response) => behaviours::html(response.to_options()?),
            BehaviourConfig::Status(response) => {
                let options = response.to_options()?;
                let code = options.status.ok_or_else(|| {
                    BehaviourError::configuration("'status' behaviour requires a status code")
                })?;
                behaviours::status(code, options)
            }
            BehaviourConfig::BadRequest(response) => behaviours::bad_request(response.to_options()?),
            BehaviourConfig::Forbidden(response) => behaviours::forbidden(response.to_options()?),
            BehaviourConfig::NotAllowed(config) => {
                let permitted = config
                    .permitted
                    .iter()
                    .map(|m| {
                        Method::from_bytes(m.to_ascii_uppercase().as_bytes()).map_err(|_| {
                            BehaviourError::configuration(format!("Invalid HTTP method '{m}'"))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                behaviours::not_allowed(&permitted, config.response.to_options()?)
            }
            BehaviourConfig::ServerError(response) => {
                behaviours::server_error(response.to_options()?)
            }
            BehaviourConfig::NotFound(response) => behaviours::not_found(response.to_options()?),
            BehaviourConfig::Json(config) => {
                behaviours::json(config.value.clone(), config.response.to_options()?)
            }
            BehaviourConfig::MalformedJson(response) => {
                behaviours::malformed_json(response.to_options()?)
            }
            BehaviourConfig::Delay(config) => {
                let inner = match &config.behaviour {
                    Some(inner) => inner.build()?,
                    None => behaviours::default(),
                };
                let phase = match config.phase {
                    PhaseConfig::Before => DelayPhase::BeforeResponse,
                    PhaseConfig::After => DelayPhase::AfterResponse,
                };
                Delay::new(inner, config.seconds.to_source()?, phase).into()
            }
            BehaviourConfig::Conditional(config) => {
                let otherwise = match &config.otherwise {
                    Some(otherwise) => otherwise.build()?,
                    None => behaviours::default(),
                };
                Conditional::shared(config.when.build()?, config.then.build()?, otherwise).into()
            }
            BehaviourConfig::MultiConditional(config) => {
                let mut multi = MultiConditional::new();
                for case in &config.cases {
                    multi = multi.shared_case(case.when.build()?, case.then.build()?);
                }
                if let Some(default) = &config.default {
                    multi = multi.otherwise(default.build()?);
                }
                multi.into()
            }
            BehaviourConfig::RandomChoice(config) => {
                let choices = config
                    .choices
                    .iter()
                    .map(|choice| -> Result<(f64, Behaviour)> {
                        Ok((choice.weight, choice.behaviour.build()?))
                    })
                    .collect::<Result<Vec<_>>>()?;
                RandomChoice::new(choices)?.into()
            }
        };
        Ok(behaviour)
    }
}
