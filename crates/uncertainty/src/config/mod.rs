//! Configuration types for the uncertainty server.
//!
//! A single YAML document, loaded once at startup, describes where to listen,
//! where to forward pass-through traffic and which behaviour tree answers each
//! route:
//!
//! ```yaml
//! listen:
//!   port: 8080
//! upstream:
//!   url: http://127.0.0.1:3000
//! routes:
//!   - path: /flaky
//!     behaviour:
//!       type: random_choice
//!       choices:
//!         - { weight: 1, behaviour: { type: ok } }
//!         - { weight: 1, behaviour: { type: server_error } }
//! ```

mod behaviour;
mod predicate;

use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dispatch::{Dispatcher, Route};
use crate::error::BehaviourError;

pub use behaviour::{
    BehaviourConfig, CaseConfig, ChoiceConfig, ConditionalConfig, DelayBehaviourConfig,
    DelayConfig, JsonConfig, MultiConditionalConfig, NotAllowedConfig, PhaseConfig,
    RandomChoiceConfig, ResponseConfig,
};
pub use predicate::{PathConfig, PredicateConfig};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,
    /// Where pass-through traffic goes. Without it, pass-through requests get
    /// a plain 200 response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<UpstreamConfig>,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl ListenConfig {
    /// Resolve `host:port`; `host` may be an IP address or a hostname.
    pub async fn socket_addr(&self) -> Result<SocketAddr, anyhow::Error> {
        tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to resolve listen host '{}': {}", self.host, e))?
            .next()
            .ok_or_else(|| anyhow::anyhow!("Listen host '{}' resolved to no address", self.host))
    }
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Base URL, e.g. `http://127.0.0.1:3000`
    pub url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Name used in logs; defaults to `route_<index>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub path: PathConfig,
    pub behaviour: BehaviourConfig,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, anyhow::Error> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let Some(upstream) = &self.upstream {
            let uri: hyper::Uri = upstream
                .url
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid upstream url '{}': {}", upstream.url, e))?;
            match uri.scheme_str() {
                Some("http") => {}
                Some(other) => anyhow::bail!(
                    "Unsupported upstream scheme '{}'. Currently supported: http",
                    other
                ),
                None => anyhow::bail!("Upstream url '{}' is missing a scheme", upstream.url),
            }
            if uri.host().is_none() {
                anyhow::bail!("Upstream url '{}' is missing a host", upstream.url);
            }
        }

        // Building the dispatcher runs every behaviour-level check.
        self.build_dispatcher()?;
        Ok(())
    }

    /// Compile the configured routes, in order, into a dispatcher.
    pub fn build_dispatcher(&self) -> Result<Dispatcher, BehaviourError> {
        let routes = self
            .routes
            .iter()
            .enumerate()
            .map(|(i, route)| {
                let name = route
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("route_{i}"));
                let pattern = route.path.compile()?;
                let behaviour = route.behaviour.build().map_err(|e| match e {
                    BehaviourError::Configuration(msg) => {
                        BehaviourError::Configuration(format!("route '{name}': {msg}"))
                    }
                    other => other,
                })?;
                debug!("Route '{}' -> {}", name, behaviour);
                Ok(Route::new(name, pattern, behaviour))
            })
            .collect::<Result<Vec<_>, BehaviourError>>()?;
        Ok(Dispatcher::new(routes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FLAKY: &str = r#"
listen:
  port: 9000
upstream:
  url: http://127.0.0.1:3000
routes:
  - name: flaky
    path: /flaky
    behaviour:
      type: multi_conditional
      cases:
        - when: { method: GET }
          then:
            type: random_choice
            choices:
              - { weight: 1, behaviour: { type: ok } }
              - { weight: 1, behaviour: { type: server_error } }
      default:
        type: not_allowed
        permitted: [GET]
  - path: /slow/*
    behaviour:
      type: delay
      seconds: { query: delay, default: 0 }
"#;

    #[test]
    fn test_parse_config() {
        let config = Config::from_yaml(FLAKY).unwrap();
        assert_eq!(config.listen.port, 9000);
        assert_eq!(config.listen.host, "127.0.0.1");
        assert_eq!(config.upstream.as_ref().unwrap().timeout_ms, 30_000);
        assert_eq!(config.routes.len(), 2);

        let dispatcher = config.build_dispatcher().unwrap();
        assert_eq!(dispatcher.routes()[0].name, "flaky");
        assert_eq!(dispatcher.routes()[1].name, "route_1");
        assert!(dispatcher.match_path("/slow/report").is_some());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config.listen.port, 8080);
        assert!(config.upstream.is_none());
        assert!(config.routes.is_empty());
    }

    #[tokio::test]
    async fn test_listen_host_resolution() {
        let listen = ListenConfig {
            host: "127.0.0.1".to_string(),
            port: 9001,
        };
        assert_eq!(
            listen.socket_addr().await.unwrap(),
            "127.0.0.1:9001".parse::<SocketAddr>().unwrap()
        );

        let listen = ListenConfig {
            host: "localhost".to_string(),
            port: 9002,
        };
        let addr = listen.socket_addr().await.unwrap();
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), 9002);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FLAKY.as_bytes()).unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.routes.len(), 2);
    }

    #[test]
    fn test_invalid_upstream_rejected() {
        let yaml = "upstream:\n  url: ftp://example.com";
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("Unsupported upstream scheme"));

        let yaml = "upstream:\n  url: /relative";
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_invalid_route_reports_name() {
        let yaml = r#"
routes:
  - name: broken
    path: /x
    behaviour:
      type: random_choice
      choices: []
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("route 'broken'"), "{err}");
    }

    #[test]
    fn test_invalid_route_regex_rejected() {
        let yaml = r#"
routes:
  - path: { regex: "([" }
    behaviour: { type: ok }
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }
}
