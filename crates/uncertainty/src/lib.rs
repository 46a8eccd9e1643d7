//! Composable fault injection for HTTP services.
//!
//! Behaviours wrap a downstream [`Handler`] and decide, per request, whether to
//! forward it, answer with a fixed outcome, add latency, or choose among
//! nested behaviours by predicate or weighted chance. A [`Dispatcher`] maps
//! request paths to behaviour trees, and [`FaultServer`] hosts a dispatcher
//! over HTTP.

pub mod behaviours;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod predicate;
pub mod response;
pub mod server;
pub mod upstream;

pub use behaviours::Behaviour;
pub use config::Config;
pub use dispatch::{Dispatcher, PathPattern, Route};
pub use error::{BehaviourError, Result};
pub use handler::{Handler, Request, Response, StaticHandler};
pub use predicate::{Predicate, PredicateExt};
pub use response::{ResponseFactory, ResponseOptions};
pub use server::FaultServer;
pub use upstream::UpstreamHandler;
