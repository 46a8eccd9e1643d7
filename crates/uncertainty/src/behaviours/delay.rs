//! Delay behaviours - add blocking latency around an inner behaviour.

use super::Behaviour;
use crate::error::Result;
use crate::handler::{query_param, Handler, Request, Response};
use hyper::header::HeaderName;
use rand::Rng;
use std::time::Duration;
use tracing::debug;

/// Where the delay length comes from. Evaluated fresh on every invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum DelaySource {
    /// Fixed number of seconds
    Fixed(f64),
    /// Uniformly distributed between `min` and `max` seconds
    Uniform { min: f64, max: f64 },
    /// Seconds read from a query parameter, `default` when absent or invalid
    Query { param: String, default: f64 },
    /// Seconds read from a request header, `default` when absent or invalid
    Header { name: HeaderName, default: f64 },
}

/// Cap on delays read from the request itself.
pub const MAX_REQUEST_DELAY_SECS: f64 = 300.0;

impl DelaySource {
    pub fn duration<R: Rng + ?Sized>(&self, request: &Request, rng: &mut R) -> Duration {
        let seconds = match self {
            DelaySource::Fixed(seconds) => *seconds,
            DelaySource::Uniform { min, max } => {
                // gen_range panics on non-finite bounds or an overflowing span
                if max > min && (max - min).is_finite() {
                    rng.gen_range(*min..=*max)
                } else {
                    *min
                }
            }
            DelaySource::Query { param, default } => {
                request_seconds(query_param(request, param).as_deref(), *default)
            }
            DelaySource::Header { name, default } => request_seconds(
                request.headers().get(name).and_then(|v| v.to_str().ok()),
                *default,
            ),
        };
        seconds_to_duration(seconds)
    }
}

/// Parse a client-supplied delay. Unparsable or non-finite values fall back to
/// `default`; anything else is capped at [`MAX_REQUEST_DELAY_SECS`].
fn request_seconds(raw: Option<&str>, default: f64) -> f64 {
    raw.and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|seconds| seconds.is_finite())
        .map(|seconds| seconds.min(MAX_REQUEST_DELAY_SECS))
        .unwrap_or(default)
}

impl From<f64> for DelaySource {
    fn from(seconds: f64) -> Self {
        DelaySource::Fixed(seconds)
    }
}

impl From<Duration> for DelaySource {
    fn from(duration: Duration) -> Self {
        DelaySource::Fixed(duration.as_secs_f64())
    }
}

/// Non-positive and NaN values are no-op delays.
fn seconds_to_duration(seconds: f64) -> Duration {
    if seconds.is_nan() || seconds <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelayPhase {
    /// Sleep, then invoke the inner behaviour
    #[default]
    BeforeResponse,
    /// Invoke the inner behaviour, then sleep before returning its response
    AfterResponse,
}

#[derive(Debug, Clone)]
pub struct Delay {
    inner: Box<Behaviour>,
    source: DelaySource,
    phase: DelayPhase,
}

impl Delay {
    pub fn new(inner: Behaviour, source: impl Into<DelaySource>, phase: DelayPhase) -> Self {
        Self {
            inner: Box::new(inner),
            source: source.into(),
            phase,
        }
    }

    pub fn source(&self) -> &DelaySource {
        &self.source
    }

    pub fn phase(&self) -> DelayPhase {
        self.phase
    }

    pub(super) fn invoke_with_rng<R: Rng + ?Sized>(
        &self,
        next: &dyn Handler,
        request: &Request,
        rng: &mut R,
    ) -> Result<Response> {
        let duration = self.source.duration(request, rng);
        match self.phase {
            DelayPhase::BeforeResponse => {
                pause(duration);
                self.inner.invoke_with_rng(next, request, rng)
            }
            DelayPhase::AfterResponse => {
                let response = self.inner.invoke_with_rng(next, request, rng)?;
                pause(duration);
                Ok(response)
            }
        }
    }
}

/// Blocks the calling thread only.
fn pause(duration: Duration) {
    if duration.is_zero() {
        return;
    }
    debug!("Delaying response by {}ms", duration.as_millis());
    std::thread::sleep(duration);
}

/// Sleep before invoking `inner`.
pub fn delay(inner: Behaviour, source: impl Into<DelaySource>) -> Behaviour {
    Delay::new(inner, source, DelayPhase::BeforeResponse).into()
}

/// Invoke `inner`, then sleep before handing its response back.
pub fn delay_response(inner: Behaviour, source: impl Into<DelaySource>) -> Behaviour {
    Delay::new(inner, source, DelayPhase::AfterResponse).into()
}
