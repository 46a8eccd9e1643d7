//! Behaviour composition engine.
//!
//! A [`Behaviour`] decides how a request is answered: forward it, answer it
//! with a fixed outcome, slow it down, or pick among nested behaviours by
//! predicate or by weighted chance. Trees are built once at configuration
//! load, are immutable afterwards and are shared across concurrent requests.
//!
//! - `outcome` - fixed responses that short-circuit the pipeline
//! - `delay` - blocking latency before or after an inner behaviour
//! - `conditional` - predicate gates (single and first-match-wins lists)
//! - `choice` - weighted random selection

mod choice;
mod conditional;
mod delay;
mod outcome;

pub use choice::RandomChoice;
pub use conditional::{Conditional, MultiConditional};
pub use delay::{delay, delay_response, Delay, DelayPhase, DelaySource, MAX_REQUEST_DELAY_SECS};
pub use outcome::{
    bad_request, forbidden, html, json, malformed_json, not_allowed, not_found, ok,
    server_error, status, HttpOutcome,
};

use crate::error::Result;
use crate::handler::{Handler, Request, Response};
use rand::Rng;
use std::fmt;

#[derive(Debug, Clone, Default)]
pub enum Behaviour {
    /// Forward to the downstream handler untouched.
    #[default]
    PassThrough,
    Outcome(HttpOutcome),
    Delay(Delay),
    Conditional(Conditional),
    MultiConditional(MultiConditional),
    RandomChoice(RandomChoice),
}

/// The pass-through behaviour.
pub fn default() -> Behaviour {
    Behaviour::PassThrough
}

impl Behaviour {
    /// Answer `request`, using the thread-local random source for any
    /// weighted or randomized decisions in the tree.
    pub fn invoke(&self, next: &dyn Handler, request: &Request) -> Result<Response> {
        self.invoke_with_rng(next, request, &mut rand::thread_rng())
    }

    /// Same as [`Behaviour::invoke`] but with an explicit random source, so
    /// callers can make selection reproducible.
    pub fn invoke_with_rng<R: Rng + ?Sized>(
        &self,
        next: &dyn Handler,
        request: &Request,
        rng: &mut R,
    ) -> Result<Response> {
        match self {
            Behaviour::PassThrough => next.handle(request),
            Behaviour::Outcome(outcome) => outcome.respond(),
            Behaviour::Delay(delay) => delay.invoke_with_rng(next, request, rng),
            Behaviour::Conditional(conditional) => {
                conditional.select(request)?.invoke_with_rng(next, request, rng)
            }
            Behaviour::MultiConditional(multi) => {
                multi.select(request)?.invoke_with_rng(next, request, rng)
            }
            Behaviour::RandomChoice(choice) => {
                choice.select(rng).invoke_with_rng(next, request, rng)
            }
        }
    }

}

/// One-line summary of the top of a behaviour tree, used in route logs.
impl fmt::Display for Behaviour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Behaviour::PassThrough => f.write_str("pass_through"),
            Behaviour::Outcome(outcome) => match outcome.options().status {
                Some(status) => write!(f, "outcome({})", status.as_u16()),
                None => f.write_str("outcome"),
            },
            Behaviour::Delay(delay) => {
                let phase = match delay.phase() {
                    DelayPhase::BeforeResponse => "before",
                    DelayPhase::AfterResponse => "after",
                };
                match delay.source() {
                    DelaySource::Fixed(seconds) => write!(f, "delay({phase}, {seconds}s)"),
                    DelaySource::Uniform { min, max } => {
                        write!(f, "delay({phase}, {min}..{max}s)")
                    }
                    DelaySource::Query { param, .. } => write!(f, "delay({phase}, ?{param})"),
                    DelaySource::Header { name, .. } => write!(f, "delay({phase}, {name})"),
                }
            }
            Behaviour::Conditional(_) => f.write_str("conditional"),
            Behaviour::MultiConditional(multi) if multi.is_empty() => {
                f.write_str("multi_conditional(default only)")
            }
            Behaviour::MultiConditional(multi) => {
                write!(f, "multi_conditional({} cases)", multi.len())
            }
            Behaviour::RandomChoice(choice) => write!(
                f,
                "random_choice({} entries, total weight {})",
                choice.choices().len(),
                choice.total_weight()
            ),
        }
    }
}

impl From<HttpOutcome> for Behaviour {
    fn from(outcome: HttpOutcome) -> Self {
        Behaviour::Outcome(outcome)
    }
}

impl From<Delay> for Behaviour {
    fn from(delay: Delay) -> Self {
        Behaviour::Delay(delay)
    }
}

impl From<Conditional> for Behaviour {
    fn from(conditional: Conditional) -> Self {
        Behaviour::Conditional(conditional)
    }
}

impl From<MultiConditional> for Behaviour {
    fn from(multi: MultiConditional) -> Self {
        Behaviour::MultiConditional(multi)
    }
}

impl From<RandomChoice> for Behaviour {
    fn from(choice: RandomChoice) -> Self {
        Behaviour::RandomChoice(choice)
    }
}
