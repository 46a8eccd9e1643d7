//! Predicate-gated behaviours.

use super::Behaviour;
use crate::error::Result;
use crate::handler::Request;
use crate::predicate::{Predicate, SharedPredicate};
use std::fmt;
use std::sync::Arc;

/// Routes to `when_true` if the predicate holds, `when_false` otherwise.
#[derive(Clone)]
pub struct Conditional {
    predicate: SharedPredicate,
    when_true: Box<Behaviour>,
    when_false: Box<Behaviour>,
}

impl Conditional {
    /// The false branch defaults to pass-through.
    pub fn new<P: Predicate + 'static>(predicate: P, when_true: Behaviour) -> Self {
        Self::shared(Arc::new(predicate), when_true, Behaviour::PassThrough)
    }

    pub fn with_else<P: Predicate + 'static>(
        predicate: P,
        when_true: Behaviour,
        when_false: Behaviour,
    ) -> Self {
        Self::shared(Arc::new(predicate), when_true, when_false)
    }

    pub fn shared(predicate: SharedPredicate, when_true: Behaviour, when_false: Behaviour) -> Self {
        Self {
            predicate,
            when_true: Box::new(when_true),
            when_false: Box::new(when_false),
        }
    }

    pub(super) fn select(&self, request: &Request) -> Result<&Behaviour> {
        if self.predicate.evaluate(request)? {
            Ok(&self.when_true)
        } else {
            Ok(&self.when_false)
        }
    }
}

impl fmt::Debug for Conditional {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conditional")
            .field("when_true", &self.when_true)
            .field("when_false", &self.when_false)
            .finish_non_exhaustive()
    }
}

/// Ordered `(predicate, behaviour)` cases; the first case whose predicate
/// holds is used, the default when none do. Predicates after the first match
/// are never evaluated.
#[derive(Clone, Default)]
pub struct MultiConditional {
    cases: Vec<(SharedPredicate, Behaviour)>,
    default: Box<Behaviour>,
}

impl MultiConditional {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn case<P: Predicate + 'static>(self, predicate: P, behaviour: Behaviour) -> Self {
        self.shared_case(Arc::new(predicate), behaviour)
    }

    pub fn shared_case(mut self, predicate: SharedPredicate, behaviour: Behaviour) -> Self {
        self.cases.push((predicate, behaviour));
        self
    }

    pub fn otherwise(mut self, default: Behaviour) -> Self {
        self.default = Box::new(default);
        self
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub(super) fn select(&self, request: &Request) -> Result<&Behaviour> {
        for (predicate, behaviour) in &self.cases {
            if predicate.evaluate(request)? {
                return Ok(behaviour);
            }
        }
        Ok(&self.default)
    }
}

impl fmt::Debug for MultiConditional {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let behaviours: Vec<&Behaviour> = self.cases.iter().map(|(_, b)| b).collect();
        f.debug_struct("MultiConditional")
            .field("cases", &behaviours)
            .field("default", &self.default)
            .finish()
    }
}
