//! Weighted random selection among behaviours.

use super::Behaviour;
use crate::error::{BehaviourError, Result};
use rand::Rng;
use tracing::debug;

/// Picks one behaviour per invocation with probability `weight / total`.
///
/// Weights need not sum to one. Zero-weight entries are kept (so configs can
/// switch an outcome off without removing it) but are never selected.
#[derive(Debug, Clone)]
pub struct RandomChoice {
    choices: Vec<(f64, Behaviour)>,
    total: f64,
}

impl RandomChoice {
    pub fn new(choices: Vec<(f64, Behaviour)>) -> Result<Self> {
        if choices.is_empty() {
            return Err(BehaviourError::configuration(
                "random choice needs at least one behaviour",
            ));
        }

        if let Some((weight, _)) = choices
            .iter()
            .find(|(weight, _)| !weight.is_finite() || *weight < 0.0)
        {
            return Err(BehaviourError::configuration(format!(
                "random choice weights must be finite and non-negative, got {weight}"
            )));
        }

        let total: f64 = choices.iter().map(|(weight, _)| weight).sum();
        if total <= 0.0 {
            return Err(BehaviourError::configuration(
                "random choice weights must add up to more than zero",
            ));
        }
        if !total.is_finite() {
            return Err(BehaviourError::configuration(
                "random choice weights add up to more than the largest representable number",
            ));
        }

        Ok(Self { choices, total })
    }

    pub fn total_weight(&self) -> f64 {
        self.total
    }

    pub fn choices(&self) -> &[(f64, Behaviour)] {
        &self.choices
    }

    /// Draw a sample in `[0, total)` and walk the cumulative weights in order.
    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> &Behaviour {
        let sample = rng.gen_range(0.0..self.total);
        let mut upper = 0.0;
        for (index, (weight, behaviour)) in self.choices.iter().enumerate() {
            upper += weight;
            if sample < upper {
                debug!("Random choice picked entry {} (sample {:.4})", index, sample);
                return behaviour;
            }
        }
        // Rounding in the running sum can leave the sample just past the last
        // bound; fall back to the last entry that can be selected at all.
        self.choices
            .iter()
            .rev()
            .find(|(weight, _)| *weight > 0.0)
            .map(|(_, behaviour)| behaviour)
            .unwrap_or(&self.choices[self.choices.len() - 1].1)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{request, RecordingHandler};
    use super::super::{not_found, ok, server_error, status};
    use super::*;
    use crate::response::ResponseOptions;
    use hyper::{Method, StatusCode};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tagged(code: u16) -> Behaviour {
        status(StatusCode::from_u16(code).unwrap(), ResponseOptions::new())
    }

    #[test]
    fn test_weighted_frequencies() {
        let choice = RandomChoice::new(vec![(1.0, tagged(201)), (0.0, tagged(202)), (3.0, tagged(203))])
            .unwrap();
        let behaviour: Behaviour = choice.into();
        let next = RecordingHandler::default();
        let req = request(Method::GET, "/");
        let mut rng = StdRng::seed_from_u64(0x5eed);

        let iterations = 10_000;
        let mut counts = [0usize; 3];
        for _ in 0..iterations {
            let response = behaviour.invoke_with_rng(&next, &req, &mut rng).unwrap();
            counts[(response.status().as_u16() - 201) as usize] += 1;
        }

        let a = counts[0] as f64 / iterations as f64;
        let c = counts[2] as f64 / iterations as f64;
        assert!((a - 0.25).abs() < 0.03, "Expected ~0.25 for A, got {a}");
        assert!((c - 0.75).abs() < 0.03, "Expected ~0.75 for C, got {c}");
        assert_eq!(counts[1], 0, "zero-weight entry must never be selected");
        assert_eq!(next.call_count(), 0);
    }

    #[test]
    fn test_seeded_selection_is_reproducible() {
        let choice = RandomChoice::new(vec![
            (1.0, ok(ResponseOptions::new())),
            (1.0, server_error(ResponseOptions::new())),
        ])
        .unwrap();

        let mut first = StdRng::seed_from_u64(11);
        let mut second = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let a = choice.select(&mut first) as *const Behaviour;
            let b = choice.select(&mut second) as *const Behaviour;
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_single_entry_always_selected() {
        let choice = RandomChoice::new(vec![(0.5, not_found(ResponseOptions::new()))]).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            assert!(matches!(choice.select(&mut rng), Behaviour::Outcome(_)));
        }
    }

    #[test]
    fn test_all_zero_weights_rejected() {
        let err = RandomChoice::new(vec![(0.0, tagged(200)), (0.0, tagged(500))]).unwrap_err();
        assert!(matches!(err, BehaviourError::Configuration(_)));
    }

    #[test]
    fn test_empty_choices_rejected() {
        assert!(matches!(
            RandomChoice::new(vec![]),
            Err(BehaviourError::Configuration(_))
        ));
    }

    #[test]
    fn test_negative_or_nan_weights_rejected() {
        assert!(RandomChoice::new(vec![(-1.0, tagged(200)), (2.0, tagged(500))]).is_err());
        assert!(RandomChoice::new(vec![(f64::NAN, tagged(200))]).is_err());
        assert!(RandomChoice::new(vec![(f64::INFINITY, tagged(200))]).is_err());
        assert!(matches!(
            RandomChoice::new(vec![(f64::MAX, tagged(200)), (f64::MAX, tagged(500))]),
            Err(BehaviourError::Configuration(_))
        ));
    }

    #[test]
    fn test_nested_choice_falls_through_to_downstream() {
        let choice = RandomChoice::new(vec![(1.0, Behaviour::PassThrough)]).unwrap();
        let behaviour: Behaviour = choice.into();
        let next = RecordingHandler::default();
        let response = behaviour.invoke(&next, &request(Method::GET, "/")).unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(next.call_count(), 1);
    }
}
