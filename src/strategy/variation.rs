//! Weighted-random variation selection for A/B tests.
//!
//! Ratios are relative weights, not probabilities; they need not sum to 1.
//! Selection is per invocation with no per-user stickiness.

use std::sync::Arc;

use rand::Rng;

use crate::errors::{EngineError, Result};
use crate::strategy::Strategy;

/// One competing strategy with its relative selection weight.
#[derive(Clone)]
pub struct Variation {
    pub strategy: Arc<Strategy>,
    pub ratio: f64,
}

/// A non-empty ordered list of variations for one client.
pub struct VariationSet {
    variations: Vec<Variation>,
    total_ratio: f64,
}

impl VariationSet {
    pub fn build(variations: Vec<Variation>) -> Result<Self> {
        if variations.is_empty() {
            return Err(EngineError::ConfigParse {
                key: "variations".to_string(),
                reason: "a test needs at least one variation".to_string(),
            });
        }
        let total_ratio = variations.iter().map(|v| v.ratio).sum();
        Ok(Self {
            variations,
            total_ratio,
        })
    }

    pub fn variations(&self) -> &[Variation] {
        &self.variations
    }

    /// Draw a variation, weighted by ratio.
    pub fn pick(&self) -> Arc<Strategy> {
        self.pick_with(&mut rand::thread_rng())
    }

    /// Draw with a caller-supplied RNG (seedable in tests).
    pub fn pick_with<R: Rng>(&self, rng: &mut R) -> Arc<Strategy> {
        let draw = rng.gen_range(0.0..self.total_ratio);
        let mut cumulative = 0.0;
        for variation in &self.variations {
            cumulative += variation.ratio;
            if draw < cumulative {
                return variation.strategy.clone();
            }
        }
        // floating-point edge: the draw landed on the very top of the range
        self.variations
            .last()
            .expect("variation set is never empty")
            .strategy
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::FirstSuccessfulCombiner;
    use crate::strategy::test_support::simple_strategy;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn variation(label: &str, ratio: f64) -> Variation {
        let mut strategy = simple_strategy(vec![], Arc::new(FirstSuccessfulCombiner), 0.0);
        strategy.label = label.to_string();
        Variation {
            strategy: Arc::new(strategy),
            ratio,
        }
    }

    #[test]
    fn test_empty_set_rejected() {
        assert!(VariationSet::build(vec![]).is_err());
    }

    #[test]
    fn test_selection_frequency_tracks_ratios() {
        let set = VariationSet::build(vec![variation("a", 3.0), variation("b", 1.0)])
            .expect("build");
        let mut rng = StdRng::seed_from_u64(7);
        let draws = 10_000;
        let mut a_hits = 0usize;
        for _ in 0..draws {
            if set.pick_with(&mut rng).label == "a" {
                a_hits += 1;
            }
        }
        let frequency = a_hits as f64 / draws as f64;
        // expected 0.75 within statistical tolerance
        assert!((frequency - 0.75).abs() < 0.02, "frequency was {frequency}");
    }

    #[test]
    fn test_single_variation_always_selected() {
        let set = VariationSet::build(vec![variation("only", 0.5)]).expect("build");
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert_eq!(set.pick_with(&mut rng).label, "only");
        }
    }
}
