//! Option-set synthesis: the correct answer plus plausible wrong answers.

use crate::money::round_to;
use crate::EngineError;
use quiz_core::{EngineConfig, JitterConfig, Quantity};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use tracing::debug;

/// Shuffled options and the position of the correct one.
#[derive(Clone, Debug, PartialEq)]
pub struct OptionSet {
    pub options: Vec<f64>,
    pub correct_index: usize,
}

/// Build `config.option_count` options around `correct`.
///
/// Variant-specific `mistakes` are tried first, then jitter around the
/// correct value. A candidate is dropped when it is non-finite, within
/// tolerance of an option already chosen, or renders identically to one.
pub fn synthesize_options(
    correct: f64,
    unknown: Quantity,
    mistakes: &[f64],
    config: &EngineConfig,
    rng: &mut dyn RngCore,
) -> Result<OptionSet, EngineError> {
    let tolerance = config.tolerances.for_quantity(unknown);
    let wanted = config.option_count;
    let mut options = vec![correct];

    let mut pool = mistakes.to_vec();
    pool.shuffle(rng);
    for m in pool {
        if options.len() >= wanted {
            break;
        }
        let candidate = round_to(m, unknown.decimals());
        if accepts(candidate, &options, unknown, tolerance) {
            options.push(candidate);
        }
    }

    let mut attempts = 0;
    while options.len() < wanted {
        if attempts >= config.max_distractor_attempts {
            return Err(EngineError::DistractorsExhausted {
                wanted,
                found: options.len(),
                attempts,
            });
        }
        attempts += 1;
        let candidate = round_to(jitter(correct, unknown, &config.jitter, rng), unknown.decimals());
        if accepts(candidate, &options, unknown, tolerance) {
            options.push(candidate);
        }
    }
    debug!(?unknown, attempts, "options synthesized");

    let mut order: Vec<usize> = (0..options.len()).collect();
    order.shuffle(rng);
    let correct_index = order.iter().position(|&i| i == 0).unwrap_or_default();
    Ok(OptionSet {
        options: order.into_iter().map(|i| options[i]).collect(),
        correct_index,
    })
}

fn accepts(candidate: f64, chosen: &[f64], unknown: Quantity, tolerance: f64) -> bool {
    if !candidate.is_finite() {
        return false;
    }
    let shown = unknown.format(candidate);
    chosen
        .iter()
        .all(|o| (candidate - o).abs() > tolerance && unknown.format(*o) != shown)
}

fn jitter(correct: f64, unknown: Quantity, j: &JitterConfig, rng: &mut dyn RngCore) -> f64 {
    let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
    match unknown {
        Quantity::Currency | Quantity::Ratio => {
            let scale = if correct.abs() > 1e-9 { correct.abs() } else { 1.0 };
            correct + sign * rng.gen_range(j.relative_min..=j.relative_max) * scale
        }
        Quantity::Rate => correct + sign * rng.gen_range(j.rate_step_min..=j.rate_step_max),
        Quantity::Periods => {
            let step = rng.gen_range(j.period_step_min..=j.period_step_max);
            // Negative period counts are never plausible.
            if correct - step < 0.0 || sign > 0.0 {
                correct + step
            } else {
                correct - step
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn distinct(set: &OptionSet, tol: f64) -> bool {
        set.options.iter().enumerate().all(|(i, a)| {
            set.options[i + 1..]
                .iter()
                .all(|b| (a - b).abs() > tol)
        })
    }

    #[test]
    fn mistakes_are_preferred() {
        let cfg = EngineConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let set =
            synthesize_options(783.53, Quantity::Currency, &[1000.0, 900.0, 700.0], &cfg, &mut rng)
                .unwrap();
        assert_eq!(set.options.len(), 4);
        assert_eq!(set.options[set.correct_index], 783.53);
        for m in [1000.0, 900.0, 700.0] {
            assert!(set.options.contains(&m));
        }
    }

    #[test]
    fn duplicate_mistakes_are_discarded() {
        let cfg = EngineConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let set = synthesize_options(
            0.0485,
            Quantity::Rate,
            &[0.0485, 0.04851, 0.05, 0.05],
            &cfg,
            &mut rng,
        )
        .unwrap();
        assert_eq!(set.options.len(), 4);
        assert!(distinct(&set, cfg.tolerances.rate));
        assert_eq!(
            set.options.iter().filter(|v| (**v - 0.0485).abs() <= 1e-4).count(),
            1
        );
    }

    #[test]
    fn zero_correct_value_still_fills() {
        let cfg = EngineConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let set = synthesize_options(0.0, Quantity::Currency, &[], &cfg, &mut rng).unwrap();
        assert_eq!(set.options.len(), 4);
        assert!(distinct(&set, cfg.tolerances.currency));
    }

    #[test]
    fn periods_stay_non_negative() {
        let cfg = EngineConfig::default();
        for seed in 0..50 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let set = synthesize_options(0.3, Quantity::Periods, &[], &cfg, &mut rng).unwrap();
            assert!(set.options.iter().all(|v| *v >= 0.0));
        }
    }

    #[test]
    fn exhausted_budget_is_reported() {
        let mut cfg = EngineConfig::default();
        cfg.max_distractor_attempts = 1;
        cfg.option_count = 4;
        // Jitter far below the tolerance can never produce a distinct option.
        cfg.tolerances.currency = 1.0e9;
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let err = synthesize_options(100.0, Quantity::Currency, &[], &cfg, &mut rng).unwrap_err();
        assert!(matches!(err, EngineError::DistractorsExhausted { found: 1, .. }));
    }

    #[test]
    fn seeded_sets_repeat() {
        let cfg = EngineConfig::default();
        let mut a = ChaCha8Rng::seed_from_u64(9);
        let mut b = ChaCha8Rng::seed_from_u64(9);
        let x = synthesize_options(1234.56, Quantity::Currency, &[1500.0], &cfg, &mut a).unwrap();
        let y = synthesize_options(1234.56, Quantity::Currency, &[1500.0], &cfg, &mut b).unwrap();
        assert_eq!(x, y);
    }
}
