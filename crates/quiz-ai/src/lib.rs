#![deny(warnings)]

//! Rival behaviour for the negotiation game.
//!
//! The continue/fold rule is a tunable heuristic: a quality score for the
//! rival's hand pushes toward continuing, the size of the pot pushes toward
//! folding. Its constants live in [`PolicyConfig`] and the rule itself sits
//! behind [`ContinuePolicy`] so it can be swapped.

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Constants of the default quality-minus-pot policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Continue probability for an average hand and an empty pot.
    pub base: f64,
    /// Weight on `quality - 0.5`.
    pub quality_weight: f64,
    /// Penalty per unit of pot relative to the starting bankroll.
    pub pot_penalty: f64,
    /// Lowest continue probability; a weak rival still calls sometimes.
    pub floor: f64,
    /// Highest continue probability; a strong rival still folds sometimes.
    pub ceiling: f64,
}

impl PolicyConfig {
    /// `(floor, ceiling)` limited to `[0, 1]` and put in order.
    ///
    /// Non-finite bounds fall back to 0 and 1.
    pub fn bounds(&self) -> (f64, f64) {
        let unit = |v: f64, fallback: f64| {
            if v.is_finite() {
                v.max(0.0).min(1.0)
            } else {
                fallback
            }
        };
        let (lo, hi) = (unit(self.floor, 0.0), unit(self.ceiling, 1.0));
        if lo <= hi {
            (lo, hi)
        } else {
            (hi, lo)
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            base: 0.65,
            quality_weight: 0.8,
            pot_penalty: 0.5,
            floor: 0.05,
            ceiling: 0.95,
        }
    }
}

/// Decides how likely the rival is to keep negotiating.
pub trait ContinuePolicy {
    /// Probability in `[0, 1]` that the rival matches the latest stake.
    ///
    /// `quality` is the rival's hand strength normalized to `[0, 1]`;
    /// `pot_fraction` is the pot divided by the starting bankroll.
    fn continue_probability(&self, quality: f64, pot_fraction: f64) -> f64;
}

/// Default policy: `base + w_q (quality - 0.5) - w_p pot_fraction`, clamped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QualityPotPolicy {
    pub config: PolicyConfig,
}

impl QualityPotPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }
}

impl ContinuePolicy for QualityPotPolicy {
    fn continue_probability(&self, quality: f64, pot_fraction: f64) -> f64 {
        let c = &self.config;
        let (floor, ceiling) = c.bounds();
        let p = c.base + c.quality_weight * (quality - 0.5) - c.pot_penalty * pot_fraction;
        if p.is_nan() {
            return floor;
        }
        p.max(floor).min(ceiling)
    }
}

/// Rival never folds. Useful for showdown-only play and tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysContinue;

impl ContinuePolicy for AlwaysContinue {
    fn continue_probability(&self, _quality: f64, _pot_fraction: f64) -> f64 {
        1.0
    }
}

/// Normalize `value` into `[0, 1]` over `[lo, hi]`.
pub fn quality_score(value: f64, lo: f64, hi: f64) -> f64 {
    if !(value.is_finite() && lo.is_finite() && hi.is_finite()) || hi <= lo {
        return 0.5;
    }
    ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
}

/// Outcome of a rival decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Continue,
    Fold,
}

/// Roll the rival's decision against the policy probability.
pub fn decide<P: ContinuePolicy + ?Sized>(
    policy: &P,
    quality: f64,
    pot_fraction: f64,
    rng: &mut dyn RngCore,
) -> Decision {
    let p = policy.continue_probability(quality, pot_fraction);
    let roll: f64 = rng.gen();
    let decision = if roll < p {
        Decision::Continue
    } else {
        Decision::Fold
    };
    debug!(quality, pot_fraction, p, roll, ?decision, "rival decision");
    decision
}
