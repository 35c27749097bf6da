//! Game adapters: parameter ranges, scenario generators and distractor rules.

pub mod bond_memory;
pub mod decision_rules;
pub mod incremental;
pub mod lending;
pub mod tvm_rocket;
pub mod wacc;

pub use bond_memory::{
    BoardError, BoardPhase, BondConfig, BondMemoryGame, BondTerms, Card, CardFace, Flip,
    MemoryBoard,
};
pub use decision_rules::{DecisionConfig, DecisionRulesGame, DecisionTopic, Project};
pub use incremental::{EarningsTopic, IncrementalConfig, IncrementalEarningsGame};
pub use lending::{
    deal_hand, BetOutcome, LendingConfig, LendingGame, LendingHand, Negotiation,
    NegotiationError, Resolution, RivalView, Street,
};
pub use tvm_rocket::{TvmConfig, TvmRocketGame, TvmTopic};
pub use wacc::{WaccCardGame, WaccConfig, WaccHand};

use fin_math::FinanceError;
use quiz_core::{Quantity, RateQuote};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};

fn empty(what: &str) -> FinanceError {
    FinanceError::InvalidInput(format!("no {what} configured"))
}

pub(crate) fn pick<T: Copy>(
    rng: &mut dyn RngCore,
    choices: &[T],
    what: &str,
) -> Result<T, FinanceError> {
    choices.choose(rng).copied().ok_or_else(|| empty(what))
}

pub(crate) fn uniform(
    rng: &mut dyn RngCore,
    lo: f64,
    hi: f64,
    what: &str,
) -> Result<f64, FinanceError> {
    if !(lo.is_finite() && hi.is_finite() && lo <= hi) {
        return Err(FinanceError::InvalidInput(format!(
            "{what} range [{lo}, {hi}] is empty"
        )));
    }
    if lo == hi {
        return Ok(lo);
    }
    Ok(rng.gen_range(lo..=hi))
}

/// Uniform draw snapped to a multiple of `step`.
pub(crate) fn stepped(
    rng: &mut dyn RngCore,
    lo: f64,
    hi: f64,
    step: f64,
    what: &str,
) -> Result<f64, FinanceError> {
    let x = uniform(rng, lo, hi, what)?;
    if step > 0.0 {
        Ok((x / step).round() * step)
    } else {
        Ok(x)
    }
}

pub(crate) fn whole(rng: &mut dyn RngCore, lo: u32, hi: u32, what: &str) -> Result<u32, FinanceError> {
    if lo > hi {
        return Err(empty(what));
    }
    Ok(rng.gen_range(lo..=hi))
}

pub(crate) fn pct(rate: f64) -> String {
    Quantity::Rate.format(rate)
}

pub(crate) fn money(value: f64) -> String {
    Quantity::Currency.format(value)
}

/// Restate how a quote converts to an effective annual rate.
pub(crate) fn explain_ear(quote: &RateQuote, ear: f64) -> String {
    match *quote {
        RateQuote::Nominal {
            annual_rate,
            compoundings_per_year: m,
        } => format!("EAR = (1 + {annual_rate:.4}/{m})^{m} - 1 = {ear:.6}"),
        RateQuote::Effective { .. } => format!("EAR is quoted directly: {ear:.6}"),
        RateQuote::LumpSum {
            multiplier,
            term_years,
        } => format!("EAR = {multiplier:.3}^(1/{term_years}) - 1 = {ear:.6}"),
    }
}
