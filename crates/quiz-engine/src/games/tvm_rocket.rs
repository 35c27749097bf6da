//! TVM Rocket: rapid-fire time-value-of-money questions.

use super::{explain_ear, money, pct, pick, stepped, whole};
use crate::config::{check_choices, check_positive, check_range, ConfigError};
use crate::variant::GameVariant;
use fin_math::{
    effective_annual_rate, future_value_single_sum, present_value_annuity,
    present_value_perpetuity, present_value_single_sum, FinanceError,
};
use quiz_core::{GameKind, Param, Quantity, RateQuote, Scenario};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Question families the rocket can launch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TvmTopic {
    PresentValue,
    FutureValue,
    Annuity,
    Perpetuity,
    EffectiveRate,
    LumpSumRate,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TvmConfig {
    /// Range for single sums, in dollars.
    pub amount_min: f64,
    pub amount_max: f64,
    /// Range for annuity and perpetuity payments.
    pub payment_min: f64,
    pub payment_max: f64,
    /// Annual rates to choose from.
    pub rates: Vec<f64>,
    /// Horizon in whole years.
    pub years_min: u32,
    pub years_max: u32,
    /// Compounding frequencies for nominal quotes.
    pub compounding: Vec<u32>,
    /// Repayment multiples for lump-sum quotes.
    pub multipliers: Vec<f64>,
    /// Question families drawn uniformly.
    pub topics: Vec<TvmTopic>,
}

impl Default for TvmConfig {
    fn default() -> Self {
        Self {
            amount_min: 1_000.0,
            amount_max: 50_000.0,
            payment_min: 100.0,
            payment_max: 5_000.0,
            rates: vec![0.02, 0.03, 0.04, 0.05, 0.06, 0.08, 0.10, 0.12],
            years_min: 2,
            years_max: 30,
            compounding: vec![1, 2, 4, 12, 52, 365],
            multipliers: vec![1.25, 1.5, 2.0, 2.5, 3.0],
            topics: vec![
                TvmTopic::PresentValue,
                TvmTopic::FutureValue,
                TvmTopic::Annuity,
                TvmTopic::Perpetuity,
                TvmTopic::EffectiveRate,
                TvmTopic::LumpSumRate,
            ],
        }
    }
}

impl TvmConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("tvm.amount", self.amount_min, self.amount_max)?;
        check_positive("tvm.amount_min", self.amount_min)?;
        check_range("tvm.payment", self.payment_min, self.payment_max)?;
        check_positive("tvm.payment_min", self.payment_min)?;
        check_range(
            "tvm.years",
            f64::from(self.years_min),
            f64::from(self.years_max),
        )?;
        check_choices("tvm.rates", &self.rates)?;
        check_choices("tvm.compounding", &self.compounding)?;
        check_choices("tvm.multipliers", &self.multipliers)?;
        check_choices("tvm.topics", &self.topics)?;
        Ok(())
    }
}

pub struct TvmRocketGame {
    config: TvmConfig,
}

impl TvmRocketGame {
    pub fn new(config: TvmConfig) -> Self {
        Self { config }
    }

    fn scenario(
        round: u32,
        params: Vec<Param>,
        prompt: String,
        unknown: Quantity,
        correct: f64,
        explanation: String,
        mistakes: Vec<f64>,
    ) -> Scenario {
        Scenario {
            game: GameKind::TvmRocket,
            round,
            params,
            prompt: format!("Round {round} launch. {prompt}"),
            unknown,
            correct,
            explanation,
            mistakes,
        }
    }

    fn present_value(&self, rng: &mut dyn RngCore, round: u32) -> Result<Scenario, FinanceError> {
        let c = &self.config;
        let fv = stepped(rng, c.amount_min, c.amount_max, 100.0, "amount")?;
        let r = pick(rng, &c.rates, "rates")?;
        let n = f64::from(whole(rng, c.years_min, c.years_max, "years")?);
        let pv = present_value_single_sum(fv, r, n)?;
        Ok(Self::scenario(
            round,
            vec![
                Param::new("future value", fv, Quantity::Currency),
                Param::new("annual rate", r, Quantity::Rate),
                Param::new("years", n, Quantity::Periods),
            ],
            format!(
                "The fuel depot needs {} in {n} years. At {} a year, how much must you set aside today?",
                money(fv),
                pct(r)
            ),
            Quantity::Currency,
            pv,
            format!("PV = FV / (1 + r)^n = {fv:.2} / (1 + {r})^{n} = {pv:.2}"),
            vec![
                fv * (1.0 + r).powf(n),
                fv / (1.0 + r * n),
                fv / (1.0 + r).powf(n - 1.0),
            ],
        ))
    }

    fn future_value(&self, rng: &mut dyn RngCore, round: u32) -> Result<Scenario, FinanceError> {
        let c = &self.config;
        let pv = stepped(rng, c.amount_min, c.amount_max, 100.0, "amount")?;
        let r = pick(rng, &c.rates, "rates")?;
        let n = f64::from(whole(rng, c.years_min, c.years_max, "years")?);
        let fv = future_value_single_sum(pv, r, n)?;
        Ok(Self::scenario(
            round,
            vec![
                Param::new("deposit", pv, Quantity::Currency),
                Param::new("annual rate", r, Quantity::Rate),
                Param::new("years", n, Quantity::Periods),
            ],
            format!(
                "You load {} into the tank earning {} a year. How much is on board after {n} years?",
                money(pv),
                pct(r)
            ),
            Quantity::Currency,
            fv,
            format!("FV = PV x (1 + r)^n = {pv:.2} x (1 + {r})^{n} = {fv:.2}"),
            vec![
                pv / (1.0 + r).powf(n),
                pv * (1.0 + r * n),
                pv * (1.0 + r).powf(n - 1.0),
            ],
        ))
    }

    fn annuity(&self, rng: &mut dyn RngCore, round: u32) -> Result<Scenario, FinanceError> {
        let c = &self.config;
        let pmt = stepped(rng, c.payment_min, c.payment_max, 50.0, "payment")?;
        let r = pick(rng, &c.rates, "rates")?;
        let n = f64::from(whole(rng, c.years_min, c.years_max, "years")?);
        let pv = present_value_annuity(pmt, r, n)?;
        Ok(Self::scenario(
            round,
            vec![
                Param::new("payment", pmt, Quantity::Currency),
                Param::new("annual rate", r, Quantity::Rate),
                Param::new("years", n, Quantity::Periods),
            ],
            format!(
                "Mission control pays {} at the end of each year for {n} years. At {}, what is that stream worth today?",
                money(pmt),
                pct(r)
            ),
            Quantity::Currency,
            pv,
            format!(
                "PV = C x (1 - (1 + r)^-n) / r = {pmt:.2} x (1 - (1 + {r})^-{n}) / {r} = {pv:.2}"
            ),
            vec![pmt * n, pmt / r, pv * (1.0 + r)],
        ))
    }

    fn perpetuity(&self, rng: &mut dyn RngCore, round: u32) -> Result<Scenario, FinanceError> {
        let c = &self.config;
        let pmt = stepped(rng, c.payment_min, c.payment_max, 50.0, "payment")?;
        let r = pick(rng, &c.rates, "rates")?;
        let pv = present_value_perpetuity(pmt, r)?;
        Ok(Self::scenario(
            round,
            vec![
                Param::new("payment", pmt, Quantity::Currency),
                Param::new("annual rate", r, Quantity::Rate),
            ],
            format!(
                "A space station lease pays {} a year forever, first payment in one year. At {}, what is it worth today?",
                money(pmt),
                pct(r)
            ),
            Quantity::Currency,
            pv,
            format!("PV = C / r = {pmt:.2} / {r} = {pv:.2}"),
            vec![pmt * (1.0 + r) / r, pmt / (r * 100.0), pmt * r * 100.0],
        ))
    }

    fn effective_rate(&self, rng: &mut dyn RngCore, round: u32) -> Result<Scenario, FinanceError> {
        let c = &self.config;
        let apr = pick(rng, &c.rates, "rates")?;
        let m = pick(rng, &c.compounding, "compounding")?;
        let quote = RateQuote::Nominal {
            annual_rate: apr,
            compoundings_per_year: m,
        };
        let ear = effective_annual_rate(&quote)?;
        Ok(Self::scenario(
            round,
            vec![
                Param::new("APR", apr, Quantity::Rate),
                Param::new("compoundings per year", f64::from(m), Quantity::Periods),
            ],
            format!("The booster loan is quoted at {quote}. What is its effective annual rate?"),
            Quantity::Rate,
            ear,
            explain_ear(&quote, ear),
            vec![apr, apr / f64::from(m), apr.exp() - 1.0],
        ))
    }

    fn lump_sum_rate(&self, rng: &mut dyn RngCore, round: u32) -> Result<Scenario, FinanceError> {
        let c = &self.config;
        let multiplier = pick(rng, &c.multipliers, "multipliers")?;
        let years = f64::from(whole(rng, c.years_min, c.years_max, "years")?);
        let quote = RateQuote::LumpSum {
            multiplier,
            term_years: years,
        };
        let ear = effective_annual_rate(&quote)?;
        Ok(Self::scenario(
            round,
            vec![
                Param::new("multiplier", multiplier, Quantity::Ratio),
                Param::new("years", years, Quantity::Periods),
            ],
            format!(
                "An investor promises to {quote}. What annual rate of return does that imply?"
            ),
            Quantity::Rate,
            ear,
            explain_ear(&quote, ear),
            vec![
                (multiplier - 1.0) / years,
                multiplier.ln() / years,
                multiplier - 1.0,
            ],
        ))
    }
}

impl GameVariant for TvmRocketGame {
    fn kind(&self) -> GameKind {
        GameKind::TvmRocket
    }

    fn draw(&self, rng: &mut dyn RngCore, round: u32) -> Result<Scenario, FinanceError> {
        match pick(rng, &self.config.topics, "topics")? {
            TvmTopic::PresentValue => self.present_value(rng, round),
            TvmTopic::FutureValue => self.future_value(rng, round),
            TvmTopic::Annuity => self.annuity(rng, round),
            TvmTopic::Perpetuity => self.perpetuity(rng, round),
            TvmTopic::EffectiveRate => self.effective_rate(rng, round),
            TvmTopic::LumpSumRate => self.lump_sum_rate(rng, round),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::testing::exercise;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn only(topic: TvmTopic) -> TvmRocketGame {
        TvmRocketGame::new(TvmConfig {
            topics: vec![topic],
            ..TvmConfig::default()
        })
    }

    #[test]
    fn every_topic_builds_valid_questions() {
        for topic in TvmConfig::default().topics {
            exercise(&only(topic), 11, 20);
        }
    }

    #[test]
    fn present_value_matches_formula() {
        let g = only(TvmTopic::PresentValue);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let s = g.draw(&mut rng, 1).unwrap();
        let fv = s.params[0].value;
        let r = s.params[1].value;
        let n = s.params[2].value;
        assert!((s.correct - fv / (1.0 + r).powf(n)).abs() < 1e-9);
        assert!(s.prompt.starts_with("Round 1 launch."));
    }

    #[test]
    fn effective_rate_exceeds_apr_when_compounding() {
        let g = only(TvmTopic::EffectiveRate);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        for _ in 0..30 {
            let s = g.draw(&mut rng, 1).unwrap();
            let apr = s.params[0].value;
            assert!(s.correct >= apr - 1e-12);
        }
    }

    #[test]
    fn empty_topics_fail_to_draw() {
        let g = TvmRocketGame::new(TvmConfig {
            topics: vec![],
            ..TvmConfig::default()
        });
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        assert!(g.draw(&mut rng, 1).is_err());
        assert!(TvmConfig {
            topics: vec![],
            ..TvmConfig::default()
        }
        .validate()
        .is_err());
    }
}
