//! Incremental earnings and free cash flow of a project's first year.

use super::{money, pct, pick, stepped};
use crate::config::{check_choices, check_positive, check_range, ConfigError};
use crate::variant::GameVariant;
use fin_math::{free_cash_flow, incremental_earnings, straight_line_depreciation, FinanceError};
use quiz_core::{GameKind, Param, Quantity, Scenario};
use rand::RngCore;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarningsTopic {
    IncrementalEarnings,
    FreeCashFlow,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncrementalConfig {
    /// Annual revenue range.
    pub revenue_min: f64,
    pub revenue_max: f64,
    /// Operating costs as a share of revenue.
    pub cost_share_min: f64,
    pub cost_share_max: f64,
    /// Equipment cost, depreciated straight-line to zero.
    pub capex_min: f64,
    pub capex_max: f64,
    /// Depreciable life of the equipment.
    pub life_years: Vec<u32>,
    pub tax_rates: Vec<f64>,
    /// Change in net working capital.
    pub nwc_min: f64,
    pub nwc_max: f64,
    pub topics: Vec<EarningsTopic>,
}

impl Default for IncrementalConfig {
    fn default() -> Self {
        Self {
            revenue_min: 100_000.0,
            revenue_max: 2_000_000.0,
            cost_share_min: 0.3,
            cost_share_max: 0.7,
            capex_min: 50_000.0,
            capex_max: 1_000_000.0,
            life_years: vec![3, 4, 5, 7, 10],
            tax_rates: vec![0.15, 0.21, 0.25, 0.30, 0.35],
            nwc_min: 5_000.0,
            nwc_max: 100_000.0,
            topics: vec![EarningsTopic::IncrementalEarnings, EarningsTopic::FreeCashFlow],
        }
    }
}

impl IncrementalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("earnings.revenue", self.revenue_min, self.revenue_max)?;
        check_positive("earnings.revenue_min", self.revenue_min)?;
        check_range("earnings.cost_share", self.cost_share_min, self.cost_share_max)?;
        if self.cost_share_max >= 1.0 || self.cost_share_min < 0.0 {
            return Err(ConfigError::Invalid(
                "earnings.cost_share must lie in [0, 1)".into(),
            ));
        }
        check_range("earnings.capex", self.capex_min, self.capex_max)?;
        check_positive("earnings.capex_min", self.capex_min)?;
        check_range("earnings.nwc", self.nwc_min, self.nwc_max)?;
        check_choices("earnings.life_years", &self.life_years)?;
        check_choices("earnings.tax_rates", &self.tax_rates)?;
        check_choices("earnings.topics", &self.topics)?;
        if self.life_years.contains(&0) {
            return Err(ConfigError::Invalid("earnings.life_years must be >= 1".into()));
        }
        Ok(())
    }
}

pub struct IncrementalEarningsGame {
    config: IncrementalConfig,
}

impl IncrementalEarningsGame {
    pub fn new(config: IncrementalConfig) -> Self {
        Self { config }
    }
}

impl GameVariant for IncrementalEarningsGame {
    fn kind(&self) -> GameKind {
        GameKind::IncrementalEarnings
    }

    fn draw(&self, rng: &mut dyn RngCore, round: u32) -> Result<Scenario, FinanceError> {
        let c = &self.config;
        let topic = pick(rng, &c.topics, "topics")?;
        let revenue = stepped(rng, c.revenue_min, c.revenue_max, 1_000.0, "revenue")?;
        let share = stepped(rng, c.cost_share_min, c.cost_share_max, 0.01, "cost_share")?;
        let costs = (revenue * share / 1_000.0).round() * 1_000.0;
        let capex = stepped(rng, c.capex_min, c.capex_max, 1_000.0, "capex")?;
        let life = pick(rng, &c.life_years, "life_years")?;
        let tax = pick(rng, &c.tax_rates, "tax_rates")?;
        let nwc = stepped(rng, c.nwc_min, c.nwc_max, 1_000.0, "nwc")?;

        let dep = straight_line_depreciation(capex, f64::from(life))?;
        let earnings = incremental_earnings(revenue, costs, dep, tax)?;
        let ebit = revenue - costs - dep;
        let setup = format!(
            "A new line adds {} of revenue and {} of operating costs in year 1. \
             Equipment costing {} is bought at the start of the year and depreciated \
             straight-line over {life} years. The tax rate is {}.",
            money(revenue),
            money(costs),
            money(capex),
            pct(tax)
        );
        let mut params = vec![
            Param::new("revenue", revenue, Quantity::Currency),
            Param::new("operating costs", costs, Quantity::Currency),
            Param::new("capital expenditure", capex, Quantity::Currency),
            Param::new("asset life (years)", f64::from(life), Quantity::Periods),
            Param::new("tax rate", tax, Quantity::Rate),
        ];

        let (prompt, correct, explanation, mistakes) = match topic {
            EarningsTopic::IncrementalEarnings => (
                format!("{setup} What are the project's incremental earnings in year 1?"),
                earnings,
                format!(
                    "Depreciation = {capex:.2} / {life} = {dep:.2}; \
                     earnings = ({revenue:.2} - {costs:.2} - {dep:.2}) x (1 - {tax}) = {earnings:.2}"
                ),
                vec![
                    (revenue - costs) * (1.0 - tax),
                    (revenue - costs - capex) * (1.0 - tax),
                    ebit,
                ],
            ),
            EarningsTopic::FreeCashFlow => {
                params.push(Param::new("increase in NWC", nwc, Quantity::Currency));
                let fcf = free_cash_flow(earnings, dep, capex, nwc)?;
                (
                    format!(
                        "{setup} Net working capital rises by {}. What is the project's \
                         free cash flow in year 1?",
                        money(nwc)
                    ),
                    fcf,
                    format!(
                        "Earnings = ({revenue:.2} - {costs:.2} - {dep:.2}) x (1 - {tax}) = {earnings:.2}; \
                         FCF = {earnings:.2} + {dep:.2} - {capex:.2} - {nwc:.2} = {fcf:.2}"
                    ),
                    vec![
                        earnings - capex - nwc,
                        earnings + dep - capex,
                        (revenue - costs - capex) * (1.0 - tax) - nwc,
                        ebit + dep - capex - nwc,
                    ],
                )
            }
        };
        Ok(Scenario {
            game: GameKind::IncrementalEarnings,
            round,
            params,
            prompt,
            unknown: Quantity::Currency,
            correct,
            explanation,
            mistakes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::testing::exercise;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn only(topic: EarningsTopic) -> IncrementalEarningsGame {
        IncrementalEarningsGame::new(IncrementalConfig {
            topics: vec![topic],
            ..IncrementalConfig::default()
        })
    }

    #[test]
    fn every_topic_builds_valid_questions() {
        exercise(&only(EarningsTopic::IncrementalEarnings), 61, 25);
        exercise(&only(EarningsTopic::FreeCashFlow), 62, 25);
    }

    #[test]
    fn free_cash_flow_adds_back_depreciation() {
        let g = only(EarningsTopic::FreeCashFlow);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for round in 1..=20 {
            let s = g.draw(&mut rng, round).unwrap();
            let v: Vec<f64> = s.params.iter().map(|p| p.value).collect();
            let (rev, costs, capex, life, tax, nwc) = (v[0], v[1], v[2], v[3], v[4], v[5]);
            let dep = capex / life;
            let expected = (rev - costs - dep) * (1.0 - tax) + dep - capex - nwc;
            assert!((s.correct - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn cost_share_must_stay_below_revenue() {
        let cfg = IncrementalConfig {
            cost_share_max: 1.2,
            ..IncrementalConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
