//! Capital budgeting decision rules: NPV, IRR, payback and profitability index.

use super::{money, pct, pick, stepped, whole};
use crate::config::{check_choices, check_positive, check_range, ConfigError};
use crate::variant::GameVariant;
use fin_math::{
    internal_rate_of_return, net_present_value, payback_period, profitability_index,
    FinanceError,
};
use quiz_core::{GameKind, Param, Quantity, Scenario};
use rand::RngCore;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionTopic {
    Npv,
    Irr,
    Payback,
    ProfitabilityIndex,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Initial outlay range.
    pub investment_min: f64,
    pub investment_max: f64,
    /// Number of yearly inflows after the outlay.
    pub inflows_min: u32,
    pub inflows_max: u32,
    /// Each inflow is drawn as a share of the initial investment.
    pub inflow_share_min: f64,
    pub inflow_share_max: f64,
    pub discount_rates: Vec<f64>,
    /// Decision rules drawn uniformly.
    pub topics: Vec<DecisionTopic>,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            investment_min: 10_000.0,
            investment_max: 200_000.0,
            inflows_min: 3,
            inflows_max: 6,
            inflow_share_min: 0.15,
            inflow_share_max: 0.55,
            discount_rates: vec![0.04, 0.06, 0.08, 0.10, 0.12, 0.15],
            topics: vec![
                DecisionTopic::Npv,
                DecisionTopic::Irr,
                DecisionTopic::Payback,
                DecisionTopic::ProfitabilityIndex,
            ],
        }
    }
}

impl DecisionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("decisions.investment", self.investment_min, self.investment_max)?;
        check_positive("decisions.investment_min", self.investment_min)?;
        check_range(
            "decisions.inflows",
            f64::from(self.inflows_min),
            f64::from(self.inflows_max),
        )?;
        if self.inflows_min == 0 {
            return Err(ConfigError::Invalid("decisions.inflows_min must be >= 1".into()));
        }
        check_range(
            "decisions.inflow_share",
            self.inflow_share_min,
            self.inflow_share_max,
        )?;
        check_positive("decisions.inflow_share_min", self.inflow_share_min)?;
        check_choices("decisions.discount_rates", &self.discount_rates)?;
        check_choices("decisions.topics", &self.topics)?;
        Ok(())
    }
}

/// An initial outlay followed by year-end inflows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Year 0 outlay (negative) then inflows.
    pub cash_flows: Vec<f64>,
    pub discount_rate: f64,
}

impl Project {
    pub fn draw(config: &DecisionConfig, rng: &mut dyn RngCore) -> Result<Self, FinanceError> {
        let investment = stepped(
            rng,
            config.investment_min,
            config.investment_max,
            1_000.0,
            "investment",
        )?;
        let years = whole(rng, config.inflows_min, config.inflows_max, "inflows")?;
        let mut cash_flows = Vec::with_capacity(years as usize + 1);
        cash_flows.push(-investment);
        for _ in 0..years {
            cash_flows.push(stepped(
                rng,
                investment * config.inflow_share_min,
                investment * config.inflow_share_max,
                100.0,
                "inflow",
            )?);
        }
        Ok(Self {
            cash_flows,
            discount_rate: pick(rng, &config.discount_rates, "discount_rates")?,
        })
    }

    pub fn investment(&self) -> f64 {
        self.cash_flows.first().map_or(0.0, |c| -c)
    }

    pub fn inflows(&self) -> &[f64] {
        self.cash_flows.get(1..).unwrap_or(&[])
    }

    fn listing(&self) -> String {
        self.inflows()
            .iter()
            .enumerate()
            .map(|(t, c)| format!("year {}: {}", t + 1, money(*c)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn params(&self) -> Vec<Param> {
        let mut params = vec![
            Param::new("initial investment", self.investment(), Quantity::Currency),
            Param::new("discount rate", self.discount_rate, Quantity::Rate),
        ];
        for (t, c) in self.inflows().iter().enumerate() {
            params.push(Param::new(format!("inflow year {}", t + 1), *c, Quantity::Currency));
        }
        params
    }
}

pub struct DecisionRulesGame {
    config: DecisionConfig,
}

impl DecisionRulesGame {
    pub fn new(config: DecisionConfig) -> Self {
        Self { config }
    }
}

impl GameVariant for DecisionRulesGame {
    fn kind(&self) -> GameKind {
        GameKind::DecisionRules
    }

    fn draw(&self, rng: &mut dyn RngCore, round: u32) -> Result<Scenario, FinanceError> {
        let topic = pick(rng, &self.config.topics, "topics")?;
        let project = Project::draw(&self.config, rng)?;
        let r = project.discount_rate;
        let cfs = &project.cash_flows;
        let investment = project.investment();
        let inflow_sum: f64 = project.inflows().iter().sum();
        let years = project.inflows().len() as f64;
        let npv = net_present_value(r, cfs)?;
        let pv_inflows = npv + investment;
        let intro = format!(
            "A project costs {} today and returns {}.",
            money(investment),
            project.listing()
        );

        let (prompt, unknown, correct, explanation, mistakes) = match topic {
            DecisionTopic::Npv => (
                format!("{intro} At a {} discount rate, what is its NPV?", pct(r)),
                Quantity::Currency,
                npv,
                format!(
                    "NPV = -{investment:.2} + sum of C_t / (1 + {r})^t = -{investment:.2} + {pv_inflows:.2} = {npv:.2}"
                ),
                vec![inflow_sum - investment, pv_inflows, npv * (1.0 + r)],
            ),
            DecisionTopic::Irr => {
                let irr = internal_rate_of_return(cfs)?;
                (
                    format!("{intro} What is its internal rate of return?"),
                    Quantity::Rate,
                    irr,
                    format!(
                        "IRR solves 0 = -{investment:.2} + sum of C_t / (1 + IRR)^t; IRR = {irr:.6}"
                    ),
                    vec![
                        r,
                        inflow_sum / years / investment,
                        (inflow_sum - investment) / investment,
                    ],
                )
            }
            DecisionTopic::Payback => {
                let payback = payback_period(cfs)?;
                if !payback.is_finite() {
                    return Err(FinanceError::InvalidInput(
                        "project never pays back".into(),
                    ));
                }
                (
                    format!("{intro} What is its payback period in years?"),
                    Quantity::Periods,
                    payback,
                    format!(
                        "Cumulative inflows first cover {investment:.2} during year {}; \
                         payback = {payback:.4} years",
                        payback.ceil()
                    ),
                    vec![payback.ceil(), investment / (inflow_sum / years), years],
                )
            }
            DecisionTopic::ProfitabilityIndex => {
                let pi = profitability_index(r, cfs)?;
                (
                    format!(
                        "{intro} At a {} discount rate, what is its profitability index?",
                        pct(r)
                    ),
                    Quantity::Ratio,
                    pi,
                    format!("PI = PV(inflows) / I = {pv_inflows:.2} / {investment:.2} = {pi:.4}"),
                    vec![npv / investment, inflow_sum / investment, investment / pv_inflows],
                )
            }
        };
        Ok(Scenario {
            game: GameKind::DecisionRules,
            round,
            params: project.params(),
            prompt,
            unknown,
            correct,
            explanation,
            mistakes,
        })
    }
}
