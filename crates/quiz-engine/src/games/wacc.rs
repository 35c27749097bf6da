//! WACC cards: a hand of capital-structure cards, answer the firm's WACC.

use super::{money, pct, pick, stepped, uniform};
use crate::config::{check_choices, check_positive, check_range, ConfigError};
use crate::money::round_to;
use crate::variant::GameVariant;
use fin_math::{capm_cost_of_equity, weighted_average_cost_of_capital, FinanceError};
use quiz_core::{GameKind, Param, Quantity, Scenario};
use rand::RngCore;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaccConfig {
    /// Market value of equity, in dollars.
    pub equity_min: f64,
    pub equity_max: f64,
    /// Debt is drawn as a fraction of equity value.
    pub leverage_min: f64,
    pub leverage_max: f64,
    pub risk_free: Vec<f64>,
    /// Equity beta range, rounded to two decimals when dealt.
    pub beta_min: f64,
    pub beta_max: f64,
    pub market_risk_premium: Vec<f64>,
    /// Pre-tax cost of debt.
    pub cost_of_debt: Vec<f64>,
    /// Corporate tax rates, each in `[0, 1)`.
    pub tax_rates: Vec<f64>,
}

impl Default for WaccConfig {
    fn default() -> Self {
        Self {
            equity_min: 10_000_000.0,
            equity_max: 500_000_000.0,
            leverage_min: 0.1,
            leverage_max: 0.9,
            risk_free: vec![0.02, 0.03, 0.04, 0.05],
            beta_min: 0.5,
            beta_max: 2.0,
            market_risk_premium: vec![0.04, 0.05, 0.06, 0.07],
            cost_of_debt: vec![0.03, 0.04, 0.05, 0.06, 0.07, 0.08],
            tax_rates: vec![0.15, 0.21, 0.25, 0.30, 0.35],
        }
    }
}

impl WaccConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("wacc.equity", self.equity_min, self.equity_max)?;
        check_positive("wacc.equity_min", self.equity_min)?;
        check_range("wacc.leverage", self.leverage_min, self.leverage_max)?;
        check_positive("wacc.leverage_min", self.leverage_min)?;
        // Debt below equity keeps the D/E-weighted distractor meaningful.
        if self.leverage_max >= 1.0 {
            return Err(ConfigError::Invalid("wacc.leverage_max must be < 1".into()));
        }
        check_range("wacc.beta", self.beta_min, self.beta_max)?;
        check_choices("wacc.risk_free", &self.risk_free)?;
        check_choices("wacc.market_risk_premium", &self.market_risk_premium)?;
        check_choices("wacc.cost_of_debt", &self.cost_of_debt)?;
        check_choices("wacc.tax_rates", &self.tax_rates)?;
        if self.tax_rates.iter().any(|t| !(0.0..1.0).contains(t)) {
            return Err(ConfigError::Invalid("wacc.tax_rates must be in [0, 1)".into()));
        }
        Ok(())
    }
}

/// The cards dealt for one round.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaccHand {
    pub equity_value: f64,
    pub debt_value: f64,
    pub risk_free: f64,
    pub beta: f64,
    pub market_risk_premium: f64,
    pub cost_of_debt: f64,
    pub tax_rate: f64,
}

impl WaccHand {
    pub fn deal(config: &WaccConfig, rng: &mut dyn RngCore) -> Result<Self, FinanceError> {
        let equity_value = stepped(
            rng,
            config.equity_min,
            config.equity_max,
            1_000_000.0,
            "equity",
        )?;
        let leverage = uniform(rng, config.leverage_min, config.leverage_max, "leverage")?;
        Ok(Self {
            equity_value,
            debt_value: (equity_value * leverage / 1_000_000.0).round() * 1_000_000.0,
            risk_free: pick(rng, &config.risk_free, "risk_free")?,
            beta: round_to(uniform(rng, config.beta_min, config.beta_max, "beta")?, 2),
            market_risk_premium: pick(rng, &config.market_risk_premium, "market_risk_premium")?,
            cost_of_debt: pick(rng, &config.cost_of_debt, "cost_of_debt")?,
            tax_rate: pick(rng, &config.tax_rates, "tax_rates")?,
        })
    }

    pub fn cost_of_equity(&self) -> Result<f64, FinanceError> {
        capm_cost_of_equity(self.risk_free, self.beta, self.market_risk_premium)
    }

    pub fn wacc(&self) -> Result<f64, FinanceError> {
        weighted_average_cost_of_capital(
            self.equity_value,
            self.debt_value,
            self.cost_of_equity()?,
            self.cost_of_debt,
            self.tax_rate,
        )
    }

    pub fn cards(&self) -> Vec<Param> {
        vec![
            Param::new("equity market value", self.equity_value, Quantity::Currency),
            Param::new("debt market value", self.debt_value, Quantity::Currency),
            Param::new("risk-free rate", self.risk_free, Quantity::Rate),
            Param::new("beta", self.beta, Quantity::Ratio),
            Param::new("market risk premium", self.market_risk_premium, Quantity::Rate),
            Param::new("pre-tax cost of debt", self.cost_of_debt, Quantity::Rate),
            Param::new("tax rate", self.tax_rate, Quantity::Rate),
        ]
    }
}

pub struct WaccCardGame {
    config: WaccConfig,
}

impl WaccCardGame {
    pub fn new(config: WaccConfig) -> Self {
        Self { config }
    }
}

impl GameVariant for WaccCardGame {
    fn kind(&self) -> GameKind {
        GameKind::WaccCards
    }

    fn draw(&self, rng: &mut dyn RngCore, round: u32) -> Result<Scenario, FinanceError> {
        let hand = WaccHand::deal(&self.config, rng)?;
        let re = hand.cost_of_equity()?;
        let wacc = hand.wacc()?;
        let (e, d) = (hand.equity_value, hand.debt_value);
        let v = e + d;
        let rd_after = hand.cost_of_debt * (1.0 - hand.tax_rate);
        let de = d / e;
        let mistakes = vec![
            e / v * re + d / v * hand.cost_of_debt,
            d / v * re + e / v * rd_after,
            (1.0 - de) * re + de * rd_after,
            (re + rd_after) / 2.0,
        ];
        Ok(Scenario {
            game: GameKind::WaccCards,
            round,
            params: hand.cards(),
            prompt: format!(
                "Your hand: equity worth {}, debt worth {}, risk-free {}, beta {:.2}, \
                 market risk premium {}, pre-tax cost of debt {}, tax rate {}. \
                 What is the firm's WACC?",
                money(e),
                money(d),
                pct(hand.risk_free),
                hand.beta,
                pct(hand.market_risk_premium),
                pct(hand.cost_of_debt),
                pct(hand.tax_rate)
            ),
            unknown: Quantity::Rate,
            correct: wacc,
            explanation: format!(
                "rE = {} + {:.2} x {} = {re:.6}; WACC = E/V x rE + D/V x rD x (1 - t) \
                 = {:.4} x {re:.6} + {:.4} x {} x (1 - {}) = {wacc:.6}",
                hand.risk_free,
                hand.beta,
                hand.market_risk_premium,
                e / v,
                d / v,
                hand.cost_of_debt,
                hand.tax_rate
            ),
            mistakes,
        })
    }
}
