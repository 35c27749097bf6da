#![deny(warnings)]

//! Core domain models and invariants for the classroom finance games.
//!
//! This crate defines serializable types shared by the scenario engine and
//! the front ends, with validation helpers that guard the basic invariants
//! of questions and round state. Rate quotes live in `fin_math` and are
//! re-exported here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use fin_math::{validate_rate_quote, QuoteError, RateQuote};

/// Kind of quantity a question solves for.
///
/// Drives the comparison tolerance, the display format and the precision
/// distractors are rounded to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    /// Money amounts (present values, prices, earnings).
    Currency,
    /// Rates and returns, stored as decimals.
    Rate,
    /// Number of periods, possibly fractional.
    Periods,
    /// Dimensionless ratios such as a profitability index.
    Ratio,
}

impl Quantity {
    /// Default comparison tolerance in the quantity's own unit.
    pub fn default_tolerance(self) -> f64 {
        match self {
            Quantity::Currency => 0.005,
            Quantity::Rate => 0.0001,
            Quantity::Periods => 0.05,
            Quantity::Ratio => 0.005,
        }
    }

    /// Decimal places kept when a value of this kind is rounded for display.
    pub fn decimals(self) -> u32 {
        match self {
            Quantity::Currency => 2,
            Quantity::Rate => 4,
            Quantity::Periods => 2,
            Quantity::Ratio => 3,
        }
    }

    /// Render a value for players.
    pub fn format(self, value: f64) -> String {
        match self {
            Quantity::Currency if value < 0.0 => format!("-${:.2}", -value),
            Quantity::Currency => format!("${value:.2}"),
            Quantity::Rate => format!("{:.2}%", value * 100.0),
            Quantity::Periods => format!("{value:.2}"),
            Quantity::Ratio => format!("{value:.3}"),
        }
    }
}

/// The six classroom games.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    LendingNegotiation,
    BondMemory,
    WaccCards,
    TvmRocket,
    DecisionRules,
    IncrementalEarnings,
}

impl GameKind {
    pub const ALL: [GameKind; 6] = [
        GameKind::LendingNegotiation,
        GameKind::BondMemory,
        GameKind::WaccCards,
        GameKind::TvmRocket,
        GameKind::DecisionRules,
        GameKind::IncrementalEarnings,
    ];

    /// Identifier used on the command line and in config files.
    pub fn slug(self) -> &'static str {
        match self {
            GameKind::LendingNegotiation => "lending",
            GameKind::BondMemory => "bonds",
            GameKind::WaccCards => "wacc",
            GameKind::TvmRocket => "tvm",
            GameKind::DecisionRules => "decisions",
            GameKind::IncrementalEarnings => "earnings",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            GameKind::LendingNegotiation => "Lending Negotiation Simulator",
            GameKind::BondMemory => "Bond Pricing Memory",
            GameKind::WaccCards => "WACC Card Game",
            GameKind::TvmRocket => "TVM Rocket",
            GameKind::DecisionRules => "Investment Decision Rules",
            GameKind::IncrementalEarnings => "Incremental Earnings Trainer",
        }
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for GameKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        GameKind::ALL
            .into_iter()
            .find(|k| k.slug() == wanted)
            .ok_or(ValidationError::UnknownGame(wanted))
    }
}

/// A labelled parameter drawn for a scenario, e.g. "principal" = 25000.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub label: String,
    pub value: f64,
    /// Kind of value, used for display.
    pub unit: Quantity,
}

impl Param {
    pub fn new(label: impl Into<String>, value: f64, unit: Quantity) -> Self {
        Self {
            label: label.into(),
            value,
            unit,
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.unit.format(self.value))
    }
}

/// One round's problem: drawn parameters plus the derived ground truth.
///
/// Created at round start and read-only afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Game that drew the scenario.
    pub game: GameKind,
    /// 1-based round number within the session.
    pub round: u32,
    /// Inputs shown to the player, in prompt order.
    pub params: Vec<Param>,
    /// Question text with the parameters filled in.
    pub prompt: String,
    /// What the player solves for.
    pub unknown: Quantity,
    /// Ground-truth answer, always finite.
    pub correct: f64,
    /// Formula restated with the substituted numbers and the result.
    pub explanation: String,
    /// Answers produced by common mistakes; preferred as distractors.
    pub mistakes: Vec<f64>,
}

/// A multiple-choice (or free-form) question derived from a scenario.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub game: GameKind,
    pub prompt: String,
    pub unknown: Quantity,
    /// Shuffled options, 2 to 4 of them.
    pub options: Vec<f64>,
    /// Position of the correct answer in `options`.
    pub correct_index: usize,
    /// Ground truth copied from the scenario.
    pub correct: f64,
    /// Largest absolute error still graded correct.
    pub tolerance: f64,
    /// Shown after the answer is graded.
    pub explanation: String,
}

impl Question {
    /// Whether `value` equals the correct answer within tolerance.
    pub fn matches(&self, value: f64) -> bool {
        value.is_finite() && (value - self.correct).abs() <= self.tolerance
    }

    /// Options rendered for display, in presentation order.
    pub fn option_labels(&self) -> Vec<String> {
        self.options.iter().map(|v| self.unknown.format(*v)).collect()
    }
}

/// Result of validating a submitted answer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnswerOutcome {
    /// Whether the answer was within tolerance.
    pub correct: bool,
    pub explanation: String,
    /// Ground-truth answer for the round.
    pub correct_value: f64,
    /// Value the player submitted.
    pub chosen: f64,
}

/// Engine phases. Each round walks them in a fixed order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Setup,
    Presenting,
    AwaitingInput,
    Validating,
    Revealing,
    RoundOver,
}

impl Phase {
    /// Legal transitions of the scenario state machine.
    pub fn can_advance_to(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Setup, Presenting)
                | (Presenting, AwaitingInput)
                | (AwaitingInput, Validating)
                | (Validating, Revealing)
                | (Revealing, Presenting)
                | (Revealing, RoundOver)
                | (RoundOver, Setup)
        )
    }
}

/// Attempted phase change outside the fixed order.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal phase transition {from:?} -> {to:?}")]
pub struct TransitionError {
    /// Phase the state was in.
    pub from: Phase,
    /// Phase that was requested.
    pub to: Phase,
}

/// Mutable per-session state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoundState {
    pub phase: Phase,
    /// Current round, 0 before the first scenario is drawn.
    pub round: u32,
    /// Questions graded so far.
    pub answered: u32,
    /// Correct answers so far; never exceeds `answered`.
    pub score: u32,
    /// Questions per session.
    pub budget: u32,
    /// Scenario of the current round.
    pub scenario: Option<Scenario>,
    /// Question built from `scenario`, once presented.
    pub question: Option<Question>,
    /// Outcome of the most recent answer.
    pub last_outcome: Option<AnswerOutcome>,
    /// Every graded outcome, oldest first.
    pub history: Vec<AnswerOutcome>,
}

impl RoundState {
    pub fn new(budget: u32) -> Self {
        Self {
            phase: Phase::Setup,
            round: 0,
            answered: 0,
            score: 0,
            budget,
            scenario: None,
            question: None,
            last_outcome: None,
            history: Vec::new(),
        }
    }

    /// Move to `next`, rejecting anything but the fixed phase order.
    pub fn advance(&mut self, next: Phase) -> Result<(), TransitionError> {
        if !self.phase.can_advance_to(next) {
            return Err(TransitionError {
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        Ok(())
    }

    pub fn remaining(&self) -> u32 {
        self.budget.saturating_sub(self.answered)
    }

    pub fn budget_spent(&self) -> bool {
        self.answered >= self.budget
    }
}

/// Per-quantity comparison tolerances.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    /// Dollars.
    pub currency: f64,
    /// Decimal rate, so 0.0001 is one basis point.
    pub rate: f64,
    /// Periods or years.
    pub periods: f64,
    pub ratio: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            currency: Quantity::Currency.default_tolerance(),
            rate: Quantity::Rate.default_tolerance(),
            periods: Quantity::Periods.default_tolerance(),
            ratio: Quantity::Ratio.default_tolerance(),
        }
    }
}

impl Tolerances {
    pub fn for_quantity(&self, q: Quantity) -> f64 {
        match q {
            Quantity::Currency => self.currency,
            Quantity::Rate => self.rate,
            Quantity::Periods => self.periods,
            Quantity::Ratio => self.ratio,
        }
    }
}

/// Bounds for jitter-based distractors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitterConfig {
    /// Relative perturbation for currency and ratio answers.
    pub relative_min: f64,
    /// Upper bound of the relative perturbation.
    pub relative_max: f64,
    /// Absolute perturbation for rates (0.0025 = 0.25 percentage points).
    pub rate_step_min: f64,
    pub rate_step_max: f64,
    /// Absolute perturbation for period counts.
    pub period_step_min: f64,
    pub period_step_max: f64,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            relative_min: 0.05,
            relative_max: 0.30,
            rate_step_min: 0.0025,
            rate_step_max: 0.02,
            period_step_min: 0.25,
            period_step_max: 2.0,
        }
    }
}

/// Scenario engine configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seed for the per-session deterministic RNG.
    pub rng_seed: u64,
    /// Questions graded before the session ends.
    pub questions_per_session: u32,
    /// Options per question including the correct one (2..=4).
    pub option_count: usize,
    /// Scenario redraws allowed before giving up on a round.
    pub max_regenerations: u32,
    /// Jitter draws allowed while filling the option set.
    pub max_distractor_attempts: u32,
    /// Bounds for randomly perturbed distractors.
    pub jitter: JitterConfig,
    /// Grading tolerance per quantity.
    pub tolerances: Tolerances,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rng_seed: 42,
            questions_per_session: 5,
            option_count: 4,
            max_regenerations: 32,
            max_distractor_attempts: 64,
            jitter: JitterConfig::default(),
            tolerances: Tolerances::default(),
        }
    }
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Numeric field must be finite.
    #[error("non-finite numeric value encountered")]
    NonFinite,
    #[error(transparent)]
    Quote(#[from] QuoteError),
    #[error("a question needs 2 to 4 options, got {0}")]
    OptionCount(usize),
    #[error("tolerance must be positive and finite")]
    InvalidTolerance,
    #[error("no option matches the correct answer")]
    CorrectOptionMissing,
    #[error("options are not distinguishable within tolerance")]
    AmbiguousOptions,
    #[error("prompt must not be empty")]
    EmptyPrompt,
    #[error("unknown game: {0}")]
    UnknownGame(String),
    #[error("invalid engine config: {0}")]
    Config(&'static str),
}

/// Validate a freshly generated scenario.
pub fn validate_scenario(s: &Scenario) -> Result<(), ValidationError> {
    if s.prompt.trim().is_empty() {
        return Err(ValidationError::EmptyPrompt);
    }
    if !s.correct.is_finite() || s.params.iter().any(|p| !p.value.is_finite()) {
        return Err(ValidationError::NonFinite);
    }
    Ok(())
}

/// Validate the option set of a question.
///
/// Exactly one option may sit within tolerance of the correct answer and no
/// two options may be within tolerance of each other.
pub fn validate_question(q: &Question) -> Result<(), ValidationError> {
    let n = q.options.len();
    if !(2..=4).contains(&n) {
        return Err(ValidationError::OptionCount(n));
    }
    if !(q.tolerance.is_finite() && q.tolerance > 0.0) {
        return Err(ValidationError::InvalidTolerance);
    }
    if !q.correct.is_finite() || q.options.iter().any(|v| !v.is_finite()) {
        return Err(ValidationError::NonFinite);
    }
    match q.options.get(q.correct_index) {
        Some(v) if q.matches(*v) => {}
        _ => return Err(ValidationError::CorrectOptionMissing),
    }
    if q.options.iter().filter(|v| q.matches(**v)).count() != 1 {
        return Err(ValidationError::AmbiguousOptions);
    }
    for (i, a) in q.options.iter().enumerate() {
        for b in &q.options[i + 1..] {
            if (a - b).abs() <= q.tolerance {
                return Err(ValidationError::AmbiguousOptions);
            }
        }
    }
    Ok(())
}

/// Validate engine configuration values.
pub fn validate_engine_config(c: &EngineConfig) -> Result<(), ValidationError> {
    if !(2..=4).contains(&c.option_count) {
        return Err(ValidationError::OptionCount(c.option_count));
    }
    if c.questions_per_session == 0 {
        return Err(ValidationError::Config("questions_per_session must be >= 1"));
    }
    if c.max_regenerations == 0 || c.max_distractor_attempts == 0 {
        return Err(ValidationError::Config("retry budgets must be >= 1"));
    }
    let j = &c.jitter;
    let pairs = [
        (j.relative_min, j.relative_max),
        (j.rate_step_min, j.rate_step_max),
        (j.period_step_min, j.period_step_max),
    ];
    for (lo, hi) in pairs {
        if !(lo.is_finite() && hi.is_finite() && lo > 0.0 && lo <= hi) {
            return Err(ValidationError::Config("jitter bounds must satisfy 0 < min <= max"));
        }
    }
    let t = &c.tolerances;
    for tol in [t.currency, t.rate, t.periods, t.ratio] {
        if !(tol.is_finite() && tol > 0.0) {
            return Err(ValidationError::InvalidTolerance);
        }
    }
    Ok(())
}

/// Player input that is not a usable number.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("answer {0:?} is not a number")]
pub struct AnswerError(pub String);

/// Parse free-form numeric input.
///
/// Accepts `$` prefixes and thousands separators; a trailing `%` divides by
/// 100 so "12.5%" and "0.125" mean the same rate. Scientific notation such
/// as "1e3" is accepted; NaN and infinities are rejected.
pub fn parse_answer(input: &str) -> Result<f64, AnswerError> {
    let malformed = || AnswerError(input.to_string());
    let cleaned: String = input
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    let (digits, scale) = match cleaned.strip_suffix('%') {
        Some(rest) => (rest, 0.01),
        None => (cleaned.as_str(), 1.0),
    };
    // Rust accepts "nan"/"inf" as floats; players should not.
    let body = digits.trim_start_matches(['+', '-']).to_ascii_lowercase();
    if digits.is_empty() || matches!(body.as_str(), "nan" | "inf" | "infinity") {
        return Err(malformed());
    }
    let value: f64 = digits.parse().map_err(|_| malformed())?;
    let value = value * scale;
    if !value.is_finite() {
        return Err(malformed());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn question(options: Vec<f64>, correct_index: usize) -> Question {
        Question {
            game: GameKind::TvmRocket,
            prompt: "PV?".to_string(),
            unknown: Quantity::Currency,
            correct: options[correct_index],
            options,
            correct_index,
            tolerance: 0.005,
            explanation: "PV = FV / (1 + r)^n".to_string(),
        }
    }

    #[test]
    fn serde_roundtrip_scenario() {
        let s = Scenario {
            game: GameKind::LendingNegotiation,
            round: 1,
            params: vec![Param::new("principal", 25_000.0, Quantity::Currency)],
            prompt: "What real rate?".to_string(),
            unknown: Quantity::Rate,
            correct: 0.048544,
            explanation: "1.08 / 1.03 - 1".to_string(),
            mistakes: vec![0.05, 0.08],
        };
        validate_scenario(&s).unwrap();
        let json = serde_json::to_string(&s).unwrap();
        let back: Scenario = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn rate_quote_serializes_tagged() {
        let q = RateQuote::Nominal {
            annual_rate: 0.12,
            compoundings_per_year: 12,
        };
        let json = serde_json::to_string(&q).unwrap();
        assert!(json.contains("\"kind\":\"nominal\""));
        assert_eq!(q.to_string(), "12.00% APR compounded monthly");
    }

    #[test]
    fn quote_errors_convert() {
        let zero_m = RateQuote::Nominal {
            annual_rate: 0.05,
            compoundings_per_year: 0,
        };
        let err: ValidationError = validate_rate_quote(&zero_m).unwrap_err().into();
        assert_eq!(err, ValidationError::Quote(QuoteError::ZeroCompounding));
        assert_eq!(err.to_string(), "compounding frequency must be >= 1");
    }

    #[test]
    fn game_kind_parses_slugs() {
        for k in GameKind::ALL {
            assert_eq!(k.slug().parse::<GameKind>().unwrap(), k);
        }
        assert!("poker".parse::<GameKind>().is_err());
    }

    #[test]
    fn quantity_formats() {
        assert_eq!(Quantity::Currency.format(1234.5), "$1234.50");
        assert_eq!(Quantity::Currency.format(-3.0), "-$3.00");
        assert_eq!(Quantity::Rate.format(0.126825), "12.68%");
        assert_eq!(Quantity::Ratio.format(1.23456), "1.235");
    }

    #[test]
    fn parse_answer_accepts_common_forms() {
        assert_eq!(parse_answer("783.53").unwrap(), 783.53);
        assert_eq!(parse_answer(" $1,250.00 ").unwrap(), 1250.0);
        assert!((parse_answer("12.5%").unwrap() - 0.125).abs() < 1e-12);
        assert_eq!(parse_answer("-4").unwrap(), -4.0);
    }

    #[test]
    fn parse_answer_accepts_scientific_notation() {
        assert_eq!(parse_answer("1e3").unwrap(), 1000.0);
        assert_eq!(parse_answer("2.5E-2").unwrap(), 0.025);
        assert!((parse_answer("1.25e1%").unwrap() - 0.125).abs() < 1e-12);
        assert!(parse_answer("1e999").is_err());
        assert!(parse_answer("e3").is_err());
    }

    #[test]
    fn parse_answer_rejects_garbage() {
        for bad in [
            "", "abc", "NaN", "+nan", "inf", "-INF", "-infinity", "%", "inf%", "1.2.3", "$",
            "banana",
        ] {
            assert!(parse_answer(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn phase_order_is_fixed() {
        let mut st = RoundState::new(2);
        assert!(st.advance(Phase::AwaitingInput).is_err());
        st.advance(Phase::Presenting).unwrap();
        st.advance(Phase::AwaitingInput).unwrap();
        st.advance(Phase::Validating).unwrap();
        st.advance(Phase::Revealing).unwrap();
        assert_eq!(
            st.advance(Phase::Validating),
            Err(TransitionError {
                from: Phase::Revealing,
                to: Phase::Validating
            })
        );
        st.advance(Phase::RoundOver).unwrap();
        assert!(st.advance(Phase::Presenting).is_err());
        st.advance(Phase::Setup).unwrap();
    }

    #[test]
    fn question_validation() {
        let q = question(vec![100.0, 110.0, 90.0], 0);
        validate_question(&q).unwrap();
        assert!(q.matches(100.004));
        assert!(!q.matches(100.01));

        let dup = question(vec![100.0, 100.001, 90.0], 0);
        assert_eq!(
            validate_question(&dup),
            Err(ValidationError::AmbiguousOptions)
        );

        let single = question(vec![100.0], 0);
        assert_eq!(
            validate_question(&single),
            Err(ValidationError::OptionCount(1))
        );

        let mut wrong_index = question(vec![100.0, 110.0], 0);
        wrong_index.correct_index = 1;
        assert_eq!(
            validate_question(&wrong_index),
            Err(ValidationError::CorrectOptionMissing)
        );
    }

    #[test]
    fn engine_config_defaults_validate() {
        let c = EngineConfig::default();
        validate_engine_config(&c).unwrap();
        let bad = EngineConfig {
            option_count: 5,
            ..EngineConfig::default()
        };
        assert!(validate_engine_config(&bad).is_err());
        let mut bad_jitter = EngineConfig::default();
        bad_jitter.jitter.relative_min = 0.5;
        assert!(validate_engine_config(&bad_jitter).is_err());
    }

    proptest! {
        #[test]
        fn valid_nominal_quotes_pass(rate in 0.0f64..1.0, m in 1u32..400) {
            let q = RateQuote::Nominal { annual_rate: rate, compoundings_per_year: m };
            prop_assert!(validate_rate_quote(&q).is_ok());
        }

        #[test]
        fn parse_answer_roundtrips_plain_numbers(v in -1.0e9f64..1.0e9) {
            let parsed = parse_answer(&format!("{v}")).unwrap();
            prop_assert_eq!(parsed, v);
        }
    }
}
