//! Lending negotiation simulator.
//!
//! Two lenders hold competing loan quotes. The question asks for the real
//! return of the player's own quote; the [`Negotiation`] sub-protocol is a
//! poker-style showdown where the rival's quote is revealed street by street
//! while the pot grows, and the higher real return takes the pot.

use super::{explain_ear, money, pct, pick, stepped};
use crate::config::{check_choices, check_positive, check_range, ConfigError};
use crate::money::{round_to, to_money};
use crate::variant::GameVariant;
use fin_math::{effective_annual_rate, real_rate, FinanceError};
use quiz_ai::{decide, quality_score, ContinuePolicy, Decision, PolicyConfig};
use quiz_core::{GameKind, Param, Quantity, RateQuote, Scenario};
use rand::{Rng, RngCore};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LendingConfig {
    /// Loan principal range, drawn in `principal_step` increments.
    pub principal_min: f64,
    pub principal_max: f64,
    pub principal_step: f64,
    pub term_years: Vec<u32>,
    /// Stated annual rates both lenders quote from.
    pub nominal_rates: Vec<f64>,
    /// Compounding frequencies for nominal quotes.
    pub compounding: Vec<u32>,
    /// Expected inflation, used to turn effective rates into real ones.
    pub inflation: Vec<f64>,
    /// Player's bankroll at the start of each negotiation.
    pub starting_bankroll: f64,
    /// Paid into the pot by both sides when a negotiation opens.
    pub ante: f64,
    /// Real-rate range mapped onto the rival's quality score.
    pub real_rate_floor: f64,
    pub real_rate_ceiling: f64,
    /// Real rates closer than this split the pot.
    pub tie_tolerance: f64,
    /// Rival's continue policy.
    pub policy: PolicyConfig,
}

impl Default for LendingConfig {
    fn default() -> Self {
        Self {
            principal_min: 5_000.0,
            principal_max: 100_000.0,
            principal_step: 1_000.0,
            term_years: vec![1, 2, 3, 5, 7, 10],
            nominal_rates: vec![
                0.03, 0.035, 0.04, 0.045, 0.05, 0.055, 0.06, 0.065, 0.07, 0.075, 0.08, 0.09,
                0.10, 0.11, 0.12,
            ],
            compounding: vec![1, 2, 4, 12, 52, 365],
            inflation: vec![0.0, 0.01, 0.02, 0.03, 0.04, 0.05, 0.06],
            starting_bankroll: 1_000.0,
            ante: 10.0,
            real_rate_floor: -0.03,
            real_rate_ceiling: 0.12,
            tie_tolerance: 1e-4,
            policy: PolicyConfig::default(),
        }
    }
}

impl LendingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("lending.principal", self.principal_min, self.principal_max)?;
        check_positive("lending.principal_min", self.principal_min)?;
        check_choices("lending.term_years", &self.term_years)?;
        check_choices("lending.nominal_rates", &self.nominal_rates)?;
        check_choices("lending.compounding", &self.compounding)?;
        check_choices("lending.inflation", &self.inflation)?;
        check_positive("lending.ante", self.ante)?;
        check_range("lending.bankroll", self.ante, self.starting_bankroll)?;
        check_range(
            "lending.real_rate",
            self.real_rate_floor,
            self.real_rate_ceiling,
        )?;
        check_positive("lending.tie_tolerance", self.tie_tolerance)?;
        check_range("lending.policy", self.policy.floor, self.policy.ceiling)?;
        Ok(())
    }
}

/// One deal: the loan being negotiated and both lenders' quotes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LendingHand {
    pub principal: f64,
    pub term_years: u32,
    pub inflation: f64,
    pub player: RateQuote,
    pub rival: RateQuote,
}

impl LendingHand {
    pub fn player_real(&self) -> Result<f64, FinanceError> {
        real_rate(effective_annual_rate(&self.player)?, self.inflation)
    }

    pub fn rival_real(&self) -> Result<f64, FinanceError> {
        real_rate(effective_annual_rate(&self.rival)?, self.inflation)
    }
}

/// Deal a hand with each quote form chosen uniformly.
pub fn deal_hand(
    config: &LendingConfig,
    rng: &mut dyn RngCore,
) -> Result<LendingHand, FinanceError> {
    let principal = stepped(
        rng,
        config.principal_min,
        config.principal_max,
        config.principal_step,
        "principal",
    )?;
    let term_years = pick(rng, &config.term_years, "term_years")?;
    let inflation = pick(rng, &config.inflation, "inflation")?;
    let player = draw_quote(config, term_years, rng)?;
    let rival = draw_quote(config, term_years, rng)?;
    let hand = LendingHand {
        principal,
        term_years,
        inflation,
        player,
        rival,
    };
    // Both sides must be solvable before the hand is played.
    hand.player_real()?;
    hand.rival_real()?;
    Ok(hand)
}

fn draw_quote(
    config: &LendingConfig,
    term_years: u32,
    rng: &mut dyn RngCore,
) -> Result<RateQuote, FinanceError> {
    let rate = pick(rng, &config.nominal_rates, "nominal_rates")?;
    let quote = match rng.gen_range(0..3) {
        0 => RateQuote::Nominal {
            annual_rate: rate,
            compoundings_per_year: pick(rng, &config.compounding, "compounding")?,
        },
        1 => RateQuote::Effective { annual_rate: rate },
        _ => {
            let term = f64::from(term_years);
            RateQuote::LumpSum {
                multiplier: round_to((1.0 + rate).powf(term), 3),
                term_years: term,
            }
        }
    };
    effective_annual_rate(&quote)?;
    Ok(quote)
}

/// Stated annual figure a careless reader would take at face value.
fn quoted_rate(quote: &RateQuote) -> f64 {
    match *quote {
        RateQuote::Nominal { annual_rate, .. } | RateQuote::Effective { annual_rate } => {
            annual_rate
        }
        RateQuote::LumpSum {
            multiplier,
            term_years,
        } => (multiplier - 1.0) / term_years,
    }
}

pub struct LendingGame {
    config: LendingConfig,
}

impl LendingGame {
    pub fn new(config: LendingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LendingConfig {
        &self.config
    }

    /// Deal a hand and open a negotiation over it.
    pub fn open_negotiation(
        &self,
        rng: &mut dyn RngCore,
    ) -> Result<Negotiation, NegotiationError> {
        let hand = deal_hand(&self.config, rng)?;
        Negotiation::open(hand, &self.config)
    }
}

impl GameVariant for LendingGame {
    fn kind(&self) -> GameKind {
        GameKind::LendingNegotiation
    }

    fn draw(&self, rng: &mut dyn RngCore, round: u32) -> Result<Scenario, FinanceError> {
        let hand = deal_hand(&self.config, rng)?;
        let ear = effective_annual_rate(&hand.player)?;
        let real = real_rate(ear, hand.inflation)?;
        let quoted = quoted_rate(&hand.player);
        let prompt = format!(
            "You can lend {} for {} years at {}. Inflation is expected to run {} a year. \
             What real annual return does this loan earn?",
            money(hand.principal),
            hand.term_years,
            hand.player,
            pct(hand.inflation)
        );
        let explanation = format!(
            "{}; real = (1 + {ear:.6}) / (1 + {}) - 1 = {real:.6}",
            explain_ear(&hand.player, ear),
            hand.inflation
        );
        Ok(Scenario {
            game: GameKind::LendingNegotiation,
            round,
            params: vec![
                Param::new("principal", hand.principal, Quantity::Currency),
                Param::new("term (years)", f64::from(hand.term_years), Quantity::Periods),
                Param::new("inflation", hand.inflation, Quantity::Rate),
                Param::new("effective annual rate", ear, Quantity::Rate),
            ],
            prompt,
            unknown: Quantity::Rate,
            correct: real,
            explanation,
            mistakes: vec![ear - hand.inflation, ear, quoted - hand.inflation],
        })
    }
}

/// Betting rounds of a negotiation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Street {
    /// Rival quote fully hidden.
    Initial,
    /// Rival's quote form is known.
    Revealed1,
    /// Rival's full quote is known.
    Revealed2,
    Over,
}

/// Single terminal result of a negotiation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    Win,
    Lose,
    Tie,
    PlayerFolded,
    RivalFolded,
}

/// What the player currently knows about the rival's quote.
#[derive(Clone, Debug, PartialEq)]
pub enum RivalView {
    Hidden,
    Form(&'static str),
    Full(RateQuote),
}

/// Result of one bet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BetOutcome {
    RivalCalled { street: Street },
    RivalFolded,
    Showdown(Resolution),
}

#[derive(Debug, Error, PartialEq)]
pub enum NegotiationError {
    #[error("the negotiation is already resolved")]
    Resolved,
    #[error("stake must be positive")]
    NonPositiveStake,
    #[error("stake {stake} exceeds bankroll {bankroll}")]
    InsufficientBankroll { stake: Decimal, bankroll: Decimal },
    #[error("ante must be positive and covered by the bankroll")]
    InvalidAnte,
    #[error(transparent)]
    Finance(#[from] FinanceError),
}

/// Poker-style negotiation over a [`LendingHand`].
///
/// The pot strictly increases with every bet, the reveal count never
/// decreases, and exactly one [`Resolution`] ends the negotiation.
#[derive(Clone, Debug)]
pub struct Negotiation {
    hand: LendingHand,
    street: Street,
    pot: Decimal,
    bankroll: Decimal,
    starting_bankroll: Decimal,
    resolution: Option<Resolution>,
    player_real: f64,
    rival_real: f64,
    quality: f64,
    tie_tolerance: f64,
}

impl Negotiation {
    /// Both sides ante into the pot.
    pub fn open(hand: LendingHand, config: &LendingConfig) -> Result<Self, NegotiationError> {
        let bankroll = to_money(config.starting_bankroll).ok_or(NegotiationError::InvalidAnte)?;
        let ante = to_money(config.ante).ok_or(NegotiationError::InvalidAnte)?;
        if ante <= Decimal::ZERO || ante > bankroll {
            return Err(NegotiationError::InvalidAnte);
        }
        let player_real = hand.player_real()?;
        let rival_real = hand.rival_real()?;
        let quality = quality_score(rival_real, config.real_rate_floor, config.real_rate_ceiling);
        debug!(player_real, rival_real, quality, "negotiation opened");
        Ok(Self {
            hand,
            street: Street::Initial,
            pot: ante + ante,
            bankroll: bankroll - ante,
            starting_bankroll: bankroll,
            resolution: None,
            player_real,
            rival_real,
            quality,
            tie_tolerance: config.tie_tolerance,
        })
    }

    pub fn street(&self) -> Street {
        self.street
    }

    pub fn pot(&self) -> Decimal {
        self.pot
    }

    pub fn bankroll(&self) -> Decimal {
        self.bankroll
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    /// Number of rival attributes revealed so far (0..=2).
    pub fn reveals(&self) -> u8 {
        match self.street {
            Street::Initial => 0,
            Street::Revealed1 => 1,
            Street::Revealed2 | Street::Over => 2,
        }
    }

    pub fn player_quote(&self) -> &RateQuote {
        &self.hand.player
    }

    pub fn hand_summary(&self) -> String {
        format!(
            "{} for {} years at {}, inflation {}",
            money(self.hand.principal),
            self.hand.term_years,
            self.hand.player,
            pct(self.hand.inflation)
        )
    }

    pub fn rival_view(&self) -> RivalView {
        match self.street {
            Street::Initial => RivalView::Hidden,
            Street::Revealed1 => RivalView::Form(self.hand.rival.form()),
            Street::Revealed2 | Street::Over => RivalView::Full(self.hand.rival),
        }
    }

    /// Put `stake` into the pot; the rival matches it or folds.
    ///
    /// A match advances one street and reveals one more rival attribute;
    /// a match on the last street goes to showdown.
    pub fn bet<P: ContinuePolicy + ?Sized>(
        &mut self,
        stake: Decimal,
        policy: &P,
        rng: &mut dyn RngCore,
    ) -> Result<BetOutcome, NegotiationError> {
        if self.resolution.is_some() {
            return Err(NegotiationError::Resolved);
        }
        if stake <= Decimal::ZERO {
            return Err(NegotiationError::NonPositiveStake);
        }
        if stake > self.bankroll {
            return Err(NegotiationError::InsufficientBankroll {
                stake,
                bankroll: self.bankroll,
            });
        }
        self.bankroll -= stake;
        self.pot += stake;
        let pot_fraction = (self.pot / self.starting_bankroll).to_f64().unwrap_or(1.0);

        if decide(policy, self.quality, pot_fraction, rng) == Decision::Fold {
            self.bankroll += self.pot;
            self.finish(Resolution::RivalFolded);
            return Ok(BetOutcome::RivalFolded);
        }
        self.pot += stake;
        let outcome = match self.street {
            Street::Initial => {
                self.street = Street::Revealed1;
                BetOutcome::RivalCalled {
                    street: self.street,
                }
            }
            Street::Revealed1 => {
                self.street = Street::Revealed2;
                BetOutcome::RivalCalled {
                    street: self.street,
                }
            }
            Street::Revealed2 => BetOutcome::Showdown(self.showdown()),
            Street::Over => return Err(NegotiationError::Resolved),
        };
        Ok(outcome)
    }

    /// Concede the pot to the rival.
    pub fn fold(&mut self) -> Result<Resolution, NegotiationError> {
        if self.resolution.is_some() {
            return Err(NegotiationError::Resolved);
        }
        self.finish(Resolution::PlayerFolded);
        Ok(Resolution::PlayerFolded)
    }

    fn showdown(&mut self) -> Resolution {
        let diff = self.player_real - self.rival_real;
        let resolution = if diff.abs() <= self.tie_tolerance {
            self.bankroll += self.pot / Decimal::TWO;
            Resolution::Tie
        } else if diff > 0.0 {
            self.bankroll += self.pot;
            Resolution::Win
        } else {
            Resolution::Lose
        };
        self.finish(resolution);
        resolution
    }

    fn finish(&mut self, resolution: Resolution) {
        self.street = Street::Over;
        self.resolution = Some(resolution);
        info!(?resolution, pot = %self.pot, bankroll = %self.bankroll, "negotiation resolved");
    }

    /// Narrate the hand; rival numbers are only shown once revealed.
    pub fn explain(&self) -> String {
        let mine = format!("your real return is {}", pct(self.player_real));
        match (self.resolution, self.rival_view()) {
            (Some(Resolution::RivalFolded), _) => {
                format!("The rival folded; {mine}. You take the {} pot.", self.pot)
            }
            (Some(Resolution::PlayerFolded), _) => {
                format!("You folded; {mine}. The rival takes the {} pot.", self.pot)
            }
            (Some(r), RivalView::Full(quote)) => format!(
                "Showdown ({r:?}): {mine}; the rival's {quote} returns {} real.",
                pct(self.rival_real)
            ),
            (_, RivalView::Form(form)) => {
                format!("The rival is quoting a {form}; {mine}.")
            }
            _ => format!("The rival's quote is still hidden; {mine}."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::testing::exercise;
    use proptest::prelude::*;
    use quiz_ai::{AlwaysContinue, QualityPotPolicy};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct NeverContinue;

    impl ContinuePolicy for NeverContinue {
        fn continue_probability(&self, _quality: f64, _pot_fraction: f64) -> f64 {
            0.0
        }
    }

    fn hand(player: RateQuote, rival: RateQuote) -> LendingHand {
        LendingHand {
            principal: 10_000.0,
            term_years: 5,
            inflation: 0.03,
            player,
            rival,
        }
    }

    fn eff(rate: f64) -> RateQuote {
        RateQuote::Effective { annual_rate: rate }
    }

    #[test]
    fn questions_are_valid() {
        exercise(&LendingGame::new(LendingConfig::default()), 21, 30);
    }

    #[test]
    fn real_return_uses_fisher() {
        let g = LendingGame::new(LendingConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let s = g.draw(&mut rng, 1).unwrap();
        let inflation = s.params[2].value;
        let ear = s.params[3].value;
        assert!((s.correct - ((1.0 + ear) / (1.0 + inflation) - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn showdown_higher_real_return_wins() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut n = Negotiation::open(hand(eff(0.08), eff(0.05)), &LendingConfig::default()).unwrap();
        assert_eq!(n.pot(), Decimal::new(20, 0));
        assert_eq!(n.rival_view(), RivalView::Hidden);

        let out = n.bet(Decimal::new(10, 0), &AlwaysContinue, &mut rng).unwrap();
        assert_eq!(out, BetOutcome::RivalCalled { street: Street::Revealed1 });
        assert_eq!(n.rival_view(), RivalView::Form("effective annual rate"));
        n.bet(Decimal::new(20, 0), &AlwaysContinue, &mut rng).unwrap();
        assert_eq!(n.reveals(), 2);
        let out = n.bet(Decimal::new(30, 0), &AlwaysContinue, &mut rng).unwrap();
        assert_eq!(out, BetOutcome::Showdown(Resolution::Win));
        // 20 ante + 2 x (10 + 20 + 30)
        assert_eq!(n.pot(), Decimal::new(140, 0));
        assert_eq!(n.bankroll(), Decimal::new(1070, 0));
        assert!(n.explain().contains("Showdown"));
        assert_eq!(
            n.bet(Decimal::ONE, &AlwaysContinue, &mut rng),
            Err(NegotiationError::Resolved)
        );
        assert_eq!(n.fold(), Err(NegotiationError::Resolved));
    }

    #[test]
    fn equal_real_returns_split_the_pot() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut n = Negotiation::open(hand(eff(0.06), eff(0.06)), &LendingConfig::default()).unwrap();
        for _ in 0..3 {
            n.bet(Decimal::new(10, 0), &AlwaysContinue, &mut rng).unwrap();
        }
        assert_eq!(n.resolution(), Some(Resolution::Tie));
        // 990 - 30 + 80 / 2
        assert_eq!(n.bankroll(), Decimal::new(1000, 0));
    }

    #[test]
    fn rival_fold_awards_pot() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut n = Negotiation::open(hand(eff(0.02), eff(0.10)), &LendingConfig::default()).unwrap();
        let out = n.bet(Decimal::new(50, 0), &NeverContinue, &mut rng).unwrap();
        assert_eq!(out, BetOutcome::RivalFolded);
        assert_eq!(n.resolution(), Some(Resolution::RivalFolded));
        assert_eq!(n.bankroll(), Decimal::new(1010, 0));
    }

    #[test]
    fn invalid_bets_are_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut n = Negotiation::open(hand(eff(0.05), eff(0.04)), &LendingConfig::default()).unwrap();
        assert_eq!(
            n.bet(Decimal::ZERO, &AlwaysContinue, &mut rng),
            Err(NegotiationError::NonPositiveStake)
        );
        assert!(matches!(
            n.bet(Decimal::new(5_000, 0), &AlwaysContinue, &mut rng),
            Err(NegotiationError::InsufficientBankroll { .. })
        ));
        assert_eq!(n.street(), Street::Initial);
        assert_eq!(n.fold(), Ok(Resolution::PlayerFolded));
        assert!(n.explain().starts_with("You folded"));
    }

    #[test]
    fn ante_must_be_covered() {
        let cfg = LendingConfig {
            ante: 2_000.0,
            ..LendingConfig::default()
        };
        assert_eq!(
            Negotiation::open(hand(eff(0.05), eff(0.04)), &cfg).unwrap_err(),
            NegotiationError::InvalidAnte
        );
        assert!(cfg.validate().is_err());
    }

    proptest! {
        #[test]
        fn pot_strictly_increases_and_resolves_once(seed in 0u64..500, stakes in proptest::collection::vec(1i64..100, 1..6)) {
            let g = LendingGame::new(LendingConfig::default());
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut n = g.open_negotiation(&mut rng).unwrap();
            let policy = QualityPotPolicy::new(g.config().policy.clone());
            let mut last_pot = n.pot();
            let mut last_reveals = n.reveals();
            for s in stakes {
                match n.bet(Decimal::new(s, 0), &policy, &mut rng) {
                    Ok(_) => {
                        prop_assert!(n.pot() > last_pot);
                        prop_assert!(n.reveals() >= last_reveals);
                        last_pot = n.pot();
                        last_reveals = n.reveals();
                    }
                    Err(e) => {
                        prop_assert_eq!(e, NegotiationError::Resolved);
                        prop_assert!(n.resolution().is_some());
                    }
                }
            }
            if n.resolution().is_none() {
                prop_assert_eq!(n.fold(), Ok(Resolution::PlayerFolded));
            }
            prop_assert!(n.fold().is_err());
        }
    }
}
