//! Bond memory: price a bond, or match bond cards with their price cards.

use super::{money, pct, pick};
use crate::config::{check_choices, check_positive, ConfigError};
use crate::money::to_money;
use crate::variant::GameVariant;
use fin_math::{present_value_annuity, present_value_bond, present_value_single_sum, FinanceError};
use quiz_core::{GameKind, Param, Quantity, Scenario};
use rand::seq::SliceRandom;
use rand::RngCore;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BondConfig {
    pub face_value: f64,
    /// Annual coupon rates; 0 deals a zero-coupon bond.
    pub coupon_rates: Vec<f64>,
    pub payments_per_year: Vec<u32>,
    /// Years to maturity.
    pub years: Vec<u32>,
    /// Annual yields to maturity.
    pub yields: Vec<f64>,
    /// Bonds dealt onto a memory board.
    pub pairs: usize,
    /// Bond draws allowed while looking for distinct prices.
    pub max_deal_attempts: u32,
}

impl Default for BondConfig {
    fn default() -> Self {
        Self {
            face_value: 1_000.0,
            coupon_rates: vec![0.0, 0.03, 0.04, 0.05, 0.06, 0.07, 0.08],
            payments_per_year: vec![1, 2],
            years: vec![2, 3, 5, 7, 10, 15, 20, 30],
            yields: vec![0.02, 0.03, 0.04, 0.05, 0.06, 0.07, 0.08, 0.09, 0.10],
            pairs: 4,
            max_deal_attempts: 64,
        }
    }
}

impl BondConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("bonds.face_value", self.face_value)?;
        check_choices("bonds.coupon_rates", &self.coupon_rates)?;
        check_choices("bonds.payments_per_year", &self.payments_per_year)?;
        check_choices("bonds.years", &self.years)?;
        check_choices("bonds.yields", &self.yields)?;
        if self.payments_per_year.contains(&0) {
            return Err(ConfigError::Invalid(
                "bonds.payments_per_year must be >= 1".into(),
            ));
        }
        if self.coupon_rates.iter().any(|c| *c < 0.0) {
            return Err(ConfigError::Invalid("bonds.coupon_rates must be >= 0".into()));
        }
        if self.pairs < 2 {
            return Err(ConfigError::Invalid("bonds.pairs must be >= 2".into()));
        }
        if self.max_deal_attempts == 0 {
            return Err(ConfigError::Invalid(
                "bonds.max_deal_attempts must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BondTerms {
    pub face_value: f64,
    pub coupon_rate: f64,
    pub payments_per_year: u32,
    pub years: u32,
    pub yield_rate: f64,
}

impl BondTerms {
    pub fn draw(config: &BondConfig, rng: &mut dyn RngCore) -> Result<Self, FinanceError> {
        Ok(Self {
            face_value: config.face_value,
            coupon_rate: pick(rng, &config.coupon_rates, "coupon_rates")?,
            payments_per_year: pick(rng, &config.payments_per_year, "payments_per_year")?,
            years: pick(rng, &config.years, "years")?,
            yield_rate: pick(rng, &config.yields, "yields")?,
        })
    }

    pub fn price(&self) -> Result<f64, FinanceError> {
        self.price_with(self.payments_per_year)
    }

    fn price_with(&self, payments_per_year: u32) -> Result<f64, FinanceError> {
        present_value_bond(
            self.face_value,
            self.coupon_rate,
            payments_per_year,
            f64::from(self.years),
            self.yield_rate,
        )
    }

    fn frequency(&self) -> &'static str {
        match self.payments_per_year {
            1 => "annual",
            2 => "semiannual",
            4 => "quarterly",
            12 => "monthly",
            _ => "periodic",
        }
    }

    pub fn describe(&self) -> String {
        if self.coupon_rate == 0.0 {
            format!(
                "{} zero-coupon, {}y, yield {}",
                money(self.face_value),
                self.years,
                pct(self.yield_rate)
            )
        } else {
            format!(
                "{} {} {} coupon, {}y, yield {}",
                money(self.face_value),
                pct(self.coupon_rate),
                self.frequency(),
                self.years,
                pct(self.yield_rate)
            )
        }
    }
}

pub struct BondMemoryGame {
    config: BondConfig,
}

impl BondMemoryGame {
    pub fn new(config: BondConfig) -> Self {
        Self { config }
    }

    pub fn deal_board(&self, rng: &mut dyn RngCore) -> Result<MemoryBoard, BoardError> {
        MemoryBoard::deal(&self.config, rng)
    }
}

impl GameVariant for BondMemoryGame {
    fn kind(&self) -> GameKind {
        GameKind::BondMemory
    }

    fn draw(&self, rng: &mut dyn RngCore, round: u32) -> Result<Scenario, FinanceError> {
        let bond = BondTerms::draw(&self.config, rng)?;
        let price = bond.price()?;
        let ppy = f64::from(bond.payments_per_year);
        let coupon = bond.coupon_rate * bond.face_value / ppy;
        let y = bond.yield_rate / ppy;
        let n = ppy * f64::from(bond.years);
        let other_frequency = if bond.payments_per_year == 1 { 2 } else { 1 };
        let mut mistakes = vec![bond.face_value, bond.price_with(other_frequency)?];
        if coupon > 0.0 {
            mistakes.push(coupon * present_value_annuity(1.0, y, n)?);
            mistakes.push(present_value_single_sum(
                bond.face_value,
                bond.yield_rate,
                f64::from(bond.years),
            )?);
        }
        Ok(Scenario {
            game: GameKind::BondMemory,
            round,
            params: vec![
                Param::new("face value", bond.face_value, Quantity::Currency),
                Param::new("coupon rate", bond.coupon_rate, Quantity::Rate),
                Param::new("payments per year", ppy, Quantity::Periods),
                Param::new("years to maturity", f64::from(bond.years), Quantity::Periods),
                Param::new("yield", bond.yield_rate, Quantity::Rate),
            ],
            prompt: format!("What is the price of this bond: {}?", bond.describe()),
            unknown: Quantity::Currency,
            correct: price,
            explanation: format!(
                "P = C x (1 - (1 + y)^-n) / y + F / (1 + y)^n with C = {coupon:.2}, \
                 y = {y:.6}, n = {n}, F = {:.2}; P = {price:.2}",
                bond.face_value
            ),
            mistakes,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardFace {
    Bond,
    Price,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub pair: usize,
    pub face: CardFace,
    label: String,
}

impl Card {
    pub fn label(&self) -> &str {
        &self.label
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flip {
    /// First card of an attempt is face up.
    First { index: usize },
    Match { pair: usize },
    /// Both cards turn back face down.
    Mismatch { first: usize, second: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoardPhase {
    Playing,
    Cleared,
}

#[derive(Debug, Error, PartialEq)]
pub enum BoardError {
    #[error("card {index} is out of range (board has {len} cards)")]
    OutOfRange { index: usize, len: usize },
    #[error("card {0} is already matched")]
    AlreadyMatched(usize),
    #[error("card {0} is already face up")]
    AlreadyFaceUp(usize),
    #[error("the board is cleared")]
    Cleared,
    #[error("could not deal {pairs} bonds with distinct prices in {attempts} attempts")]
    DealFailed { pairs: usize, attempts: u32 },
    #[error(transparent)]
    Finance(#[from] FinanceError),
}

/// Shuffled bond and price cards; every bond is paired with its own price.
#[derive(Clone, Debug)]
pub struct MemoryBoard {
    bonds: Vec<(BondTerms, f64)>,
    cards: Vec<Card>,
    matched: Vec<bool>,
    face_up: Option<usize>,
    moves: u32,
}

impl MemoryBoard {
    pub fn deal(config: &BondConfig, rng: &mut dyn RngCore) -> Result<Self, BoardError> {
        let mut bonds: Vec<(BondTerms, f64)> = Vec::with_capacity(config.pairs);
        let mut prices: Vec<Decimal> = Vec::with_capacity(config.pairs);
        let mut attempts = 0;
        while bonds.len() < config.pairs {
            if attempts >= config.max_deal_attempts {
                return Err(BoardError::DealFailed {
                    pairs: config.pairs,
                    attempts,
                });
            }
            attempts += 1;
            let bond = BondTerms::draw(config, rng)?;
            let price = bond.price()?;
            let Some(cents) = to_money(price) else {
                continue;
            };
            if prices.contains(&cents) {
                continue;
            }
            prices.push(cents);
            bonds.push((bond, price));
        }

        let mut cards = Vec::with_capacity(bonds.len() * 2);
        for (pair, (bond, price)) in bonds.iter().enumerate() {
            cards.push(Card {
                pair,
                face: CardFace::Bond,
                label: bond.describe(),
            });
            cards.push(Card {
                pair,
                face: CardFace::Price,
                label: money(*price),
            });
        }
        cards.shuffle(rng);
        debug!(pairs = bonds.len(), attempts, "memory board dealt");
        Ok(Self {
            matched: vec![false; cards.len()],
            bonds,
            cards,
            face_up: None,
            moves: 0,
        })
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn bonds(&self) -> &[(BondTerms, f64)] {
        &self.bonds
    }

    pub fn is_matched(&self, index: usize) -> bool {
        self.matched.get(index).copied().unwrap_or(false)
    }

    pub fn face_up(&self) -> Option<usize> {
        self.face_up
    }

    /// Completed pair attempts.
    pub fn moves(&self) -> u32 {
        self.moves
    }

    pub fn phase(&self) -> BoardPhase {
        if self.matched.iter().all(|m| *m) {
            BoardPhase::Cleared
        } else {
            BoardPhase::Playing
        }
    }

    pub fn flip(&mut self, index: usize) -> Result<Flip, BoardError> {
        if self.phase() == BoardPhase::Cleared {
            return Err(BoardError::Cleared);
        }
        let len = self.cards.len();
        if index >= len {
            return Err(BoardError::OutOfRange { index, len });
        }
        if self.matched[index] {
            return Err(BoardError::AlreadyMatched(index));
        }
        let Some(first) = self.face_up else {
            self.face_up = Some(index);
            return Ok(Flip::First { index });
        };
        if first == index {
            return Err(BoardError::AlreadyFaceUp(index));
        }
        self.face_up = None;
        self.moves += 1;
        let (a, b) = (&self.cards[first], &self.cards[index]);
        if a.pair == b.pair && a.face != b.face {
            let pair = a.pair;
            self.matched[first] = true;
            self.matched[index] = true;
            debug!(pair, moves = self.moves, "pair matched");
            Ok(Flip::Match { pair })
        } else {
            Ok(Flip::Mismatch {
                first,
                second: index,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::testing::exercise;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn partner(board: &MemoryBoard, index: usize) -> usize {
        let card = &board.cards()[index];
        board
            .cards()
            .iter()
            .position(|c| c.pair == card.pair && c.face != card.face)
            .unwrap()
    }

    #[test]
    fn questions_are_valid() {
        exercise(&BondMemoryGame::new(BondConfig::default()), 31, 30);
    }

    #[test]
    fn zero_coupon_prices_at_discount() {
        let bond = BondTerms {
            face_value: 1_000.0,
            coupon_rate: 0.0,
            payments_per_year: 1,
            years: 5,
            yield_rate: 0.05,
        };
        assert!((bond.price().unwrap() - 783.53).abs() < 0.01);
        assert!(bond.describe().contains("zero-coupon"));
    }

    #[test]
    fn coupon_equal_to_yield_prices_at_par() {
        let bond = BondTerms {
            face_value: 1_000.0,
            coupon_rate: 0.06,
            payments_per_year: 2,
            years: 10,
            yield_rate: 0.06,
        };
        assert!((bond.price().unwrap() - 1_000.0).abs() < 1e-6);
        assert!(bond.describe().contains("semiannual"));
    }

    #[test]
    fn board_deals_distinct_prices() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let board = MemoryBoard::deal(&BondConfig::default(), &mut rng).unwrap();
        assert_eq!(board.cards().len(), 8);
        let mut labels: Vec<&str> = board
            .cards()
            .iter()
            .filter(|c| c.face == CardFace::Price)
            .map(Card::label)
            .collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), 4);
        assert_eq!(board.phase(), BoardPhase::Playing);
    }

    #[test]
    fn board_clears_after_every_pair() {
        let mut rng = ChaCha8Rng::seed_from_u64(10);
        let mut board = BondMemoryGame::new(BondConfig::default())
            .deal_board(&mut rng)
            .unwrap();
        for i in 0..board.cards().len() {
            if board.is_matched(i) {
                continue;
            }
            let j = partner(&board, i);
            assert_eq!(board.flip(i).unwrap(), Flip::First { index: i });
            assert!(matches!(board.flip(j).unwrap(), Flip::Match { .. }));
        }
        assert_eq!(board.phase(), BoardPhase::Cleared);
        assert_eq!(board.moves(), 4);
        assert_eq!(board.flip(0), Err(BoardError::Cleared));
    }

    #[test]
    fn flips_are_checked() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut board = MemoryBoard::deal(&BondConfig::default(), &mut rng).unwrap();
        assert_eq!(
            board.flip(99),
            Err(BoardError::OutOfRange { index: 99, len: 8 })
        );
        board.flip(0).unwrap();
        assert_eq!(board.flip(0), Err(BoardError::AlreadyFaceUp(0)));
        let wrong = (1..8).find(|&k| k != partner(&board, 0)).unwrap();
        assert_eq!(
            board.flip(wrong).unwrap(),
            Flip::Mismatch {
                first: 0,
                second: wrong
            }
        );
        assert_eq!(board.face_up(), None);
        assert_eq!(board.moves(), 1);

        let j = partner(&board, 0);
        board.flip(0).unwrap();
        board.flip(j).unwrap();
        assert_eq!(board.flip(j), Err(BoardError::AlreadyMatched(j)));
    }

    #[test]
    fn impossible_deal_fails() {
        let cfg = BondConfig {
            coupon_rates: vec![0.05],
            payments_per_year: vec![1],
            years: vec![5],
            yields: vec![0.05],
            ..BondConfig::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        assert!(matches!(
            MemoryBoard::deal(&cfg, &mut rng),
            Err(BoardError::DealFailed { pairs: 4, .. })
        ));
    }
}
