#![deny(warnings)]

//! Scenario engine for the classroom finance games.
//!
//! A [`GameVariant`] draws a [`Scenario`](quiz_core::Scenario) and derives its
//! ground truth with `fin-math`; the engine turns it into a multiple-choice
//! [`Question`](quiz_core::Question) with synthesized distractors, validates
//! answers within a unit-aware tolerance, and walks the round state machine.
//! The negotiation and memory-board sub-protocols live next to their games.

pub mod config;
pub mod distractors;
pub mod engine;
pub mod games;
pub mod money;
pub mod variant;

pub use config::{ConfigError, GamesConfig};
pub use distractors::{synthesize_options, OptionSet};
pub use engine::{
    build_question, start_scenario, submit_answer, NextRound, ScenarioEngine, SessionSummary,
};
pub use variant::GameVariant;

use quiz_core::{AnswerError, GameKind, TransitionError, ValidationError};
use thiserror::Error;

/// Errors surfaced by the scenario engine.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    /// Every redraw produced an unsolvable scenario.
    #[error("no solvable {game} scenario after {attempts} attempts: {last}")]
    Regeneration {
        game: GameKind,
        attempts: u32,
        last: String,
    },
    /// The distractor generator could not fill the option set.
    #[error("only {found} of {wanted} distinct options after {attempts} attempts")]
    DistractorsExhausted {
        wanted: usize,
        found: usize,
        attempts: u32,
    },
    /// Player input was not a number; the question is still open.
    #[error(transparent)]
    MalformedAnswer(#[from] AnswerError),
    #[error("invalid question or config: {0}")]
    Invalid(#[from] ValidationError),
    #[error("no active {0}")]
    Missing(&'static str),
}
