//! Round state machine: Setup → Presenting → AwaitingInput → Validating →
//! Revealing → (Presenting | RoundOver).

use crate::distractors::synthesize_options;
use crate::variant::GameVariant;
use crate::EngineError;
use quiz_core::{
    parse_answer, validate_engine_config, validate_question, validate_scenario, AnswerError,
    AnswerOutcome, EngineConfig, GameKind, Phase, Question, RoundState, Scenario,
    TransitionError,
};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Draw a solvable scenario, redrawing whenever the math rejects the
/// parameters, up to `config.max_regenerations` attempts.
pub fn start_scenario<V: GameVariant + ?Sized>(
    variant: &V,
    config: &EngineConfig,
    rng: &mut dyn RngCore,
    round: u32,
) -> Result<Scenario, EngineError> {
    let game = variant.kind();
    let mut last = String::from("no attempts made");
    for attempt in 1..=config.max_regenerations {
        let drawn = variant
            .draw(rng, round)
            .map_err(|e| e.to_string())
            .and_then(|s| validate_scenario(&s).map(|_| s).map_err(|e| e.to_string()));
        match drawn {
            Ok(s) => {
                debug!(%game, round, attempt, correct = s.correct, "scenario drawn");
                return Ok(s);
            }
            Err(e) => {
                warn!(%game, round, attempt, error = %e, "discarding unsolvable scenario");
                last = e;
            }
        }
    }
    Err(EngineError::Regeneration {
        game,
        attempts: config.max_regenerations,
        last,
    })
}

/// Turn a scenario into a question with shuffled options.
pub fn build_question(
    scenario: &Scenario,
    config: &EngineConfig,
    rng: &mut dyn RngCore,
) -> Result<Question, EngineError> {
    let set = synthesize_options(
        scenario.correct,
        scenario.unknown,
        &scenario.mistakes,
        config,
        rng,
    )?;
    let question = Question {
        game: scenario.game,
        prompt: scenario.prompt.clone(),
        unknown: scenario.unknown,
        options: set.options,
        correct_index: set.correct_index,
        correct: scenario.correct,
        tolerance: config.tolerances.for_quantity(scenario.unknown),
        explanation: scenario.explanation.clone(),
    };
    validate_question(&question)?;
    Ok(question)
}

/// Compare a chosen value with the correct answer within the question's tolerance.
pub fn submit_answer(question: &Question, chosen: f64) -> AnswerOutcome {
    let correct = question.matches(chosen);
    let answer = question.unknown.format(question.correct);
    let explanation = if correct {
        format!("Correct, {answer}. {}", question.explanation)
    } else {
        format!(
            "Not quite: you answered {}, the answer is {answer}. {}",
            question.unknown.format(chosen),
            question.explanation
        )
    };
    AnswerOutcome {
        correct,
        explanation,
        correct_value: question.correct,
        chosen,
    }
}

/// What follows a revealed answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NextRound {
    /// A fresh scenario is being presented.
    Presenting { round: u32 },
    /// The question budget is spent.
    Over { score: u32, answered: u32 },
}

/// End-of-session report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub game: GameKind,
    pub seed: u64,
    pub score: u32,
    pub answered: u32,
    pub budget: u32,
    pub outcomes: Vec<AnswerOutcome>,
}

impl SessionSummary {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// One game session: a variant, its config, a seeded RNG and the round state.
pub struct ScenarioEngine<V> {
    variant: V,
    config: EngineConfig,
    rng: ChaCha8Rng,
    state: RoundState,
}

impl<V: GameVariant> ScenarioEngine<V> {
    pub fn new(variant: V, config: EngineConfig) -> Result<Self, EngineError> {
        validate_engine_config(&config)?;
        let rng = ChaCha8Rng::seed_from_u64(config.rng_seed);
        let state = RoundState::new(config.questions_per_session);
        Ok(Self {
            variant,
            config,
            rng,
            state,
        })
    }

    pub fn state(&self) -> &RoundState {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn variant(&self) -> &V {
        &self.variant
    }

    /// Session RNG, shared with game sub-protocols so a seed replays a whole session.
    pub fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// Setup → Presenting: draw the first scenario.
    pub fn start(&mut self) -> Result<&Scenario, EngineError> {
        if self.state.phase != Phase::Setup {
            return Err(TransitionError {
                from: self.state.phase,
                to: Phase::Presenting,
            }
            .into());
        }
        let round = self.state.round + 1;
        let scenario = start_scenario(&self.variant, &self.config, &mut self.rng, round)?;
        self.state.advance(Phase::Presenting)?;
        self.state.round = round;
        self.state.question = None;
        let s: &Scenario = self.state.scenario.insert(scenario);
        Ok(s)
    }

    /// Presenting → AwaitingInput: build the question for the active scenario.
    pub fn present(&mut self) -> Result<&Question, EngineError> {
        if self.state.phase != Phase::Presenting {
            return Err(TransitionError {
                from: self.state.phase,
                to: Phase::AwaitingInput,
            }
            .into());
        }
        let scenario = self
            .state
            .scenario
            .as_ref()
            .ok_or(EngineError::Missing("scenario"))?;
        let question = build_question(scenario, &self.config, &mut self.rng)?;
        self.state.advance(Phase::AwaitingInput)?;
        let q: &Question = self.state.question.insert(question);
        Ok(q)
    }

    /// Validate raw player input. Malformed input leaves the question open.
    pub fn submit(&mut self, input: &str) -> Result<AnswerOutcome, EngineError> {
        if self.state.phase != Phase::AwaitingInput {
            return Err(TransitionError {
                from: self.state.phase,
                to: Phase::Validating,
            }
            .into());
        }
        let value = parse_answer(input).map_err(|e| {
            debug!(input, "malformed answer, re-prompting");
            EngineError::from(e)
        })?;
        self.submit_value(value)
    }

    /// AwaitingInput → Validating → Revealing for an already-parsed value.
    pub fn submit_value(&mut self, chosen: f64) -> Result<AnswerOutcome, EngineError> {
        if self.state.phase != Phase::AwaitingInput {
            return Err(TransitionError {
                from: self.state.phase,
                to: Phase::Validating,
            }
            .into());
        }
        if !chosen.is_finite() {
            return Err(AnswerError(chosen.to_string()).into());
        }
        let question = self
            .state
            .question
            .as_ref()
            .ok_or(EngineError::Missing("question"))?;
        let outcome = submit_answer(question, chosen);
        self.state.advance(Phase::Validating)?;
        self.state.advance(Phase::Revealing)?;
        self.state.answered += 1;
        if outcome.correct {
            self.state.score += 1;
        }
        debug!(
            round = self.state.round,
            correct = outcome.correct,
            score = self.state.score,
            "answer revealed"
        );
        self.state.history.push(outcome.clone());
        self.state.last_outcome = Some(outcome.clone());
        Ok(outcome)
    }

    /// Revealing → Presenting with a fresh scenario, or → RoundOver once the
    /// budget is spent.
    pub fn next_round(&mut self) -> Result<NextRound, EngineError> {
        if self.state.phase != Phase::Revealing {
            return Err(TransitionError {
                from: self.state.phase,
                to: Phase::Presenting,
            }
            .into());
        }
        if self.state.budget_spent() {
            self.state.advance(Phase::RoundOver)?;
            self.state.scenario = None;
            self.state.question = None;
            info!(
                game = %self.variant.kind(),
                score = self.state.score,
                answered = self.state.answered,
                "session over"
            );
            return Ok(NextRound::Over {
                score: self.state.score,
                answered: self.state.answered,
            });
        }
        let round = self.state.round + 1;
        let scenario = start_scenario(&self.variant, &self.config, &mut self.rng, round)?;
        self.state.advance(Phase::Presenting)?;
        self.state.round = round;
        self.state.scenario = Some(scenario);
        self.state.question = None;
        Ok(NextRound::Presenting { round })
    }

    /// RoundOver → Setup with fresh counters. The RNG keeps its position.
    pub fn restart(&mut self) -> Result<(), EngineError> {
        self.state.advance(Phase::Setup)?;
        self.state = RoundState::new(self.config.questions_per_session);
        Ok(())
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            game: self.variant.kind(),
            seed: self.config.rng_seed,
            score: self.state.score,
            answered: self.state.answered,
            budget: self.state.budget,
            outcomes: self.state.history.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fin_math::{present_value_single_sum, FinanceError};
    use quiz_core::{validate_question, Param, Quantity};
    use std::cell::Cell;

    /// Discounting drill with a configurable number of leading failures.
    struct Discounting {
        failures: Cell<u32>,
    }

    impl Discounting {
        fn new() -> Self {
            Self {
                failures: Cell::new(0),
            }
        }
    }

    impl GameVariant for Discounting {
        fn kind(&self) -> GameKind {
            GameKind::TvmRocket
        }

        fn draw(&self, rng: &mut dyn RngCore, round: u32) -> Result<Scenario, FinanceError> {
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                return Err(FinanceError::InvalidInput("rate of -100%".into()));
            }
            let fv = 1000.0 + f64::from(rng.next_u32() % 9) * 100.0;
            let pv = present_value_single_sum(fv, 0.05, 5.0)?;
            Ok(Scenario {
                game: GameKind::TvmRocket,
                round,
                params: vec![Param::new("future value", fv, Quantity::Currency)],
                prompt: format!("What is {fv} due in 5 years worth today at 5%?"),
                unknown: Quantity::Currency,
                correct: pv,
                explanation: format!("PV = {fv} / 1.05^5 = {pv:.2}"),
                mistakes: vec![fv, fv * 1.05f64.powi(5)],
            })
        }
    }

    fn engine(budget: u32) -> ScenarioEngine<Discounting> {
        let config = EngineConfig {
            questions_per_session: budget,
            ..EngineConfig::default()
        };
        ScenarioEngine::new(Discounting::new(), config).unwrap()
    }

    #[test]
    fn full_session_walks_phases() {
        let mut e = engine(2);
        e.start().unwrap();
        assert_eq!(e.state().phase, Phase::Presenting);
        let q = e.present().unwrap().clone();
        validate_question(&q).unwrap();
        assert_eq!(e.state().phase, Phase::AwaitingInput);

        let out = e.submit_value(q.options[q.correct_index]).unwrap();
        assert!(out.correct);
        assert_eq!(e.state().phase, Phase::Revealing);
        assert_eq!(e.next_round().unwrap(), NextRound::Presenting { round: 2 });

        let q = e.present().unwrap().clone();
        let wrong = q.correct * 3.0;
        let out = e.submit_value(wrong).unwrap();
        assert!(!out.correct);
        assert!(!out.explanation.is_empty());
        assert_eq!(
            e.next_round().unwrap(),
            NextRound::Over {
                score: 1,
                answered: 2
            }
        );
        assert_eq!(e.state().phase, Phase::RoundOver);
        assert!(e.next_round().is_err());

        e.restart().unwrap();
        assert_eq!(e.state().phase, Phase::Setup);
        assert_eq!(e.state().answered, 0);
        e.start().unwrap();
    }

    #[test]
    fn malformed_input_does_not_consume_question() {
        let mut e = engine(1);
        e.start().unwrap();
        e.present().unwrap();
        let err = e.submit("twelve").unwrap_err();
        assert!(matches!(err, EngineError::MalformedAnswer(_)));
        assert_eq!(e.state().phase, Phase::AwaitingInput);
        assert_eq!(e.state().answered, 0);
        assert!(e.submit_value(f64::NAN).is_err());
        assert_eq!(e.state().phase, Phase::AwaitingInput);
        let correct = e.state().question.as_ref().unwrap().correct;
        let out = e.submit(&format!("{correct}")).unwrap();
        assert!(out.correct);
    }

    #[test]
    fn out_of_order_calls_are_rejected() {
        let mut e = engine(1);
        assert!(matches!(e.present(), Err(EngineError::Transition(_))));
        assert!(matches!(e.submit("1"), Err(EngineError::Transition(_))));
        e.start().unwrap();
        assert!(e.start().is_err());
        assert!(e.next_round().is_err());
        assert!(e.restart().is_err());
    }

    #[test]
    fn unsolvable_draws_are_regenerated() {
        let variant = Discounting::new();
        variant.failures.set(3);
        let cfg = EngineConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let s = start_scenario(&variant, &cfg, &mut rng, 1).unwrap();
        assert!(s.correct > 0.0);

        variant.failures.set(100);
        let err = start_scenario(&variant, &cfg, &mut rng, 1).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Regeneration { attempts: 32, .. }
        ));
    }

    #[test]
    fn same_seed_same_session() {
        let mut a = engine(3);
        let mut b = engine(3);
        a.start().unwrap();
        b.start().unwrap();
        assert_eq!(a.present().unwrap(), b.present().unwrap());
    }

    #[test]
    fn submit_answer_reports_far_values() {
        let mut e = engine(1);
        e.start().unwrap();
        let q = e.present().unwrap().clone();
        let exact = submit_answer(&q, q.correct);
        assert!(exact.correct);
        let far = submit_answer(&q, -1.0e6);
        assert!(!far.correct);
        assert!(far.explanation.contains("Not quite"));
        assert_eq!(far.correct_value, q.correct);
    }

    #[test]
    fn summary_serializes() {
        let mut e = engine(1);
        e.start().unwrap();
        let q = e.present().unwrap().clone();
        e.submit_value(q.correct).unwrap();
        let json = e.summary().to_json_pretty().unwrap();
        assert!(json.contains("\"score\": 1"));
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(24))]
        #[test]
        fn every_game_runs_a_full_session(seed in 0u64..10_000, pick in 0usize..6) {
            let games = crate::GamesConfig::default();
            let kind = GameKind::ALL[pick];
            let config = EngineConfig {
                rng_seed: seed,
                questions_per_session: 3,
                ..EngineConfig::default()
            };
            let mut e = ScenarioEngine::new(games.variant(kind), config).unwrap();
            e.start().unwrap();
            loop {
                let q = e.present().unwrap().clone();
                proptest::prop_assert!(validate_question(&q).is_ok());
                proptest::prop_assert_eq!(q.game, kind);
                let outcome = e.submit_value(q.correct).unwrap();
                proptest::prop_assert!(outcome.correct);
                proptest::prop_assert!(!outcome.explanation.is_empty());
                if let NextRound::Over { score, answered } = e.next_round().unwrap() {
                    proptest::prop_assert_eq!((score, answered), (3, 3));
                    break;
                }
            }
        }
    }
}
