//! Terminal loops for the quiz, negotiation and memory-board modes.
//!
//! Every loop reads commands from a `BufRead` and writes to a `Write` so
//! sessions can be scripted.

use anyhow::{bail, Result};
use quiz_ai::QualityPotPolicy;
use quiz_core::Question;
use quiz_engine::games::{
    BetOutcome, BoardPhase, BondMemoryGame, Flip, LendingGame, MemoryBoard, Negotiation,
    RivalView,
};
use quiz_engine::money::money_to_f64;
use quiz_engine::{EngineError, GameVariant, NextRound, ScenarioEngine, SessionSummary};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use std::io::{BufRead, Write};
use std::str::FromStr;
use tracing::{debug, warn};

const LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];

fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Map a single option letter (case-insensitive) to its index.
pub fn letter_index(text: &str, options: usize) -> Option<usize> {
    let mut chars = text.chars();
    let c = chars.next()?.to_ascii_uppercase();
    if chars.next().is_some() {
        return None;
    }
    LETTERS.iter().take(options).position(|l| *l == c)
}

fn show_question<W: Write>(out: &mut W, round: u32, q: &Question) -> Result<()> {
    writeln!(out, "\nRound {round}: {}", q.prompt)?;
    for (letter, label) in LETTERS.iter().zip(q.option_labels()) {
        writeln!(out, "  {letter}) {label}")?;
    }
    Ok(())
}

fn show_session<V: GameVariant, W: Write>(out: &mut W, engine: &ScenarioEngine<V>) -> Result<()> {
    writeln!(
        out,
        "{}: {} questions",
        engine.variant().kind().title(),
        engine.config().questions_per_session
    )?;
    Ok(())
}

/// Multiple-choice session. Input is an option letter or a number;
/// anything else re-prompts without touching the round.
pub fn run_quiz<V, R, W>(
    engine: &mut ScenarioEngine<V>,
    input: &mut R,
    out: &mut W,
) -> Result<SessionSummary>
where
    V: GameVariant,
    R: BufRead,
    W: Write,
{
    show_session(out, engine)?;
    engine.start()?;
    loop {
        let round = engine.state().round;
        let question = engine.present()?.clone();
        show_question(out, round, &question)?;
        let outcome = loop {
            write!(out, "answer> ")?;
            out.flush()?;
            let Some(line) = read_line(input)? else {
                bail!("input closed with a question open");
            };
            let submitted = match letter_index(&line, question.options.len()) {
                Some(i) => engine.submit_value(question.options[i]),
                None => engine.submit(&line),
            };
            match submitted {
                Ok(outcome) => break outcome,
                Err(EngineError::MalformedAnswer(e)) => {
                    debug!(%e, "re-prompting");
                    let last = LETTERS[question.options.len() - 1];
                    writeln!(out, "Enter a letter A-{last} or a number.")?;
                }
                Err(e) => return Err(e.into()),
            }
        };
        writeln!(out, "{}", outcome.explanation)?;
        if let NextRound::Over { score, answered } = engine.next_round()? {
            writeln!(out, "\nScore: {score}/{answered}")?;
            return Ok(engine.summary());
        }
    }
}

/// Headless session: picks a random option for every question.
pub fn run_demo<V, W>(engine: &mut ScenarioEngine<V>, out: &mut W) -> Result<SessionSummary>
where
    V: GameVariant,
    W: Write,
{
    show_session(out, engine)?;
    engine.start()?;
    loop {
        let round = engine.state().round;
        let question = engine.present()?.clone();
        show_question(out, round, &question)?;
        let Some(choice) = question.options.choose(engine.rng_mut()).copied() else {
            bail!("question has no options");
        };
        let outcome = engine.submit_value(choice)?;
        writeln!(out, "{}", outcome.explanation)?;
        if let NextRound::Over { score, answered } = engine.next_round()? {
            writeln!(out, "\nScore: {score}/{answered}")?;
            return Ok(engine.summary());
        }
    }
}

fn show_negotiation<W: Write>(out: &mut W, n: &Negotiation) -> Result<()> {
    let rival = match n.rival_view() {
        RivalView::Hidden => "hidden".to_string(),
        RivalView::Form(form) => format!("a {form}"),
        RivalView::Full(quote) => quote.to_string(),
    };
    writeln!(
        out,
        "Street {:?} | pot {} | bankroll {} | your quote: {} | rival quote: {rival}",
        n.street(),
        n.pot(),
        n.bankroll(),
        n.player_quote()
    )?;
    Ok(())
}

/// How one negotiation ended.
#[derive(Clone, Debug, PartialEq)]
pub struct HandRecord {
    pub story: String,
    /// Bankroll left after the pot was settled.
    pub bankroll: f64,
}

/// Poker-style lending negotiations: `bet <amount>` or `fold`.
pub fn run_negotiation<R, W>(
    game: &LendingGame,
    hands: u32,
    rng: &mut ChaCha8Rng,
    input: &mut R,
    out: &mut W,
) -> Result<Vec<HandRecord>>
where
    R: BufRead,
    W: Write,
{
    let policy = QualityPotPolicy::new(game.config().policy.clone());
    let mut results = Vec::new();
    for hand in 1..=hands {
        let mut n = game.open_negotiation(rng)?;
        writeln!(out, "\nHand {hand}: you offer {}", n.hand_summary())?;
        while n.resolution().is_none() {
            show_negotiation(out, &n)?;
            write!(out, "bet <amount> | fold> ")?;
            out.flush()?;
            let Some(line) = read_line(input)? else {
                bail!("input closed during a negotiation");
            };
            let mut words = line.split_whitespace();
            match (words.next(), words.next()) {
                (Some("fold"), None) => {
                    n.fold()?;
                }
                (Some("bet"), Some(amount)) => match Decimal::from_str(amount) {
                    Ok(stake) => match n.bet(stake, &policy, rng) {
                        Ok(BetOutcome::RivalCalled { street }) => {
                            writeln!(out, "Rival calls. Now at {street:?}.")?;
                        }
                        Ok(BetOutcome::RivalFolded) => writeln!(out, "Rival folds.")?,
                        Ok(BetOutcome::Showdown(r)) => writeln!(out, "Showdown: {r:?}")?,
                        Err(e) => writeln!(out, "{e}")?,
                    },
                    Err(_) => writeln!(out, "Stake must be a number.")?,
                },
                _ => writeln!(out, "Commands: bet <amount>, fold")?,
            }
        }
        let story = n.explain();
        writeln!(out, "{story}")?;
        results.push(HandRecord {
            story,
            bankroll: money_to_f64(n.bankroll()),
        });
    }
    Ok(results)
}

fn show_board<W: Write>(out: &mut W, board: &MemoryBoard) -> Result<()> {
    for (i, card) in board.cards().iter().enumerate() {
        if board.is_matched(i) || board.face_up() == Some(i) {
            writeln!(out, "  [{i}] {}", card.label())?;
        } else {
            writeln!(out, "  [{i}] ??")?;
        }
    }
    Ok(())
}

/// Bond memory board: `flip <index>` until every pair is matched.
pub fn run_memory<R, W>(
    game: &BondMemoryGame,
    rng: &mut ChaCha8Rng,
    input: &mut R,
    out: &mut W,
) -> Result<u32>
where
    R: BufRead,
    W: Write,
{
    let mut board = game.deal_board(rng)?;
    while board.phase() == BoardPhase::Playing {
        show_board(out, &board)?;
        write!(out, "flip <index>> ")?;
        out.flush()?;
        let Some(line) = read_line(input)? else {
            bail!("input closed with the board in play");
        };
        let index = line
            .strip_prefix("flip")
            .unwrap_or(line.as_str())
            .trim()
            .parse::<usize>();
        let Ok(index) = index else {
            writeln!(out, "Commands: flip <index>")?;
            continue;
        };
        match board.flip(index) {
            Ok(Flip::First { index }) => {
                writeln!(out, "Card {index}: {}", board.cards()[index].label())?;
            }
            Ok(Flip::Match { .. }) => writeln!(out, "Match!")?,
            Ok(Flip::Mismatch { first, second }) => writeln!(
                out,
                "No match: {} / {}",
                board.cards()[first].label(),
                board.cards()[second].label()
            )?,
            Err(e) => {
                warn!(%e, "rejected flip");
                writeln!(out, "{e}")?;
            }
        }
    }
    writeln!(out, "Board cleared in {} moves.", board.moves())?;
    Ok(board.moves())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::{EngineConfig, GameKind};
    use quiz_engine::GamesConfig;
    use rand::SeedableRng;
    use std::io::Cursor;

    fn engine(questions: u32) -> ScenarioEngine<Box<dyn GameVariant>> {
        let config = EngineConfig {
            questions_per_session: questions,
            ..EngineConfig::default()
        };
        ScenarioEngine::new(GamesConfig::default().variant(GameKind::TvmRocket), config).unwrap()
    }

    #[test]
    fn letters_map_to_options() {
        assert_eq!(letter_index("a", 4), Some(0));
        assert_eq!(letter_index("D", 4), Some(3));
        assert_eq!(letter_index("D", 3), None);
        assert_eq!(letter_index("AB", 4), None);
        assert_eq!(letter_index("", 4), None);
    }

    #[test]
    fn quiz_reprompts_on_garbage() {
        let mut e = engine(2);
        let mut input = Cursor::new("banana\nA\nB\n");
        let mut out = Vec::new();
        let summary = run_quiz(&mut e, &mut input, &mut out).unwrap();
        assert_eq!(summary.answered, 2);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("TVM Rocket: 2 questions"));
        assert!(text.contains("Enter a letter A-D or a number."));
        assert!(text.contains("Score: "));
    }

    #[test]
    fn quiz_fails_when_input_closes() {
        let mut e = engine(2);
        let mut input = Cursor::new("A\n");
        let mut out = Vec::new();
        assert!(run_quiz(&mut e, &mut input, &mut out).is_err());
    }

    #[test]
    fn demo_runs_headless() {
        let mut e = engine(3);
        let summary = run_demo(&mut e, &mut Vec::new()).unwrap();
        assert_eq!(summary.answered, 3);
    }

    #[test]
    fn folding_ends_each_hand() {
        let game = LendingGame::new(GamesConfig::default().lending);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut input = Cursor::new("raise\nbet x\nfold\nfold\n");
        let mut out = Vec::new();
        let results = run_negotiation(&game, 2, &mut rng, &mut input, &mut out).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.story.starts_with("You folded")));
        // Folding forfeits the ante from a fresh 1000 bankroll.
        assert!(results.iter().all(|r| r.bankroll == 990.0));
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("your quote: "));
    }

    #[test]
    fn memory_board_clears_from_script() {
        let game = BondMemoryGame::new(GamesConfig::default().bonds);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        // Replay the same deal to learn the layout.
        let layout = game.deal_board(&mut rng.clone()).unwrap();
        let mut script = String::new();
        for i in 0..layout.cards().len() {
            let card = &layout.cards()[i];
            let j = layout
                .cards()
                .iter()
                .position(|c| c.pair == card.pair && c.face != card.face)
                .unwrap();
            if i < j {
                script.push_str(&format!("flip {i}\nflip {j}\n"));
            }
        }
        let moves = run_memory(&game, &mut rng, &mut Cursor::new(script), &mut Vec::new()).unwrap();
        assert_eq!(moves, 4);
    }
}
