#![deny(warnings)]

//! Headless terminal front end for the classroom finance games.

mod play;

use anyhow::{anyhow, bail, Context, Result};
use quiz_core::GameKind;
use quiz_engine::games::{BondMemoryGame, LendingGame};
use quiz_engine::{GamesConfig, ScenarioEngine};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::io::{self, Write};
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: finquiz [--game <slug>] [--seed <n>] [--questions <n>] \
[--config <file.yaml>] [--mode quiz|demo|negotiate|memory] [--json] [--list] [--version]";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Quiz,
    Demo,
    Negotiate,
    Memory,
}

#[derive(Debug, PartialEq)]
struct Args {
    game: GameKind,
    seed: Option<u64>,
    questions: Option<u32>,
    config: Option<String>,
    mode: Mode,
    json: bool,
    list: bool,
    version: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            game: GameKind::TvmRocket,
            seed: None,
            questions: None,
            config: None,
            mode: Mode::Quiz,
            json: false,
            list: false,
            version: false,
        }
    }
}

fn value(it: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    it.next().ok_or_else(|| anyhow!("{flag} needs a value\n{USAGE}"))
}

fn parse_args(raw: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut args = Args::default();
    let mut it = raw.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--game" => args.game = value(&mut it, "--game")?.parse()?,
            "--seed" => {
                args.seed = Some(value(&mut it, "--seed")?.parse().context("--seed")?);
            }
            "--questions" => {
                args.questions = Some(
                    value(&mut it, "--questions")?
                        .parse()
                        .context("--questions")?,
                );
            }
            "--config" => args.config = Some(value(&mut it, "--config")?),
            "--mode" => {
                args.mode = match value(&mut it, "--mode")?.as_str() {
                    "quiz" => Mode::Quiz,
                    "demo" => Mode::Demo,
                    "negotiate" => Mode::Negotiate,
                    "memory" => Mode::Memory,
                    other => bail!("unknown mode {other:?}\n{USAGE}"),
                }
            }
            "--json" => args.json = true,
            "--list" => args.list = true,
            "--version" => args.version = true,
            other => bail!("unexpected argument {other:?}\n{USAGE}"),
        }
    }
    match (args.mode, args.game) {
        (Mode::Negotiate, GameKind::LendingNegotiation) | (Mode::Memory, GameKind::BondMemory) => {}
        (Mode::Negotiate, _) => args.game = GameKind::LendingNegotiation,
        (Mode::Memory, _) => args.game = GameKind::BondMemory,
        _ => {}
    }
    Ok(args)
}

/// File config first, then flag overrides, then validation.
fn load_config(args: &Args) -> Result<GamesConfig> {
    let mut cfg = match &args.config {
        Some(path) => GamesConfig::load(path).with_context(|| format!("loading {path}"))?,
        None => GamesConfig::default(),
    };
    if let Some(seed) = args.seed {
        cfg.engine.rng_seed = seed;
    }
    if let Some(questions) = args.questions {
        cfg.engine.questions_per_session = questions;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn version_line() -> String {
    format!(
        "finquiz {} ({}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_SHA"),
        env!("BUILD_DATE")
    )
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.version {
        writeln!(out, "{}", version_line())?;
        return Ok(());
    }
    if args.list {
        for kind in GameKind::ALL {
            writeln!(out, "{:<10} {}", kind.slug(), kind.title())?;
        }
        return Ok(());
    }

    let cfg = load_config(&args)?;
    info!(game = %args.game, seed = cfg.engine.rng_seed, mode = ?args.mode, "starting session");
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut rng = ChaCha8Rng::seed_from_u64(cfg.engine.rng_seed);

    match args.mode {
        Mode::Quiz | Mode::Demo => {
            let mut engine = ScenarioEngine::new(cfg.variant(args.game), cfg.engine.clone())?;
            let summary = if args.mode == Mode::Quiz {
                play::run_quiz(&mut engine, &mut input, &mut out)?
            } else {
                play::run_demo(&mut engine, &mut out)?
            };
            if args.json {
                writeln!(out, "{}", summary.to_json_pretty()?)?;
            }
        }
        Mode::Negotiate => {
            let game = LendingGame::new(cfg.lending.clone());
            let results = play::run_negotiation(
                &game,
                cfg.engine.questions_per_session,
                &mut rng,
                &mut input,
                &mut out,
            )?;
            if args.json {
                let report = serde_json::json!({
                    "game": args.game,
                    "seed": cfg.engine.rng_seed,
                    "hands": results
                        .iter()
                        .map(|r| serde_json::json!({ "story": r.story, "bankroll": r.bankroll }))
                        .collect::<Vec<_>>(),
                });
                writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
            }
        }
        Mode::Memory => {
            let game = BondMemoryGame::new(cfg.bonds.clone());
            let moves = play::run_memory(&game, &mut rng, &mut input, &mut out)?;
            if args.json {
                let report = serde_json::json!({
                    "game": args.game,
                    "seed": cfg.engine.rng_seed,
                    "moves": moves,
                });
                writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Args> {
        parse_args(line.split_whitespace().map(String::from))
    }

    #[test]
    fn defaults_to_tvm_quiz() {
        assert_eq!(parse("").unwrap(), Args::default());
    }

    #[test]
    fn flags_are_parsed() {
        let args = parse("--game wacc --seed 9 --questions 3 --json").unwrap();
        assert_eq!(args.game, GameKind::WaccCards);
        assert_eq!(args.seed, Some(9));
        assert_eq!(args.questions, Some(3));
        assert!(args.json);
    }

    #[test]
    fn sub_protocol_modes_pick_their_game() {
        assert_eq!(parse("--mode negotiate").unwrap().game, GameKind::LendingNegotiation);
        assert_eq!(parse("--mode memory --game tvm").unwrap().game, GameKind::BondMemory);
    }

    #[test]
    fn bad_arguments_fail() {
        assert!(parse("--game chess").is_err());
        assert!(parse("--seed").is_err());
        assert!(parse("--mode poker").is_err());
        assert!(parse("--verbose").is_err());
    }

    #[test]
    fn overrides_apply_before_validation() {
        let cfg = load_config(&parse("--seed 5 --questions 2").unwrap()).unwrap();
        assert_eq!(cfg.engine.rng_seed, 5);
        assert_eq!(cfg.engine.questions_per_session, 2);
        assert!(load_config(&parse("--questions 0").unwrap()).is_err());
    }

    #[test]
    fn version_line_carries_a_day_or_unknown() {
        let line = version_line();
        assert!(line.starts_with(&format!("finquiz {} (", env!("CARGO_PKG_VERSION"))));
        let day = line
            .rsplit("built ")
            .next()
            .and_then(|rest| rest.strip_suffix(')'))
            .unwrap();
        let is_date = day.len() == 10
            && day
                .char_indices()
                .all(|(i, c)| if i == 4 || i == 7 { c == '-' } else { c.is_ascii_digit() });
        assert!(day == "unknown" || is_date, "unexpected build date {day:?}");
    }
}
