//! Session configuration: engine knobs plus per-game parameter ranges,
//! loadable from YAML.

use crate::games::{
    BondConfig, BondMemoryGame, DecisionConfig, DecisionRulesGame, IncrementalConfig,
    IncrementalEarningsGame, LendingConfig, LendingGame, TvmConfig, TvmRocketGame,
    WaccCardGame, WaccConfig,
};
use crate::variant::GameVariant;
use quiz_core::{validate_engine_config, EngineConfig, GameKind};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything a session needs; every section falls back to its defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GamesConfig {
    pub engine: EngineConfig,
    pub lending: LendingConfig,
    pub bonds: BondConfig,
    pub wacc: WaccConfig,
    pub tvm: TvmConfig,
    pub decisions: DecisionConfig,
    pub earnings: IncrementalConfig,
}

impl GamesConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: GamesConfig = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let cfg = Self::from_yaml_str(&text)?;
        info!(path = %path.display(), "loaded game config");
        Ok(cfg)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_engine_config(&self.engine).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.lending.validate()?;
        self.bonds.validate()?;
        self.wacc.validate()?;
        self.tvm.validate()?;
        self.decisions.validate()?;
        self.earnings.validate()?;
        Ok(())
    }

    /// Build the adapter for `kind` from its section of this config.
    pub fn variant(&self, kind: GameKind) -> Box<dyn GameVariant> {
        match kind {
            GameKind::LendingNegotiation => Box::new(LendingGame::new(self.lending.clone())),
            GameKind::BondMemory => Box::new(BondMemoryGame::new(self.bonds.clone())),
            GameKind::WaccCards => Box::new(WaccCardGame::new(self.wacc.clone())),
            GameKind::TvmRocket => Box::new(TvmRocketGame::new(self.tvm.clone())),
            GameKind::DecisionRules => Box::new(DecisionRulesGame::new(self.decisions.clone())),
            GameKind::IncrementalEarnings => {
                Box::new(IncrementalEarningsGame::new(self.earnings.clone()))
            }
        }
    }
}

pub(crate) fn check_range(what: &str, lo: f64, hi: f64) -> Result<(), ConfigError> {
    if !(lo.is_finite() && hi.is_finite() && lo <= hi) {
        return Err(ConfigError::Invalid(format!(
            "{what}: range [{lo}, {hi}] is empty or not finite"
        )));
    }
    Ok(())
}

pub(crate) fn check_choices<T>(what: &str, choices: &[T]) -> Result<(), ConfigError> {
    if choices.is_empty() {
        return Err(ConfigError::Invalid(format!("{what}: no choices configured")));
    }
    Ok(())
}

pub(crate) fn check_positive(what: &str, value: f64) -> Result<(), ConfigError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(ConfigError::Invalid(format!("{what} must be > 0, got {value}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        GamesConfig::default().validate().unwrap();
    }

    #[test]
    fn yaml_roundtrip() {
        let cfg = GamesConfig::default();
        let text = cfg.to_yaml().unwrap();
        let back = GamesConfig::from_yaml_str(&text).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg = GamesConfig::from_yaml_str(
            "engine:\n  rng_seed: 7\n  questions_per_session: 6\nlending:\n  ante: 25.0\n",
        )
        .unwrap();
        assert_eq!(cfg.engine.rng_seed, 7);
        assert_eq!(cfg.engine.questions_per_session, 6);
        assert_eq!(cfg.engine.option_count, 4);
        assert_eq!(cfg.lending.ante, 25.0);
        assert_eq!(cfg.bonds, BondConfig::default());
    }

    #[test]
    fn invalid_sections_are_rejected() {
        let err = GamesConfig::from_yaml_str("engine:\n  option_count: 9\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = GamesConfig::from_yaml_str("tvm:\n  rates: []\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = GamesConfig::from_yaml_str("engine: [1, 2]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn every_game_has_a_variant() {
        let cfg = GamesConfig::default();
        for kind in GameKind::ALL {
            assert_eq!(cfg.variant(kind).kind(), kind);
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = GamesConfig::load("/nonexistent/finquiz.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
