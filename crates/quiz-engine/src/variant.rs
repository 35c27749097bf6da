//! Strategy seam between the generic engine and each game.

use fin_math::FinanceError;
use quiz_core::{GameKind, Scenario};
use rand::RngCore;

/// A game that can draw rounds for the scenario engine.
///
/// `draw` returns a fully-derived scenario or the `FinanceError` that made
/// the drawn parameters unsolvable; the engine discards and redraws on error.
pub trait GameVariant {
    fn kind(&self) -> GameKind;

    fn draw(&self, rng: &mut dyn RngCore, round: u32) -> Result<Scenario, FinanceError>;
}

impl<V: GameVariant + ?Sized> GameVariant for Box<V> {
    fn kind(&self) -> GameKind {
        (**self).kind()
    }

    fn draw(&self, rng: &mut dyn RngCore, round: u32) -> Result<Scenario, FinanceError> {
        (**self).draw(rng, round)
    }
}
