use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::*;

/// Session-level view of the game lifecycle. `NotGenerated` means the
/// parameters are fixed but no mines have been placed yet, which only
/// happens on the first reveal.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SessionState {
    NotGenerated,
    InProgress,
    Won,
    Lost,
}

impl SessionState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

/// One playable board plus its parameters, addressed by row-major cell
/// indices so presentation layers can treat the grid as a flat array.
///
/// The board itself does not exist until the first reveal: generation is
/// deferred so the clicked cell and its neighborhood can be kept clear.
/// Flags placed before that are kept aside and carried onto the fresh
/// board. The host supplies the root seed; every generated board draws
/// the next seed from the session's RNG stream, so a session is fully
/// deterministic given its inputs.
#[derive(Debug)]
pub struct Session {
    config: GameConfig,
    rng: SmallRng,
    game: Option<Game>,
    pending_flags: BTreeSet<CellIndex>,
}

impl Session {
    pub fn new(config: GameConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            rng: SmallRng::seed_from_u64(seed),
            game: None,
            pending_flags: BTreeSet::new(),
        })
    }

    pub fn config(&self) -> GameConfig {
        self.config
    }

    pub fn width(&self) -> Coord {
        self.config.width()
    }

    pub fn height(&self) -> Coord {
        self.config.height()
    }

    pub fn total_cells(&self) -> CellCount {
        self.config.total_cells()
    }

    pub fn total_mines(&self) -> CellCount {
        self.config.mines
    }

    pub fn state(&self) -> SessionState {
        match &self.game {
            None => SessionState::NotGenerated,
            Some(game) => match game.state() {
                GameState::NotStarted | GameState::InProgress => SessionState::InProgress,
                GameState::Win => SessionState::Won,
                GameState::Lose => SessionState::Lost,
            },
        }
    }

    /// Remaining-mine estimate for a counter display; negative when more
    /// flags than mines have been placed.
    pub fn mines_left(&self) -> isize {
        match &self.game {
            Some(game) => game.mines_left(),
            None => (self.config.mines as isize) - (self.pending_flags.len() as isize),
        }
    }

    pub fn opened_count(&self) -> CellCount {
        self.game.as_ref().map_or(0, Game::opened_count)
    }

    /// Whole seconds since the first reveal of the current board.
    pub fn elapsed_secs(&self) -> u32 {
        self.game.as_ref().map_or(0, Game::elapsed_secs)
    }

    /// What the player sees at `index`.
    pub fn cell_view(&self, index: CellIndex) -> Result<Tile> {
        let coords = self.coords(index)?;
        Ok(match &self.game {
            Some(game) => game.tile_at(coords),
            None if self.pending_flags.contains(&index) => Tile::Flag,
            None => Tile::Closed,
        })
    }

    /// Reveals a cell, generating the board on first use so the clicked
    /// cell starts an empty clearing.
    pub fn open(&mut self, index: CellIndex) -> Result<RevealOutcome> {
        let coords = self.coords(index)?;
        self.check_not_terminal()?;

        if let Some(game) = self.game.as_mut() {
            return game.open(coords);
        }

        let mut game = self.generate_at(index)?;
        let outcome = game.open(coords);
        self.game = Some(game);
        outcome
    }

    /// Flags a cell. Allowed before generation, without placing mines.
    pub fn flag(&mut self, index: CellIndex) -> Result<FlagOutcome> {
        let coords = self.coords(index)?;
        self.check_not_terminal()?;

        match self.game.as_mut() {
            Some(game) => game.flag(coords),
            None => {
                if self.pending_flags.insert(index) {
                    Ok(FlagOutcome::Changed)
                } else {
                    Err(GameError::InvalidMove)
                }
            }
        }
    }

    pub fn unflag(&mut self, index: CellIndex) -> Result<FlagOutcome> {
        let coords = self.coords(index)?;
        self.check_not_terminal()?;

        match self.game.as_mut() {
            Some(game) => game.unflag(coords),
            None => {
                if self.pending_flags.remove(&index) {
                    Ok(FlagOutcome::Changed)
                } else {
                    Err(GameError::InvalidMove)
                }
            }
        }
    }

    /// Opens the neighbors of a satisfied numbered cell. Before the first
    /// reveal nothing is open, so there is nothing to chord.
    pub fn chord_open(&mut self, index: CellIndex) -> Result<RevealOutcome> {
        let coords = self.coords(index)?;
        self.check_not_terminal()?;

        match self.game.as_mut() {
            Some(game) => game.chord_open(coords),
            None => Err(GameError::InvalidMove),
        }
    }

    pub fn can_chord(&self, index: CellIndex) -> bool {
        match (self.coords(index), self.game.as_ref()) {
            (Ok(coords), Some(game)) => game.is_chordable(coords),
            _ => false,
        }
    }

    /// Discards the board, keeping the parameters. The next first reveal
    /// generates a fresh mine placement.
    pub fn new_game(&mut self) {
        self.game = None;
        self.pending_flags.clear();
    }

    /// Clears all visibility while keeping the current mine layout, so
    /// the same puzzle can be attempted again.
    pub fn replay(&mut self) -> Result<()> {
        match self.game.as_mut() {
            Some(game) => {
                game.replay();
                Ok(())
            }
            None => Err(GameError::InvalidMove),
        }
    }

    /// Switches to new parameters and discards the board. On a validation
    /// error nothing changes.
    pub fn reconfigure(&mut self, config: GameConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        self.new_game();
        Ok(())
    }

    fn generate_at(&mut self, index: CellIndex) -> Result<Game> {
        let seed = self.rng.random();
        let layout = RandomMinefieldGenerator::new(seed, index).generate(self.config)?;
        let mut game = Game::new(layout);
        for &flag in &self.pending_flags {
            // the grid is still fully closed, these cannot fail
            game.flag(to_coords(flag, self.config.width()))?;
        }
        self.pending_flags.clear();
        log::debug!("board generated on first reveal at index {}", index);
        Ok(game)
    }

    fn coords(&self, index: CellIndex) -> Result<Coord2> {
        if index < self.config.total_cells() {
            Ok(to_coords(index, self.config.width()))
        } else {
            Err(GameError::InvalidCoords)
        }
    }

    fn check_not_terminal(&self) -> Result<()> {
        if self.state().is_terminal() {
            Err(GameError::AlreadyEnded)
        } else {
            Ok(())
        }
    }
}
