use serde::{Deserialize, Serialize};

pub use board::*;
pub use engine::*;
pub use error::*;
pub use generator::*;
pub use grid::*;
pub use session::*;
pub use tile::*;

mod board;
mod engine;
mod error;
mod generator;
mod grid;
mod session;
mod tile;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub size: Coord2,
    pub mines: CellCount,
}

impl GameConfig {
    /// 9x9 with 12 mines.
    pub const EASY: GameConfig = GameConfig::new_unchecked((9, 9), 12);
    /// 16x16 with 50 mines.
    pub const MEDIUM: GameConfig = GameConfig::new_unchecked((16, 16), 50);
    /// 32x16 with 100 mines.
    pub const HARD: GameConfig = GameConfig::new_unchecked((32, 16), 100);

    pub const fn new_unchecked(size: Coord2, mines: CellCount) -> Self {
        Self { size, mines }
    }

    pub fn new(size: Coord2, mines: CellCount) -> Result<Self> {
        let config = Self::new_unchecked(size, mines);
        config.validate()?;
        Ok(config)
    }

    /// Checks that the board has room for the mines plus a mine-free first
    /// reveal. A corner click excludes the fewest cells, so the bound uses
    /// the corner neighborhood.
    pub fn validate(&self) -> Result<()> {
        let (width, height) = self.size;
        if width == 0 || height == 0 || self.mines == 0 {
            return Err(GameError::InvalidConfig);
        }
        let corner_region = mult(width.min(2), height.min(2));
        let free = self.total_cells().saturating_sub(corner_region);
        if self.mines >= free {
            return Err(GameError::TooManyMines);
        }
        Ok(())
    }

    pub const fn width(&self) -> Coord {
        self.size.0
    }

    pub const fn height(&self) -> Coord {
        self.size.1
    }

    pub const fn total_cells(&self) -> CellCount {
        mult(self.size.0, self.size.1)
    }
}
