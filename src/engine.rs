use chrono::prelude::*;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::ops::BitOr;

use crate::*;

/// Valid transitions:
/// - NotStarted -> InProgress
/// - NotStarted -> Win | Lose (a first reveal can already end the game)
/// - InProgress -> Win | Lose
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameState {
    NotStarted,
    InProgress,
    Win,
    Lose,
}

impl GameState {
    pub const fn is_initial(self) -> bool {
        matches!(self, Self::NotStarted)
    }

    /// Indicates the game has ended and no moves are accepted anymore.
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Win | Self::Lose)
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::NotStarted
    }
}

/// Outcome of a flag or unflag.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FlagOutcome {
    NoChange,
    Changed,
}

impl FlagOutcome {
    /// Whether this outcome could have changed what is displayed.
    pub const fn has_update(self) -> bool {
        match self {
            Self::NoChange => false,
            Self::Changed => true,
        }
    }
}

/// Outcome of revealing one or more cells.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RevealOutcome {
    NoChange,
    Revealed,
    Exploded,
    Won,
}

impl RevealOutcome {
    /// Whether this outcome could have changed what is displayed.
    pub const fn has_update(self) -> bool {
        use RevealOutcome::*;
        match self {
            NoChange => false,
            Revealed => true,
            Exploded => true,
            Won => true,
        }
    }
}

/// Merges outcomes when a chord reveals several cells.
impl BitOr for RevealOutcome {
    type Output = RevealOutcome;

    fn bitor(self, rhs: Self) -> Self::Output {
        use RevealOutcome::*;
        match (self, rhs) {
            (Exploded, _) => Exploded,
            (_, Exploded) => Exploded,
            (Won, _) => Won,
            (_, Won) => Won,
            (Revealed, _) => Revealed,
            (_, Revealed) => Revealed,
            (NoChange, NoChange) => NoChange,
        }
    }
}

/// A single board played from start to finish: the mine layout plus the
/// grid of what the player currently sees.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Game {
    layout: MineLayout,
    grid: Array2<Tile>,
    opened: CellCount,
    flagged: CellCount,
    state: GameState,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl Game {
    pub fn new(layout: MineLayout) -> Self {
        let size = layout.size();
        Self {
            layout,
            grid: Array2::default(size.to_nd_index()),
            opened: 0,
            flagged: 0,
            state: Default::default(),
            started_at: None,
            ended_at: None,
        }
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn is_over(&self) -> bool {
        self.state.is_final()
    }

    pub fn size(&self) -> Coord2 {
        self.layout.size()
    }

    pub fn total_mines(&self) -> CellCount {
        self.layout.mine_count()
    }

    pub fn opened_count(&self) -> CellCount {
        self.opened
    }

    /// How many mines have not been flagged yet. Goes negative when the
    /// player places more flags than there are mines.
    pub fn mines_left(&self) -> isize {
        (self.layout.mine_count() as isize) - (self.flagged as isize)
    }

    /// Whole seconds since the first reveal, 0 before it.
    pub fn elapsed_secs(&self) -> u32 {
        if let Some(started_at) = self.started_at {
            (self.ended_at.unwrap_or_else(Utc::now) - started_at)
                .num_seconds()
                .max(0) as u32
        } else {
            0
        }
    }

    pub fn tile_at(&self, coords: Coord2) -> Tile {
        self.grid[coords.to_nd_index()]
    }

    /// Flags a closed cell.
    pub fn flag(&mut self, coords: Coord2) -> Result<FlagOutcome> {
        let coords = self.layout.validate_coords(coords)?;
        self.check_not_over()?;

        match self.grid[coords.to_nd_index()] {
            Tile::Closed => {
                self.grid[coords.to_nd_index()] = Tile::Flag;
                self.flagged += 1;
                Ok(FlagOutcome::Changed)
            }
            _ => Err(GameError::InvalidMove),
        }
    }

    /// Removes a flag, returning the cell to closed.
    pub fn unflag(&mut self, coords: Coord2) -> Result<FlagOutcome> {
        let coords = self.layout.validate_coords(coords)?;
        self.check_not_over()?;

        match self.grid[coords.to_nd_index()] {
            Tile::Flag => {
                self.grid[coords.to_nd_index()] = Tile::Closed;
                self.flagged -= 1;
                Ok(FlagOutcome::Changed)
            }
            _ => Err(GameError::InvalidMove),
        }
    }

    /// Opens a closed cell. Opening anything else is a silent no-op, so a
    /// flag always protects its cell.
    pub fn open(&mut self, coords: Coord2) -> Result<RevealOutcome> {
        let coords = self.layout.validate_coords(coords)?;
        self.check_not_over()?;

        if matches!(self.grid[coords.to_nd_index()], Tile::Closed) {
            Ok(self.open_cell(coords))
        } else {
            Ok(RevealOutcome::NoChange)
        }
    }

    /// Opens every closed neighbor of a satisfied numbered cell. A flag
    /// count that does not match the number is a silent no-op.
    pub fn chord_open(&mut self, coords: Coord2) -> Result<RevealOutcome> {
        let coords = self.layout.validate_coords(coords)?;
        self.check_not_over()?;

        let count = match self.grid[coords.to_nd_index()] {
            Tile::Open(count) if count > 0 => count,
            _ => return Err(GameError::InvalidMove),
        };
        if self.count_flagged_neighbors(coords) != count {
            return Ok(RevealOutcome::NoChange);
        }

        let mut outcome = RevealOutcome::NoChange;
        for pos in self.layout.iter_neighbors(coords) {
            if matches!(self.grid[pos.to_nd_index()], Tile::Closed) {
                outcome = outcome | self.open_cell(pos);
                if matches!(outcome, RevealOutcome::Exploded) {
                    break;
                }
            }
        }
        Ok(outcome)
    }

    /// Whether a chord at `coords` would open anything right now.
    pub fn is_chordable(&self, coords: Coord2) -> bool {
        if self.state.is_final() {
            return false;
        }
        match self.grid[coords.to_nd_index()] {
            Tile::Open(count) if count > 0 => count == self.count_flagged_neighbors(coords),
            _ => false,
        }
    }

    /// Returns the board to its unopened state, keeping the mine layout,
    /// so the same puzzle can be replayed.
    pub fn replay(&mut self) {
        self.grid = Array2::default(self.layout.size().to_nd_index());
        self.opened = 0;
        self.flagged = 0;
        self.state = GameState::NotStarted;
        self.started_at = None;
        self.ended_at = None;
    }

    /// Opens one cell and flood-fills outward when it has no adjacent
    /// mines. The worklist keeps the cascade off the call stack.
    fn open_cell(&mut self, coords: Coord2) -> RevealOutcome {
        let has_mine = self.layout[coords];
        if has_mine {
            self.grid[coords.to_nd_index()] = Tile::Exploded;
            self.end_game(false);
            return RevealOutcome::Exploded;
        }

        let count = self.layout.adjacent_mine_count(coords);
        self.grid[coords.to_nd_index()] = Tile::Open(count);
        self.opened += 1;
        log::debug!("opened cell {:?}, adjacent mines: {}", coords, count);

        if count == 0 {
            let mut visited = HashSet::from([coords]);
            let mut to_visit: VecDeque<_> = self
                .layout
                .iter_neighbors(coords)
                .filter(|&pos| matches!(self.grid[pos.to_nd_index()], Tile::Closed))
                .collect();

            while let Some(visit) = to_visit.pop_front() {
                if !visited.insert(visit) {
                    continue;
                }

                // flags and already opened cells stop the cascade
                if !matches!(self.grid[visit.to_nd_index()], Tile::Closed) {
                    continue;
                }

                let visit_count = self.layout.adjacent_mine_count(visit);
                self.grid[visit.to_nd_index()] = Tile::Open(visit_count);
                self.opened += 1;
                log::trace!("cascade opened {:?}, adjacent mines: {}", visit, visit_count);

                // only empty cells keep the cascade going, numbered cells
                // form its border
                if visit_count == 0 {
                    to_visit.extend(
                        self.layout
                            .iter_neighbors(visit)
                            .filter(|&pos| matches!(self.grid[pos.to_nd_index()], Tile::Closed))
                            .filter(|pos| !visited.contains(pos)),
                    );
                }
            }
        }

        if self.opened == self.layout.safe_cell_count() {
            self.end_game(true);
            RevealOutcome::Won
        } else {
            self.mark_started();
            RevealOutcome::Revealed
        }
    }

    fn mark_started(&mut self) {
        if self.state.is_initial() {
            let now = Utc::now();
            log::debug!("game started at {}", now);
            self.started_at.replace(now);
            self.state = GameState::InProgress;
        }
    }

    fn end_game(&mut self, won: bool) {
        if self.state.is_final() {
            return;
        }

        let now = Utc::now();
        if self.started_at.is_none() {
            self.started_at.replace(now);
        }
        self.ended_at.replace(now);
        self.state = if won { GameState::Win } else { GameState::Lose };
        log::debug!("game ended at {}, won: {}", now, won);
        self.annotate_mines(won);
    }

    /// On a win, auto-flags the remaining mines; on a loss, uncovers them
    /// and crosses out every flag that was not on a mine.
    fn annotate_mines(&mut self, won: bool) {
        let (x_end, y_end) = self.layout.size();
        for y in 0..y_end {
            for x in 0..x_end {
                let coords = (x, y);
                let tile = self.grid[coords.to_nd_index()];
                if self.layout[coords] {
                    if tile == Tile::Closed {
                        if won {
                            self.grid[coords.to_nd_index()] = Tile::Flag;
                            self.flagged += 1;
                        } else {
                            self.grid[coords.to_nd_index()] = Tile::Mine;
                        }
                    }
                } else if tile == Tile::Flag {
                    self.grid[coords.to_nd_index()] = Tile::IncorrectFlag;
                }
            }
        }
    }

    fn count_flagged_neighbors(&self, coords: Coord2) -> u8 {
        self.grid
            .iter_neighbor_cells(coords)
            .filter(|&tile| tile == Tile::Flag)
            .count()
            .try_into()
            .unwrap()
    }

    fn check_not_over(&self) -> Result<()> {
        if self.state.is_final() {
            Err(GameError::AlreadyEnded)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(size: Coord2, mines: &[Coord2]) -> Game {
        Game::new(MineLayout::from_mine_coords(size, mines).unwrap())
    }

    #[test]
    fn opening_a_mine_loses_and_annotates_the_board() {
        let mut game = game((3, 3), &[(0, 0), (2, 2), (2, 0)]);

        game.flag((2, 2)).unwrap();
        game.flag((0, 2)).unwrap();
        let outcome = game.open((0, 0)).unwrap();

        assert_eq!(outcome, RevealOutcome::Exploded);
        assert_eq!(game.state(), GameState::Lose);
        assert!(game.is_over());
        // the clicked mine, the other uncovered mine, the kept flag and
        // the wrong flag are all distinguishable
        assert_eq!(game.tile_at((0, 0)), Tile::Exploded);
        assert_eq!(game.tile_at((2, 0)), Tile::Mine);
        assert_eq!(game.tile_at((2, 2)), Tile::Flag);
        assert_eq!(game.tile_at((0, 2)), Tile::IncorrectFlag);
        assert_eq!(game.tile_at((1, 1)), Tile::Closed);
        // the uncovered mines read as visually open, the flags do not
        assert!(!game.tile_at((0, 0)).is_closed());
        assert!(!game.tile_at((2, 0)).is_closed());
        assert!(game.tile_at((0, 2)).is_closed());
    }

    #[test]
    fn cascade_opens_the_zero_region_and_its_border_only() {
        // mine in the middle of a 5x1 strip splits it into two clearings
        let mut game = game((5, 1), &[(2, 0)]);

        let outcome = game.open((0, 0)).unwrap();

        assert_eq!(outcome, RevealOutcome::Revealed);
        assert_eq!(game.tile_at((0, 0)), Tile::Open(0));
        assert_eq!(game.tile_at((1, 0)), Tile::Open(1));
        // the far side of the mine is untouched
        assert_eq!(game.tile_at((3, 0)), Tile::Closed);
        assert_eq!(game.tile_at((4, 0)), Tile::Closed);

        assert_eq!(game.open((4, 0)).unwrap(), RevealOutcome::Won);
        assert_eq!(game.state(), GameState::Win);
    }

    #[test]
    fn cascade_respects_flags() {
        let mut game = game((4, 4), &[(3, 3)]);

        game.flag((1, 1)).unwrap();
        game.open((0, 0)).unwrap();

        assert_eq!(game.tile_at((1, 1)), Tile::Flag);
        assert_eq!(game.tile_at((0, 1)), Tile::Open(0));
    }

    #[test]
    fn golden_four_by_one_board() {
        // hand-computed: mine at the far end, reveal(0) cascades across
        // the clearing, stops on the numbered border and wins
        let mut game = game((4, 1), &[(3, 0)]);
        assert_eq!(game.size(), (4, 1));
        assert_eq!(game.total_mines(), 1);

        assert_eq!(game.open((0, 0)).unwrap(), RevealOutcome::Won);
        assert_eq!(game.tile_at((0, 0)), Tile::Open(0));
        assert_eq!(game.tile_at((1, 0)), Tile::Open(0));
        assert_eq!(game.tile_at((2, 0)), Tile::Open(1));
        assert_eq!(game.tile_at((3, 0)), Tile::Flag);
        assert_eq!(game.mines_left(), 0);
    }

    #[test]
    fn winning_auto_flags_the_remaining_mines() {
        let mut game = game((2, 1), &[(0, 0)]);

        assert_eq!(game.open((1, 0)).unwrap(), RevealOutcome::Won);
        assert_eq!(game.state(), GameState::Win);
        assert_eq!(game.tile_at((0, 0)), Tile::Flag);
        assert_eq!(game.mines_left(), 0);
    }

    #[test]
    fn win_is_monotonic() {
        let mut game = game((2, 1), &[(0, 0)]);

        game.open((1, 0)).unwrap();
        assert_eq!(game.open((0, 0)).unwrap_err(), GameError::AlreadyEnded);
        assert_eq!(game.flag((0, 0)).unwrap_err(), GameError::AlreadyEnded);
        assert_eq!(game.state(), GameState::Win);
    }

    #[test]
    fn chord_opens_when_flags_match() {
        let mines = &[(0, 1), (2, 1)];
        let mut game = game((3, 3), mines);

        game.open((1, 1)).unwrap();
        game.flag((0, 1)).unwrap();
        game.flag((2, 1)).unwrap();

        let outcome = game.chord_open((1, 1)).unwrap();

        assert_eq!(outcome, RevealOutcome::Won);
        assert_eq!(game.tile_at((1, 0)), Tile::Open(2));
        assert_eq!(game.tile_at((1, 2)), Tile::Open(2));
    }

    #[test]
    fn chord_with_mismatched_flags_is_a_silent_no_op() {
        let mut game = game((3, 3), &[(0, 1), (2, 1)]);

        game.open((1, 1)).unwrap();
        game.flag((0, 1)).unwrap();

        assert_eq!(game.chord_open((1, 1)).unwrap(), RevealOutcome::NoChange);
        assert_eq!(game.tile_at((1, 0)), Tile::Closed);
    }

    #[test]
    fn chord_on_unopened_or_empty_cells_is_rejected() {
        let mut game = game((3, 3), &[(2, 0), (2, 2)]);

        assert_eq!(game.chord_open((0, 0)).unwrap_err(), GameError::InvalidMove);
        game.open((0, 0)).unwrap();
        // (0, 0) opened as an empty cell, chording it means nothing
        assert_eq!(game.tile_at((0, 0)), Tile::Open(0));
        assert_eq!(game.chord_open((0, 0)).unwrap_err(), GameError::InvalidMove);
    }

    #[test]
    fn chord_over_a_wrong_flag_explodes() {
        let mut game = game((2, 2), &[(0, 0)]);

        game.open((1, 1)).unwrap();
        game.flag((1, 0)).unwrap();

        let outcome = game.chord_open((1, 1)).unwrap();

        assert_eq!(outcome, RevealOutcome::Exploded);
        assert_eq!(game.state(), GameState::Lose);
        assert_eq!(game.tile_at((0, 0)), Tile::Exploded);
        assert_eq!(game.tile_at((1, 0)), Tile::IncorrectFlag);
    }

    #[test]
    fn flag_round_trip_returns_to_closed() {
        let mut game = game((3, 3), &[(2, 2)]);

        let outcome = game.flag((0, 0)).unwrap();
        assert_eq!(outcome, FlagOutcome::Changed);
        assert!(outcome.has_update());
        assert_eq!(game.tile_at((0, 0)), Tile::Flag);
        assert_eq!(game.unflag((0, 0)).unwrap(), FlagOutcome::Changed);
        assert_eq!(game.tile_at((0, 0)), Tile::Closed);
    }

    #[test]
    fn flagging_the_wrong_tile_state_is_rejected() {
        let mut game = game((3, 3), &[(2, 0), (2, 2)]);

        game.open((0, 0)).unwrap();
        assert_eq!(game.flag((0, 0)).unwrap_err(), GameError::InvalidMove);
        assert_eq!(game.unflag((1, 0)).unwrap_err(), GameError::InvalidMove);
        game.flag((2, 2)).unwrap();
        assert_eq!(game.flag((2, 2)).unwrap_err(), GameError::InvalidMove);
    }

    #[test]
    fn flag_counter_may_go_negative() {
        let mut game = game((3, 3), &[(2, 2)]);

        game.flag((0, 0)).unwrap();
        game.flag((1, 0)).unwrap();
        assert_eq!(game.mines_left(), -1);
    }

    #[test]
    fn opening_a_flagged_or_open_cell_changes_nothing() {
        let mut game = game((3, 3), &[(2, 0), (2, 2)]);

        game.flag((2, 0)).unwrap();
        assert_eq!(game.open((2, 0)).unwrap(), RevealOutcome::NoChange);
        game.open((0, 0)).unwrap();
        assert_eq!(game.open((0, 0)).unwrap(), RevealOutcome::NoChange);
    }

    #[test]
    fn replay_keeps_the_layout_and_clears_the_rest() {
        let mut game = game((5, 1), &[(2, 0)]);

        game.open((0, 0)).unwrap();
        game.flag((2, 0)).unwrap();
        game.replay();

        assert_eq!(game.state(), GameState::NotStarted);
        assert_eq!(game.opened_count(), 0);
        assert_eq!(game.mines_left(), 1);
        assert_eq!(game.elapsed_secs(), 0);
        for x in 0..5 {
            assert_eq!(game.tile_at((x, 0)), Tile::Closed);
        }
        // same puzzle: the border cell shows the same number again
        game.open((1, 0)).unwrap();
        assert_eq!(game.tile_at((1, 0)), Tile::Open(1));
    }

    #[test]
    fn elapsed_is_zero_before_the_first_reveal() {
        let game = game((3, 3), &[(2, 2)]);
        assert_eq!(game.elapsed_secs(), 0);
    }

    #[test]
    fn chordable_only_when_flags_satisfy_the_number() {
        let mut game = game((3, 3), &[(0, 1), (2, 1)]);

        game.open((1, 1)).unwrap();
        assert!(!game.is_chordable((1, 1)));
        game.flag((0, 1)).unwrap();
        assert!(!game.is_chordable((1, 1)));
        game.flag((2, 1)).unwrap();
        assert!(game.is_chordable((1, 1)));
        assert!(!game.is_chordable((0, 0)));
    }

    #[test]
    fn serde_round_trip_is_lossless() {
        let mut game = game((3, 3), &[(2, 0), (2, 2)]);
        game.open((0, 0)).unwrap();
        game.flag((2, 2)).unwrap();

        let encoded = serde_json::to_string(&game).unwrap();
        let decoded: Game = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, game);
    }
}
