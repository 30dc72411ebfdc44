use ndarray::Array2;

use super::*;

/// Uniformly random mine placement that keeps the first revealed cell and
/// all of its neighbors clear, so every game starts on an empty spot.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RandomMinefieldGenerator {
    seed: u64,
    start: CellIndex,
}

impl RandomMinefieldGenerator {
    pub fn new(seed: u64, start: CellIndex) -> Self {
        Self { seed, start }
    }
}

impl MinefieldGenerator for RandomMinefieldGenerator {
    fn generate(self, config: GameConfig) -> Result<MineLayout> {
        use rand::prelude::*;

        let total_cells = config.total_cells();
        if self.start >= total_cells {
            return Err(GameError::InvalidCoords);
        }
        let start = to_coords(self.start, config.width());

        // mark the exclusion region as occupied so sampling skips it
        let mut mask: Array2<bool> = Array2::default(config.size.to_nd_index());
        mask[start.to_nd_index()] = true;
        let mut free_cells = total_cells - 1;
        for pos in mask.iter_neighbors(start) {
            mask[pos.to_nd_index()] = true;
            free_cells -= 1;
        }

        if config.mines >= free_cells {
            return Err(GameError::TooManyMines);
        }

        let mut rng = SmallRng::seed_from_u64(self.seed);
        let mut placed = 0;
        {
            let cells = mask.as_slice_mut().expect("mask layout should be standard");
            while placed < config.mines {
                // pick the slot-th free cell
                let mut slot = rng.random_range(0..free_cells);
                for cell in cells.iter_mut() {
                    if *cell {
                        continue;
                    }
                    if slot == 0 {
                        *cell = true;
                        placed += 1;
                        free_cells -= 1;
                        break;
                    }
                    slot -= 1;
                }
            }
        }

        // clear the exclusion marks back out
        mask[start.to_nd_index()] = false;
        for pos in mask.iter_neighbors(start) {
            mask[pos.to_nd_index()] = false;
        }

        let layout = MineLayout::from_mine_mask(mask);
        debug_assert_eq!(layout.mine_count(), config.mines);
        log::debug!(
            "generated {}x{} layout with {} mines, start cell {:?} kept clear",
            config.width(),
            config.height(),
            layout.mine_count(),
            start
        );
        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate(config: GameConfig, seed: u64, start: CellIndex) -> MineLayout {
        RandomMinefieldGenerator::new(seed, start)
            .generate(config)
            .unwrap()
    }

    #[test]
    fn places_exactly_the_requested_mines() {
        let config = GameConfig::EASY;
        for seed in 0..8 {
            let layout = generate(config, seed, 40);
            assert_eq!(layout.mine_count(), config.mines);
        }
    }

    #[test]
    fn start_cell_and_neighbors_stay_clear() {
        let config = GameConfig::EASY;
        for start in [0, 8, 40, 72, 80] {
            for seed in 0..8 {
                let layout = generate(config, seed, start);
                let coords = to_coords(start, config.width());
                assert!(!layout[coords], "mine on start cell {:?}", coords);
                for pos in layout.iter_neighbors(coords) {
                    assert!(!layout[pos], "mine next to start cell at {:?}", pos);
                }
                // the start cell always opens as an empty clearing
                assert_eq!(layout.adjacent_mine_count(coords), 0);
            }
        }
    }

    #[test]
    fn same_seed_same_layout() {
        let config = GameConfig::MEDIUM;
        let a = generate(config, 7, 0);
        let b = generate(config, 7, 0);
        assert_eq!(a, b);
    }

    #[test]
    fn seeds_vary_the_layout() {
        let config = GameConfig::MEDIUM;
        let first = generate(config, 0, 0);
        assert!((1..8).any(|seed| generate(config, seed, 0) != first));
    }

    #[test]
    fn too_many_mines_for_this_click_is_an_error() {
        // 4x1 with one mine works from a corner but not from the middle,
        // where the exclusion region covers three of the four cells
        let config = GameConfig::new((4, 1), 1).unwrap();
        assert!(
            RandomMinefieldGenerator::new(0, 0)
                .generate(config)
                .is_ok()
        );
        assert_eq!(
            RandomMinefieldGenerator::new(0, 1)
                .generate(config)
                .unwrap_err(),
            GameError::TooManyMines
        );
    }

    #[test]
    fn out_of_range_start_is_an_error() {
        let config = GameConfig::EASY;
        assert_eq!(
            RandomMinefieldGenerator::new(0, 81)
                .generate(config)
                .unwrap_err(),
            GameError::InvalidCoords
        );
    }
}
