use crate::*;
pub use random::*;

mod random;

/// Produces the mine layout for a fresh board.
///
/// Generation happens on the first reveal, so implementations receive the
/// clicked cell and must keep it and its whole neighborhood mine-free.
pub trait MinefieldGenerator {
    fn generate(self, config: GameConfig) -> Result<MineLayout>;
}
