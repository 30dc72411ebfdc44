use serde::{Deserialize, Serialize};

/// Player-visible state of a single cell.
///
/// `Exploded`, `Mine` and `IncorrectFlag` only appear once a game is lost:
/// the revealed mine, the remaining unflagged mines, and flags that turned
/// out to be wrong. Correct flags keep showing as `Flag`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Tile {
    Closed,
    Open(u8),
    Flag,
    Exploded,
    Mine,
    IncorrectFlag,
}

impl Tile {
    /// Whether the tile still visually covers its cell.
    pub const fn is_closed(self) -> bool {
        use Tile::*;
        match self {
            Closed => true,
            Open(_) => false,
            Flag => true,
            Exploded => false,
            Mine => false,
            IncorrectFlag => true,
        }
    }
}

impl Default for Tile {
    fn default() -> Self {
        Self::Closed
    }
}
