use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Invalid coordinates")]
    InvalidCoords,
    #[error("Invalid board size or mine count")]
    InvalidConfig,
    #[error("Too many mines for a safe first reveal")]
    TooManyMines,
    #[error("Operation not allowed in the current state")]
    InvalidMove,
    #[error("Game already ended, no new moves are accepted")]
    AlreadyEnded,
}

pub type Result<T> = std::result::Result<T, GameError>;
