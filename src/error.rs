use thiserror::Error;

/// Why a move token was rejected
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IllegalMove {
    UnknownToken,
    ColumnFull,
    NoOwnDisc,
    BoardNotFull,
    GameOver,
}

impl std::fmt::Display for IllegalMove {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            IllegalMove::UnknownToken => "not a move on this board",
            IllegalMove::ColumnFull => "column is full",
            IllegalMove::NoOwnDisc => "bottom disc is not the mover's",
            IllegalMove::BoardNotFull => "passing is only allowed on a full board",
            IllegalMove::GameOver => "game is over",
        };
        f.write_str(reason)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[error("invalid move '{token}': {reason}")]
    InvalidMove { token: char, reason: IllegalMove },

    #[error("invalid board size {width}x{height}: {reason}")]
    InvalidGeometry {
        width: usize,
        height: usize,
        reason: &'static str,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("resources exhausted: {0}")]
    ResourceExhausted(String),

    #[error("search cancelled")]
    Cancelled,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
