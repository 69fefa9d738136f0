//! The board model shared by `game-server` and by offline map tooling: the
//! packed bit-array primitive, the `is_mine`/`is_open` board built on top of
//! it, and the fixed on-disk map file format.

pub mod bitboard;
pub mod board;
pub mod io;

pub use bitboard::BitBoard;
pub use board::Board;
pub use io::{read_map_file, write_map_file, MapFile};

/// Errors reading or validating a map file.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("failed to read map file: {0}")]
    Io(#[source] std::io::Error),

    #[error("malformed map file header: {0:?}")]
    BadHeader(String),

    #[error("map side length N={0} must be a power of two and at least 8")]
    BadSideLength(u32),

    #[error("declared mine count K={k} exceeds N*N for N={n}")]
    TooManyMines { k: u64, n: u32 },

    #[error("map file declares K={declared} mines but the body contains {actual}")]
    MineCountMismatch { declared: u64, actual: u64 },
}
