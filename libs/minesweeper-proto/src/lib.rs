//! Shared wire-level protocol pieces for the minesweeper judging harness:
//! shared-memory layout constants, the per-channel control block, the
//! futex-based two-phase wakeup, environment variable plumbing, and the
//! shared-memory segment lifecycle. Used by `game-server`, `minesweeper-player`
//! and `judger` alike, so that all three agree on the exact same byte layout.

pub mod control_block;
pub mod env;
pub mod error;
pub mod futex;
pub mod process;
pub mod segment;

pub use control_block::{ControlBlock, OpenCell, OpenCount, MAX_OPEN_GRID};
pub use error::ShmError;

/// The maximum number of channels the player's program can have open at once.
pub const MAX_CHANNEL: usize = 1024;

/// The size of each per-channel shared-memory region, in bytes.
pub const CHANNEL_SHM_SIZE: usize = 256 * 1024;

/// Total size of the shm segment the judger allocates.
pub const TOTAL_SHM_SIZE: usize = MAX_CHANNEL * CHANNEL_SHM_SIZE;

/// Spin iterations the server attempts before falling back to `futex_wait`.
pub const SPIN_LIMIT: u32 = 2048;

/// Names of the environment variables the judger sets up for its children.
pub mod env_vars {
    pub const LAUNCHED_BY_JUDGER: &str = "MINESWEEPER_LAUNCHED_BY_JUDGER";
    pub const MAP_FILE_PATH: &str = "MINESWEEPER_MAP_FILE_PATH";
    pub const SHM_NAME: &str = "MINESWEEPER_SHM_NAME";

    pub const FD_GS_TO_PL: &str = "MINESWEEPER_FD_GS_TO_PL";
    pub const FD_GS_FROM_PL: &str = "MINESWEEPER_FD_GS_FROM_PL";
    pub const FD_GS_TO_JU: &str = "MINESWEEPER_FD_GS_TO_JU";
    pub const FD_GS_FROM_JU: &str = "MINESWEEPER_FD_GS_FROM_JU";

    pub const FD_PL_TO_GS: &str = "MINESWEEPER_FD_PL_TO_GS";
    pub const FD_PL_FROM_GS: &str = "MINESWEEPER_FD_PL_FROM_GS";
}

/// Single-byte pipe commands.
pub mod commands {
    /// Player → server: "create a new channel".
    pub const CREATE_CHANNEL: u8 = b'C';
    /// Judger → server: "finalize and report the summary".
    pub const FINALIZE: u8 = b'F';
}

/// A marker logged alongside anything that indicates a bug in this codebase
/// rather than a problem with the player's program or the environment.
pub const THIS_IS_A_BUG: &str =
    "this is a bug in the judging harness itself, not in the player's program";
