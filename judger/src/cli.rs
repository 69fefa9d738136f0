//! Command-line surface: one judger invocation runs exactly one game between
//! one player's program and the game server, against one fixed map file.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "judger",
    about = "Runs one player's program against one map and reports the resulting score."
)]
pub struct Args {
    /// Path to the player's compiled program.
    pub player_exe: PathBuf,

    /// Path to the map file to play against.
    pub map_file: PathBuf,

    /// Kill the player's program after this many seconds and score whatever
    /// it opened so far. Omit to run with no time limit.
    pub time_limit_seconds: Option<u64>,

    /// Path to the game server binary. Defaults to a binary named
    /// `game-server` alongside the judger's own binary.
    pub server_exe: Option<PathBuf>,
}
