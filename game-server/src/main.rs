//! The minesweeper game server: loads the ground-truth map, then serves
//! click requests from the player's program over shared memory until the
//! judger asks it to finalize.
//!
//! Never invoked directly — the judger execs this binary with the
//! environment variables it needs already set.

mod expand;
mod scratch;
mod server;
mod summarize;
mod worker;

use std::sync::Arc;

use anyhow::{ensure, Context, Result};

use minesweeper_map::Board;
use minesweeper_proto::{env, env_vars, segment};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(err) = real_main() {
        tracing::error!(%err, "{}", minesweeper_proto::THIS_IS_A_BUG);
        eprintln!("game-server: fatal: {err:#}");
        std::process::exit(1);
    }
    Ok(())
}

fn real_main() -> Result<()> {
    ensure!(
        env::required_env(env_vars::LAUNCHED_BY_JUDGER).is_ok(),
        "game-server is not designed to be launched manually; invoke it via the judger"
    );

    minesweeper_proto::process::die_with_parent().context("installing parent-death signal")?;

    let map_path = env::required_env(env_vars::MAP_FILE_PATH)?;
    let map = minesweeper_map::read_map_file(map_path.as_ref())
        .with_context(|| format!("reading map file {map_path}"))?;
    tracing::info!(n = map.n, k = map.k, "loaded map");
    let board = Arc::new(Board::new(map.n, map.is_mine));

    let shm_name = env::required_env(env_vars::SHM_NAME)?;
    let segment = segment::open_existing(&shm_name).context("opening shared-memory segment")?;

    let pipes = server::Pipes {
        fd_to_player: env::required_env_fd(env_vars::FD_GS_TO_PL)?,
        fd_from_player: env::required_env_fd(env_vars::FD_GS_FROM_PL)?,
        fd_to_judger: env::required_env_fd(env_vars::FD_GS_TO_JU)?,
        fd_from_judger: env::required_env_fd(env_vars::FD_GS_FROM_JU)?,
    };

    server::run(pipes, segment, board)
}
