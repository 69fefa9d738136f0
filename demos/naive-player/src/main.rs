//! A minimal raster-scan player: clicks every cell of the board in row-major
//! order, letting each click's flood fill do as much work as it can so later
//! clicks in an already-opened region come back instantly.
//!
//! This is test tooling, not a scored strategy — it exists so the rest of
//! the harness has something real to drive end-to-end, the way a reference
//! client exercises a server in any client/server test suite.

use anyhow::{Context, Result};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let game = minesweeper_player::init().context("performing the startup handshake")?;
    let channel = game.create_channel().context("creating a channel")?;

    let n = game.side_len();
    for r in 0..n {
        for c in 0..n {
            // skip_when_reopen: a cell already opened by an earlier click's
            // flood fill doesn't need to be re-clicked. do_not_expand: false,
            // so zero-valued cells keep opening their neighbours for us.
            channel
                .click(r, c, true, false)
                .with_context(|| format!("clicking ({r}, {c})"))?;
        }
    }

    Ok(())
}
