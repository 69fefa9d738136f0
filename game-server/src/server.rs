//! Server main: owns the two command pipes (to/from the player, to/from the
//! judger), multiplexes them with level-triggered `poll`, spawns a worker
//! thread per channel, and drives the summarizer on finalize.

use std::os::fd::RawFd;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use nix::poll::{poll, PollFd, PollFlags};
use nix::unistd::{read, write};

use minesweeper_map::Board;
use minesweeper_proto::{commands, ControlBlock, MAX_CHANNEL};

use crate::scratch::ScratchPool;
use crate::summarize;

pub struct Pipes {
    pub fd_to_player: RawFd,
    pub fd_from_player: RawFd,
    pub fd_to_judger: RawFd,
    pub fd_from_judger: RawFd,
}

/// Runs until the judger sends `'F'`, at which point it summarizes and
/// returns — the caller (`main`) is expected to exit immediately after.
pub fn run(pipes: Pipes, segment: minesweeper_proto::segment::Segment, board: Arc<Board>) -> Result<()> {
    write(
        pipes.fd_to_player,
        format!("{} {}", board.side_len(), board.is_mine_board().popcount()).as_bytes(),
    )
    .context("writing the initial N K handshake to the player")?;

    let pool = Arc::new(ScratchPool::new(board.side_len()));
    let next_channel_id = AtomicUsize::new(0);
    let mut player_open = true;

    loop {
        let mut fds = vec![PollFd::new(pipes.fd_from_judger, PollFlags::POLLIN)];
        if player_open {
            fds.push(PollFd::new(pipes.fd_from_player, PollFlags::POLLIN));
        }

        poll(&mut fds, -1).context("polling command pipes")?;

        if fds[0]
            .revents()
            .is_some_and(|r| r.contains(PollFlags::POLLIN))
        {
            let mut cmd = [0u8; 1];
            let n = read(pipes.fd_from_judger, &mut cmd).context("reading judger command")?;
            if n == 0 {
                bail!("judger pipe closed without sending 'F'; {}", minesweeper_proto::THIS_IS_A_BUG);
            }
            if cmd[0] == commands::FINALIZE {
                let summary = summarize::summarize(&board);
                let line = format!(
                    "0 {} {} {} {}",
                    board.side_len(),
                    board.is_mine_board().popcount(),
                    summary.cnt_safe_open,
                    summary.cnt_mine_open
                );
                write(pipes.fd_to_judger, line.as_bytes()).context("writing summary to judger")?;
                return Ok(());
            } else {
                tracing::warn!(cmd = cmd[0], "ignoring unrecognized judger command byte");
            }
        }

        if player_open
            && fds
                .get(1)
                .and_then(PollFd::revents)
                .is_some_and(|r| r.contains(PollFlags::POLLIN) || r.contains(PollFlags::POLLHUP))
        {
            let mut cmd = [0u8; 1];
            let n = read(pipes.fd_from_player, &mut cmd).context("reading player command")?;
            if n == 0 {
                // player EOF: stop listening to it, keep serving the judger.
                player_open = false;
                continue;
            }
            if cmd[0] == commands::CREATE_CHANNEL {
                let id = next_channel_id.fetch_add(1, Ordering::Relaxed);
                if id >= MAX_CHANNEL {
                    let line = format!("channel id {id} exceeds MAX_CHANNEL={MAX_CHANNEL}");
                    tracing::error!(%line, "refusing to create another channel");
                    write(pipes.fd_to_judger, line.as_bytes()).ok();
                    bail!(line);
                }
                spawn_worker(
                    id,
                    &segment,
                    Arc::clone(&board),
                    Arc::clone(&pool),
                    pipes.fd_to_player,
                    pipes.fd_to_judger,
                )?;
            } else {
                tracing::warn!(cmd = cmd[0], "ignoring unrecognized player command byte");
            }
        }
    }
}

fn spawn_worker(
    id: usize,
    segment: &minesweeper_proto::segment::Segment,
    board: Arc<Board>,
    pool: Arc<ScratchPool>,
    fd_to_player: RawFd,
    fd_to_judger: RawFd,
) -> Result<()> {
    let base = segment.channel_base(id);
    let control = unsafe { ControlBlock::at(base) };
    control.reset();

    std::thread::Builder::new()
        .name(format!("channel-{id}"))
        .spawn(move || crate::worker::run(id, control, board, pool, fd_to_player, fd_to_judger))
        .context("spawning channel worker thread")?;

    Ok(())
}
