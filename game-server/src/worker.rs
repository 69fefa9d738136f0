//! One thread per active channel: the server side of the two-phase wakeup
//! protocol, dispatching each accepted request to the expand engine and
//! publishing the reply.

use std::os::fd::RawFd;
use std::sync::Arc;

use nix::unistd::write;

use minesweeper_map::Board;
use minesweeper_proto::{ControlBlock, OpenCount, SPIN_LIMIT};

use crate::expand::{self, ExpandResult};
use crate::scratch::ScratchPool;

/// Run until this channel hits a protocol violation or the process is torn
/// down out from under it — matches the original's "workers live until the
/// server exits" lifecycle, except that a protocol violation ends only this
/// one channel's worker, not the whole server: other channels and the
/// summarizer must still be answerable after one player click misbehaves.
///
/// Writes the allocated `channel_id` back to the player itself, as the very
/// first thing it does — the server main's job is only to spawn this thread,
/// not to speak for it.
pub fn run(
    channel_id: usize,
    control: ControlBlock,
    board: Arc<Board>,
    pool: Arc<ScratchPool>,
    fd_to_player: RawFd,
    fd_to_judger: RawFd,
) {
    if let Err(err) = write(fd_to_player, channel_id.to_string().as_bytes()) {
        tracing::error!(channel_id, %err, "failed to write back the allocated channel id");
        return;
    }

    loop {
        if !control.spin_for_pending(SPIN_LIMIT) {
            control.sleep_until_pending();
        }
        control.accept_request();

        let (r, c) = control.click_coords();
        let (r, c) = (r as u32, c as u32);
        let skip_when_reopen = control.skip_when_reopen();
        let do_not_expand = control.do_not_expand();

        if r >= board.side_len() || c >= board.side_len() {
            let msg = format!(
                "channel {channel_id}: click({r}, {c}) is out of range for a board of side length {}",
                board.side_len()
            );
            report_protocol_violation(channel_id, fd_to_judger, &msg);
            return;
        }

        match expand::expand(&board, &pool, r, c, skip_when_reopen, do_not_expand) {
            Ok(ExpandResult::Mine) => control.finish_request(OpenCount::Mine),
            Ok(ExpandResult::SkippedSafe) => control.finish_request(OpenCount::SkippedSafe),
            Ok(ExpandResult::SkippedMine) => control.finish_request(OpenCount::SkippedMine),
            Ok(ExpandResult::Revealed(cells)) => {
                for (i, cell) in cells.iter().enumerate() {
                    control.write_open_cell(i, *cell);
                }
                control.finish_request(OpenCount::Revealed(cells.len() as u32));
            }
            Err(err) => {
                let msg = format!("channel {channel_id}: {err}");
                report_protocol_violation(channel_id, fd_to_judger, &msg);
                return;
            }
        }
    }
}

/// Log and forward a protocol violation to the judger, then let the caller
/// end this channel's worker thread. Best-effort: a failure to write to the
/// judger pipe here does not change the fact that this channel is done.
fn report_protocol_violation(channel_id: usize, fd_to_judger: RawFd, msg: &str) {
    tracing::error!(channel_id, %msg, "protocol violation; killing this channel's worker");
    if let Err(err) = write(fd_to_judger, msg.as_bytes()) {
        tracing::error!(channel_id, %err, "failed to forward protocol violation to the judger");
    }
}
