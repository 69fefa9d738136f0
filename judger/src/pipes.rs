//! The four command pipes the judger creates before forking anyone: one pair
//! wiring the player to the server, one pair wiring the judger to the server.
//! Every fd the judger hands down to a child is renumbered into a fixed range
//! well above the low fds a player's program might reasonably want for its
//! own stdio or sockets.

use std::os::fd::RawFd;

use anyhow::{Context, Result};
use nix::unistd::{close, dup2, pipe};

/// First fd number the judger renumbers pipe ends into. Chosen well above
/// any fd a freshly-exec'd program is likely to already have open.
const FIRST_RENUMBERED_FD: RawFd = 100;

/// The eight pipe endpoints created by [`Pipes::create`]. `fd_A_to_B` is the
/// write end owned by process `A`; its peer, the read end owned by `B`, is
/// named `fd_B_from_A`.
pub struct Pipes {
    pub fd_pl_to_gs: RawFd,
    pub fd_gs_from_pl: RawFd,
    pub fd_gs_to_pl: RawFd,
    pub fd_pl_from_gs: RawFd,

    pub fd_gs_to_ju: RawFd,
    pub fd_ju_from_gs: RawFd,
    pub fd_ju_to_gs: RawFd,
    pub fd_gs_from_ju: RawFd,
}

impl Pipes {
    pub fn create() -> Result<Pipes> {
        let mut next_fd = FIRST_RENUMBERED_FD;
        let (fd_gs_from_pl, fd_pl_to_gs) = renumbered_pipe(&mut next_fd)?;
        let (fd_pl_from_gs, fd_gs_to_pl) = renumbered_pipe(&mut next_fd)?;
        let (fd_gs_from_ju, fd_ju_to_gs) = renumbered_pipe(&mut next_fd)?;
        let (fd_ju_from_gs, fd_gs_to_ju) = renumbered_pipe(&mut next_fd)?;

        Ok(Pipes {
            fd_pl_to_gs,
            fd_gs_from_pl,
            fd_gs_to_pl,
            fd_pl_from_gs,
            fd_gs_to_ju,
            fd_ju_from_gs,
            fd_ju_to_gs,
            fd_gs_from_ju,
        })
    }

    /// Close the judger's own copies of the four fds the server now owns.
    /// Called once the server has been forked and holds its own copies.
    pub fn close_server_side(&self) -> Result<()> {
        for fd in [self.fd_gs_to_pl, self.fd_gs_from_pl, self.fd_gs_to_ju, self.fd_gs_from_ju] {
            close(fd).context("closing the judger's copy of a server-owned fd")?;
        }
        Ok(())
    }

    /// Close the judger's own copies of the two fds the player now owns.
    pub fn close_player_side(&self) -> Result<()> {
        for fd in [self.fd_pl_to_gs, self.fd_pl_from_gs] {
            close(fd).context("closing the judger's copy of a player-owned fd")?;
        }
        Ok(())
    }
}

/// Create one pipe, then move both ends up into the renumbered range,
/// closing the kernel-assigned originals. Returns `(read_fd, write_fd)`.
fn renumbered_pipe(next_fd: &mut RawFd) -> Result<(RawFd, RawFd)> {
    let (raw_read, raw_write) = pipe().context("creating a pipe")?;

    let read_fd = *next_fd;
    dup2(raw_read, read_fd).context("moving a pipe read end into the renumbered range")?;
    *next_fd += 1;

    let write_fd = *next_fd;
    dup2(raw_write, write_fd).context("moving a pipe write end into the renumbered range")?;
    *next_fd += 1;

    if raw_read != read_fd {
        close(raw_read).ok();
    }
    if raw_write != write_fd {
        close(raw_write).ok();
    }

    Ok((read_fd, write_fd))
}
