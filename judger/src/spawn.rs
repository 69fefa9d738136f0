//! Forking the two processes the judger supervises. Each `pre_exec` hook
//! replicates what the original did in the fork's child branch, in order:
//! close the fds this process has no business holding, reset the signal
//! mask and dispositions the judger installed back to default, and request
//! kernel-level parent-death delivery — all before `Command::spawn` performs
//! the actual `exec`.

use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command};

use anyhow::{Context, Result};
use nix::sys::signal::{self, SigHandler, SigSet, Signal};

use minesweeper_proto::env_vars;

use crate::pipes::Pipes;

pub fn spawn_game_server(
    server_exe: &Path,
    map_file: &Path,
    shm_name: &str,
    pipes: &Pipes,
) -> Result<Child> {
    let keep = (pipes.fd_gs_to_pl, pipes.fd_gs_from_pl, pipes.fd_gs_to_ju, pipes.fd_gs_from_ju);
    let drop_fds = [pipes.fd_pl_to_gs, pipes.fd_pl_from_gs, pipes.fd_ju_to_gs, pipes.fd_ju_from_gs];

    let mut cmd = Command::new(server_exe);
    cmd.env(env_vars::LAUNCHED_BY_JUDGER, "1")
        .env(env_vars::MAP_FILE_PATH, map_file)
        .env(env_vars::SHM_NAME, shm_name)
        .env(env_vars::FD_GS_TO_PL, keep.0.to_string())
        .env(env_vars::FD_GS_FROM_PL, keep.1.to_string())
        .env(env_vars::FD_GS_TO_JU, keep.2.to_string())
        .env(env_vars::FD_GS_FROM_JU, keep.3.to_string());

    // SAFETY: the closure only calls async-signal-safe primitives (`close`,
    // `sigaction`, `sigprocmask`, `prctl`, `getppid`, `exit`), as required by
    // `pre_exec`'s contract.
    unsafe {
        cmd.pre_exec(move || {
            for fd in drop_fds {
                let _ = nix::unistd::close(fd);
            }
            reset_signal_dispositions()?;
            minesweeper_proto::process::die_with_parent()
        });
    }

    cmd.spawn().context("forking/exec'ing the game server")
}

pub fn spawn_player(player_exe: &Path, shm_name: &str, pipes: &Pipes) -> Result<Child> {
    let keep = (pipes.fd_pl_to_gs, pipes.fd_pl_from_gs);
    let drop_fds = [
        pipes.fd_ju_to_gs,
        pipes.fd_ju_from_gs,
        pipes.fd_gs_to_pl,
        pipes.fd_gs_from_pl,
        pipes.fd_gs_to_ju,
        pipes.fd_gs_from_ju,
    ];

    let mut cmd = Command::new(player_exe);
    cmd.env(env_vars::LAUNCHED_BY_JUDGER, "1")
        .env(env_vars::SHM_NAME, shm_name)
        .env(env_vars::FD_PL_TO_GS, keep.0.to_string())
        .env(env_vars::FD_PL_FROM_GS, keep.1.to_string());

    // SAFETY: see `spawn_game_server`.
    unsafe {
        cmd.pre_exec(move || {
            for fd in drop_fds {
                let _ = nix::unistd::close(fd);
            }
            reset_signal_dispositions()?;
            minesweeper_proto::process::die_with_parent()
        });
    }

    cmd.spawn().context("forking/exec'ing the player's program")
}

/// Undo the judger's own signal setup before `exec`: a child must not
/// inherit handlers installed for the judger's own SIGCHLD/SIGALRM/SIGPIPE
/// bookkeeping, and must start with an empty blocked-signal set.
fn reset_signal_dispositions() -> std::io::Result<()> {
    for sig in [Signal::SIGCHLD, Signal::SIGALRM, Signal::SIGPIPE] {
        unsafe { signal::signal(sig, SigHandler::SigDfl) }.map_err(nix_to_io)?;
    }
    signal::sigprocmask(signal::SigmaskHow::SIG_SETMASK, Some(&SigSet::empty()), None)
        .map_err(nix_to_io)?;
    Ok(())
}

fn nix_to_io(err: nix::Error) -> std::io::Error {
    err.into()
}
