//! The judger: the only process a player's submission-running pipeline
//! invokes directly. Creates the shared-memory segment and the four command
//! pipes, forks the game server and the player's program, then supervises
//! both until the game ends — by the player exiting, by the time limit
//! firing, or by the server reporting a protocol violation — at which point
//! it collects the final score from the server and reports it.

mod cli;
mod pipes;
mod report;
mod signals;
mod spawn;

use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use clap::Parser;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags};
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{read, Pid};
use once_cell::sync::OnceCell;

use cli::Args;
use pipes::Pipes;
use signals::SignalPipes;

/// The name of the shared-memory segment this run created, set once `run`
/// has it in hand. Read back by [`exit_process`] so every exit path —
/// success, protocol violation, or fatal error — unlinks it, regardless of
/// which function noticed the game was over.
static SHM_NAME: OnceCell<String> = OnceCell::new();

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(err) = run(Args::parse()) {
        tracing::error!(%err, "judger exiting after a fatal error");
        eprintln!("judger: fatal: {err:#}");
        exit_process(1);
    }
    Ok(())
}

/// Unlink the shared-memory segment's `/dev/shm` name (best-effort — a
/// segment that was never created, or is already gone, is not itself a
/// fatal error on the way out) and exit with `code`.
fn exit_process(code: i32) -> ! {
    if let Some(name) = SHM_NAME.get() {
        if let Err(err) = minesweeper_proto::segment::unlink(name) {
            tracing::warn!(%err, "failed to unlink the shared-memory segment");
        }
    }
    std::process::exit(code);
}

fn run(args: Args) -> Result<()> {
    ensure!(args.player_exe.exists(), "player executable {} does not exist", args.player_exe.display());
    ensure_executable(&args.player_exe)?;

    ensure!(args.map_file.exists(), "map file {} does not exist", args.map_file.display());

    let server_exe = args.server_exe.clone().unwrap_or_else(default_server_exe);
    ensure!(server_exe.exists(), "game server executable {} does not exist", server_exe.display());
    ensure_executable(&server_exe)?;

    let pipes = Pipes::create().context("creating the judger's command pipes")?;

    let shm_name = minesweeper_proto::segment::random_shm_name();
    let _segment =
        minesweeper_proto::segment::create(&shm_name).context("creating the shared-memory segment")?;
    SHM_NAME
        .set(shm_name.clone())
        .expect("run() is only called once per process");

    // Install signal handling before forking anyone, so a SIGCHLD delivered
    // the instant a child exits can never race ahead of us being ready to
    // observe it.
    let signal_pipes = SignalPipes::register().context("installing signal handlers")?;

    let game_server_child = spawn::spawn_game_server(&server_exe, &args.map_file, &shm_name, &pipes)
        .context("starting the game server")?;
    let game_server_pid = Pid::from_raw(game_server_child.id() as i32);
    pipes
        .close_server_side()
        .context("closing the judger's copies of the server's fds")?;

    let player_child = spawn::spawn_player(&args.player_exe, &shm_name, &pipes)
        .context("starting the player's program")?;
    let player_pid = Pid::from_raw(player_child.id() as i32);
    pipes
        .close_player_side()
        .context("closing the judger's copies of the player's fds")?;

    if let Some(seconds) = args.time_limit_seconds {
        // SAFETY: `alarm` touches only process-global kernel state.
        unsafe { libc::alarm(seconds as u32) };
    }

    event_loop(&pipes, &signal_pipes, game_server_pid, player_pid)
}

/// A `game-server` binary alongside the judger's own executable, used when
/// `--server-exe` is omitted.
fn default_server_exe() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf));
    match exe_dir {
        Some(dir) => dir.join("game-server"),
        None => PathBuf::from("./game-server"),
    }
}

fn ensure_executable(path: &std::path::Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = std::fs::metadata(path)
        .with_context(|| format!("stat'ing {}", path.display()))?
        .permissions();
    ensure!(perms.mode() & 0o111 != 0, "{} is not executable", path.display());
    Ok(())
}

/// Multiplex the server's command pipe alongside the three signal self-pipes
/// until something decides the game is over. Every branch that decides the
/// game is over ends the process (via [`finalize_and_exit`] or a direct
/// [`exit_process`]), so this function only returns on an I/O error.
fn event_loop(
    pipes: &Pipes,
    signal_pipes: &SignalPipes,
    game_server_pid: Pid,
    player_pid: Pid,
) -> Result<()> {
    loop {
        let mut fds = [
            PollFd::new(pipes.fd_ju_from_gs, PollFlags::POLLIN),
            PollFd::new(signal_pipes.sigchld.as_raw_fd(), PollFlags::POLLIN),
            PollFd::new(signal_pipes.sigalrm.as_raw_fd(), PollFlags::POLLIN),
            PollFd::new(signal_pipes.sigpipe.as_raw_fd(), PollFlags::POLLIN),
        ];
        poll(&mut fds, -1).context("polling for judger events")?;

        if readable(&fds[1]) {
            signals::drain(&signal_pipes.sigchld);
            handle_sigchld(pipes, game_server_pid, player_pid)?;
        }
        if readable(&fds[2]) {
            signals::drain(&signal_pipes.sigalrm);
            handle_sigalrm(pipes, player_pid);
        }
        if readable(&fds[3]) {
            signals::drain(&signal_pipes.sigpipe);
            tracing::error!(
                "received SIGPIPE; a write to an already-closed pipe means a child exited \
                 out of turn. {}",
                minesweeper_proto::THIS_IS_A_BUG
            );
            exit_process(1);
        }
        if readable(&fds[0]) {
            handle_spontaneous_message(pipes)?;
        }
    }
}

fn readable(fd: &PollFd) -> bool {
    fd.revents().is_some_and(|r| r.contains(PollFlags::POLLIN))
}

fn handle_sigchld(pipes: &Pipes, game_server_pid: Pid, player_pid: Pid) -> Result<()> {
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => return Ok(()),
            Err(Errno::ECHILD) => return Ok(()),
            Ok(WaitStatus::Exited(pid, code)) => {
                handle_child_exit(pipes, pid, game_server_pid, player_pid, Some(code), None);
            }
            Ok(WaitStatus::Signaled(pid, sig, _core_dumped)) => {
                handle_child_exit(pipes, pid, game_server_pid, player_pid, None, Some(sig));
            }
            Ok(_) => continue,
            Err(err) => return Err(err).context("waitpid failed while reaping children"),
        }
    }
}

fn handle_child_exit(
    pipes: &Pipes,
    pid: Pid,
    game_server_pid: Pid,
    player_pid: Pid,
    exit_code: Option<i32>,
    signal: Option<Signal>,
) {
    if pid == player_pid {
        if let Some(code) = exit_code {
            if code != 0 {
                tracing::warn!(code, "the player's program exited with a non-zero exit code");
            }
        }
        if let Some(sig) = signal {
            tracing::warn!(?sig, "the player's program was killed by a signal");
        }
        finalize_and_exit(pipes);
    } else if pid == game_server_pid {
        tracing::error!(
            ?exit_code,
            ?signal,
            "the game server exited before the judger asked it to; {}",
            minesweeper_proto::THIS_IS_A_BUG
        );
        exit_process(1);
    } else {
        tracing::error!(
            pid = pid.as_raw(),
            game_server_pid = game_server_pid.as_raw(),
            player_pid = player_pid.as_raw(),
            "reaped an unrecognized pid; {}",
            minesweeper_proto::THIS_IS_A_BUG
        );
        exit_process(1);
    }
}

fn handle_sigalrm(pipes: &Pipes, player_pid: Pid) -> ! {
    tracing::info!("time limit reached; killing the player's program");
    let _ = signal::kill(player_pid, Signal::SIGKILL);
    finalize_and_exit(pipes);
}

fn handle_spontaneous_message(pipes: &Pipes) -> Result<()> {
    let mut buf = [0u8; 1024];
    let n = read(pipes.fd_ju_from_gs, &mut buf)
        .context("reading an unsolicited message from the game server")?;
    if n == 0 {
        bail!("game server's pipe closed unexpectedly; {}", minesweeper_proto::THIS_IS_A_BUG);
    }
    let msg = String::from_utf8_lossy(&buf[..n]);
    tracing::warn!(%msg, "game server reported a protocol violation; finalizing now");
    finalize_and_exit(pipes);
}

/// Run the finalize handshake and exit. Never returns: every caller has
/// already decided the game is over, so there is nothing left for the event
/// loop to do once this completes.
fn finalize_and_exit(pipes: &Pipes) -> ! {
    match report::request_summary(pipes.fd_ju_to_gs, pipes.fd_ju_from_gs) {
        Ok(summary) => {
            summary.report();
            exit_process(0);
        }
        Err(err) => {
            tracing::error!(%err, "failed to collect the final summary from the game server");
            eprintln!("judger: fatal: {err:#}");
            exit_process(1);
        }
    }
}
