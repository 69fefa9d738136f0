//! Signal delivery via the self-pipe pattern: `signal_hook` writes one byte
//! into a `UnixStream` from inside the actual signal handler (the only part
//! of this that must be async-signal-safe), and everything the judger
//! actually needs to do in response — reaping children, killing the player,
//! exiting — happens later in [`crate::event_loop`], well outside handler
//! context.
//!
//! A separate pipe per signal (rather than one shared pipe encoding which
//! signal fired) keeps the main loop's dispatch a plain `poll` over known
//! fds, the same style `game-server`'s own command loop already uses.

use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;

use anyhow::{Context, Result};
use signal_hook::consts::{SIGALRM, SIGCHLD, SIGPIPE};
use signal_hook::low_level::pipe;

pub struct SignalPipes {
    pub sigchld: UnixStream,
    pub sigalrm: UnixStream,
    pub sigpipe: UnixStream,
}

impl SignalPipes {
    /// Register all three self-pipes. Must run before either child is
    /// forked, so a signal delivered the instant after `fork` can never be
    /// missed.
    pub fn register() -> Result<SignalPipes> {
        let sigchld = one_pipe(SIGCHLD, "SIGCHLD")?;
        let sigalrm = one_pipe(SIGALRM, "SIGALRM")?;
        let sigpipe = one_pipe(SIGPIPE, "SIGPIPE")?;
        Ok(SignalPipes { sigchld, sigalrm, sigpipe })
    }
}

fn one_pipe(signal: i32, name: &str) -> Result<UnixStream> {
    let (read_end, write_end) =
        UnixStream::pair().with_context(|| format!("creating the {name} self-pipe"))?;
    read_end
        .set_nonblocking(true)
        .with_context(|| format!("setting the {name} self-pipe to non-blocking"))?;
    pipe::register(signal, write_end).with_context(|| format!("registering the {name} handler"))?;
    Ok(read_end)
}

/// Drain whatever bytes are waiting on a self-pipe. The byte values carry no
/// information — `signal_hook` writes one zero byte per delivery — only that
/// at least one delivery happened matters, so repeated deliveries before the
/// main loop gets back around to `poll` collapse into a single wakeup.
pub fn drain(stream: &UnixStream) {
    use std::io::{ErrorKind, Read};
    let mut reader = stream;
    let mut buf = [0u8; 64];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(_) => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => break,
            Err(_) => break,
        }
    }
}

pub fn raw_fd(stream: &UnixStream) -> RawFd {
    stream.as_raw_fd()
}
