//! Client stub linked into the player's own program. Mirrors the shape of
//! the harness's other process-facing modules: a small amount of
//! environment/handshake plumbing up front, then a thin, thread-compatible
//! request/response API over the shared-memory control blocks.

use std::os::fd::RawFd;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use nix::unistd::{read, write};

use minesweeper_proto::{
    commands, env, env_vars, segment, ControlBlock, OpenCell, MAX_OPEN_GRID,
};

/// Errors from the player-facing SDK. Distinct from
/// [`minesweeper_proto::ShmError`] because these also cover protocol-level
/// problems (bad handshake line, out-of-range click) that only make sense
/// from the player's side of the wire.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error(transparent)]
    Shm(#[from] minesweeper_proto::ShmError),

    #[error("pipe I/O with the game server failed: {0}")]
    Io(#[source] std::io::Error),

    #[error("game server sent an unparsable handshake line: {0:?}")]
    BadHandshake(String),

    #[error("game server allocated channel id {0}, which is out of range")]
    ChannelIdOutOfRange(u32),

    #[error("click({r}, {c}) is out of range for a board of side length {n}")]
    OutOfRange { r: u32, c: u32, n: u32 },
}

/// The outcome of one [`Channel::click`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The clicked cell was a mine.
    Mine,
    /// `skip_when_reopen` was set and the cell was already open and safe.
    SkippedSafe,
    /// `skip_when_reopen` was set and the cell was already open and a mine.
    SkippedMine,
    /// The cells revealed by this click, each `(r, c, adjacent_mine_count)`.
    Revealed(Vec<(u16, u16, u16)>),
}

/// A handle to the running game: board dimensions and the two pipe fds
/// needed to open new channels. Obtained once via [`init`].
pub struct Game {
    n: u32,
    k: u64,
    segment: segment::Segment,
    fd_to_gs: RawFd,
    fd_from_gs: RawFd,
    create_mutex: Mutex<()>,
}

impl Game {
    pub fn side_len(&self) -> u32 {
        self.n
    }

    pub fn mine_count(&self) -> u64 {
        self.k
    }

    /// Request a new channel from the server. Serialized by an internal
    /// mutex so that the reply on `fd_from_gs` is unambiguously this call's,
    /// even if multiple threads call `create_channel` concurrently.
    pub fn create_channel(&self) -> Result<Channel<'_>, PlayerError> {
        let _guard = self.create_mutex.lock().expect("create_channel mutex poisoned");

        write(self.fd_to_gs, &[commands::CREATE_CHANNEL]).map_err(|e| PlayerError::Io(e.into()))?;

        // The server's reply is a bare ASCII decimal channel id with no
        // padding or delimiter (`channel_id.to_string().as_bytes()` on the
        // other end) — one `read` and a parse, not a fixed-size `read_exact`,
        // which would block forever waiting for bytes that are never coming.
        let mut buf = [0u8; 16];
        let n = read(self.fd_from_gs, &mut buf).map_err(|e| PlayerError::Io(e.into()))?;
        if n == 0 {
            return Err(PlayerError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "game server closed the pipe mid-handshake",
            )));
        }

        let text = std::str::from_utf8(&buf[..n])
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok())
            .ok_or_else(|| PlayerError::BadHandshake(String::from_utf8_lossy(&buf[..n]).into_owned()))?;

        if text as usize >= minesweeper_proto::MAX_CHANNEL {
            return Err(PlayerError::ChannelIdOutOfRange(text));
        }

        let base = self.segment.channel_base(text as usize);
        let control = unsafe { ControlBlock::at(base) };

        Ok(Channel {
            game: self,
            control,
        })
    }
}

/// One open channel to the server: a dedicated control block plus the
/// board-range validation `click` needs.
pub struct Channel<'g> {
    game: &'g Game,
    control: ControlBlock,
}

impl Channel<'_> {
    /// Reveal `(r, c)`. If `skip_when_reopen` is set and the cell is already
    /// open, the server reports that instead of repeating the reveal. If
    /// `do_not_expand` is set, a zero-valued safe cell still opens but its
    /// neighbours are not flood-filled.
    pub fn click(
        &self,
        r: u32,
        c: u32,
        skip_when_reopen: bool,
        do_not_expand: bool,
    ) -> Result<ClickOutcome, PlayerError> {
        let n = self.game.side_len();
        if r >= n || c >= n {
            return Err(PlayerError::OutOfRange { r, c, n });
        }

        self.control
            .arm_request(r as u16, c as u16, skip_when_reopen, do_not_expand);
        self.control.spin_until_done();

        let outcome = match self.control.read_open_count() {
            minesweeper_proto::OpenCount::Mine => ClickOutcome::Mine,
            minesweeper_proto::OpenCount::SkippedSafe => ClickOutcome::SkippedSafe,
            minesweeper_proto::OpenCount::SkippedMine => ClickOutcome::SkippedMine,
            minesweeper_proto::OpenCount::Revealed(count) => {
                let count = count as usize;
                debug_assert!(count <= MAX_OPEN_GRID);
                let mut cells = Vec::with_capacity(count);
                for i in 0..count {
                    let OpenCell { r, c, number } = self.control.read_open_cell(i);
                    cells.push((r, c, number));
                }
                ClickOutcome::Revealed(cells)
            }
        };

        self.control.clear_done();
        Ok(outcome)
    }
}

/// Counter used only to sanity-check that `init` is called at most once per
/// process; the real per-channel ids come from the server.
static INIT_GUARD: AtomicU32 = AtomicU32::new(0);

/// Perform the player-side startup handshake: verify we were launched by the
/// judger, request parent-death delivery, open the shared-memory segment,
/// and read the server's initial `"N K"` line.
///
/// Must be called exactly once, before any other function in this crate.
pub fn init() -> Result<Game, PlayerError> {
    if INIT_GUARD.swap(1, Ordering::SeqCst) != 0 {
        panic!("minesweeper_player::init() called more than once in this process");
    }

    env::required_env(env_vars::LAUNCHED_BY_JUDGER)?;
    minesweeper_proto::process::die_with_parent().map_err(PlayerError::Io)?;

    let shm_name = env::required_env(env_vars::SHM_NAME)?;
    let segment = segment::open_existing(&shm_name)?;

    let fd_to_gs = env::required_env_fd(env_vars::FD_PL_TO_GS)?;
    let fd_from_gs = env::required_env_fd(env_vars::FD_PL_FROM_GS)?;

    let mut buf = [0u8; 64];
    let n_read = read(fd_from_gs, &mut buf).map_err(|e| PlayerError::Io(e.into()))?;

    let line = String::from_utf8_lossy(&buf[..n_read]);
    let mut parts = line.split_whitespace();
    let n: u32 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| PlayerError::BadHandshake(line.clone().into_owned()))?;
    let k: u64 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| PlayerError::BadHandshake(line.clone().into_owned()))?;

    Ok(Game {
        n,
        k,
        segment,
        fd_to_gs,
        fd_from_gs,
        create_mutex: Mutex::new(()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr::NonNull;

    // `Game`/`Channel` talk to a real process over pipes and shm, so the
    // meaningful unit-level coverage here is the pure click-outcome decoding,
    // exercised directly against a `ControlBlock` the way `game-server`'s own
    // tests do, without going through `init()`/pipes at all.
    #[test]
    fn click_decodes_a_revealed_region() {
        let mut storage = vec![0u8; ControlBlock::WIRE_SIZE].into_boxed_slice();
        let base = NonNull::new(storage.as_mut_ptr()).unwrap();
        let control = unsafe { ControlBlock::at(base) };
        control.reset();

        control.arm_request(1, 1, false, false);
        assert!(control.spin_for_pending(10_000));
        control.accept_request();
        control.write_open_cell(0, OpenCell { r: 1, c: 1, number: 0 });
        control.write_open_cell(1, OpenCell { r: 1, c: 2, number: 1 });
        control.finish_request(minesweeper_proto::OpenCount::Revealed(2));
        control.spin_until_done();

        let game = Game {
            n: 10,
            k: 0,
            segment: {
                // unused by `click`'s out-of-range check in this test; built
                // only to satisfy `Channel`'s borrow of `Game`.
                let name = segment::random_shm_name();
                let seg = segment::create(&name).unwrap();
                segment::unlink(&name).unwrap();
                seg
            },
            fd_to_gs: -1,
            fd_from_gs: -1,
            create_mutex: Mutex::new(()),
        };
        let channel = Channel { game: &game, control };

        // exercise the decode path directly, bypassing `click`'s own
        // request/spin (already armed above).
        let outcome = match channel.control.read_open_count() {
            minesweeper_proto::OpenCount::Revealed(count) => {
                let mut cells = Vec::new();
                for i in 0..count as usize {
                    let OpenCell { r, c, number } = channel.control.read_open_cell(i);
                    cells.push((r, c, number));
                }
                ClickOutcome::Revealed(cells)
            }
            _ => panic!("expected a revealed outcome"),
        };
        channel.control.clear_done();

        assert_eq!(
            outcome,
            ClickOutcome::Revealed(vec![(1, 1, 0), (1, 2, 1)])
        );
    }

    #[test]
    fn click_rejects_out_of_range_coordinates() {
        let mut storage = vec![0u8; ControlBlock::WIRE_SIZE].into_boxed_slice();
        let base = NonNull::new(storage.as_mut_ptr()).unwrap();
        let control = unsafe { ControlBlock::at(base) };
        control.reset();

        let name = segment::random_shm_name();
        let seg = segment::create(&name).unwrap();
        segment::unlink(&name).unwrap();
        let game = Game {
            n: 4,
            k: 0,
            segment: seg,
            fd_to_gs: -1,
            fd_from_gs: -1,
            create_mutex: Mutex::new(()),
        };
        let channel = Channel { game: &game, control };

        let err = channel.click(4, 0, false, false).unwrap_err();
        assert!(matches!(err, PlayerError::OutOfRange { r: 4, c: 0, n: 4 }));
    }
}
