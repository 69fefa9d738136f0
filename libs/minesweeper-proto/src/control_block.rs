//! The fixed-offset per-channel control block shared between the player's
//! program and the game server. Field order here IS the wire format: it must
//! match the table in the specification exactly, offset for offset, since
//! both sides cast the same raw shared-memory bytes to this layout
//! independently (there is no serialization step).

use std::cell::UnsafeCell;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicI32, AtomicU16, AtomicU32, Ordering};

use crate::futex;

/// Hard cap on how many cells a single `click()` response can report.
pub const MAX_OPEN_GRID: usize = 16384;

/// One entry of the `open_arr` response payload: a revealed cell and its
/// adjacent-mine count.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpenCell {
    pub r: u16,
    pub c: u16,
    pub number: u16,
}

/// `open_count` values below zero are status codes rather than counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenCount {
    /// The clicked cell was a mine; exactly that cell's `is_open` bit was set.
    Mine,
    /// `skip_when_reopen` was set and the cell was already open and safe.
    SkippedSafe,
    /// `skip_when_reopen` was set and the cell was already open and a mine.
    SkippedMine,
    /// `n` cells were revealed; `n` entries are valid in `open_arr`.
    Revealed(u32),
}

impl OpenCount {
    fn encode(self) -> i32 {
        match self {
            OpenCount::Mine => -1,
            OpenCount::SkippedSafe => -2,
            OpenCount::SkippedMine => -3,
            OpenCount::Revealed(n) => n as i32,
        }
    }

    fn decode(raw: i32) -> Self {
        match raw {
            -1 => OpenCount::Mine,
            -2 => OpenCount::SkippedSafe,
            -3 => OpenCount::SkippedMine,
            n if n >= 0 => OpenCount::Revealed(n as u32),
            other => panic!("invalid open_count on the wire: {other}"),
        }
    }
}

/// The raw, `repr(C)` layout of one channel's control block. Never
/// constructed by value — always reached through a raw pointer into the
/// shared-memory segment via [`ControlBlock`].
#[repr(C)]
struct Raw {
    pending: AtomicU32,
    sleeping: AtomicU32,
    done: AtomicU32,
    skip_when_reopen: AtomicU32,
    do_not_expand: AtomicU32,
    click_r: AtomicU16,
    click_c: AtomicU16,
    open_count: AtomicI32,
    open_arr: [UnsafeCell<OpenCell>; MAX_OPEN_GRID],
}

// `open_arr` is written only by the server and read only by the player, and
// only ever across the `pending`/`done` happens-before edges established
// below, so concurrent access through the `UnsafeCell`s is never racy despite
// the type not being `Sync` on its own.
unsafe impl Sync for Raw {}

/// A typed, synchronized view over one channel's 256 KiB region of the shared
/// segment.
///
/// Cheap to construct (it's just a pointer); the actual `Raw` block lives in
/// the mmap'd segment for as long as the process holds it mapped.
#[derive(Clone, Copy)]
pub struct ControlBlock {
    raw: NonNull<Raw>,
}

// SAFETY: every field access method below uses atomics with the ordering the
// specification mandates, or is documented as single-writer/single-reader
// under an established happens-before edge.
unsafe impl Send for ControlBlock {}
unsafe impl Sync for ControlBlock {}

impl ControlBlock {
    /// Size in bytes of the `Raw` layout. Always well under
    /// [`crate::CHANNEL_SHM_SIZE`]; the remainder of the 256 KiB region is
    /// unused padding reserved for future growth, matching the original
    /// fixed-size layout.
    pub const WIRE_SIZE: usize = std::mem::size_of::<Raw>();

    /// Build a view over the control block living at `base`, which must point
    /// to the start of a `CHANNEL_SHM_SIZE`-byte region inside the shared
    /// segment that is alive for as long as this `ControlBlock` is used.
    ///
    /// # Safety
    /// `base` must be validly aligned for `Raw` (mmap'd pages always are) and
    /// must remain mapped and exclusively owned by this logical channel for
    /// the lifetime of all `ControlBlock`s built from it.
    pub unsafe fn at(base: NonNull<u8>) -> Self {
        ControlBlock {
            raw: base.cast::<Raw>(),
        }
    }

    fn raw(&self) -> &Raw {
        // SAFETY: see `at`'s contract.
        unsafe { self.raw.as_ref() }
    }

    /// Zero every control word. Called by the server exactly once, when a
    /// channel is first created, before the channel id is handed back to the
    /// player.
    pub fn reset(&self) {
        let raw = self.raw();
        raw.pending.store(0, Ordering::Relaxed);
        raw.sleeping.store(0, Ordering::Relaxed);
        raw.done.store(0, Ordering::Relaxed);
        raw.skip_when_reopen.store(0, Ordering::Relaxed);
        raw.do_not_expand.store(0, Ordering::Relaxed);
    }

    // ---- player side -----------------------------------------------------

    /// Arm a request: write the request fields, then `pending`, matching the
    /// "payload before pending" publication order, and wake the server if it
    /// had already gone to sleep.
    pub fn arm_request(&self, r: u16, c: u16, skip_when_reopen: bool, do_not_expand: bool) {
        let raw = self.raw();
        raw.click_r.store(r, Ordering::Relaxed);
        raw.click_c.store(c, Ordering::Relaxed);
        raw.skip_when_reopen
            .store(skip_when_reopen as u32, Ordering::Relaxed);
        raw.do_not_expand
            .store(do_not_expand as u32, Ordering::Relaxed);
        raw.pending.store(1, Ordering::Release);
        if raw.sleeping.load(Ordering::Acquire) == 1 {
            let _ = futex::futex_wake(&raw.pending);
        }
    }

    /// Spin until the server signals completion, waking it again on every
    /// iteration where it looks asleep (handles the race where it set
    /// `sleeping` just after our first wake above).
    pub fn spin_until_done(&self) {
        let raw = self.raw();
        while raw.done.load(Ordering::Acquire) == 0 {
            if raw.sleeping.load(Ordering::Relaxed) == 1 {
                let _ = futex::futex_wake(&raw.pending);
            }
            std::hint::spin_loop();
        }
    }

    /// Read back the completed request's status/count. Valid only after
    /// [`ControlBlock::spin_until_done`] has observed `done == 1`.
    pub fn read_open_count(&self) -> OpenCount {
        OpenCount::decode(self.raw().open_count.load(Ordering::Relaxed))
    }

    /// Read back one emitted `(r, c, number)` triple. `i` must be `<` the
    /// revealed count from [`ControlBlock::read_open_count`].
    pub fn read_open_cell(&self, i: usize) -> OpenCell {
        // SAFETY: protected by the done-acquire happens-before edge observed
        // in `spin_until_done`; the server will not touch `open_arr` again
        // until the player clears `done`.
        unsafe { *self.raw().open_arr[i].get() }
    }

    /// Clear `done`, releasing the control block back to the server. Must be
    /// called after reading out the result and before the next `click`.
    pub fn clear_done(&self) {
        self.raw().done.store(0, Ordering::Relaxed);
    }

    // ---- server side -------------------------------------------------------

    /// Spin up to `spin_limit` iterations waiting for `pending`. Returns
    /// `true` if a request was observed without needing to sleep.
    pub fn spin_for_pending(&self, spin_limit: u32) -> bool {
        let raw = self.raw();
        for _ in 0..spin_limit {
            if raw.pending.load(Ordering::Acquire) == 1 {
                return true;
            }
        }
        false
    }

    /// Mark this channel as asleep, then block in `futex_wait` until
    /// `pending` is observed set, handling spurious wakeups by re-checking in
    /// a loop.
    pub fn sleep_until_pending(&self) {
        let raw = self.raw();
        raw.sleeping.store(1, Ordering::Relaxed);
        loop {
            if raw.pending.load(Ordering::Acquire) == 1 {
                break;
            }
            let _ = futex::futex_wait(&raw.pending, 0);
        }
    }

    /// Clear `pending`, then `sleeping`, in that order — the order is load
    /// bearing: a client re-checking `sleeping` must never see it still 1
    /// once `pending` (which it already observed cleared) has told it the
    /// server accepted the request.
    pub fn accept_request(&self) {
        let raw = self.raw();
        raw.pending.store(0, Ordering::Relaxed);
        raw.sleeping.store(0, Ordering::Relaxed);
    }

    pub fn click_coords(&self) -> (u16, u16) {
        let raw = self.raw();
        (
            raw.click_r.load(Ordering::Relaxed),
            raw.click_c.load(Ordering::Relaxed),
        )
    }

    pub fn skip_when_reopen(&self) -> bool {
        self.raw().skip_when_reopen.load(Ordering::Relaxed) != 0
    }

    pub fn do_not_expand(&self) -> bool {
        self.raw().do_not_expand.load(Ordering::Relaxed) != 0
    }

    /// Write one emitted cell into the response payload. `i` must be `<
    /// MAX_OPEN_GRID`.
    pub fn write_open_cell(&self, i: usize, cell: OpenCell) {
        // SAFETY: only the server writes `open_arr`, and only before
        // publishing `open_count`/`done`; no concurrent access is possible.
        unsafe {
            *self.raw().open_arr[i].get() = cell;
        }
    }

    /// Publish the result: `open_count` first, then `done` with release
    /// ordering so the payload and count become visible together.
    pub fn finish_request(&self, result: OpenCount) {
        let raw = self.raw();
        raw.open_count.store(result.encode(), Ordering::Relaxed);
        raw.done.store(1, Ordering::Release);
    }
}
