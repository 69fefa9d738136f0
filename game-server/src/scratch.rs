//! A fixed-size pool of BFS scratch slots. Each slot holds one worker's
//! visited bitmap and flood-fill queue for the duration of a single expand
//! call; test-and-set claiming keeps this lower-latency than a blocking
//! semaphore for the small, fixed `NUM_ACTIVE` this harness needs.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, Ordering};

/// Number of BFS scratch slots, and so the maximum number of simultaneously
/// running flood fills.
pub const NUM_ACTIVE: usize = 8;

/// Hard cap on both the flood-fill queue depth and the emitted-cell count,
/// matching the control block's `open_arr` capacity.
pub const MAX_QUEUE: usize = minesweeper_proto::MAX_OPEN_GRID;

struct SlotInner {
    /// Packed visited bitmap, `n*n` bits. Exclusive to whichever worker holds
    /// the slot's claim.
    visited: Vec<u8>,
    queue: Vec<(u16, u16)>,
    head: usize,
}

struct Slot {
    claimed: AtomicBool,
    inner: UnsafeCell<SlotInner>,
}

// Exclusive access to `inner` is established by winning the `claimed`
// compare-exchange in `ScratchPool::claim` and released by dropping the
// resulting `ScratchGuard`; no two threads ever hold the same slot at once.
unsafe impl Sync for Slot {}

/// The process-global pool of scratch slots, sized for one board.
pub struct ScratchPool {
    visited_bytes: usize,
    slots: Vec<Slot>,
}

impl ScratchPool {
    pub fn new(n: u32) -> Self {
        let visited_bytes = minesweeper_map::bitboard::byte_len((n as usize) * (n as usize));
        let slots = (0..NUM_ACTIVE)
            .map(|_| Slot {
                claimed: AtomicBool::new(false),
                inner: UnsafeCell::new(SlotInner {
                    visited: vec![0u8; visited_bytes],
                    queue: Vec::with_capacity(MAX_QUEUE),
                    head: 0,
                }),
            })
            .collect();
        ScratchPool { visited_bytes, slots }
    }

    /// Busy-scan the slot array until one is claimed. There are never more
    /// than `NUM_ACTIVE` concurrent BFSes in flight, so a slot is always
    /// eventually available.
    pub fn claim(&self) -> ScratchGuard<'_> {
        loop {
            for (index, slot) in self.slots.iter().enumerate() {
                if slot
                    .claimed
                    .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
                {
                    return ScratchGuard { pool: self, index };
                }
            }
            std::hint::spin_loop();
        }
    }
}

/// An exclusively-held scratch slot, released when dropped.
pub struct ScratchGuard<'a> {
    pool: &'a ScratchPool,
    index: usize,
}

impl ScratchGuard<'_> {
    fn inner(&self) -> &mut SlotInner {
        // SAFETY: holding this guard is exclusive ownership of the slot.
        unsafe { &mut *self.pool.slots[self.index].inner.get() }
    }

    pub fn visited(&self, bit_index: usize) -> bool {
        debug_assert!(bit_index / 8 < self.pool.visited_bytes);
        let inner = self.inner();
        inner.visited[bit_index / 8] & (1 << (bit_index % 8)) != 0
    }

    pub fn mark_visited(&self, bit_index: usize) {
        debug_assert!(bit_index / 8 < self.pool.visited_bytes);
        let inner = self.inner();
        inner.visited[bit_index / 8] |= 1 << (bit_index % 8);
    }

    /// Clear exactly one visited bit. Called once per emitted cell when the
    /// BFS finishes, so cleanup cost is proportional to the component size,
    /// not to the board size.
    pub fn clear_visited(&self, bit_index: usize) {
        debug_assert!(bit_index / 8 < self.pool.visited_bytes);
        let inner = self.inner();
        inner.visited[bit_index / 8] &= !(1 << (bit_index % 8));
    }

    /// Enqueue `(r, c)`. Returns `false` if the queue is already at
    /// [`MAX_QUEUE`] — the caller must treat this as the component-too-large
    /// protocol error, not silently drop the cell.
    #[must_use]
    pub fn push(&self, cell: (u16, u16)) -> bool {
        let inner = self.inner();
        if inner.queue.len() - inner.head >= MAX_QUEUE {
            return false;
        }
        inner.queue.push(cell);
        true
    }

    pub fn pop(&self) -> Option<(u16, u16)> {
        let inner = self.inner();
        if inner.head >= inner.queue.len() {
            return None;
        }
        let cell = inner.queue[inner.head];
        inner.head += 1;
        Some(cell)
    }
}

impl Drop for ScratchGuard<'_> {
    fn drop(&mut self) {
        let inner = self.inner();
        inner.queue.clear();
        inner.head = 0;
        self.pool.slots[self.index].claimed.store(false, Ordering::Release);
    }
}
