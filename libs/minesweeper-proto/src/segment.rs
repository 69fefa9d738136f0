//! Lifecycle of the single POSIX shared-memory segment that backs every
//! channel's control block: creation (judger), opening by an already-agreed
//! name (game server and player program), and unmapping.

use std::io::{self, ErrorKind};
use std::num::NonZeroUsize;
use std::os::unix::io::{AsRawFd, FromRawFd};
use std::ptr::NonNull;

use nix::fcntl::OFlag;
use nix::sys::mman::{self, MapFlags, ProtFlags};
use nix::sys::stat::Mode;
use rand::Rng;

use crate::error::ShmError;
use crate::TOTAL_SHM_SIZE;

/// A live mapping of the whole shared-memory segment. `munmap`s on drop.
pub struct Segment {
    ptr: NonNull<u8>,
    len: NonZeroUsize,
}

// The segment is a flat byte buffer; synchronization of anything inside it is
// the job of the types built on top (see `control_block`), not of `Segment`
// itself.
unsafe impl Send for Segment {}
unsafe impl Sync for Segment {}

impl Segment {
    /// Base pointer of the mapping.
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Size of the mapping in bytes. Always [`crate::TOTAL_SHM_SIZE`].
    pub fn len(&self) -> usize {
        self.len.get()
    }

    /// Pointer to the start of channel `index`'s control block region.
    ///
    /// # Panics
    /// Panics if `index >= MAX_CHANNEL`.
    pub fn channel_base(&self, index: usize) -> NonNull<u8> {
        assert!(index < crate::MAX_CHANNEL, "channel index out of range");
        let offset = index * crate::CHANNEL_SHM_SIZE;
        // SAFETY: offset is within the mapped region by the assertion above.
        unsafe { NonNull::new_unchecked(self.ptr.as_ptr().add(offset)) }
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        // SAFETY: `ptr`/`len` describe exactly the mapping `mmap` returned.
        let _ = unsafe { mman::munmap(self.ptr.as_ptr().cast(), self.len.get()) };
    }
}

/// Generate a `/dev/shm`-style name unique enough that two judger runs on the
/// same host never collide, without needing a central allocator.
///
/// Mirrors the intent of the original's random-name generator, but draws from
/// `rand` rather than hand-rolling an RNG.
pub fn random_shm_name() -> String {
    let suffix: u64 = rand::thread_rng().gen();
    format!("/minesweeper-{:016x}-{}", suffix, std::process::id())
}

/// Create and size the backing segment. Called by the judger only, before any
/// child process is spawned; the returned name is then handed to the
/// children via an environment variable.
pub fn create(name: &str) -> Result<Segment, ShmError> {
    let flags = OFlag::O_CREAT | OFlag::O_RDWR | OFlag::O_TRUNC | OFlag::O_EXCL;
    let mode = Mode::S_IRUSR | Mode::S_IWUSR;

    let fd = mman::shm_open(name, flags, mode).map_err(|e| ShmError::ShmOpen(e.into()))?;
    let file = unsafe { std::fs::File::from_raw_fd(fd) };

    file.set_len(TOTAL_SHM_SIZE as u64)
        .map_err(ShmError::Ftruncate)?;

    map(&file)
}

/// Open a segment a judger already created, by name. Called by the game
/// server and by the player's channel-creation helper.
pub fn open_existing(name: &str) -> Result<Segment, ShmError> {
    let flags = OFlag::O_RDWR;
    let mode = Mode::S_IRUSR | Mode::S_IWUSR;

    let fd = mman::shm_open(name, flags, mode).map_err(|e| ShmError::ShmOpen(e.into()))?;
    let file = unsafe { std::fs::File::from_raw_fd(fd) };

    map(&file)
}

/// Remove the segment's name from `/dev/shm`. Called by the judger once after
/// every child has exited; existing mappings remain valid until unmapped.
pub fn unlink(name: &str) -> Result<(), ShmError> {
    mman::shm_unlink(name).map_err(|e| ShmError::ShmOpen(e.into()))
}

fn map(file: &std::fs::File) -> Result<Segment, ShmError> {
    let len = NonZeroUsize::new(TOTAL_SHM_SIZE).expect("TOTAL_SHM_SIZE is nonzero");

    let ptr = unsafe {
        mman::mmap(
            None,
            len,
            ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
            MapFlags::MAP_SHARED,
            file.as_raw_fd(),
            0,
        )
    }
    .map_err(|e| ShmError::Mmap(e.into()))?;

    let ptr = NonNull::new(ptr.cast())
        .ok_or_else(|| ShmError::Mmap(io::Error::new(ErrorKind::Other, "mmap returned null")))?;

    Ok(Segment { ptr, len })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_open_and_unlink_round_trip() {
        let name = random_shm_name();

        let created = create(&name).expect("create");
        assert_eq!(created.len(), TOTAL_SHM_SIZE);

        let opened = open_existing(&name).expect("open_existing");
        assert_eq!(opened.len(), TOTAL_SHM_SIZE);

        // Writes through one mapping are visible through the other, since
        // both back the same kernel object.
        unsafe {
            created.channel_base(0).as_ptr().write(0xAB);
        }
        let seen = unsafe { opened.channel_base(0).as_ptr().read() };
        assert_eq!(seen, 0xAB);

        drop(created);
        drop(opened);
        unlink(&name).expect("unlink");
    }

    #[test]
    fn channel_base_offsets_are_spaced_by_channel_size() {
        let name = random_shm_name();
        let seg = create(&name).expect("create");
        let base0 = seg.channel_base(0).as_ptr() as usize;
        let base1 = seg.channel_base(1).as_ptr() as usize;
        assert_eq!(base1 - base0, crate::CHANNEL_SHM_SIZE);
        drop(seg);
        unlink(&name).expect("unlink");
    }

    #[test]
    #[should_panic(expected = "channel index out of range")]
    fn channel_base_panics_out_of_range() {
        let name = random_shm_name();
        let seg = create(&name).expect("create");
        let _ = seg.channel_base(crate::MAX_CHANNEL);
    }
}
