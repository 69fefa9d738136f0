//! Thin wrapper around the Linux `futex(2)` syscall.
//!
//! Neither `nix` nor `libc` expose a high-level futex API (unlike e.g. their
//! `mman`/`signal` modules), so the two operations the two-phase wakeup needs
//! are issued as raw `libc::syscall(libc::SYS_futex, ...)` calls, with the
//! same "surface OS errors as `std::io::Error`" convention the rest of this
//! crate uses for `shm_open`/`mmap`.

use std::sync::atomic::AtomicU32;

use crate::error::ShmError;

const FUTEX_WAIT: i32 = 0;
const FUTEX_WAKE: i32 = 1;

/// Block the calling thread until a matching `futex_wake` is issued on `word`,
/// unless `word`'s value has already changed away from `expected` by the time
/// the kernel checks it (in which case this returns immediately with `Ok(())`).
///
/// Spurious wakeups are possible per the `futex(2)` contract; callers must
/// always re-check their condition in a loop rather than trusting that a
/// return from this function means the condition holds.
pub fn futex_wait(word: &AtomicU32, expected: u32) -> Result<(), ShmError> {
    let rc = unsafe {
        libc::syscall(
            libc::SYS_futex,
            word.as_ptr(),
            FUTEX_WAIT,
            expected,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0i32,
        )
    };
    if rc == -1 {
        let err = std::io::Error::last_os_error();
        // EAGAIN: the value had already changed. EINTR: a signal arrived.
        // Both are a "try again" for the caller's spin loop, not a real error.
        match err.raw_os_error() {
            Some(libc::EAGAIN) | Some(libc::EINTR) => return Ok(()),
            _ => return Err(ShmError::Futex(err)),
        }
    }
    Ok(())
}

/// Wake exactly one thread parked in `futex_wait` on `word`.
pub fn futex_wake(word: &AtomicU32) -> Result<(), ShmError> {
    let rc = unsafe {
        libc::syscall(
            libc::SYS_futex,
            word.as_ptr(),
            FUTEX_WAKE,
            1i32,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0i32,
        )
    };
    if rc == -1 {
        return Err(ShmError::Futex(std::io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn wake_unparks_a_waiting_thread() {
        let word = Arc::new(AtomicU32::new(0));
        let waiter = {
            let word = Arc::clone(&word);
            std::thread::spawn(move || {
                // Word is still 0, so this parks until woken (or returns
                // immediately with EAGAIN if it already changed).
                futex_wait(&word, 0).unwrap();
            })
        };

        std::thread::sleep(Duration::from_millis(20));
        word.store(1, Ordering::Relaxed);
        futex_wake(&word).unwrap();

        waiter.join().unwrap();
    }

    #[test]
    fn wait_returns_immediately_if_value_already_changed() {
        let word = AtomicU32::new(5);
        // expected (0) != current (5), so the kernel returns EAGAIN, which we
        // translate into an immediate Ok(()).
        futex_wait(&word, 0).unwrap();
    }
}
