//! Linux futex-based completion
//!
//! Futex word semantics:
//! - 0 = armed (waiters sleep)
//! - 1 = done

use super::CompletionSignal;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

const ARMED: u32 = 0;
const DONE: u32 = 1;

/// Longest single futex sleep; keeps `tv_sec` far from overflow.
const MAX_SLICE: Duration = Duration::from_secs(3600);

pub struct FutexSignal {
    word: AtomicU32,
}

impl FutexSignal {
    pub fn new() -> Self {
        Self { word: AtomicU32::new(ARMED) }
    }

    fn futex_wait(&self, timeout: Duration) {
        let ts = libc::timespec {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_nsec: timeout.subsec_nanos() as libc::c_long,
        };
        // Returns early on EAGAIN (word already DONE), EINTR or ETIMEDOUT;
        // the caller re-checks the word and the deadline either way.
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.word.as_ptr(),
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                ARMED,
                &ts as *const libc::timespec,
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }

    fn futex_wake_all(&self) {
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.word.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                i32::MAX,
                std::ptr::null::<libc::timespec>(),
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }
}

impl Default for FutexSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionSignal for FutexSignal {
    fn reinit(&self) {
        self.word.store(ARMED, Ordering::Release);
    }

    fn complete(&self) {
        self.word.store(DONE, Ordering::Release);
        self.futex_wake_all();
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        // `None`: the deadline is past what `Instant` can hold, wait in slices.
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if self.word.load(Ordering::Acquire) == DONE {
                return true;
            }
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    (deadline - now).min(MAX_SLICE)
                }
                None => MAX_SLICE,
            };
            self.futex_wait(slice);
        }
    }

    #[inline]
    fn is_done(&self) -> bool {
        self.word.load(Ordering::Acquire) == DONE
    }
}
