//! Completion tokens
//!
//! One token per probed channel. The engine re-arms it before issuing,
//! the descriptor callback signals it, and the caller waits on it with a
//! bounded timeout. Platform-specific implementations use the cheapest
//! primitive available.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use xdma_core::CompletionId;

/// One-shot notification cell.
///
/// A signal delivered before the wait begins is not lost: the cell
/// stays done until re-armed.
pub trait CompletionSignal: Send + Sync {
    /// Back to the armed (not done) state.
    fn reinit(&self);

    /// Mark done and wake every waiter.
    fn complete(&self);

    /// Block until done or `timeout` elapses. Returns `true` if done.
    ///
    /// Spurious wakeups are absorbed; `false` is only returned once the
    /// full timeout has passed.
    fn wait_timeout(&self, timeout: Duration) -> bool;

    fn is_done(&self) -> bool;
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod futex_linux;
        pub use futex_linux::FutexSignal as PlatformSignal;
    } else {
        mod fallback;
        pub use fallback::CondvarSignal as PlatformSignal;
    }
}

pub struct CompletionToken {
    id: CompletionId,
    signal: PlatformSignal,
    signaled: AtomicU64,
}

impl CompletionToken {
    pub fn new(id: CompletionId) -> Self {
        Self {
            id,
            signal: PlatformSignal::new(),
            signaled: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn id(&self) -> CompletionId {
        self.id
    }

    #[inline]
    pub fn reinit(&self) {
        self.signal.reinit();
    }

    /// Called from the hardware completion context.
    #[inline]
    pub fn complete(&self) {
        self.signaled.fetch_add(1, Ordering::Relaxed);
        self.signal.complete();
    }

    #[inline]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.signal.wait_timeout(timeout)
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.signal.is_done()
    }

    /// Total signals received (for diagnostics).
    pub fn signal_count(&self) -> u64 {
        self.signaled.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for CompletionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionToken")
            .field("id", &self.id)
            .field("done", &self.is_done())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;
    use xdma_core::{ChannelId, DeviceId};

    fn token() -> CompletionToken {
        CompletionToken::new(ChannelId::rx(DeviceId(0)).completion())
    }

    #[test]
    fn test_wait_times_out_no_earlier_than_requested() {
        let t = token();
        let start = Instant::now();
        assert!(!t.wait_timeout(Duration::from_millis(50)));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_signal_before_wait_is_kept() {
        let t = token();
        t.complete();
        assert!(t.is_done());
        assert!(t.wait_timeout(Duration::ZERO));
        assert!(t.wait_timeout(Duration::from_millis(10)));

        t.reinit();
        assert!(!t.is_done());
        assert_eq!(t.signal_count(), 1);
    }

    #[test]
    fn test_unbounded_timeout() {
        let t = token();
        t.complete();
        assert!(t.wait_timeout(Duration::MAX));

        let t = Arc::new(token());
        let t2 = Arc::clone(&t);
        let waiter = thread::spawn(move || t2.wait_timeout(Duration::MAX));
        thread::sleep(Duration::from_millis(20));
        t.complete();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_cross_thread_wake() {
        let t = Arc::new(token());
        let t2 = Arc::clone(&t);

        let waiter = thread::spawn(move || {
            let start = Instant::now();
            let done = t2.wait_timeout(Duration::from_secs(10));
            (done, start.elapsed())
        });

        thread::sleep(Duration::from_millis(20));
        t.complete();

        let (done, elapsed) = waiter.join().unwrap();
        assert!(done);
        assert!(elapsed < Duration::from_secs(5));
    }
}
