//! Fallback completion using std::sync::Condvar
//!
//! Used on platforms without futex support.

use super::CompletionSignal;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

pub struct CondvarSignal {
    done: Mutex<bool>,
    condvar: Condvar,
}

impl CondvarSignal {
    pub fn new() -> Self {
        Self {
            done: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.done.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for CondvarSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionSignal for CondvarSignal {
    fn reinit(&self) {
        *self.lock() = false;
    }

    fn complete(&self) {
        *self.lock() = true;
        self.condvar.notify_all();
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.lock();
        let (guard, _) = self
            .condvar
            .wait_timeout_while(guard, timeout, |done| !*done)
            .unwrap_or_else(|e| e.into_inner());
        *guard
    }

    fn is_done(&self) -> bool {
        *self.lock()
    }
}
