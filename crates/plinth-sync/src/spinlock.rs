use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_utils::Backoff;

/// Spin lock over a single atomic flag.
///
/// Acquisition backs off adaptively (spin, then yield); the capped variant
/// bounds the number of attempts, which is the one bounded wait in the
/// workspace.
pub struct SpinLock {
    locked: AtomicBool,
}

/// Releases the lock on drop.
#[must_use = "the lock is released when the guard drops"]
pub struct SpinGuard<'l> {
    lock: &'l SpinLock,
}

impl SpinLock {
    pub const fn new() -> SpinLock {
        SpinLock {
            locked: AtomicBool::new(false),
        }
    }

    /// Spin until the lock is acquired.
    pub fn lock(&self) -> SpinGuard<'_> {
        self.lock_timeout(-1).expect("unbounded lock cannot time out")
    }

    /// Take the lock if it is free right now.
    pub fn try_lock(&self) -> Option<SpinGuard<'_>> {
        if self.acquire() {
            Some(SpinGuard { lock: self })
        } else {
            None
        }
    }

    /// Spin up to `max_iterations` attempts; negative means spin forever.
    pub fn lock_timeout(&self, max_iterations: i64) -> Option<SpinGuard<'_>> {
        let backoff = Backoff::new();
        let mut remaining = max_iterations;
        loop {
            if self.acquire() {
                return Some(SpinGuard { lock: self });
            }
            if max_iterations >= 0 {
                remaining -= 1;
                if remaining <= 0 {
                    return None;
                }
            }
            backoff.snooze();
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    fn acquire(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }
}

impl Default for SpinLock {
    fn default() -> Self {
        SpinLock::new()
    }
}

impl Drop for SpinGuard<'_> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn guard_releases_on_drop() {
        let lock = SpinLock::new();
        {
            let _guard = lock.lock();
            assert!(lock.is_locked());
            assert!(lock.try_lock().is_none());
        }
        assert!(!lock.is_locked());
        assert!(lock.try_lock().is_some());
    }

    #[test]
    fn capped_acquire_gives_up() {
        let lock = SpinLock::new();
        let _held = lock.lock();
        assert!(lock.lock_timeout(16).is_none());
    }

    #[test]
    fn contended_lock_serialises_critical_sections() {
        const THREADS: usize = 4;
        const ROUNDS: usize = 500;

        let lock = Arc::new(SpinLock::new());
        let in_section = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        std::thread::scope(|scope| {
            for _ in 0..THREADS {
                let lock = Arc::clone(&lock);
                let in_section = Arc::clone(&in_section);
                scope.spawn(move || {
                    for _ in 0..ROUNDS {
                        let _guard = lock.lock();
                        // Exactly one thread may be inside at a time.
                        assert_eq!(in_section.fetch_add(1, Ordering::SeqCst), 0);
                        in_section.fetch_sub(1, Ordering::SeqCst);
                    }
                });
            }
        });
    }
}
