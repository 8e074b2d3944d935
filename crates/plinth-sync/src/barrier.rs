use std::sync::{Condvar, Mutex};

#[derive(Default)]
struct BarrierState {
    target: i32,
    current: i32,
    waiting: i32,
}

/// Resettable rendezvous point.
///
/// Arm the barrier with [`Barrier::set_target`], then have workers call
/// [`Barrier::reach`] (count an arrival and continue) or
/// [`Barrier::reach_and_wait`] (count an arrival and block until the target
/// is met). Once the last waiter leaves, the barrier disarms and can be
/// re-armed for another cycle.
pub struct Barrier {
    state: Mutex<BarrierState>,
    release: Condvar,
}

impl Barrier {
    pub fn new() -> Barrier {
        Barrier {
            state: Mutex::new(BarrierState::default()),
            release: Condvar::new(),
        }
    }

    /// Arm the barrier for `count` arrivals.
    ///
    /// # Panics
    ///
    /// Panics if the previous cycle has not finished.
    pub fn set_target(&self, count: i32) {
        assert!(count > 0, "barrier target must be positive");
        let mut state = self.state.lock().expect("barrier mutex poisoned");
        assert_eq!(state.target, 0, "barrier is already armed");
        state.target = count;
        state.current = 0;
        state.waiting = 0;
    }

    /// Record one arrival; returns the arrival index (1-based).
    ///
    /// The final arrival releases every thread blocked in
    /// [`Barrier::reach_and_wait`].
    pub fn reach(&self) -> i32 {
        let mut state = self.state.lock().expect("barrier mutex poisoned");
        assert!(state.current < state.target, "barrier arrivals exceed the target");
        state.current += 1;
        let arrival = state.current;
        if state.current == state.target {
            if state.waiting == 0 {
                state.target = 0;
                state.current = 0;
            } else {
                self.release.notify_all();
            }
        }
        arrival
    }

    /// Record one arrival and block until the target is met.
    pub fn reach_and_wait(&self) {
        let mut state = self.state.lock().expect("barrier mutex poisoned");
        assert!(state.current < state.target, "barrier arrivals exceed the target");
        state.current += 1;
        if state.current == state.target {
            if state.waiting == 0 {
                state.target = 0;
                state.current = 0;
            } else {
                self.release.notify_all();
            }
            return;
        }

        state.waiting += 1;
        while state.current < state.target {
            state = self.release.wait(state).expect("barrier mutex poisoned");
        }
        state.waiting -= 1;
        if state.waiting == 0 {
            // Last waiter out disarms the cycle.
            state.target = 0;
            state.current = 0;
            self.release.notify_all();
        }
    }

    /// Unblock every waiter regardless of the arrival count.
    pub fn release(&self) {
        let mut state = self.state.lock().expect("barrier mutex poisoned");
        state.current = state.target;
        self.release.notify_all();
    }

    /// Whether a cycle is currently armed.
    pub fn is_armed(&self) -> bool {
        self.state.lock().expect("barrier mutex poisoned").target != 0
    }
}

impl Default for Barrier {
    fn default() -> Self {
        Barrier::new()
    }
}

impl Drop for Barrier {
    fn drop(&mut self) {
        // Skip the check when already unwinding from a poisoned cycle.
        if let Ok(state) = self.state.get_mut() {
            assert_eq!(state.waiting, 0, "barrier dropped while threads are waiting");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn arrivals_are_numbered() {
        let barrier = Barrier::new();
        barrier.set_target(3);
        assert_eq!(barrier.reach(), 1);
        assert_eq!(barrier.reach(), 2);
        assert_eq!(barrier.reach(), 3);
        // The cycle finished; the barrier can be re-armed.
        barrier.set_target(1);
        assert_eq!(barrier.reach(), 1);
    }

    #[test]
    fn reach_and_wait_blocks_until_the_last_arrival() {
        const THREADS: i32 = 4;
        let barrier = Arc::new(Barrier::new());
        let entered = Arc::new(AtomicI32::new(0));
        barrier.set_target(THREADS);

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let entered = Arc::clone(&entered);
                std::thread::spawn(move || {
                    entered.fetch_add(1, Ordering::SeqCst);
                    barrier.reach_and_wait();
                    // Every thread must have entered before anyone leaves.
                    assert_eq!(entered.load(Ordering::SeqCst), THREADS);
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert!(!barrier.is_armed());
    }

    #[test]
    #[should_panic(expected = "already armed")]
    fn rearming_a_live_cycle_panics() {
        let barrier = Barrier::new();
        barrier.set_target(2);
        barrier.set_target(2);
    }
}
