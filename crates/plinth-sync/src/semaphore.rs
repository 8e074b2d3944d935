use std::sync::{Condvar, Mutex};

/// Counting semaphore over a mutex and condition variable.
pub struct Semaphore {
    count: Mutex<i32>,
    available: Condvar,
}

impl Semaphore {
    pub fn new(initial: i32) -> Semaphore {
        assert!(initial >= 0, "semaphore count cannot start negative");
        Semaphore {
            count: Mutex::new(initial),
            available: Condvar::new(),
        }
    }

    /// Release `n` permits.
    pub fn post(&self, n: i32) {
        assert!(n > 0, "post requires a positive permit count");
        let mut count = self.count.lock().expect("semaphore mutex poisoned");
        *count += n;
        for _ in 0..n {
            self.available.notify_one();
        }
    }

    /// Block until a permit is available, then take it.
    pub fn wait(&self) {
        let mut count = self.count.lock().expect("semaphore mutex poisoned");
        while *count <= 0 {
            count = self.available.wait(count).expect("semaphore mutex poisoned");
        }
        *count -= 1;
    }

    /// Take a permit if one is available right now.
    pub fn try_wait(&self) -> bool {
        let mut count = self.count.lock().expect("semaphore mutex poisoned");
        if *count > 0 {
            *count -= 1;
            true
        } else {
            false
        }
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Semaphore::new(0)
    }
}
