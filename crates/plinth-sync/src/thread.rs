use std::sync::Arc;
use std::thread::{Builder, JoinHandle};

use crate::Semaphore;

/// Thread spawn wrapper with an entry handshake.
///
/// [`Thread::spawn`] blocks the spawning thread until the child has actually
/// entered its proc, so the caller can safely drop or reuse state it only
/// needed for the hand-off. [`Thread::spawn_nowait`] skips the handshake.
pub struct Thread {
    handle: Option<JoinHandle<()>>,
}

impl Thread {
    /// Spawn and wait for the child to start running.
    pub fn spawn<F>(proc: F) -> Thread
    where
        F: FnOnce() + Send + 'static,
    {
        Thread::spawn_with_stack(proc, 0)
    }

    /// Spawn with an explicit stack size (0 keeps the platform default),
    /// waiting for the child to start running.
    pub fn spawn_with_stack<F>(proc: F, stack_size: usize) -> Thread
    where
        F: FnOnce() + Send + 'static,
    {
        let entered = Arc::new(Semaphore::new(0));
        let signal = Arc::clone(&entered);
        let thread = Thread::build(
            move || {
                signal.post(1);
                proc();
            },
            stack_size,
        );
        entered.wait();
        thread
    }

    /// Spawn without the entry handshake.
    pub fn spawn_nowait<F>(proc: F) -> Thread
    where
        F: FnOnce() + Send + 'static,
    {
        Thread::build(proc, 0)
    }

    fn build<F>(proc: F, stack_size: usize) -> Thread
    where
        F: FnOnce() + Send + 'static,
    {
        let mut builder = Builder::new();
        if stack_size != 0 {
            builder = builder.stack_size(stack_size);
        }
        let handle = builder.spawn(proc).expect("failed to spawn thread");
        Thread { handle: Some(handle) }
    }

    /// Whether the proc is still running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait for completion and release the OS handle.
    ///
    /// # Panics
    ///
    /// Panics if the child panicked.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().expect("thread panicked");
        }
    }
}

impl Drop for Thread {
    fn drop(&mut self) {
        self.join();
    }
}
