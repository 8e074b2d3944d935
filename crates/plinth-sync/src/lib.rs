//! Threading primitives for the plinth workspace.
//!
//! - [`Semaphore`] — counting semaphore with blocking and non-blocking wait
//! - [`Barrier`] — resettable rendezvous with `reach` / `reach_and_wait`
//! - [`SpinLock`] — atomic spin lock with an iteration-capped acquire
//! - [`Thread`] — spawn wrapper with a started-handshake and join
//!
//! Plain atomics come straight from `std::sync::atomic`; these types cover
//! the patterns the scheduler and its callers need beyond them.

mod barrier;
mod semaphore;
mod spinlock;
mod thread;

pub use barrier::Barrier;
pub use semaphore::Semaphore;
pub use spinlock::{SpinGuard, SpinLock};
pub use thread::Thread;
