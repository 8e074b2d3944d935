//! Priority-weighted job scheduler.
//!
//! A fixed pool of worker threads serves five priority queues. Queues are
//! owned and touched only by the thread driving [`JobSystem::process`]; the
//! single cross-thread hand-off is per worker: the owner writes the job
//! slot, then release-stores `READY` into the worker's status atomic, and
//! the worker's acquire-load pairs with it. No locks anywhere.
//!
//! Priorities are weighted by a round-robin "chance" divisor — smaller
//! divisors pass the dispatch gate more often, biasing selection towards
//! `Realtime`/`High` — with a bypass so `Idle` work still runs once every
//! higher queue is empty.
//!
//! # Example
//!
//! ```
//! use plinth_alloc::Heap;
//! use plinth_jobs::{JobSystem, Priority};
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//!
//! let heap = Heap::new();
//! let mut pool = JobSystem::new(&heap, 2).unwrap();
//!
//! let counter = Arc::new(AtomicU32::new(0));
//! for _ in 0..8 {
//!     let counter = Arc::clone(&counter);
//!     pool.enqueue_with_priority(Priority::High, move || {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!     });
//! }
//!
//! while !pool.done() {
//!     pool.process();
//! }
//! assert_eq!(counter.load(Ordering::SeqCst), 8);
//! ```

use core::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_utils::{Backoff, CachePadded};
use plinth_alloc::{AllocRef, AVec};
use plinth_ring::Ring;
use plinth_sync::Thread;

/// A unit of work handed to a worker.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Queue priorities, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Realtime,
    High,
    Normal,
    Low,
    Idle,
}

impl Priority {
    pub const COUNT: usize = 5;
    pub const ALL: [Priority; Priority::COUNT] = [
        Priority::Realtime,
        Priority::High,
        Priority::Normal,
        Priority::Low,
        Priority::Idle,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Round-robin skip divisors per priority; smaller dispatches more often.
const CHANCES: [u64; Priority::COUNT] = [2, 3, 5, 7, 11];

// Worker status word values.
const STATUS_READY: u32 = 0;
const STATUS_BUSY: u32 = 1;
const STATUS_WAITING: u32 = 2;
const STATUS_TERM: u32 = 3;

/// Per-worker state shared between the owner thread and the worker.
struct WorkerShared {
    /// The worker state machine word. Transitions:
    /// `WAITING -> READY` (owner), `READY -> BUSY -> WAITING` (worker),
    /// anything `-> TERM` (owner, on shutdown).
    status: AtomicU32,
    /// Job hand-off slot. Written by the owner strictly before the
    /// release-store of `READY`; taken by the worker strictly after its
    /// acquire-load of `READY`. That pairing is the scheduler's only
    /// cross-thread synchronisation.
    slot: UnsafeCell<Option<Job>>,
    /// Jobs executed.
    hits: AtomicU64,
    /// Idle polls while `WAITING`.
    idle: AtomicU64,
}

// Safety: `slot` is only touched on the owner side while the worker is
// `WAITING` and on the worker side after observing `READY`; the status
// atomic orders the two (see the field docs).
unsafe impl Sync for WorkerShared {}

impl WorkerShared {
    fn new() -> WorkerShared {
        WorkerShared {
            status: AtomicU32::new(STATUS_WAITING),
            slot: UnsafeCell::new(None),
            hits: AtomicU64::new(0),
            idle: AtomicU64::new(0),
        }
    }
}

fn worker_loop(shared: Arc<CachePadded<WorkerShared>>, index: u32) {
    let backoff = Backoff::new();
    loop {
        match shared.status.load(Ordering::Acquire) {
            STATUS_READY => {
                shared.status.store(STATUS_BUSY, Ordering::Relaxed);
                // Safety: the owner stopped touching the slot when it
                // published READY (see WorkerShared::slot).
                let job = unsafe { (*shared.slot.get()).take() };
                if let Some(job) = job {
                    job();
                    shared.hits.fetch_add(1, Ordering::Relaxed);
                }
                // The owner may have requested TERM while we ran.
                let _ = shared.status.compare_exchange(
                    STATUS_BUSY,
                    STATUS_WAITING,
                    Ordering::Release,
                    Ordering::Relaxed,
                );
                backoff.reset();
            }
            STATUS_WAITING => {
                shared.idle.fetch_add(1, Ordering::Relaxed);
                backoff.snooze();
            }
            STATUS_TERM => {
                tracing::debug!(worker = index, "worker terminating");
                return;
            }
            _ => std::thread::yield_now(),
        }
    }
}

struct Worker {
    shared: Arc<CachePadded<WorkerShared>>,
    thread: Option<Thread>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.shared.status.store(STATUS_TERM, Ordering::SeqCst);
        if let Some(mut thread) = self.thread.take() {
            thread.join();
        }
    }
}

struct Queue<'a> {
    jobs: Ring<'a, Job>,
    chance: u64,
    hits: u64,
}

/// Execution statistics for one worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Jobs executed.
    pub hits: u64,
    /// Idle polls while waiting.
    pub idle: u64,
}

/// The scheduler: five chance-weighted queues over a fixed worker pool.
///
/// The system itself stays on the thread that created it (queues are
/// single-threaded rings); only the per-worker hand-off state crosses
/// threads. Dropping the system terminates the workers cooperatively — a
/// running job completes, queued jobs are discarded.
pub struct JobSystem<'a> {
    max_workers: u32,
    max_jobs: u32,
    counter: u64,
    workers: AVec<'a, Worker>,
    queues: [Queue<'a>; Priority::COUNT],
}

impl<'a> JobSystem<'a> {
    /// Default per-priority queue capacity.
    pub const DEFAULT_MAX_JOBS: u32 = 100;

    /// Pool with the default queue capacity.
    pub fn new(alloc: AllocRef<'a>, max_workers: u32) -> Option<JobSystem<'a>> {
        JobSystem::with_limit(alloc, max_workers, JobSystem::DEFAULT_MAX_JOBS)
    }

    /// Pool with `max_workers` threads and `max_jobs` slots per priority.
    ///
    /// Returns `None` when the allocator cannot hold the queues or a worker
    /// thread cannot be spawned.
    pub fn with_limit(alloc: AllocRef<'a>, max_workers: u32, max_jobs: u32) -> Option<JobSystem<'a>> {
        let queue = |priority: usize| -> Option<Queue<'a>> {
            Some(Queue {
                jobs: Ring::new(alloc, max_jobs as usize)?,
                chance: CHANCES[priority],
                hits: 0,
            })
        };
        let queues = [queue(0)?, queue(1)?, queue(2)?, queue(3)?, queue(4)?];

        let mut workers = AVec::with_capacity(alloc, max_workers as usize)?;
        for index in 0..max_workers {
            let shared = Arc::new(CachePadded::new(WorkerShared::new()));
            let entry = Arc::clone(&shared);
            // The handshake in spawn() means the worker has entered its loop
            // before we hand the shared state to the dispatch side.
            let thread = Thread::spawn(move || worker_loop(entry, index));
            if !workers.push(Worker {
                shared,
                thread: Some(thread),
            }) {
                return None;
            }
            tracing::debug!(worker = index, "spawned worker");
        }

        Some(JobSystem {
            max_workers,
            max_jobs,
            counter: 0,
            workers,
            queues,
        })
    }

    pub fn max_workers(&self) -> u32 {
        self.max_workers
    }

    pub fn max_jobs(&self) -> u32 {
        self.max_jobs
    }

    /// Enqueue at [`Priority::Normal`].
    pub fn enqueue<F>(&mut self, proc: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue_with_priority(Priority::Normal, proc)
    }

    /// Enqueue a job; returns `false` when that priority's queue is full.
    pub fn enqueue_with_priority<F>(&mut self, priority: Priority, proc: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let queue = &mut self.queues[priority.index()];
        if queue.jobs.is_full() {
            tracing::debug!(?priority, "queue full, job rejected");
            return false;
        }
        queue.jobs.append(Box::new(proc));
        true
    }

    pub fn empty(&self, priority: Priority) -> bool {
        self.queues[priority.index()].jobs.is_empty()
    }

    pub fn full(&self, priority: Priority) -> bool {
        self.queues[priority.index()].jobs.is_full()
    }

    pub fn empty_all(&self) -> bool {
        self.queues.iter().all(|q| q.jobs.is_empty())
    }

    pub fn full_all(&self) -> bool {
        self.queues.iter().all(|q| q.jobs.is_full())
    }

    /// Every queue drained and every worker back to `WAITING`.
    pub fn done(&self) -> bool {
        self.workers
            .iter()
            .all(|w| w.shared.status.load(Ordering::Acquire) == STATUS_WAITING)
            && self.empty_all()
    }

    /// One dispatch pass: hand a job to every waiting worker the chance
    /// gate admits. Returns `false` iff all queues are empty.
    ///
    /// Call this from the owning thread in a loop; it never blocks.
    pub fn process(&mut self) -> bool {
        if self.empty_all() {
            return false;
        }

        let JobSystem {
            workers,
            queues,
            counter,
            ..
        } = self;

        for worker in workers.iter() {
            if worker.shared.status.load(Ordering::Acquire) != STATUS_WAITING {
                continue;
            }
            let mut last_empty = false;
            for (index, queue) in queues.iter_mut().enumerate() {
                if queue.jobs.is_empty() {
                    last_empty = index + 1 == Priority::COUNT;
                    continue;
                }
                let tick = *counter;
                *counter += 1;
                if !last_empty && tick % queue.chance != 0 {
                    continue;
                }
                last_empty = false;

                let job = queue.jobs.get().expect("queue checked non-empty");
                // Safety: the worker is WAITING and will not read the slot
                // until it observes the READY store below.
                unsafe {
                    *worker.shared.slot.get() = Some(job);
                }
                worker.shared.status.store(STATUS_READY, Ordering::Release);
                queue.hits += 1;
                tracing::trace!(priority = index, "job dispatched");
                break;
            }
        }
        true
    }

    /// Per-worker execution counters.
    pub fn worker_stats(&self, worker: usize) -> Option<WorkerStats> {
        let shared = &self.workers.get(worker)?.shared;
        Some(WorkerStats {
            hits: shared.hits.load(Ordering::Relaxed),
            idle: shared.idle.load(Ordering::Relaxed),
        })
    }

    /// Jobs dispatched from one priority queue so far.
    pub fn queue_hits(&self, priority: Priority) -> u64 {
        self.queues[priority.index()].hits
    }

    /// Terminate the workers cooperatively and discard queued jobs.
    ///
    /// Dropping the system does the same.
    pub fn shutdown(&mut self) {
        self.workers.clear();
        for queue in &mut self.queues {
            queue.jobs.clear();
        }
    }
}
