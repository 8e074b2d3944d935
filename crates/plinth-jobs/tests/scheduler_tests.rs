//! Scheduler integration tests: ordering, fairness, predicates, shutdown.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use plinth_alloc::Heap;
use plinth_jobs::{JobSystem, Priority};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn drive(pool: &mut JobSystem<'_>) {
    while !pool.done() {
        pool.process();
        std::thread::yield_now();
    }
}

#[test]
fn all_jobs_run_to_completion() {
    init_tracing();
    let heap = Heap::new();
    let mut pool = JobSystem::with_limit(&heap, 2, 16).unwrap();

    let counter = Arc::new(AtomicU32::new(0));
    for _ in 0..5 {
        let c = Arc::clone(&counter);
        assert!(pool.enqueue_with_priority(Priority::Idle, move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
    }
    for _ in 0..5 {
        let c = Arc::clone(&counter);
        assert!(pool.enqueue_with_priority(Priority::Realtime, move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
    }

    drive(&mut pool);
    assert_eq!(counter.load(Ordering::SeqCst), 10);
    assert_eq!(
        pool.queue_hits(Priority::Realtime) + pool.queue_hits(Priority::Idle),
        10
    );
}

#[test]
fn per_priority_order_is_fifo() {
    let heap = Heap::new();
    // A single worker executes in dispatch order, and dispatch within one
    // priority is queue order.
    let mut pool = JobSystem::with_limit(&heap, 1, 32).unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));
    for i in 0..16u32 {
        let order = Arc::clone(&order);
        assert!(pool.enqueue(move || {
            order.lock().unwrap().push(i);
        }));
    }

    drive(&mut pool);
    let seen = order.lock().unwrap().clone();
    assert_eq!(seen, (0..16).collect::<Vec<_>>());
}

#[test]
fn first_dispatch_prefers_realtime() {
    let heap = Heap::new();
    let mut pool = JobSystem::with_limit(&heap, 1, 8).unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));
    for _ in 0..3 {
        let order = Arc::clone(&order);
        pool.enqueue_with_priority(Priority::Idle, move || {
            order.lock().unwrap().push("idle");
        });
    }
    for _ in 0..3 {
        let order = Arc::clone(&order);
        pool.enqueue_with_priority(Priority::Realtime, move || {
            order.lock().unwrap().push("realtime");
        });
    }

    drive(&mut pool);
    let seen = order.lock().unwrap().clone();
    assert_eq!(seen.len(), 6);
    // The round-robin counter starts at zero, so the very first grant goes
    // to the realtime queue.
    assert_eq!(seen[0], "realtime");
}

#[test]
fn idle_work_is_not_starved() {
    let heap = Heap::new();
    let mut pool = JobSystem::with_limit(&heap, 1, 8).unwrap();

    let ran = Arc::new(AtomicU32::new(0));
    let r = Arc::clone(&ran);
    pool.enqueue_with_priority(Priority::Idle, move || {
        r.fetch_add(1, Ordering::SeqCst);
    });

    // Only the idle queue is populated: the bypass must dispatch it even
    // though its chance divisor is 11.
    drive(&mut pool);
    assert_eq!(ran.load(Ordering::SeqCst), 1);
}

#[test]
fn enqueue_reports_full_queues() {
    let heap = Heap::new();
    let mut pool = JobSystem::with_limit(&heap, 1, 2).unwrap();

    assert!(pool.enqueue(|| {}));
    assert!(pool.enqueue(|| {}));
    assert!(pool.full(Priority::Normal));
    assert!(!pool.enqueue(|| {}));
    assert!(!pool.full_all());

    drive(&mut pool);
    assert!(pool.empty_all());
}

#[test]
fn predicates_track_queue_state() {
    let heap = Heap::new();
    let mut pool = JobSystem::with_limit(&heap, 1, 4).unwrap();

    assert!(pool.empty(Priority::High));
    assert!(pool.empty_all());
    pool.enqueue_with_priority(Priority::High, || {});
    assert!(!pool.empty(Priority::High));
    assert!(!pool.empty_all());
    assert!(!pool.done());

    drive(&mut pool);
    assert!(pool.done());
}

#[test]
fn worker_stats_count_executions() {
    let heap = Heap::new();
    let mut pool = JobSystem::with_limit(&heap, 2, 16).unwrap();

    for _ in 0..8 {
        pool.enqueue(|| {});
    }
    drive(&mut pool);

    let total: u64 = (0..2).map(|w| pool.worker_stats(w).unwrap().hits).sum();
    assert_eq!(total, 8);
    assert!(pool.worker_stats(5).is_none());
}

#[test]
fn shutdown_discards_queued_jobs() {
    let heap = Heap::new();
    let mut pool = JobSystem::with_limit(&heap, 1, 8).unwrap();

    let ran = Arc::new(AtomicU32::new(0));
    // Queue more than the single worker can be handed in one pass, then
    // shut down without draining.
    for _ in 0..8 {
        let r = Arc::clone(&ran);
        pool.enqueue(move || {
            r.fetch_add(1, Ordering::SeqCst);
        });
    }
    pool.shutdown();
    assert!(pool.empty_all());
    assert!(ran.load(Ordering::SeqCst) <= 8);
}

#[test]
fn drop_joins_workers() {
    let heap = Heap::new();
    let pool = JobSystem::with_limit(&heap, 4, 4).unwrap();
    drop(pool);
}
