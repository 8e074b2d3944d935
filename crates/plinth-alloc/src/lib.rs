//! Plinth memory model — one polymorphic allocation interface threaded
//! through every collection and parser in the workspace.
//!
//! An allocator handle is `&dyn Allocator`: the `(vtable, state)` pair.
//! Concrete allocators:
//!
//! - [`Heap`] — aligned wrapper over the operating system heap, with
//!   unconditional leak accounting ([`heap_stats`], [`heap_stats_check`])
//! - [`Arena`] — bump allocator with scoped LIFO [snapshots](Arena::snapshot_begin)
//! - [`Pool`] — fixed-size blocks over an intrusive free list
//! - [`ScratchRing`] — ring allocator with out-of-order free and in-order
//!   reclamation
//! - [`StackAlloc`] — LIFO allocator with per-allocation rewind records
//!
//! [`AVec`] is the allocator-backed vector the higher layers build on.
//!
//! Allocators are single-threaded by design; callers provide isolation.
//! Exhaustion is reported as `None`, never as a panic — panics are reserved
//! for programmer errors (wrong pool block size, non-LIFO snapshot end,
//! resizing a stack block).
//!
//! # Example
//!
//! ```
//! use plinth_alloc::{Allocator, AllocatorExt, Arena, AVec};
//!
//! let mut backing = [0u8; 1024];
//! let arena = Arena::from_buffer(&mut backing);
//!
//! let mut xs: AVec<'_, u32> = AVec::new(&arena);
//! for i in 0..10 {
//!     assert!(xs.push(i));
//! }
//! assert_eq!(xs.iter().sum::<u32>(), 45);
//!
//! drop(xs);
//! arena.free_all();
//! assert_eq!(arena.used(), 0);
//! ```

mod allocator;
mod arena;
mod avec;
mod heap;
mod invariants;
mod pool;
mod scratch;
mod stack;

pub use allocator::{alloc_copy, alloc_str, AllocFlags, AllocRef, Allocator, AllocatorExt, DEFAULT_ALIGN};
pub use arena::{Arena, ArenaSnapshot};
pub use avec::AVec;
pub use heap::{heap_stats, heap_stats_check, Heap, HeapStats};
pub use pool::Pool;
pub use scratch::ScratchRing;
pub use stack::StackAlloc;
