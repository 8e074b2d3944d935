use core::cell::Cell;
use core::marker::PhantomData;
use core::ptr::{self, NonNull};

use crate::allocator::{align_up, AllocFlags, AllocRef, Allocator, AllocatorExt};
use crate::invariants::{debug_assert_cursor_in_bounds, debug_assert_power_of_two};

/// Bump allocator over a fixed backing region.
///
/// Individual frees are no-ops; memory is reclaimed wholesale through
/// [`Arena::free_all`] or piecewise through scoped [snapshots](Arena::snapshot_begin).
pub struct Arena<'a> {
    backing: Option<AllocRef<'a>>,
    base: NonNull<u8>,
    total_size: usize,
    used: Cell<usize>,
    temp_count: Cell<usize>,
    _marker: PhantomData<&'a mut [u8]>,
}

impl<'a> Arena<'a> {
    /// Build an arena over caller-provided memory.
    pub fn from_buffer(buf: &'a mut [u8]) -> Arena<'a> {
        let total_size = buf.len();
        // An empty slice still yields an aligned, non-null pointer.
        let base = NonNull::new(buf.as_mut_ptr()).expect("slice pointers are non-null");
        Arena {
            backing: None,
            base,
            total_size,
            used: Cell::new(0),
            temp_count: Cell::new(0),
            _marker: PhantomData,
        }
    }

    /// Build an arena whose region comes from another allocator.
    ///
    /// The region is returned to `backing` when the arena is dropped.
    pub fn new(backing: AllocRef<'a>, size: usize) -> Option<Arena<'a>> {
        let base = backing.alloc(size)?;
        Some(Arena {
            backing: Some(backing),
            base,
            total_size: size,
            used: Cell::new(0),
            temp_count: Cell::new(0),
            _marker: PhantomData,
        })
    }

    /// Carve a sub-arena out of a parent arena.
    pub fn sub(parent: &'a Arena<'a>, size: usize) -> Option<Arena<'a>> {
        Arena::new(parent, size)
    }

    pub fn capacity(&self) -> usize {
        self.total_size
    }

    pub fn used(&self) -> usize {
        self.used.get()
    }

    pub fn temp_count(&self) -> usize {
        self.temp_count.get()
    }

    /// Padding needed before the next allocation at `align`.
    pub fn alignment_offset(&self, align: usize) -> usize {
        debug_assert_power_of_two!(align);
        let cursor = self.base.as_ptr() as usize + self.used.get();
        align_up(cursor, align) - cursor
    }

    /// Bytes still available for an allocation at `align`.
    pub fn size_remaining(&self, align: usize) -> usize {
        self.total_size - (self.used.get() + self.alignment_offset(align))
    }

    /// Assert that no snapshot is still open.
    pub fn check(&self) {
        assert_eq!(self.temp_count.get(), 0, "arena still has live snapshots");
    }

    /// Open a scoped snapshot of the current usage.
    ///
    /// Snapshots nest and must be ended in LIFO order; [`ArenaSnapshot::end`]
    /// panics otherwise.
    pub fn snapshot_begin(&self) -> ArenaSnapshot<'_, 'a> {
        let depth = self.temp_count.get() + 1;
        self.temp_count.set(depth);
        ArenaSnapshot {
            arena: self,
            used_at_begin: self.used.get(),
            depth,
        }
    }
}

impl Allocator for Arena<'_> {
    fn alloc_raw(&self, size: usize, align: usize, flags: AllocFlags) -> Option<NonNull<u8>> {
        debug_assert_power_of_two!(align);
        let base = self.base.as_ptr() as usize;
        let aligned = align_up(base + self.used.get(), align);
        let new_used = (aligned - base).checked_add(size)?;
        if new_used > self.total_size {
            return None;
        }
        self.used.set(new_used);
        debug_assert_cursor_in_bounds!("arena", self.used.get(), self.total_size);
        unsafe {
            let ptr = self.base.as_ptr().add(aligned - base);
            if flags.contains(AllocFlags::CLEAR_TO_ZERO) {
                ptr::write_bytes(ptr, 0, size);
            }
            NonNull::new(ptr)
        }
    }

    // Use a snapshot to release a block; individual frees do nothing.
    unsafe fn free_raw(&self, _ptr: NonNull<u8>) {}

    fn free_all(&self) {
        assert_eq!(self.temp_count.get(), 0, "arena still has live snapshots");
        self.used.set(0);
    }

    unsafe fn resize_raw(
        &self,
        old: Option<NonNull<u8>>,
        old_size: usize,
        new_size: usize,
        align: usize,
    ) -> Option<NonNull<u8>> {
        let Some(old_ptr) = old else {
            return self.alloc_raw(new_size, align, AllocFlags::empty());
        };
        if new_size == 0 {
            // Frees are no-ops here, matching the free operation.
            return None;
        }

        let base = self.base.as_ptr() as usize;
        let old_addr = old_ptr.as_ptr() as usize;
        if old_addr + old_size == base + self.used.get() {
            // Top-of-arena block: move the cursor instead of copying.
            let new_used = old_addr - base + new_size;
            if new_used > self.total_size {
                return None;
            }
            self.used.set(new_used);
            return Some(old_ptr);
        }

        if new_size <= old_size {
            return Some(old_ptr);
        }
        let fresh = self.alloc_raw(new_size, align, AllocFlags::empty())?;
        ptr::copy_nonoverlapping(old_ptr.as_ptr(), fresh.as_ptr(), old_size.min(new_size));
        Some(fresh)
    }
}

impl Drop for Arena<'_> {
    fn drop(&mut self) {
        if let Some(backing) = self.backing {
            unsafe { backing.free_raw(self.base) };
        }
    }
}

impl core::fmt::Debug for Arena<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Arena")
            .field("total_size", &self.total_size)
            .field("used", &self.used.get())
            .field("temp_count", &self.temp_count.get())
            .finish_non_exhaustive()
    }
}

/// A saved arena usage mark.
///
/// Ending the snapshot rewinds the arena to where it was when the snapshot
/// was taken. Snapshots must end in LIFO order.
#[must_use = "an unfinished snapshot keeps the arena's temp count raised"]
pub struct ArenaSnapshot<'s, 'a> {
    arena: &'s Arena<'a>,
    used_at_begin: usize,
    depth: usize,
}

impl ArenaSnapshot<'_, '_> {
    /// Rewind the arena to the snapshot point.
    ///
    /// # Panics
    ///
    /// Panics if an inner snapshot is still open (non-LIFO end).
    pub fn end(self) {
        assert_eq!(
            self.arena.temp_count.get(),
            self.depth,
            "arena snapshots must end in LIFO order"
        );
        self.arena.used.set(self.used_at_begin);
        self.arena.temp_count.set(self.depth - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_advances_and_free_all_resets() {
        let mut buf = [0u8; 256];
        let arena = Arena::from_buffer(&mut buf);

        let a = arena.alloc(32).unwrap();
        let b = arena.alloc(32).unwrap();
        assert_ne!(a, b);
        assert!(arena.used() >= 64);

        arena.free_all();
        assert_eq!(arena.used(), 0);
    }

    #[test]
    fn refuses_past_capacity() {
        let mut buf = [0u8; 64];
        let arena = Arena::from_buffer(&mut buf);
        assert!(arena.alloc(128).is_none());
        // A failed allocation leaves the cursor untouched.
        assert_eq!(arena.used(), 0);
    }

    #[test]
    fn snapshots_nest_and_restore() {
        let mut buf = [0u8; 4096];
        let arena = Arena::from_buffer(&mut buf);

        arena.alloc(100).unwrap();
        let mark = arena.used();

        let snap_a = arena.snapshot_begin();
        arena.alloc(200).unwrap();
        let snap_b = arena.snapshot_begin();
        arena.alloc(400).unwrap();
        snap_b.end();
        snap_a.end();

        assert_eq!(arena.used(), mark);
        assert_eq!(arena.temp_count(), 0);
    }

    #[test]
    #[should_panic(expected = "LIFO")]
    fn out_of_order_snapshot_end_panics() {
        let mut buf = [0u8; 1024];
        let arena = Arena::from_buffer(&mut buf);
        let snap_a = arena.snapshot_begin();
        let _snap_b = arena.snapshot_begin();
        snap_a.end();
    }

    #[test]
    #[should_panic(expected = "live snapshots")]
    fn free_all_with_open_snapshot_panics() {
        let mut buf = [0u8; 1024];
        let arena = Arena::from_buffer(&mut buf);
        let _snap = arena.snapshot_begin();
        arena.free_all();
    }

    #[test]
    fn top_block_resizes_in_place() {
        let mut buf = [0u8; 1024];
        let arena = Arena::from_buffer(&mut buf);

        let p = arena.alloc(64).unwrap();
        let used = arena.used();
        let q = unsafe { arena.resize(Some(p), 64, 128) }.unwrap();
        assert_eq!(p, q);
        assert_eq!(arena.used(), used + 64);
    }

    #[test]
    fn interior_block_resize_copies() {
        let mut buf = [0u8; 1024];
        let arena = Arena::from_buffer(&mut buf);

        let p = arena.alloc(16).unwrap();
        unsafe { p.as_ptr().write_bytes(0x5A, 16) };
        let _top = arena.alloc(16).unwrap();

        let q = unsafe { arena.resize(Some(p), 16, 64) }.unwrap();
        assert_ne!(p, q);
        assert_eq!(unsafe { q.as_ptr().read() }, 0x5A);
    }

    #[test]
    fn sub_arena_draws_from_parent() {
        let mut buf = [0u8; 1024];
        let parent = Arena::from_buffer(&mut buf);
        {
            let child = Arena::sub(&parent, 256).unwrap();
            assert!(child.alloc(200).is_some());
            assert!(parent.used() >= 256);
        }
    }
}
