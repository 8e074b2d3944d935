use core::cell::Cell;
use core::marker::PhantomData;
use core::ptr::{self, NonNull};

use crate::allocator::{align_up, AllocFlags, AllocRef, Allocator, DEFAULT_ALIGN};
use crate::invariants::{debug_assert_cursor_in_bounds, debug_assert_power_of_two};

/// The record in front of every allocation: the `used` value to rewind to.
const RECORD: usize = core::mem::size_of::<usize>();

/// LIFO bump allocator.
///
/// Each allocation stores the previous cursor in a record directly below the
/// returned pointer, so a free rewinds the stack to where it stood before
/// that allocation (and implicitly releases everything allocated after it).
///
/// With a backing allocator the region grows on demand; growth may relocate
/// the region, so callers must not hold pointers across a growing
/// allocation.
pub struct StackAlloc<'a> {
    backing: Option<AllocRef<'a>>,
    base: Cell<NonNull<u8>>,
    total_size: Cell<usize>,
    used: Cell<usize>,
    _marker: PhantomData<&'a mut [u8]>,
}

impl<'a> StackAlloc<'a> {
    /// Stack over caller-provided memory; exhaustion panics.
    pub fn from_buffer(buf: &'a mut [u8]) -> StackAlloc<'a> {
        let total_size = buf.len();
        let base = NonNull::new(buf.as_mut_ptr()).expect("slice pointers are non-null");
        StackAlloc {
            backing: None,
            base: Cell::new(base),
            total_size: Cell::new(total_size),
            used: Cell::new(0),
            _marker: PhantomData,
        }
    }

    /// Stack whose region comes from (and grows through) another allocator.
    pub fn new(backing: AllocRef<'a>, size: usize) -> Option<StackAlloc<'a>> {
        let base = backing.alloc_raw(size, DEFAULT_ALIGN, AllocFlags::empty())?;
        Some(StackAlloc {
            backing: Some(backing),
            base: Cell::new(base),
            total_size: Cell::new(size),
            used: Cell::new(0),
            _marker: PhantomData,
        })
    }

    pub fn capacity(&self) -> usize {
        self.total_size.get()
    }

    pub fn used(&self) -> usize {
        self.used.get()
    }
}

impl Allocator for StackAlloc<'_> {
    fn alloc_raw(&self, size: usize, align: usize, flags: AllocFlags) -> Option<NonNull<u8>> {
        debug_assert_power_of_two!(align);
        let align = align.max(RECORD);

        let mut base = self.base.get().as_ptr() as usize;
        let mut data = align_up(base + self.used.get() + RECORD, align);
        let mut end = data - base + size;

        if end > self.total_size.get() {
            let Some(backing) = self.backing else {
                panic!("stack allocator exhausted and no backing allocator to grow with");
            };
            let old_total = self.total_size.get();
            let new_total = old_total + end;
            let fresh = unsafe {
                backing.resize_raw(Some(self.base.get()), old_total, new_total, DEFAULT_ALIGN)?
            };
            self.base.set(fresh);
            self.total_size.set(new_total);
            base = fresh.as_ptr() as usize;
            data = align_up(base + self.used.get() + RECORD, align);
            end = data - base + size;
        }

        let prev_used = self.used.get();
        self.used.set(end);
        debug_assert_cursor_in_bounds!("stack", self.used.get(), self.total_size.get());
        unsafe {
            let ptr = self.base.get().as_ptr().add(data - base);
            ptr.sub(RECORD).cast::<usize>().write(prev_used);
            if flags.contains(AllocFlags::CLEAR_TO_ZERO) {
                ptr::write_bytes(ptr, 0, size);
            }
            NonNull::new(ptr)
        }
    }

    unsafe fn free_raw(&self, ptr: NonNull<u8>) {
        let base = self.base.get().as_ptr() as usize;
        let addr = ptr.as_ptr() as usize;
        assert!(
            addr >= base + RECORD && addr <= base + self.total_size.get(),
            "pointer was not allocated from this stack"
        );
        let prev_used = ptr.as_ptr().sub(RECORD).cast::<usize>().read();
        debug_assert!(prev_used <= self.used.get(), "stack record is ahead of the cursor");
        self.used.set(prev_used);
    }

    fn free_all(&self) {
        self.used.set(0);
    }

    unsafe fn resize_raw(
        &self,
        _old: Option<NonNull<u8>>,
        _old_size: usize,
        _new_size: usize,
        _align: usize,
    ) -> Option<NonNull<u8>> {
        panic!("stack allocations cannot be resized");
    }
}

impl Drop for StackAlloc<'_> {
    fn drop(&mut self) {
        if let Some(backing) = self.backing {
            unsafe { backing.free_raw(self.base.get()) };
        }
    }
}

impl core::fmt::Debug for StackAlloc<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StackAlloc")
            .field("total_size", &self.total_size.get())
            .field("used", &self.used.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::AllocatorExt;
    use crate::Heap;

    #[test]
    fn free_rewinds_to_the_previous_mark() {
        let mut buf = [0u8; 256];
        let stack = StackAlloc::from_buffer(&mut buf);

        let a = stack.alloc(32).unwrap();
        let mark = stack.used();
        let b = stack.alloc(32).unwrap();
        assert!(stack.used() > mark);

        unsafe { stack.free_raw(b) };
        assert_eq!(stack.used(), mark);

        unsafe { stack.free_raw(a) };
        assert_eq!(stack.used(), 0);
    }

    #[test]
    fn freeing_an_inner_block_releases_everything_above_it() {
        let mut buf = [0u8; 256];
        let stack = StackAlloc::from_buffer(&mut buf);

        let a = stack.alloc(16).unwrap();
        let _b = stack.alloc(16).unwrap();
        let _c = stack.alloc(16).unwrap();

        unsafe { stack.free_raw(a) };
        assert_eq!(stack.used(), 0);
    }

    #[test]
    fn grows_through_the_backing_allocator() {
        let heap = Heap::new();
        let stack = StackAlloc::new(&heap, 64).unwrap();

        let p = stack.alloc(200).unwrap();
        unsafe { p.as_ptr().write_bytes(0x11, 200) };
        assert!(stack.capacity() > 64);
    }

    #[test]
    #[should_panic(expected = "no backing allocator")]
    fn exhaustion_without_backing_panics() {
        let mut buf = [0u8; 64];
        let stack = StackAlloc::from_buffer(&mut buf);
        let _ = stack.alloc(128);
    }

    #[test]
    #[should_panic(expected = "not allocated from this stack")]
    fn foreign_pointer_panics() {
        let mut buf = [0u8; 64];
        let mut other = [0u8; 64];
        let stack = StackAlloc::from_buffer(&mut buf);
        let _ = stack.alloc(8).unwrap();
        unsafe { stack.free_raw(NonNull::new(other.as_mut_ptr().add(32)).unwrap()) };
    }
}
