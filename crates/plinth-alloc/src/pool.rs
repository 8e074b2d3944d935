use core::cell::Cell;
use core::ptr::{self, NonNull};

use crate::allocator::{align_up, AllocFlags, AllocRef, Allocator, DEFAULT_ALIGN};
use crate::invariants::debug_assert_power_of_two;

/// Fixed-size-block allocator over an intrusive free list.
///
/// Every block is the same size and alignment; the first machine word of a
/// free block links to the next free block. Allocation and free are O(1);
/// [`Pool::free_all`](Allocator::free_all) rebuilds the list over the whole
/// region.
pub struct Pool<'a> {
    backing: AllocRef<'a>,
    base: NonNull<u8>,
    free_head: Cell<*mut u8>,
    block_size: usize,
    block_align: usize,
    num_blocks: usize,
    used_size: Cell<usize>,
}

impl<'a> Pool<'a> {
    /// Pool with the default block alignment.
    pub fn new(backing: AllocRef<'a>, num_blocks: usize, block_size: usize) -> Option<Pool<'a>> {
        Pool::with_align(backing, num_blocks, block_size, DEFAULT_ALIGN)
    }

    /// Pool with an explicit block alignment.
    ///
    /// # Panics
    ///
    /// Panics if a block cannot hold the free-list link or the alignment is
    /// not a power of two at least word-sized.
    pub fn with_align(
        backing: AllocRef<'a>,
        num_blocks: usize,
        block_size: usize,
        block_align: usize,
    ) -> Option<Pool<'a>> {
        assert!(
            block_size >= core::mem::size_of::<*mut u8>(),
            "pool blocks must be large enough to hold a free-list link"
        );
        assert!(
            block_align >= core::mem::align_of::<*mut u8>(),
            "pool block alignment must be at least word alignment"
        );
        debug_assert_power_of_two!(block_align);

        let stride = align_up(block_size, block_align);
        let region = num_blocks.checked_mul(stride)?;
        let base = backing.alloc_raw(region, block_align, AllocFlags::empty())?;

        let pool = Pool {
            backing,
            base,
            free_head: Cell::new(ptr::null_mut()),
            block_size,
            block_align,
            num_blocks,
            used_size: Cell::new(0),
        };
        unsafe { pool.rebuild_free_list() };
        Some(pool)
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn block_align(&self) -> usize {
        self.block_align
    }

    pub fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    /// Bytes currently handed out.
    pub fn used_size(&self) -> usize {
        self.used_size.get()
    }

    /// Walk the free list and count its links.
    pub fn free_list_len(&self) -> usize {
        let mut count = 0;
        let mut cursor = self.free_head.get();
        while !cursor.is_null() {
            count += 1;
            cursor = unsafe { cursor.cast::<*mut u8>().read() };
        }
        count
    }

    fn stride(&self) -> usize {
        align_up(self.block_size, self.block_align)
    }

    /// Thread the free list through every block, front to back.
    unsafe fn rebuild_free_list(&self) {
        let stride = self.stride();
        let mut head = ptr::null_mut();
        for index in (0..self.num_blocks).rev() {
            let block = self.base.as_ptr().add(index * stride);
            block.cast::<*mut u8>().write(head);
            head = block;
        }
        self.free_head.set(head);
    }
}

impl Allocator for Pool<'_> {
    fn alloc_raw(&self, size: usize, align: usize, flags: AllocFlags) -> Option<NonNull<u8>> {
        assert_eq!(size, self.block_size, "pool allocation size must equal the block size");
        assert_eq!(
            align, self.block_align,
            "pool allocation alignment must equal the block alignment"
        );

        let head = NonNull::new(self.free_head.get())?;
        unsafe {
            let next = head.as_ptr().cast::<*mut u8>().read();
            self.free_head.set(next);
            if flags.contains(AllocFlags::CLEAR_TO_ZERO) {
                ptr::write_bytes(head.as_ptr(), 0, size);
            }
        }
        self.used_size.set(self.used_size.get() + self.block_size);
        Some(head)
    }

    unsafe fn free_raw(&self, ptr: NonNull<u8>) {
        ptr.as_ptr().cast::<*mut u8>().write(self.free_head.get());
        self.free_head.set(ptr.as_ptr());
        self.used_size.set(self.used_size.get() - self.block_size);
    }

    fn free_all(&self) {
        self.used_size.set(0);
        unsafe { self.rebuild_free_list() };
    }

    unsafe fn resize_raw(
        &self,
        _old: Option<NonNull<u8>>,
        _old_size: usize,
        _new_size: usize,
        _align: usize,
    ) -> Option<NonNull<u8>> {
        panic!("pool allocations cannot be resized");
    }
}

impl Drop for Pool<'_> {
    fn drop(&mut self) {
        unsafe { self.backing.free_raw(self.base) };
    }
}

impl core::fmt::Debug for Pool<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pool")
            .field("block_size", &self.block_size)
            .field("block_align", &self.block_align)
            .field("num_blocks", &self.num_blocks)
            .field("used_size", &self.used_size.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Heap;

    #[test]
    fn pops_each_block_exactly_once() {
        let heap = Heap::new();
        let pool = Pool::new(&heap, 8, 64).unwrap();
        assert_eq!(pool.free_list_len(), 8);

        let mut seen = Vec::new();
        while let Some(p) = pool.alloc_raw(64, DEFAULT_ALIGN, AllocFlags::empty()) {
            assert!(!seen.contains(&p), "pool returned the same block twice");
            seen.push(p);
        }
        assert_eq!(seen.len(), 8);
        assert_eq!(pool.used_size(), 8 * 64);

        for p in seen {
            unsafe { pool.free_raw(p) };
        }
        assert_eq!(pool.free_list_len(), 8);
        assert_eq!(pool.used_size(), 0);
    }

    #[test]
    fn free_all_rebuilds_the_list() {
        let heap = Heap::new();
        let pool = Pool::new(&heap, 4, 32).unwrap();
        let _a = pool.alloc_raw(32, DEFAULT_ALIGN, AllocFlags::empty()).unwrap();
        let _b = pool.alloc_raw(32, DEFAULT_ALIGN, AllocFlags::empty()).unwrap();
        pool.free_all();
        assert_eq!(pool.free_list_len(), 4);
    }

    #[test]
    #[should_panic(expected = "block size")]
    fn wrong_size_panics() {
        let heap = Heap::new();
        let pool = Pool::new(&heap, 4, 32).unwrap();
        let _ = pool.alloc_raw(16, DEFAULT_ALIGN, AllocFlags::empty());
    }

    #[test]
    #[should_panic(expected = "resized")]
    fn resize_panics() {
        let heap = Heap::new();
        let pool = Pool::new(&heap, 4, 32).unwrap();
        let p = pool.alloc_raw(32, DEFAULT_ALIGN, AllocFlags::empty()).unwrap();
        let _ = unsafe { pool.resize_raw(Some(p), 32, 64, DEFAULT_ALIGN) };
    }

    #[test]
    fn blocks_are_aligned() {
        let heap = Heap::new();
        let pool = Pool::with_align(&heap, 4, 48, 64).unwrap();
        while let Some(p) = pool.alloc_raw(48, 64, AllocFlags::empty()) {
            assert_eq!(p.as_ptr() as usize % 64, 0);
        }
    }
}
