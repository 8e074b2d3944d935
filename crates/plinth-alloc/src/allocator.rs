use core::ptr::{self, NonNull};

use bitflags::bitflags;

/// Default allocation alignment: two machine words.
pub const DEFAULT_ALIGN: usize = 2 * core::mem::size_of::<usize>();

bitflags! {
    /// Per-request allocation behaviour.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AllocFlags: u32 {
        /// Zero-fill the returned region.
        const CLEAR_TO_ZERO = 1 << 0;
    }
}

/// A borrowed allocator handle — the `(vtable, state)` value pair passed
/// through collections and parsers.
pub type AllocRef<'a> = &'a dyn Allocator;

/// The polymorphic allocation interface.
///
/// Methods take `&self`; implementations track their cursors through interior
/// mutability. Allocators are deliberately not `Sync`: callers provide
/// isolation, and nothing in this workspace shares an allocator across
/// threads.
///
/// Exhaustion is not an error value — every operation that can run out of
/// space returns `None` and the caller checks.
pub trait Allocator {
    /// Allocate `size` bytes at the given alignment.
    ///
    /// `align` must be a power of two. Returns `None` on exhaustion.
    fn alloc_raw(&self, size: usize, align: usize, flags: AllocFlags) -> Option<NonNull<u8>>;

    /// Release one allocation.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this allocator and not freed since.
    unsafe fn free_raw(&self, ptr: NonNull<u8>);

    /// Release everything at once.
    ///
    /// Only the bulk allocators support this; the default implementation
    /// panics.
    fn free_all(&self) {
        panic!("allocator does not support free_all");
    }

    /// Grow or shrink an allocation.
    ///
    /// The default implementation is the portable fallback: a nil `old`
    /// behaves like [`Allocator::alloc_raw`]; `new_size == 0` behaves like
    /// [`Allocator::free_raw`] and returns `None`; a shrink returns the old
    /// region in place; a growth allocates fresh memory, copies
    /// `min(old_size, new_size)` bytes, and frees the old region.
    /// Implementations may override this to extend in place.
    ///
    /// # Safety
    ///
    /// A non-nil `old` must have been returned by this allocator for a
    /// request of `old_size` bytes.
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
            self.free_raw(old_ptr);
            return None;
        }
        if new_size <= old_size {
            return Some(old_ptr);
        }
        let fresh = self.alloc_raw(new_size, align, AllocFlags::empty())?;
        ptr::copy_nonoverlapping(old_ptr.as_ptr(), fresh.as_ptr(), old_size.min(new_size));
        self.free_raw(old_ptr);
        Some(fresh)
    }
}

/// Convenience wrappers over the raw interface, available on any allocator
/// (including trait objects).
pub trait AllocatorExt: Allocator {
    /// Allocate with the default alignment.
    fn alloc(&self, size: usize) -> Option<NonNull<u8>> {
        self.alloc_raw(size, DEFAULT_ALIGN, AllocFlags::empty())
    }

    /// Allocate zero-filled memory with the default alignment.
    fn alloc_zeroed(&self, size: usize) -> Option<NonNull<u8>> {
        self.alloc_raw(size, DEFAULT_ALIGN, AllocFlags::CLEAR_TO_ZERO)
    }

    /// Free a possibly-nil pointer; nil is a no-op.
    ///
    /// # Safety
    ///
    /// As for [`Allocator::free_raw`].
    unsafe fn free(&self, ptr: Option<NonNull<u8>>) {
        if let Some(p) = ptr {
            self.free_raw(p);
        }
    }

    /// Resize with the default alignment.
    ///
    /// # Safety
    ///
    /// As for [`Allocator::resize_raw`].
    unsafe fn resize(
        &self,
        old: Option<NonNull<u8>>,
        old_size: usize,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        self.resize_raw(old, old_size, new_size, DEFAULT_ALIGN)
    }
}

impl<A: Allocator + ?Sized> AllocatorExt for A {}

/// Copy `src` into allocator-owned memory.
pub fn alloc_copy<'a>(a: AllocRef<'a>, src: &[u8]) -> Option<&'a [u8]> {
    if src.is_empty() {
        return Some(&[]);
    }
    let dst = a.alloc(src.len())?;
    unsafe {
        ptr::copy_nonoverlapping(src.as_ptr(), dst.as_ptr(), src.len());
        Some(core::slice::from_raw_parts(dst.as_ptr(), src.len()))
    }
}

/// Copy a string into allocator-owned memory.
pub fn alloc_str<'a>(a: AllocRef<'a>, s: &str) -> Option<&'a str> {
    let bytes = alloc_copy(a, s.as_bytes())?;
    // The bytes were copied verbatim from a `str`.
    Some(unsafe { core::str::from_utf8_unchecked(bytes) })
}

pub(crate) fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Heap;

    #[test]
    fn default_resize_follows_the_fallback_contract() {
        let heap = Heap::new();
        let a: AllocRef<'_> = &heap;

        // nil old behaves like alloc
        let p = unsafe { a.resize(None, 0, 64) }.unwrap();
        unsafe { p.as_ptr().write_bytes(0xAB, 64) };

        // shrink returns the same region
        let q = unsafe { a.resize(Some(p), 64, 16) }.unwrap();
        assert_eq!(p, q);

        // growth preserves the prefix
        let r = unsafe { a.resize(Some(q), 64, 256) }.unwrap();
        assert_eq!(unsafe { r.as_ptr().read() }, 0xAB);

        // zero size frees
        assert!(unsafe { a.resize(Some(r), 256, 0) }.is_none());
    }

    #[test]
    fn alloc_str_copies_into_the_allocator() {
        let heap = Heap::new();
        let owned = alloc_str(&heap, "scratch me").unwrap();
        assert_eq!(owned, "scratch me");
        unsafe {
            heap.free_raw(NonNull::new(owned.as_ptr().cast_mut()).unwrap());
        }
    }

    #[test]
    fn align_up_rounds_to_the_next_boundary() {
        assert_eq!(align_up(0, 16), 0);
        assert_eq!(align_up(1, 16), 16);
        assert_eq!(align_up(16, 16), 16);
        assert_eq!(align_up(17, 8), 24);
    }
}
