//! Fixed-capacity FIFO with drop-oldest overflow.
//!
//! [`Ring`] is the queue primitive behind the job scheduler's priority
//! queues: a circular buffer of `capacity + 1` slots where appending to a
//! full ring silently retires the oldest element. It is strictly
//! single-threaded — the scheduler only ever touches its queues from the
//! owning thread, and cross-thread hand-off happens elsewhere.
//!
//! # Example
//!
//! ```
//! use plinth_alloc::Heap;
//! use plinth_ring::Ring;
//!
//! let heap = Heap::new();
//! let mut ring: Ring<'_, u32> = Ring::new(&heap, 3).unwrap();
//!
//! ring.append(1);
//! ring.append(2);
//! ring.append(3);
//! ring.append(4); // full: 1 is dropped
//!
//! assert_eq!(ring.get(), Some(2));
//! assert_eq!(ring.get(), Some(3));
//! assert_eq!(ring.get(), Some(4));
//! assert_eq!(ring.get(), None);
//! ```

use core::mem::MaybeUninit;
use core::ptr::{self, NonNull};

use plinth_alloc::{AllocFlags, AllocRef, Allocator, AVec};

mod invariants;
use invariants::{debug_assert_index_in_slots, debug_assert_len_bounded};

/// Single-threaded circular FIFO; appending to a full ring drops the oldest
/// element.
///
/// The slot buffer holds `capacity + 1` elements so that fullness
/// (`(head + 1) % slots == tail`) and emptiness (`head == tail`) stay
/// distinguishable without a length field.
pub struct Ring<'a, T> {
    alloc: AllocRef<'a>,
    buf: NonNull<MaybeUninit<T>>,
    /// Slot count, always `capacity + 1`.
    slots: usize,
    head: usize,
    tail: usize,
}

impl<'a, T> Ring<'a, T> {
    /// Ring holding up to `capacity` elements; `None` when the allocator is
    /// exhausted.
    pub fn new(alloc: AllocRef<'a>, capacity: usize) -> Option<Ring<'a, T>> {
        debug_assert!(core::mem::size_of::<T>() != 0, "zero-sized elements are not supported");
        let slots = capacity.checked_add(1)?;
        let bytes = slots.checked_mul(core::mem::size_of::<T>())?;
        let align = core::mem::align_of::<T>().max(plinth_alloc::DEFAULT_ALIGN);
        let buf = alloc.alloc_raw(bytes, align, AllocFlags::empty())?;
        Some(Ring {
            alloc,
            buf: buf.cast(),
            slots,
            head: 0,
            tail: 0,
        })
    }

    /// Maximum number of live elements.
    pub fn capacity(&self) -> usize {
        self.slots - 1
    }

    pub fn len(&self) -> usize {
        (self.head + self.slots - self.tail) % self.slots
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn is_full(&self) -> bool {
        (self.head + 1) % self.slots == self.tail
    }

    /// Append an element; if the ring is full the oldest element is dropped
    /// to make room.
    pub fn append(&mut self, value: T) {
        debug_assert_index_in_slots!(self.head, self.slots);
        unsafe {
            self.slot(self.head).write(MaybeUninit::new(value));
        }
        self.head = (self.head + 1) % self.slots;
        if self.head == self.tail {
            // Caught our own tail: retire the oldest element.
            unsafe {
                ptr::drop_in_place(self.slot(self.tail).cast::<T>());
            }
            self.tail = (self.tail + 1) % self.slots;
        }
        debug_assert_len_bounded!(self.len(), self.capacity());
    }

    /// Append every element of a slice, oldest-first.
    pub fn append_array(&mut self, values: &[T])
    where
        T: Clone,
    {
        for value in values {
            self.append(value.clone());
        }
    }

    /// Take the oldest element; `None` when empty.
    pub fn get(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        debug_assert_index_in_slots!(self.tail, self.slots);
        let value = unsafe { self.slot(self.tail).cast::<T>().read() };
        self.tail = (self.tail + 1) % self.slots;
        Some(value)
    }

    /// Take up to `max` elements into an allocator-backed vector,
    /// oldest-first. Stops early if `alloc` runs out.
    pub fn get_array<'b>(&mut self, max: usize, alloc: AllocRef<'b>) -> AVec<'b, T> {
        let mut out = AVec::new(alloc);
        while out.len() < max {
            match self.get() {
                Some(v) => {
                    if !out.push(v) {
                        break;
                    }
                }
                None => break,
            }
        }
        out
    }

    /// Drop every element and reset the cursors.
    pub fn clear(&mut self) {
        while self.get().is_some() {}
        self.head = 0;
        self.tail = 0;
    }

    unsafe fn slot(&self, index: usize) -> *mut MaybeUninit<T> {
        self.buf.as_ptr().add(index)
    }
}

impl<T> Drop for Ring<'_, T> {
    fn drop(&mut self) {
        self.clear();
        unsafe { self.alloc.free_raw(self.buf.cast()) };
    }
}

impl<T: core::fmt::Debug> core::fmt::Debug for Ring<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Ring")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plinth_alloc::Heap;

    #[test]
    fn fifo_order() {
        let heap = Heap::new();
        let mut ring: Ring<'_, u32> = Ring::new(&heap, 8).unwrap();
        for i in 0..5 {
            ring.append(i);
        }
        for i in 0..5 {
            assert_eq!(ring.get(), Some(i));
        }
        assert_eq!(ring.get(), None);
    }

    #[test]
    fn overflow_drops_the_oldest() {
        let heap = Heap::new();
        let cap = 4;
        let mut ring: Ring<'_, usize> = Ring::new(&heap, cap).unwrap();
        for i in 0..=cap {
            ring.append(i);
        }
        // Elements 1..=cap survive, in order.
        for expected in 1..=cap {
            assert_eq!(ring.get(), Some(expected));
        }
        assert_eq!(ring.get(), None);
    }

    #[test]
    fn predicates_track_occupancy() {
        let heap = Heap::new();
        let mut ring: Ring<'_, u8> = Ring::new(&heap, 2).unwrap();
        assert!(ring.is_empty());
        assert!(!ring.is_full());

        ring.append(1);
        assert!(!ring.is_empty());
        ring.append(2);
        assert!(ring.is_full());
        assert_eq!(ring.len(), 2);

        ring.get();
        assert!(!ring.is_full());
    }

    #[test]
    fn append_array_is_elementwise() {
        let heap = Heap::new();
        let mut ring: Ring<'_, u16> = Ring::new(&heap, 10).unwrap();
        ring.append_array(&[7, 8, 9]);
        let drained = ring.get_array(10, &heap);
        assert_eq!(drained.as_slice(), &[7, 8, 9]);
    }

    #[test]
    fn dropped_elements_are_destructed() {
        use std::rc::Rc;

        let heap = Heap::new();
        let tracker = Rc::new(());
        {
            let mut ring = Ring::new(&heap as &dyn plinth_alloc::Allocator, 2).unwrap();
            for _ in 0..5 {
                ring.append(Rc::clone(&tracker));
            }
            assert_eq!(ring.len(), 2);
            // 3 were retired by overflow and must already be dropped.
            assert_eq!(Rc::strong_count(&tracker), 3);
        }
        assert_eq!(Rc::strong_count(&tracker), 1);
    }
}
