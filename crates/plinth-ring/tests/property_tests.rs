//! Property tests for the drop-oldest FIFO contract.

use proptest::prelude::*;

use plinth_alloc::Heap;
use plinth_ring::Ring;

proptest! {
    /// Whatever interleaving of appends and takes runs, the ring dequeues a
    /// suffix of the appended sequence in order.
    #[test]
    fn prop_fifo_suffix(
        capacity in 1usize..16,
        ops in prop::collection::vec(prop::bool::ANY, 1..200),
    ) {
        let heap = Heap::new();
        let mut ring: Ring<'_, usize> = Ring::new(&heap, capacity).unwrap();

        let mut next = 0usize;
        let mut expected = std::collections::VecDeque::new();
        for is_append in ops {
            if is_append {
                ring.append(next);
                expected.push_back(next);
                if expected.len() > capacity {
                    expected.pop_front();
                }
                next += 1;
            } else {
                prop_assert_eq!(ring.get(), expected.pop_front());
            }
            prop_assert_eq!(ring.len(), expected.len());
            prop_assert_eq!(ring.is_empty(), expected.is_empty());
            prop_assert_eq!(ring.is_full(), expected.len() == capacity);
        }

        while let Some(want) = expected.pop_front() {
            prop_assert_eq!(ring.get(), Some(want));
        }
        prop_assert_eq!(ring.get(), None);
    }

    /// Appending `capacity + 1` elements leaves `1..=capacity` in order.
    #[test]
    fn prop_drop_oldest(capacity in 1usize..32) {
        let heap = Heap::new();
        let mut ring: Ring<'_, usize> = Ring::new(&heap, capacity).unwrap();
        for i in 0..=capacity {
            ring.append(i);
        }
        let drained = ring.get_array(capacity + 1, &heap);
        let expected: Vec<usize> = (1..=capacity).collect();
        prop_assert_eq!(drained.as_slice(), expected.as_slice());
    }
}
