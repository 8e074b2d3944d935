//! Debug assertion macros for ring cursor invariants.
//!
//! Debug builds only; the release build trusts the modular arithmetic.

/// Assert that a cursor addresses a valid slot.
macro_rules! debug_assert_index_in_slots {
    ($index:expr, $slots:expr) => {
        debug_assert!(
            $index < $slots,
            "ring cursor {} outside the {} slots",
            $index,
            $slots
        )
    };
}

/// Assert that the live count never exceeds the capacity.
macro_rules! debug_assert_len_bounded {
    ($len:expr, $capacity:expr) => {
        debug_assert!(
            $len <= $capacity,
            "ring holds {} elements over capacity {}",
            $len,
            $capacity
        )
    };
}

pub(crate) use debug_assert_index_in_slots;
pub(crate) use debug_assert_len_bounded;
