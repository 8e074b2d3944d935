//! Debug assertion macros for allocator cursor invariants.
//!
//! Active in debug builds only; release builds keep the hard asserts that
//! guard against caller programming errors (wrong pool block size, foreign
//! pointers) and drop everything else.

/// Assert that an alignment request is a power of two.
macro_rules! debug_assert_power_of_two {
    ($align:expr) => {
        debug_assert!(
            $align.is_power_of_two(),
            "alignment {} is not a power of two",
            $align
        )
    };
}

/// Assert that a cursor stays inside the backing region.
///
/// Used after every cursor update in the arena, scratch ring, and stack.
macro_rules! debug_assert_cursor_in_bounds {
    ($name:literal, $cursor:expr, $total:expr) => {
        debug_assert!(
            $cursor <= $total,
            "{} cursor {} escaped the region of {} bytes",
            $name,
            $cursor,
            $total
        )
    };
}

pub(crate) use debug_assert_cursor_in_bounds;
pub(crate) use debug_assert_power_of_two;
