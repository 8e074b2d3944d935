//! Property test: printing a parsed numeric token reproduces its bytes.
//!
//! Tokens are generated without leading zeros in the integer part and
//! without a bare trailing dot — the two spellings the metadata model
//! canonicalises — so every generated token must round-trip exactly.

use proptest::prelude::*;

use plinth_alloc::Heap;
use plinth_adt::{print_number, Adt};

fn print_token(token: &str) -> String {
    let heap = Heap::new();
    let mut adt = Adt::new(&heap);
    let root = adt.alloc_root().unwrap();
    adt.make_branch(root, None, true).unwrap();
    let node = adt.append_str(root, None, token).unwrap();
    adt.str_to_number(node).unwrap();

    let mut out = Vec::new();
    print_number(&mut out, adt.node(node)).unwrap();
    String::from_utf8(out).unwrap()
}

proptest! {
    #[test]
    fn prop_integers_round_trip(value in any::<i64>()) {
        let token = value.to_string();
        prop_assert_eq!(print_token(&token), token);
    }

    #[test]
    fn prop_hex_integers_round_trip(value in 0u32..0x7fff_ffff) {
        let token = format!("0x{value:x}");
        prop_assert_eq!(print_token(&token), token);
    }

    #[test]
    fn prop_decimal_reals_round_trip(
        int_part in -9_999_999i64..10_000_000,
        frac in "[0-9]{1,8}",
    ) {
        let token = format!("{int_part}.{frac}");
        prop_assert_eq!(print_token(&token), token);
    }

    #[test]
    fn prop_leading_dot_reals_round_trip(frac in "[0-9]{1,8}") {
        let token = format!(".{frac}");
        prop_assert_eq!(print_token(&token), token);
    }

    #[test]
    fn prop_exponent_reals_round_trip(
        int_part in 1i64..1_000,
        frac in "[0-9]{1,6}",
        exp in prop_oneof![-12i32..0, 1i32..13],
    ) {
        let token = format!("{int_part}.{frac}e{exp}");
        prop_assert_eq!(print_token(&token), token);
    }

    #[test]
    fn prop_negative_zero_survives(frac in "[0-9]{0,6}") {
        let token = if frac.is_empty() {
            "-0".to_string()
        } else {
            format!("-0.{frac}")
        };
        prop_assert_eq!(print_token(&token), token);
    }
}
