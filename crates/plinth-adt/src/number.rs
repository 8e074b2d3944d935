use std::io::Write;

use crate::error::AdtError;
use crate::node::{Node, NodeProps, NumberMeta, Value};

/// Scratch space for the digits of one numeric token.
struct DigitBuf {
    bytes: [u8; 48],
    len: usize,
}

impl DigitBuf {
    fn new() -> DigitBuf {
        DigitBuf { bytes: [0; 48], len: 0 }
    }

    fn push(&mut self, byte: u8) {
        if self.len < self.bytes.len() {
            self.bytes[self.len] = byte;
            self.len += 1;
        }
    }

    fn as_str(&self) -> &str {
        // Only ASCII digit/sign/dot bytes are ever pushed.
        core::str::from_utf8(&self.bytes[..self.len]).unwrap_or("")
    }

    fn starts_with_minus(&self) -> bool {
        self.len > 0 && self.bytes[0] == b'-'
    }
}

/// Decimal or `0x` integer literal; malformed digits collapse to zero.
fn parse_int_auto(s: &str) -> i64 {
    let (negative, rest) = match s.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, s),
    };
    if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        let value = i64::from_str_radix(hex, 16).unwrap_or(0);
        if negative { value.wrapping_neg() } else { value }
    } else {
        // Parse with the sign attached so i64::MIN stays representable.
        s.parse::<i64>().unwrap_or(0)
    }
}

/// Parse a numeric token at `start`, filling in the node's value, props,
/// and print metadata. Returns the cursor after the token.
///
/// False positives (a lone exponent letter, a sign or dot followed by
/// nothing numeric, a second decimal point as in an IP address) leave the
/// node untouched and return `start + 1`.
pub(crate) fn parse_number(node: &mut Node<'_>, text: &str, start: usize) -> usize {
    let b = text.as_bytes();
    debug_assert!(start < b.len());
    let c0 = b[start];
    let c1 = b.get(start + 1).copied().unwrap_or(0);

    if c0 == b'e' || c0 == b'E' {
        return start + 1;
    }
    if matches!(c0, b'.' | b'+' | b'-') && !c1.is_ascii_hexdigit() && c1 != b'.' {
        return start + 1;
    }

    let mut p = start;
    let mut is_real = false;
    let mut props = NodeProps::None;
    let mut lead_digit = false;
    let mut buf = DigitBuf::new();

    if b[p] == b'+' {
        p += 1;
    } else if b[p] == b'-' {
        buf.push(b'-');
        p += 1;
    }

    if b.get(p) == Some(&b'.') {
        // Leading-dot real: remember there was no lead digit and parse the
        // fraction with a synthetic zero in front.
        is_real = true;
        props = NodeProps::IsParsedReal;
        lead_digit = false;
        buf.push(b'0');
        buf.push(b[p]);
        p += 1;
        while b.get(p).is_some_and(u8::is_ascii_digit) {
            buf.push(b[p]);
            p += 1;
        }
    } else {
        if b[p..].starts_with(b"0x") || b[p..].starts_with(b"0X") {
            props = NodeProps::IsHex;
        }
        while b.get(p).is_some_and(|&c| c.is_ascii_hexdigit() || (c | 0x20) == b'x') {
            buf.push(b[p]);
            p += 1;
        }
        if b.get(p) == Some(&b'.') {
            is_real = true;
            lead_digit = true;
            let mut step = 0;
            buf.push(b[p]);
            p += 1;
            step += 1;
            while b.get(p).is_some_and(u8::is_ascii_digit) {
                buf.push(b[p]);
                p += 1;
                step += 1;
            }
            if step < 2 {
                buf.push(b'0');
            }
        }
    }

    // A second dot marks a false positive (IP address or similar).
    if b.get(p) == Some(&b'.') {
        return start + 1;
    }

    let mut exp_is_negative = false;
    let mut exponent: i32 = 0;
    if matches!(b.get(p), Some(&b'e' | &b'E')) {
        p += 1;
        if matches!(b.get(p), Some(&b'+' | &b'-')) || b.get(p).is_some_and(u8::is_ascii_digit) {
            if b.get(p) == Some(&b'-') {
                exp_is_negative = true;
            }
            if !b.get(p).is_some_and(u8::is_ascii_digit) {
                p += 1;
            }
            let digits_start = p;
            while b.get(p).is_some_and(u8::is_ascii_digit) {
                p += 1;
            }
            exponent = text[digits_start..p].parse().unwrap_or(0);
        }
    }

    if is_real {
        let mut real: f64 = buf.as_str().parse().unwrap_or(0.0);

        let digits = buf.as_str();
        let dot = digits.find('.').unwrap_or(digits.len());
        let int_part = &digits[..dot];
        let frac_part = if dot < digits.len() { &digits[dot + 1..] } else { "" };

        let base: i64 = int_part.parse().unwrap_or(0);
        let frac_base: i64 = if frac_part.is_empty() { 0 } else { frac_part.parse().unwrap_or(0) };
        // Leading zeros of the fraction; a fraction of all zeros keeps one
        // digit for itself so `1.0` survives the round trip.
        let frac_leading_zeros = match frac_part.bytes().position(|c| c != b'0') {
            Some(i) => i,
            None => frac_part.len().saturating_sub(1),
        } as u8;

        let mut decimal_exponent = 0;
        if exponent != 0 {
            decimal_exponent = if exp_is_negative { -exponent } else { exponent };
            props = NodeProps::IsExp;
        } else if props == NodeProps::None {
            props = NodeProps::IsParsedReal;
        }

        let neg_zero = base == 0 && buf.starts_with_minus();
        let multiplier = if exp_is_negative { 0.1 } else { 10.0 };
        for _ in 0..exponent {
            real *= multiplier;
        }

        node.value = Value::Real(
            real,
            NumberMeta {
                base,
                frac_base,
                frac_leading_zeros,
                decimal_exponent,
                neg_zero,
                has_lead_digit: lead_digit,
            },
        );
        node.props = props;
    } else {
        let mut integer = parse_int_auto(buf.as_str());
        let neg_zero = integer == 0 && buf.starts_with_minus();
        // Exponents are applied multiplicatively; a negative exponent steps
        // by a truncated 0.1, i.e. an integer collapses to zero.
        let step: i64 = if exp_is_negative { 0 } else { 10 };
        for _ in 0..exponent {
            integer = integer.wrapping_mul(step);
        }

        node.value = Value::Integer(
            integer,
            NumberMeta {
                neg_zero,
                has_lead_digit: true,
                ..Default::default()
            },
        );
        node.props = props;
    }

    p
}

/// Print a number exactly as its props and metadata dictate.
///
/// Sentinel props print their keyword; exponent and parsed-real forms
/// reproduce the source spelling; hex integers print as `0x…`; everything
/// else falls back to plain decimal.
pub fn print_number(w: &mut dyn Write, node: &Node<'_>) -> Result<(), AdtError> {
    let to_oom = |_: std::io::Error| AdtError::OutOfMemory;

    let meta = match &node.value {
        Value::Integer(_, meta) | Value::Real(_, meta) => *meta,
        _ => return Err(AdtError::InvalidType),
    };

    if meta.neg_zero {
        write!(w, "-").map_err(to_oom)?;
    }

    match node.value {
        Value::Integer(value, _) => {
            if node.props == NodeProps::IsHex {
                write!(w, "0x{value:x}").map_err(to_oom)?;
            } else {
                write!(w, "{value}").map_err(to_oom)?;
            }
        }
        Value::Real(value, _) => match node.props {
            NodeProps::Nan => write!(w, "NaN").map_err(to_oom)?,
            NodeProps::NanNeg => write!(w, "-NaN").map_err(to_oom)?,
            NodeProps::Infinity => write!(w, "Infinity").map_err(to_oom)?,
            NodeProps::InfinityNeg => write!(w, "-Infinity").map_err(to_oom)?,
            NodeProps::True => write!(w, "true").map_err(to_oom)?,
            NodeProps::False => write!(w, "false").map_err(to_oom)?,
            NodeProps::Null => write!(w, "null").map_err(to_oom)?,
            NodeProps::IsExp => {
                write_fraction_form(w, &meta).map_err(to_oom)?;
                write!(w, "e{}", meta.decimal_exponent).map_err(to_oom)?;
            }
            NodeProps::IsParsedReal => {
                write_fraction_form(w, &meta).map_err(to_oom)?;
            }
            _ => write!(w, "{value:?}").map_err(to_oom)?,
        },
        _ => unreachable!("checked numeric above"),
    }
    Ok(())
}

fn write_fraction_form(w: &mut dyn Write, meta: &NumberMeta) -> std::io::Result<()> {
    if meta.has_lead_digit {
        write!(w, "{}.", meta.base)?;
    } else {
        write!(w, ".")?;
    }
    for _ in 0..meta.frac_leading_zeros {
        write!(w, "0")?;
    }
    write!(w, "{}", meta.frac_base)
}
