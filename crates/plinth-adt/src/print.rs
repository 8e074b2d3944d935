use core::ptr::NonNull;
use std::io::{self, Write};

use plinth_alloc::{AllocRef, Allocator};

use crate::error::AdtError;
use crate::node::Node;

/// Emit a string payload, escaping every occurrence of a listed byte with
/// the escape symbol.
///
/// An occurrence that is already preceded by the escape symbol is left
/// alone, so payloads holding parsed escape sequences print back byte for
/// byte. The exception is self-escaping (symbol equals the escaped byte, as
/// in CSV quote doubling), where every occurrence is escaped.
pub fn print_string(
    w: &mut dyn Write,
    node: &Node<'_>,
    escaped_chars: &str,
    escape_symbol: &str,
) -> Result<(), AdtError> {
    let Some(payload) = node.as_str() else {
        return Err(AdtError::InvalidType);
    };
    write_escaped(w, payload, escaped_chars, escape_symbol).map_err(|_| AdtError::OutOfMemory)
}

pub(crate) fn write_escaped(
    w: &mut dyn Write,
    payload: &str,
    escaped_chars: &str,
    escape_symbol: &str,
) -> io::Result<()> {
    let bytes = payload.as_bytes();
    let symbol = escape_symbol.as_bytes().first().copied();
    let mut run_start = 0;

    for (i, &c) in bytes.iter().enumerate() {
        if !escaped_chars.as_bytes().contains(&c) {
            continue;
        }
        let already_escaped = i > 0 && symbol == Some(bytes[i - 1]) && symbol != Some(c);
        if already_escaped {
            continue;
        }
        w.write_all(&bytes[run_start..i])?;
        w.write_all(escape_symbol.as_bytes())?;
        run_start = i;
    }
    w.write_all(&bytes[run_start..])
}

/// `io::Write` over a growable allocator-owned buffer — the in-memory
/// stream the printers target when building strings.
///
/// The finished buffer belongs to the allocator: free it through the slice
/// pointer, or hand the writer a bulk allocator and reclaim it wholesale.
pub struct AllocWriter<'a> {
    alloc: AllocRef<'a>,
    buf: Option<NonNull<u8>>,
    len: usize,
    cap: usize,
}

impl<'a> AllocWriter<'a> {
    pub fn new(alloc: AllocRef<'a>) -> AllocWriter<'a> {
        AllocWriter {
            alloc,
            buf: None,
            len: 0,
            cap: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The bytes written so far, with the allocator's lifetime.
    pub fn into_bytes(self) -> &'a [u8] {
        match self.buf {
            Some(p) => unsafe { core::slice::from_raw_parts(p.as_ptr(), self.len) },
            None => &[],
        }
    }

    /// The bytes written so far as UTF-8; `None` when they are not.
    pub fn into_str(self) -> Option<&'a str> {
        core::str::from_utf8(self.into_bytes()).ok()
    }
}

impl Write for AllocWriter<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let needed = self.len + data.len();
        if needed > self.cap {
            let new_cap = needed.max(self.cap * 2).max(64);
            let fresh = unsafe { self.alloc.resize_raw(self.buf, self.cap, new_cap, plinth_alloc::DEFAULT_ALIGN) };
            let Some(fresh) = fresh else {
                return Err(io::Error::new(io::ErrorKind::OutOfMemory, "allocator exhausted"));
            };
            self.buf = Some(fresh);
            self.cap = new_cap;
        }
        unsafe {
            core::ptr::copy_nonoverlapping(
                data.as_ptr(),
                self.buf.expect("buffer grown above").as_ptr().add(self.len),
                data.len(),
            );
        }
        self.len += data.len();
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
