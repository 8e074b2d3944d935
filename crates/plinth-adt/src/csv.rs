//! Delimiter-parameterised CSV over the document tree.
//!
//! The parsed layout is column-major: each column is an array of row
//! values, and the root is an object when a header row names the columns
//! (so `query("col/[value]")` works) or a plain array otherwise. Quoted
//! fields unescape `""` pairs; bare fields are trimmed and re-parsed as
//! numbers when they look numeric. `\r\n` is tolerated on input and rows
//! are written with `\n`.

use std::io::{self, Write};

use plinth_alloc::{alloc_str, AllocRef};

use crate::error::CsvError;
use crate::node::{NameStyle, NodeId, NodeKind, Value};
use crate::number::{parse_number, print_number};
use crate::print::{write_escaped, AllocWriter};
use crate::tree::Adt;

/// Parse with the default `,` delimiter.
pub fn parse<'a>(adt: &mut Adt<'a>, text: &'a str, has_header: bool) -> Result<NodeId, CsvError> {
    parse_delimiter(adt, text, b',', has_header)
}

/// Parse `text` into columns of rows, splitting fields on `delim`.
pub fn parse_delimiter<'a>(
    adt: &mut Adt<'a>,
    text: &'a str,
    delim: u8,
    has_header: bool,
) -> Result<NodeId, CsvError> {
    let root = adt.alloc_root().ok_or(CsvError::OutOfMemory)?;
    // A named-column table roots at an object so columns resolve by name.
    adt.make_branch(root, None, !has_header).map_err(|_| CsvError::OutOfMemory)?;

    let b = text.as_bytes();
    let mut pos = 0usize;
    let mut column = 0usize;
    let mut row_width: Option<usize> = None;

    loop {
        while pos < b.len() && b[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= b.len() {
            break;
        }

        let payload: &'a str;
        let style;
        let mut numeric = false;
        let after: Option<u8>;

        if b[pos] == b'"' {
            let start = pos + 1;
            let mut scan = start;
            let end = loop {
                let Some(quote) = find_byte(b, scan, b'"') else {
                    return Err(CsvError::UnexpectedEndOfInput);
                };
                if b.get(quote + 1) == Some(&b'"') {
                    scan = quote + 2;
                } else {
                    break quote;
                }
            };
            let raw = &text[start..end];
            payload = if raw.contains("\"\"") {
                unescape_quotes(adt.allocator(), raw).ok_or(CsvError::OutOfMemory)?
            } else {
                raw
            };
            style = NameStyle::DoubleQuote;
            pos = end + 1;
            while pos < b.len() && b[pos] != b'\n' && b[pos].is_ascii_whitespace() {
                pos += 1;
            }
            after = b.get(pos).copied();
            if let Some(d) = after {
                if d != delim && d != b'\n' {
                    return Err(CsvError::Internal);
                }
            }
        } else if b[pos] == delim {
            payload = "";
            style = NameStyle::NoQuotes;
            after = Some(delim);
        } else {
            let start = pos;
            let mut end = pos;
            while end < b.len() && b[end] != delim && b[end] != b'\n' {
                end += 1;
            }
            pos = end;
            after = b.get(pos).copied();
            while end > start && b[end - 1].is_ascii_whitespace() {
                end -= 1;
            }
            payload = &text[start..end];
            style = NameStyle::NoQuotes;
            numeric = looks_numeric(payload);
        }

        if column == adt.node(root).child_count() {
            adt.append_arr(root, None).ok_or(CsvError::OutOfMemory)?;
        }
        let column_id = adt.children(root)[column];
        let cell = adt.alloc_node(column_id).ok_or(CsvError::OutOfMemory)?;
        {
            let node = adt.node_mut(cell);
            node.value = Value::String(payload);
            node.name_style = style;
        }
        if numeric {
            let node = adt.node_mut(cell);
            let end = parse_number(node, payload, 0);
            if end != payload.len() || !matches!(node.kind(), NodeKind::Integer | NodeKind::Real) {
                // Not fully numeric after all: keep the string.
                node.value = Value::String(payload);
                node.props = Default::default();
            }
        }

        match after {
            Some(d) if d == delim => {
                column += 1;
                pos += 1;
            }
            Some(b'\n') | None => {
                match row_width {
                    None => row_width = Some(column),
                    Some(w) if w != column => return Err(CsvError::MismatchedRows),
                    Some(_) => {}
                }
                column = 0;
                if after.is_some() {
                    pos += 1;
                }
            }
            Some(_) => return Err(CsvError::Internal),
        }
    }

    if adt.node(root).child_count() == 0 {
        return Err(CsvError::UnexpectedEndOfInput);
    }

    if has_header {
        let columns: usize = adt.node(root).child_count();
        for i in 0..columns {
            let column_id = adt.children(root)[i];
            let Some(&header) = adt.children(column_id).first() else {
                continue;
            };
            let name = match adt.node(header).as_str() {
                Some(s) => Some(s),
                // A numeric header still names the column by its print form.
                None => {
                    let mut out = AllocWriter::new(adt.allocator());
                    print_number(&mut out, adt.node(header)).map_err(|_| CsvError::Internal)?;
                    Some(out.into_str().ok_or(CsvError::OutOfMemory)?)
                }
            };
            let header_style = adt.node(header).name_style;
            let column_node = adt.node_mut(column_id);
            column_node.name = name;
            column_node.name_style = header_style;
            adt.remove_node(header);
        }
    }

    Ok(root)
}

fn find_byte(b: &[u8], from: usize, needle: u8) -> Option<usize> {
    b[from..].iter().position(|&c| c == needle).map(|i| from + i)
}

/// Best-effort numeric shape check: a numeric first byte, then either a hex
/// literal or the decimal charset. Fields that pass but fail the number
/// parser stay strings.
fn looks_numeric(field: &str) -> bool {
    let b = field.as_bytes();
    let Some(&first) = b.first() else {
        return false;
    };
    if !(first.is_ascii_digit() || matches!(first, b'+' | b'-' | b'.')) {
        return false;
    }
    let body = field.trim_start_matches(['+', '-']);
    if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        !hex.is_empty() && hex.bytes().all(|c| c.is_ascii_hexdigit())
    } else {
        b.iter()
            .all(|&c| c.is_ascii_digit() || matches!(c, b'+' | b'-' | b'.' | b'e' | b'E'))
    }
}

fn unescape_quotes<'a>(alloc: AllocRef<'a>, raw: &str) -> Option<&'a str> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(i) = rest.find("\"\"") {
        out.push_str(&rest[..=i]);
        rest = &rest[i + 2..];
    }
    out.push_str(rest);
    alloc_str(alloc, &out)
}

/// Write the table with the default `,` delimiter.
pub fn write(w: &mut dyn Write, adt: &Adt<'_>, root: NodeId) -> io::Result<()> {
    write_delimiter(w, adt, root, b',')
}

/// Write the table: a header row when the columns are named, then the rows,
/// using `\n` as the row separator.
pub fn write_delimiter(w: &mut dyn Write, adt: &Adt<'_>, root: NodeId, delim: u8) -> io::Result<()> {
    let columns = adt.children(root);
    if columns.is_empty() {
        return Ok(());
    }
    let rows = adt.node(columns[0]).child_count();
    if rows == 0 {
        return Ok(());
    }
    let delim = [delim];

    let has_headers = adt.node(columns[0]).name().is_some();
    if has_headers {
        for (i, &column) in columns.iter().enumerate() {
            let node = adt.node(column);
            write_field(w, node.name().unwrap_or(""), node.name_style)?;
            if i + 1 != columns.len() {
                w.write_all(&delim)?;
            }
        }
        writeln!(w)?;
    }

    for row in 0..rows {
        for (i, &column) in columns.iter().enumerate() {
            if let Some(&cell) = adt.children(column).get(row) {
                write_record(w, adt, cell)?;
            }
            if i + 1 != columns.len() {
                w.write_all(&delim)?;
            }
        }
        writeln!(w)?;
    }
    Ok(())
}

/// Write the table into an allocator-owned string.
pub fn write_string_delimiter<'a>(
    alloc: AllocRef<'a>,
    adt: &Adt<'_>,
    root: NodeId,
    delim: u8,
) -> Option<&'a str> {
    let mut out = AllocWriter::new(alloc);
    write_delimiter(&mut out, adt, root, delim).ok()?;
    out.into_str()
}

fn write_field(w: &mut dyn Write, payload: &str, style: NameStyle) -> io::Result<()> {
    if style == NameStyle::DoubleQuote {
        write!(w, "\"")?;
        write_escaped(w, payload, "\"", "\"")?;
        write!(w, "\"")
    } else {
        write!(w, "{payload}")
    }
}

fn write_record(w: &mut dyn Write, adt: &Adt<'_>, id: NodeId) -> io::Result<()> {
    let node = adt.node(id);
    match &node.value {
        Value::String(s) | Value::Multistring(s) => write_field(w, s, node.name_style),
        Value::Integer(..) | Value::Real(..) => print_number(w, node).map_err(io::Error::other),
        _ => Ok(()),
    }
}
