//! JSON5 parser and style-preserving printer over the document tree.
//!
//! The parser is tokenless recursive descent over a borrowed string; node
//! names and string payloads are slices of the input (escape sequences are
//! kept raw), so the tree is only valid while the input and the allocator
//! live. Accepted syntax is a superset of strict JSON: unquoted keys,
//! single-quoted strings, backtick multistrings, `=`/`|` assignments,
//! newline and `|` pair delimiters, comments, JSON5 keywords, hex and
//! leading-dot numbers, and a brace-less top level ("config mode").
//!
//! The printer re-emits every recorded style choice so that a parsed
//! document prints back with its quoting, assignment characters, and
//! delimiters intact.

use std::io::{self, Write};

use plinth_alloc::{AllocRef, AVec};

use crate::error::JsonError;
use crate::node::{AssignStyle, DelimStyle, NameStyle, NodeId, NodeKind, NodeProps, NumberMeta, Value};
use crate::number::{parse_number, print_number};
use crate::print::{write_escaped, AllocWriter};
use crate::tree::Adt;

/// Parse a JSON5 document into a fresh root node of `adt`.
///
/// The input must outlive the tree: names and strings are borrowed slices.
/// On error the partially built subtree stays in the tree and is torn down
/// with it.
pub fn parse<'a>(adt: &mut Adt<'a>, text: &'a str) -> Result<NodeId, JsonError> {
    let root = adt.alloc_root().ok_or(JsonError::OutOfMemory)?;
    let parser = Parser { text, b: text.as_bytes() };

    let pos = parser.trim(0, false);
    if pos < parser.b.len() && !matches!(parser.b[pos], b'{' | b'[') {
        adt.node_mut(root).cfg_mode = true;
    }
    parser.parse_object(adt, root, pos)?;
    Ok(root)
}

/// Print a container node as a JSON5 document.
///
/// `indent` is the starting column; pass 0 for a top-level document (which
/// is always newline-terminated; nested and inline writes are not).
pub fn write(w: &mut dyn Write, adt: &Adt<'_>, id: NodeId, indent: i32) -> io::Result<()> {
    let node = adt.node(id);
    assert!(node.is_container(), "json write requires an object or array node");
    let mut indent = indent;

    let (open, close) = if node.kind() == NodeKind::Object { ('{', '}') } else { ('[', ']') };

    pad(w, indent - 4)?;
    if node.is_cfg_mode() {
        indent -= 4;
    } else {
        writeln!(w, "{open}")?;
    }

    let children = adt.children(id);
    let count = children.len();
    for (i, &child) in children.iter().enumerate() {
        write_value(w, adt, child, id, indent, false, i + 1 == count)?;
    }

    pad(w, indent)?;
    if indent > 0 {
        write!(w, "{close}")?;
    } else if !node.is_cfg_mode() {
        writeln!(w, "{close}")?;
    }
    Ok(())
}

/// Print a container node into an allocator-owned string.
pub fn write_string<'a>(alloc: AllocRef<'a>, adt: &Adt<'_>, id: NodeId, indent: i32) -> Option<&'a str> {
    let mut out = AllocWriter::new(alloc);
    write(&mut out, adt, id, indent).ok()?;
    out.into_str()
}

fn pad(w: &mut dyn Write, width: i32) -> io::Result<()> {
    for _ in 0..width.max(0) {
        w.write_all(b" ")?;
    }
    Ok(())
}

fn write_value(
    w: &mut dyn Write,
    adt: &Adt<'_>,
    id: NodeId,
    parent: NodeId,
    indent: i32,
    is_inline: bool,
    is_last: bool,
) -> io::Result<()> {
    let node = adt.node(id);
    let indent = indent + 4;

    if !is_inline {
        pad(w, indent)?;
        if adt.node(parent).kind() != NodeKind::Array {
            let name = node.name().unwrap_or("");
            match node.name_style {
                NameStyle::DoubleQuote => write!(w, "\"{name}\"")?,
                NameStyle::SingleQuote => write!(w, "'{name}'")?,
                NameStyle::NoQuotes => write!(w, "{name}")?,
            }
            match node.assign_style {
                AssignStyle::Colon => write!(w, ": ")?,
                AssignStyle::Equals => {
                    pad(w, i32::from(node.assign_line_width).max(1))?;
                    write!(w, "= ")?;
                }
                AssignStyle::Line => {
                    pad(w, i32::from(node.assign_line_width).max(1))?;
                    write!(w, "| ")?;
                }
            }
        }
    }

    match &node.value {
        Value::String(s) => {
            write!(w, "\"")?;
            write_escaped(w, s, "\"", "\\")?;
            write!(w, "\"")?;
        }
        Value::Multistring(s) => {
            write!(w, "`")?;
            write_escaped(w, s, "`", "\\")?;
            write!(w, "`")?;
        }
        Value::Array(_) => {
            write!(w, "[")?;
            let elements = adt.children(id);
            for (j, &element) in elements.iter().enumerate() {
                let element_indent = if adt.node(element).is_container() { 0 } else { -4 };
                write_value(w, adt, element, id, element_indent, true, true)?;
                if j + 1 < elements.len() {
                    write!(w, ", ")?;
                }
            }
            write!(w, "]")?;
        }
        Value::Integer(..) | Value::Real(..) => {
            print_number(w, node).map_err(io::Error::other)?;
        }
        Value::Object(_) => {
            write(w, adt, id, indent)?;
        }
        Value::Uninit => {}
    }

    if !is_inline {
        match node.delim_style {
            DelimStyle::Comma => {
                if is_last {
                    writeln!(w)?;
                } else {
                    writeln!(w, ",")?;
                }
            }
            DelimStyle::Newline => writeln!(w)?,
            DelimStyle::Line => {
                pad(w, i32::from(node.delim_line_width))?;
                writeln!(w, "|")?;
            }
        }
    }
    Ok(())
}

fn is_assign_char(c: u8) -> bool {
    matches!(c, b':' | b'=' | b'|')
}

fn is_delim_char(c: u8) -> bool {
    matches!(c, b',' | b'|' | b'\n')
}

fn is_escape_letter(c: u8) -> bool {
    matches!(c, b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't')
}

/// A name may contain a backslash only when it starts a recognised escape:
/// an escape letter or a hex digit (unicode escapes).
fn validate_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    for (i, &c) in bytes.iter().enumerate() {
        if c != b'\\' {
            continue;
        }
        match bytes.get(i + 1) {
            Some(&next) if is_escape_letter(next) || next.is_ascii_hexdigit() => {}
            _ => return false,
        }
    }
    true
}

struct Parser<'a> {
    text: &'a str,
    b: &'a [u8],
}

impl<'a> Parser<'a> {
    /// Skip whitespace and comments. With `catch_newline`, stop at a bare
    /// newline so the caller can record it as a pair delimiter.
    fn trim(&self, mut pos: usize, catch_newline: bool) -> usize {
        let b = self.b;
        while pos < b.len() {
            if b[pos..].starts_with(b"//") {
                while pos < b.len() && b[pos] != b'\n' {
                    pos += 1;
                }
            } else if b[pos..].starts_with(b"/*") {
                match self.text[pos + 2..].find("*/") {
                    Some(i) => pos = pos + 2 + i + 2,
                    // Unterminated block comment: surface the slash.
                    None => return pos,
                }
            } else if b[pos] == b'\n' && catch_newline {
                return pos;
            } else if !b[pos].is_ascii_whitespace() {
                return pos;
            } else {
                pos += 1;
            }
        }
        pos
    }

    /// Scan from `start` to the closing `quote`. Backslash escapes protect
    /// the quote only for the escapable set (double quote), matching the
    /// grammar: single quotes and backticks end at the first match.
    fn skip_quoted(&self, start: usize, quote: u8) -> usize {
        let escapable = is_escape_letter(quote);
        let b = self.b;
        let mut i = start;
        while i < b.len() {
            if b[i] == quote && !(escapable && i > start && b[i - 1] == b'\\') {
                return i;
            }
            i += 1;
        }
        i
    }

    /// Parse an object key and its assignment character. Returns the cursor
    /// at the assignment character.
    fn parse_name(&self, adt: &mut Adt<'a>, id: NodeId, pos: usize) -> Result<usize, JsonError> {
        let b = self.b;
        let mut pos = pos;

        let starter = b.get(pos).copied().ok_or(JsonError::InvalidName)?;
        let name;
        let name_style;
        if starter == b'"' || starter == b'\'' {
            let start = pos + 1;
            let end = self.skip_quoted(start, starter);
            if end >= b.len() {
                return Err(JsonError::InvalidName);
            }
            name = &self.text[start..end];
            name_style = if starter == b'"' { NameStyle::DoubleQuote } else { NameStyle::SingleQuote };
            pos = end + 1;
        } else if starter.is_ascii_alphabetic() || starter == b'_' || starter == b'$' {
            let start = pos;
            pos += 1;
            while pos < b.len() && (b[pos].is_ascii_alphanumeric() || b[pos] == b'_') {
                pos += 1;
            }
            name = &self.text[start..pos];
            name_style = NameStyle::NoQuotes;
        } else {
            return Err(JsonError::InvalidName);
        }

        let gap_start = pos;
        pos = self.trim(pos, false);
        let assign = b.get(pos).copied().ok_or(JsonError::InvalidAssignment)?;
        if !is_assign_char(assign) {
            return Err(JsonError::InvalidAssignment);
        }
        if !validate_name(name) {
            return Err(JsonError::InvalidName);
        }

        let node = adt.node_mut(id);
        node.name = Some(name);
        node.name_style = name_style;
        node.assign_line_width = (pos - gap_start).min(255) as u8;
        node.assign_style = match assign {
            b'=' => AssignStyle::Equals,
            b'|' => AssignStyle::Line,
            _ => AssignStyle::Colon,
        };
        Ok(pos)
    }

    fn parse_value(&self, adt: &mut Adt<'a>, id: NodeId, pos: usize) -> Result<usize, JsonError> {
        let b = self.b;
        let c = b.get(pos).copied().ok_or(JsonError::InvalidValue)?;

        if matches!(c, b'"' | b'\'' | b'`') {
            let start = pos + 1;
            let end = self.skip_quoted(start, c);
            if end >= b.len() {
                return Err(JsonError::InvalidValue);
            }
            let s = &self.text[start..end];
            adt.node_mut(id).value = if c == b'`' { Value::Multistring(s) } else { Value::String(s) };
            return Ok(end + 1);
        }

        let next_is_digit = b.get(pos + 1).is_some_and(u8::is_ascii_digit);
        if c.is_ascii_alphabetic() || (c == b'-' && !next_is_digit) {
            return self.parse_keyword(adt, id, pos);
        }

        if c.is_ascii_digit() || matches!(c, b'+' | b'-' | b'.') {
            let end = parse_number(adt.node_mut(id), self.text, pos);
            if adt.node(id).kind() == NodeKind::Uninitialised {
                return Err(JsonError::InvalidValue);
            }
            return Ok(end);
        }

        if matches!(c, b'[' | b'{') {
            let end = self.parse_object(adt, id, pos)?;
            return Ok(end + 1);
        }

        Err(JsonError::InvalidValue)
    }

    fn parse_keyword(&self, adt: &mut Adt<'a>, id: NodeId, pos: usize) -> Result<usize, JsonError> {
        const KEYWORDS: &[(&str, NodeProps, f64)] = &[
            ("true", NodeProps::True, 1.0),
            ("false", NodeProps::False, 0.0),
            ("null", NodeProps::Null, 0.0),
            ("Infinity", NodeProps::Infinity, f64::INFINITY),
            ("-Infinity", NodeProps::InfinityNeg, f64::NEG_INFINITY),
            ("NaN", NodeProps::Nan, f64::NAN),
            ("-NaN", NodeProps::NanNeg, -f64::NAN),
        ];
        let rest = &self.text[pos..];
        for &(word, props, value) in KEYWORDS {
            if rest.starts_with(word) {
                let node = adt.node_mut(id);
                node.value = Value::Real(value, NumberMeta::default());
                node.props = props;
                return Ok(pos + word.len());
            }
        }
        Err(JsonError::UnknownKeyword)
    }

    /// Parse an object body (or, when the opener turns out to be `[`, an
    /// array). Returns the cursor at the closing bracket, or at end of
    /// input for a config-mode document.
    fn parse_object(&self, adt: &mut Adt<'a>, id: NodeId, pos: usize) -> Result<usize, JsonError> {
        let b = self.b;
        let mut pos = self.trim(pos, false);

        if pos < b.len() && b[pos] == b'{' {
            pos += 1;
        } else if pos < b.len() && b[pos] == b'[' {
            pos += 1;
            return self.parse_array(adt, id, pos);
        }

        let alloc = adt.allocator();
        adt.node_mut(id).value = Value::Object(AVec::new(alloc));

        loop {
            pos = self.trim(pos, false);
            if pos >= b.len() {
                return Ok(pos);
            }
            match b[pos] {
                b'}' => return Ok(pos),
                b']' => return Err(JsonError::ObjectEndPairMismatched),
                _ => {}
            }

            let child = adt.alloc_node(id).ok_or(JsonError::OutOfMemory)?;
            pos = self.parse_name(adt, child, pos)?;
            pos = self.trim(pos + 1, false);
            pos = self.parse_value(adt, child, pos)?;

            let value_end = pos;
            pos = self.trim(pos, true);
            if pos < b.len() && is_delim_char(b[pos]) {
                let node = adt.node_mut(child);
                node.delim_style = match b[pos] {
                    b'\n' => DelimStyle::Newline,
                    b'|' => {
                        node.delim_line_width = (pos - value_end).min(255) as u8;
                        DelimStyle::Line
                    }
                    _ => DelimStyle::Comma,
                };
                pos += 1;
            }
            pos = self.trim(pos, false);
        }
    }

    fn parse_array(&self, adt: &mut Adt<'a>, id: NodeId, pos: usize) -> Result<usize, JsonError> {
        let b = self.b;
        let alloc = adt.allocator();
        adt.node_mut(id).value = Value::Array(AVec::new(alloc));

        let mut pos = pos;
        loop {
            pos = self.trim(pos, false);
            if pos >= b.len() {
                return Err(JsonError::Internal);
            }
            if b[pos] == b']' {
                return Ok(pos);
            }

            let element = adt.alloc_node(id).ok_or(JsonError::OutOfMemory)?;
            pos = self.parse_value(adt, element, pos)?;

            pos = self.trim(pos, false);
            if pos >= b.len() {
                return Err(JsonError::Internal);
            }
            match b[pos] {
                b',' => pos += 1,
                b']' => return Ok(pos),
                _ => return Err(JsonError::ArrayLeftOpen),
            }
        }
    }
}
