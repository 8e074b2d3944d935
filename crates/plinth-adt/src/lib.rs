//! Allocator-backed tagged document tree with JSON5 and CSV front-ends.
//!
//! The tree ([`Adt`]) owns its nodes through a plinth allocator; nodes are
//! addressed by [`NodeId`] and keep parent back-references, so moving,
//! swapping, and removing subtrees preserves node identity. Scalar nodes
//! carry exact-print metadata (quoting style, assignment and delimiter
//! characters, number spelling), so a parsed document prints back with its
//! formatting intact wherever the grammar permits.
//!
//! # Example
//!
//! ```
//! use plinth_alloc::Heap;
//! use plinth_adt::{json, Adt};
//!
//! let heap = Heap::new();
//! let mut adt = Adt::new(&heap);
//!
//! let text = "{ a: 1, b: [true, 'x', 0x10] }";
//! let root = json::parse(&mut adt, text).unwrap();
//!
//! let hex = adt.query(root, "b/2").unwrap();
//! assert_eq!(adt.node(hex).as_integer(), Some(16));
//! ```

pub mod csv;
pub mod json;

mod error;
mod node;
mod number;
mod print;
mod tree;

pub use error::{AdtError, CsvError, JsonError};
pub use node::{
    AssignStyle, DelimStyle, NameStyle, Node, NodeId, NodeKind, NodeProps, NumberMeta, Value,
};
pub use number::print_number;
pub use print::{print_string, AllocWriter};
pub use tree::Adt;
