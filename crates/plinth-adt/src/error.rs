use thiserror::Error;

/// Error types for tree-level operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdtError {
    /// Inconsistent internal state.
    #[error("internal error")]
    Internal,
    /// The node already holds a parsed number.
    #[error("node is already converted to a number")]
    AlreadyConverted,
    /// The operation does not apply to this node kind.
    #[error("operation does not apply to this node type")]
    InvalidType,
    /// The backing allocator is exhausted.
    #[error("out of memory")]
    OutOfMemory,
}

/// Error types surfaced by the JSON5 parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum JsonError {
    /// Inconsistent internal state (unexpected end of input mid-container).
    #[error("internal parser error")]
    Internal,
    /// An object key failed validation.
    #[error("invalid name")]
    InvalidName,
    /// A value could not be parsed.
    #[error("invalid value")]
    InvalidValue,
    /// A key was not followed by an assignment character.
    #[error("invalid assignment")]
    InvalidAssignment,
    /// A bare word that is not a recognised keyword.
    #[error("unknown keyword")]
    UnknownKeyword,
    /// An array was closed by something other than `]`.
    #[error("array left open")]
    ArrayLeftOpen,
    /// A container was closed with the wrong bracket.
    #[error("mismatched object end pair")]
    ObjectEndPairMismatched,
    /// The backing allocator is exhausted.
    #[error("out of memory")]
    OutOfMemory,
}

/// Error types surfaced by the CSV parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CsvError {
    /// Inconsistent input, e.g. garbage after a closing quote.
    #[error("internal parser error")]
    Internal,
    /// The input ended inside a quoted field, or was empty.
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,
    /// A row's column count differs from the first row's.
    #[error("mismatched rows")]
    MismatchedRows,
    /// The backing allocator is exhausted.
    #[error("out of memory")]
    OutOfMemory,
}
