//! Error types specific to document semantics: malformed wire bytes,
//! validation failures, and builder misuse. Storage-level failures
//! ([`BsonError`]) come from `bson-core` and are re-exported here.

pub use bson_core::{BsonError, ExternalBuffer};

/// Why a [`crate::iter::DocumentIterator`] stopped before reaching the
/// terminating `0x00`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorruptReason {
    /// The type tag byte did not match any known [`crate::ElementType`].
    #[error("unknown element type tag 0x{0:02X}")]
    UnknownType(u8),
    /// The element's key ran off the end of the buffer without a nul.
    #[error("unterminated key")]
    UnterminatedKey,
    /// A length-prefixed field claimed more bytes than remain in the buffer.
    #[error("{field} length {needed} exceeds {remaining} remaining byte(s)")]
    LengthOverrun {
        /// Name of the field being decoded, e.g. `"utf8"` or `"binary"`.
        field: &'static str,
        /// Bytes the field claimed to need.
        needed: usize,
        /// Bytes actually left in the buffer.
        remaining: usize,
    },
    /// A length-prefixed field declared a negative or otherwise
    /// nonsensical size.
    #[error("{field} declared an invalid length {declared}")]
    InvalidLength {
        /// Name of the field being decoded.
        field: &'static str,
        /// The raw (invalid) length value read from the buffer.
        declared: i64,
    },
    /// A string field's payload was not nul-terminated where one was
    /// required.
    #[error("{field} is missing its terminating nul byte")]
    MissingTerminator {
        /// Name of the field being decoded.
        field: &'static str,
    },
}

/// A corrupt document, with the byte offset of the element where
/// corruption was first detected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("corrupt bson document at offset {offset}: {reason}")]
pub struct BsonCorruption {
    /// Absolute byte offset (from the start of the root document) of the
    /// element whose tag byte could not be parsed.
    pub offset: usize,
    /// What went wrong.
    pub reason: CorruptReason,
}

/// Why [`crate::validate::validate`] rejected a structurally sound document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationReason {
    /// A key began with `$`, forbidden under [`crate::validate::ValidationFlags::reject_dollar_keys`].
    #[error("key starts with '$'")]
    DollarKey,
    /// A key contained `.`, forbidden under [`crate::validate::ValidationFlags::reject_dot_keys`].
    #[error("key contains '.'")]
    DotKey,
    /// A UTF-8 field's payload was not valid UTF-8.
    #[error("invalid utf-8 in {field}")]
    InvalidUtf8 {
        /// Name of the field that failed to decode, e.g. `"key"` or `"utf8 value"`.
        field: &'static str,
    },
}

/// A semantically invalid document, with the absolute byte offset of the
/// innermost element that violated a validation rule.
///
/// Reporting the innermost offset (rather than conflating it with the
/// offset of the enclosing sub-document, as parent-pointer implementations
/// tend to) makes it possible to point a caller directly at the offending
/// byte even when the violation is several levels of nesting deep.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid bson document at offset {offset}: {reason}")]
pub struct ValidationError {
    /// Absolute byte offset of the offending element.
    pub offset: usize,
    /// Which rule it violated.
    pub reason: ValidationReason,
}

/// Everything that can stop [`crate::validate::validate`]: either the
/// bytes are not even a well-formed document, or they are well-formed but
/// semantically invalid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidateError {
    /// The input was not a structurally sound document at all.
    #[error(transparent)]
    Malformed(#[from] BsonCorruption),
    /// The header (length prefix / terminator) itself was invalid.
    #[error(transparent)]
    InvalidHeader(#[from] BsonError),
    /// The document parsed cleanly but violated a semantic rule.
    #[error(transparent)]
    Semantic(#[from] ValidationError),
}

/// Everything that can stop [`crate::json::to_json`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// The input was not a structurally sound document at all.
    #[error(transparent)]
    Corrupt(#[from] BsonCorruption),
    /// The header (length prefix / terminator) itself was invalid.
    #[error(transparent)]
    InvalidHeader(#[from] BsonError),
}

/// Why a [`crate::builder::DocumentBuilder`] operation was rejected.
#[derive(Debug, thiserror::Error)]
pub enum BuilderError {
    /// The underlying buffer could not satisfy the append.
    #[error(transparent)]
    Storage(#[from] BsonError),
    /// `finish()` was called while one or more `start_document`/`start_array`
    /// frames were still open.
    #[error("cannot finish a builder with {open} unfinished sub-document/array frame(s)")]
    UnfinishedFrames {
        /// Number of frames still open.
        open: usize,
    },
    /// `end_document`/`end_array` was called with nothing open.
    #[error("end_document/end_array called with no open frame")]
    NoOpenFrame,
    /// An append key contained an embedded nul byte, which cannot be
    /// represented as a BSON cstring key.
    #[error("key contains an embedded nul byte")]
    InvalidKey,
}
