use std::fmt;

/// Errors surfaced by the buffer/storage layer.
///
/// This is the typed replacement for the source library's "abort on
/// overflow, silently no-op on read-only append" behavior: every failure
/// mode here is a `Result` the caller can inspect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum BsonError {
    /// Growing the buffer would require more than `i32::MAX` bytes.
    #[error("requested buffer size {requested} exceeds the maximum document size")]
    CapacityExceeded {
        /// The size that was requested, in bytes.
        requested: usize,
    },

    /// An append was attempted against a buffer that cannot grow.
    #[error("cannot append to a read-only buffer")]
    ReadOnly,

    /// The bytes handed to a constructor do not form a well-formed BSON
    /// document header (length prefix / terminator mismatch).
    #[error("invalid document buffer: {reason}")]
    InvalidBuffer {
        /// Human-readable description of what failed to validate.
        reason: &'static str,
    },
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BufferKind::Inline => "inline",
            BufferKind::Heap => "heap",
            BufferKind::Writer => "writer",
        };
        write!(f, "{name}")
    }
}

/// Which storage binding a [`crate::buffer::Buffer`] currently uses.
///
/// Exposed for diagnostics (logging, `Debug` impls) rather than as part of
/// the append contract itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// Small fixed-capacity array embedded in the buffer itself.
    Inline,
    /// Heap-allocated, grown by doubling.
    Heap,
    /// Externally managed via an [`crate::buffer::ExternalBuffer`].
    Writer,
}
