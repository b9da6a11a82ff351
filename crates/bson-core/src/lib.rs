//! bson-core — storage primitives shared by the `bson` crate.
//!
//! Provides:
//! - [`buffer::Buffer`], the four-way growable byte store (inline / heap /
//!   writer) backing a document builder.
//! - [`io`], little-endian encode/decode helpers used by the appender and
//!   the iterator.
//! - [`error::BsonError`], the typed failure modes of the storage layer.

#![deny(missing_docs)]

pub mod buffer;
pub mod error;
pub mod io;

pub use buffer::{Buffer, ExternalBuffer, INLINE_CAPACITY};
pub use error::{BsonError, BufferKind};

/// Common result alias for the storage layer.
pub type Result<T> = std::result::Result<T, BsonError>;

/// Convenient re-exports for callers that just want the essentials.
pub mod prelude {
    /// Re-exported essentials.
    pub use crate::{buffer::Buffer, error::BsonError, Result};
}
