//! Owned and borrowed document handles (§3.3 / §3.4).

use crate::iter::DocumentIterator;
use bson_core::buffer::Buffer;
use bson_core::error::BsonError;
use bson_core::io::read_i32_le;

/// The 5-byte wire form of an empty document: length `5`, no elements,
/// terminating `0x00`.
pub(crate) const EMPTY_DOC_SKELETON: [u8; 5] = [5, 0, 0, 0, 0];

/// Check that `bytes` could plausibly be a complete document: at least 5
/// bytes, a length prefix matching `bytes.len()` exactly, and a `0x00`
/// terminator in the last position. Does not look at the elements in
/// between — that's what [`DocumentIterator`] is for.
pub(crate) fn validate_header(bytes: &[u8]) -> Result<(), BsonError> {
    if bytes.len() < 5 {
        return Err(BsonError::InvalidBuffer { reason: "document shorter than the minimum 5-byte skeleton" });
    }
    let declared = read_i32_le(bytes);
    if declared < 5 || declared as usize != bytes.len() {
        return Err(BsonError::InvalidBuffer { reason: "length prefix does not match buffer size" });
    }
    if bytes[bytes.len() - 1] != 0 {
        return Err(BsonError::InvalidBuffer { reason: "missing terminating nul byte" });
    }
    Ok(())
}

/// A read-only view over document bytes owned by someone else — a static
/// byte slice, a memory-mapped file, bytes borrowed out of another
/// document's buffer. Construction is the only place header validity is
/// checked; this is also what a [`crate::visitor::Visitor`] receives for a
/// nested sub-document or array, except there construction is infallible
/// (decoding already bounds-checked the slice against its parent) and
/// validity of the nested header is deferred to [`DocumentView::iter`].
#[derive(Debug, Clone, Copy)]
pub struct DocumentView<'a> {
    bytes: &'a [u8],
    base_offset: usize,
}

impl<'a> DocumentView<'a> {
    /// Wrap a standalone, independently-owned byte slice as a document
    /// view, checking its header.
    pub fn from_static(bytes: &'a [u8]) -> Result<Self, BsonError> {
        validate_header(bytes)?;
        Ok(Self { bytes, base_offset: 0 })
    }

    /// Wrap bytes already known (by the caller) to be a length-bounded
    /// embedded document, without re-checking the header. `base_offset` is
    /// this view's absolute position within whatever root document it was
    /// decoded from, so that elements iterated from it report absolute
    /// offsets.
    pub(crate) fn from_embedded(bytes: &'a [u8], base_offset: usize) -> Self {
        Self { bytes, base_offset }
    }

    /// The view's raw bytes, including its own length prefix and
    /// terminator.
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Length in bytes, as recorded in the document's own length prefix.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if this is the 5-byte empty-document skeleton.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.len() == 5
    }

    /// Iterate the view's top-level elements. Fails if the header itself
    /// (length prefix, terminator) is invalid; per-element corruption
    /// surfaces through [`DocumentIterator::corrupt_reason`] instead.
    pub fn iter(&self) -> Result<DocumentIterator<'a>, BsonError> {
        DocumentIterator::with_base(self.bytes, self.base_offset)
    }
}

/// An owned, independently-growable document. Produced by
/// [`crate::builder::DocumentBuilder::finish`], or built directly from
/// already-encoded bytes with [`Document::from_bytes`].
#[derive(Debug, Clone)]
pub struct Document {
    buffer: Buffer,
}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

impl Document {
    /// The empty document: 5 bytes, zero elements.
    #[must_use]
    pub fn empty() -> Self {
        let mut buffer = Buffer::new();
        buffer.grow_to(5).expect("5 bytes always fits inline");
        buffer.as_mut_slice().copy_from_slice(&EMPTY_DOC_SKELETON);
        Self { buffer }
    }

    /// Take ownership of pre-encoded bytes, checking the header.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, BsonError> {
        validate_header(&bytes)?;
        let mut buffer = Buffer::with_capacity(bytes.len());
        buffer.grow_to(bytes.len())?;
        buffer.as_mut_slice().copy_from_slice(&bytes);
        Ok(Self { buffer })
    }

    /// The document's raw bytes, including its own length prefix and
    /// terminator.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    /// Length in bytes, as recorded in the document's own length prefix.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True if this is the 5-byte empty-document skeleton.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.len() == 5
    }

    /// Count of top-level elements. Stops early (returning the count so
    /// far) if the document turns out to be corrupt.
    #[must_use]
    pub fn count_fields(&self) -> usize {
        self.iter().count()
    }

    /// Iterate the document's top-level elements.
    #[must_use]
    pub fn iter(&self) -> DocumentIterator<'_> {
        DocumentIterator::with_base(self.as_bytes(), 0).expect("header already validated at construction")
    }

    /// Borrow this document as a [`DocumentView`].
    #[must_use]
    pub fn as_view(&self) -> DocumentView<'_> {
        DocumentView { bytes: self.as_bytes(), base_offset: 0 }
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Document {}

impl PartialOrd for Document {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Document {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        crate::compare::compare(self.as_bytes(), other.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_five_bytes() {
        let doc = Document::empty();
        assert_eq!(doc.len(), 5);
        assert!(doc.is_empty());
        assert_eq!(doc.count_fields(), 0);
    }

    #[test]
    fn from_bytes_rejects_short_buffers() {
        assert!(Document::from_bytes(vec![1, 2, 3]).is_err());
    }

    #[test]
    fn from_bytes_rejects_mismatched_length() {
        let mut bytes = EMPTY_DOC_SKELETON.to_vec();
        bytes[0] = 9;
        assert!(Document::from_bytes(bytes).is_err());
    }
}
