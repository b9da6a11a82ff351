//! The document builder (§4.1 / §4.2): a single-owner cursor over a
//! growable buffer, with an explicit frame stack standing in for the
//! source library's parent-pointer child-document aliasing.
//!
//! Only the innermost open frame (the document itself, or the deepest
//! `start_document`/`start_array` not yet matched by an `end_*`) may ever
//! be appended to. Because the builder holds `&mut self` for every
//! operation, Rust's borrow checker enforces this statically: there is no
//! way to reach an outer frame's appender while an inner one is live,
//! which is exactly the invariant the source's runtime aliasing checks
//! existed to protect.

use crate::document::Document;
use crate::error::BuilderError;
use crate::element_type::ElementType;
use bson_core::buffer::{Buffer, ExternalBuffer};
use bson_core::io::{read_u32_le, write_f64_le, write_i32_le, write_i64_le, write_u32_le, write_u64_le};

const EMPTY_DOC_SKELETON: [u8; 5] = [5, 0, 0, 0, 0];

/// A `start_document`/`start_array` not yet closed by a matching `end_*`.
/// Carries just enough to find its own length prefix again: the absolute
/// byte offset where it begins.
#[derive(Debug, Clone, Copy)]
struct Frame {
    offset: usize,
}

/// Builds a document by repeated appends, growing its backing [`Buffer`]
/// as needed and re-stamping every open ancestor's length prefix on each
/// append.
#[derive(Debug)]
pub struct DocumentBuilder {
    buffer: Buffer,
    open: Vec<Frame>,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBuilder {
    /// A builder starting from the empty document.
    #[must_use]
    pub fn new() -> Self {
        let mut buffer = Buffer::new();
        buffer.grow_to(5).expect("5 bytes always fits inline");
        buffer.as_mut_slice().copy_from_slice(&EMPTY_DOC_SKELETON);
        Self { buffer, open: Vec::new() }
    }

    /// A builder pre-sized to hold at least `capacity` bytes without an
    /// intermediate reallocation.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut buffer = Buffer::with_capacity(capacity.max(5));
        buffer.grow_to(5).expect("5 bytes always fits in any non-degenerate capacity");
        buffer.as_mut_slice().copy_from_slice(&EMPTY_DOC_SKELETON);
        Self { buffer, open: Vec::new() }
    }

    /// A builder that writes into caller-managed storage instead of an
    /// internal `Vec`, for callers who already own an arena or a
    /// memory-mapped region to grow into.
    pub fn from_external(external: Box<dyn ExternalBuffer>) -> Result<Self, BuilderError> {
        let mut buffer = Buffer::from_external(external);
        buffer.grow_to(5).map_err(BuilderError::Storage)?;
        buffer.as_mut_slice().copy_from_slice(&EMPTY_DOC_SKELETON);
        Ok(Self { buffer, open: Vec::new() })
    }

    /// How many `start_document`/`start_array` frames are currently open.
    #[must_use]
    pub fn open_frames(&self) -> usize {
        self.open.len()
    }

    /// Finish building, rejecting the call if any `start_document`/
    /// `start_array` is still unmatched by an `end_*`.
    pub fn finish(self) -> Result<Document, BuilderError> {
        if !self.open.is_empty() {
            return Err(BuilderError::UnfinishedFrames { open: self.open.len() });
        }
        Document::from_bytes(self.buffer.as_slice().to_vec()).map_err(BuilderError::Storage)
    }

    /// The document's bytes so far, including any not-yet-closed
    /// sub-documents (which will show as empty `{}` until their `end_*`).
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    fn check_key(key: &str) -> Result<(), BuilderError> {
        if key.as_bytes().contains(&0) {
            return Err(BuilderError::InvalidKey);
        }
        Ok(())
    }

    /// Append a type-tagged element to the innermost open frame, growing
    /// the buffer by exactly `1 (tag) + key.len() + 1 (nul) + payload.len()`
    /// bytes and re-stamping every open ancestor's length prefix (root
    /// included) by that amount.
    fn append_raw(&mut self, key: &str, element_type: ElementType, payload: &[u8]) -> Result<(), BuilderError> {
        Self::check_key(key)?;
        let key_bytes = key.as_bytes();
        let total_insert = 1 + key_bytes.len() + 1 + payload.len();

        let old_len = self.buffer.len();
        let new_len = old_len + total_insert;
        self.buffer.grow_to(new_len)?;

        let start = old_len - 1; // overwrite the frame's current terminator
        {
            let buf = self.buffer.as_mut_slice();
            buf[start] = element_type.tag();
            let key_start = start + 1;
            buf[key_start..key_start + key_bytes.len()].copy_from_slice(key_bytes);
            buf[key_start + key_bytes.len()] = 0;
            let payload_start = key_start + key_bytes.len() + 1;
            buf[payload_start..payload_start + payload.len()].copy_from_slice(payload);
            buf[new_len - 1] = 0; // terminator
        }

        self.restamp(total_insert);
        Ok(())
    }

    /// Add `delta` to every open ancestor's length prefix (root included)
    /// and rewrite that ancestor's terminator byte to sit at its new end.
    fn restamp(&mut self, delta: usize) {
        let offsets = std::iter::once(0).chain(self.open.iter().map(|f| f.offset));
        let buf = self.buffer.as_mut_slice();
        for off in offsets {
            let old_len = read_u32_le(&buf[off..]) as usize;
            let new_len = old_len + delta;
            write_u32_le(&mut buf[off..], new_len as u32);
            buf[off + new_len - 1] = 0;
        }
    }

    fn start_nested(&mut self, key: &str, element_type: ElementType) -> Result<(), BuilderError> {
        self.append_raw(key, element_type, &EMPTY_DOC_SKELETON)?;
        let new_len = self.buffer.len();
        let child_offset = new_len - 5;
        self.open.push(Frame { offset: child_offset });
        Ok(())
    }

    fn end_nested(&mut self) -> Result<(), BuilderError> {
        let Some(frame) = self.open.pop() else {
            return Err(BuilderError::NoOpenFrame);
        };
        #[cfg(feature = "tracing")]
        tracing::trace!(frame_offset = frame.offset, remaining_open = self.open.len(), "closed bson builder frame");
        #[cfg(not(feature = "tracing"))]
        let _ = frame;
        // Defensive re-normalization: every ancestor was already kept
        // consistent on each append, so this adds nothing, but it mirrors
        // the source's `end` step and guards against any future append
        // path that forgets to restamp.
        self.restamp(0);
        Ok(())
    }

    /// Open a nested sub-document under `key`. Must be matched by
    /// [`DocumentBuilder::end_document`] before [`DocumentBuilder::finish`]
    /// or before any sibling append at the enclosing level.
    pub fn start_document(&mut self, key: &str) -> Result<(), BuilderError> {
        self.start_nested(key, ElementType::Document)
    }

    /// Close the innermost open sub-document.
    pub fn end_document(&mut self) -> Result<(), BuilderError> {
        self.end_nested()
    }

    /// Open a nested array under `key`. Conventionally, elements appended
    /// before the matching `end_array` should use decimal-string keys
    /// (`"0"`, `"1"`, ...), but the builder does not enforce this.
    pub fn start_array(&mut self, key: &str) -> Result<(), BuilderError> {
        self.start_nested(key, ElementType::Array)
    }

    /// Close the innermost open array.
    pub fn end_array(&mut self) -> Result<(), BuilderError> {
        self.end_nested()
    }

    /// `0x01`
    pub fn append_double(&mut self, key: &str, value: f64) -> Result<(), BuilderError> {
        let mut payload = [0u8; 8];
        write_f64_le(&mut payload, value);
        self.append_raw(key, ElementType::Double, &payload)
    }

    /// `0x02`
    pub fn append_str(&mut self, key: &str, value: &str) -> Result<(), BuilderError> {
        self.append_cstring_field(key, ElementType::Utf8, value.as_bytes())
    }

    fn append_cstring_field(&mut self, key: &str, element_type: ElementType, bytes: &[u8]) -> Result<(), BuilderError> {
        let len = bytes.len() + 1;
        let mut payload = Vec::with_capacity(4 + len);
        payload.extend_from_slice(&(len as i32).to_le_bytes());
        payload.extend_from_slice(bytes);
        payload.push(0);
        self.append_raw(key, element_type, &payload)
    }

    /// `0x05`
    pub fn append_binary(&mut self, key: &str, subtype: u8, data: &[u8]) -> Result<(), BuilderError> {
        let mut payload = Vec::with_capacity(5 + data.len());
        payload.extend_from_slice(&(data.len() as i32).to_le_bytes());
        payload.push(subtype);
        payload.extend_from_slice(data);
        self.append_raw(key, ElementType::Binary, &payload)
    }

    /// `0x06`
    pub fn append_undefined(&mut self, key: &str) -> Result<(), BuilderError> {
        self.append_raw(key, ElementType::Undefined, &[])
    }

    /// `0x07`
    pub fn append_object_id(&mut self, key: &str, oid: [u8; 12]) -> Result<(), BuilderError> {
        self.append_raw(key, ElementType::ObjectId, &oid)
    }

    /// `0x08`
    pub fn append_bool(&mut self, key: &str, value: bool) -> Result<(), BuilderError> {
        self.append_raw(key, ElementType::Bool, &[u8::from(value)])
    }

    /// `0x09` — milliseconds since the Unix epoch.
    pub fn append_datetime(&mut self, key: &str, millis_since_epoch: i64) -> Result<(), BuilderError> {
        let mut payload = [0u8; 8];
        write_i64_le(&mut payload, millis_since_epoch);
        self.append_raw(key, ElementType::DateTime, &payload)
    }

    /// `0x0A`
    pub fn append_null(&mut self, key: &str) -> Result<(), BuilderError> {
        self.append_raw(key, ElementType::Null, &[])
    }

    /// `0x0B`
    pub fn append_regex(&mut self, key: &str, pattern: &str, options: &str) -> Result<(), BuilderError> {
        if pattern.as_bytes().contains(&0) || options.as_bytes().contains(&0) {
            return Err(BuilderError::InvalidKey);
        }
        let mut payload = Vec::with_capacity(pattern.len() + options.len() + 2);
        payload.extend_from_slice(pattern.as_bytes());
        payload.push(0);
        payload.extend_from_slice(options.as_bytes());
        payload.push(0);
        self.append_raw(key, ElementType::Regex, &payload)
    }

    /// `0x0C`
    pub fn append_db_pointer(&mut self, key: &str, collection: &str, oid: [u8; 12]) -> Result<(), BuilderError> {
        let len = collection.len() + 1;
        let mut payload = Vec::with_capacity(4 + len + 12);
        payload.extend_from_slice(&(len as i32).to_le_bytes());
        payload.extend_from_slice(collection.as_bytes());
        payload.push(0);
        payload.extend_from_slice(&oid);
        self.append_raw(key, ElementType::DbPointer, &payload)
    }

    /// `0x0D`
    pub fn append_code(&mut self, key: &str, source: &str) -> Result<(), BuilderError> {
        self.append_cstring_field(key, ElementType::Code, source.as_bytes())
    }

    /// `0x0E`
    pub fn append_symbol(&mut self, key: &str, symbol: &str) -> Result<(), BuilderError> {
        self.append_cstring_field(key, ElementType::Symbol, symbol.as_bytes())
    }

    /// `0x0F` — unlike some legacy renderers that drop the scope document
    /// entirely, nothing here discards it: `scope` must already be
    /// complete, valid document bytes (e.g. from [`Document::as_bytes`]).
    pub fn append_code_with_scope(&mut self, key: &str, source: &str, scope: &[u8]) -> Result<(), BuilderError> {
        let code_len = source.len() + 1;
        // `total` is self-inclusive: its own 4 bytes, the 4-byte `code_len`
        // field, the code string, and the scope document.
        let total_len = 8 + code_len + scope.len();
        let mut payload = Vec::with_capacity(total_len);
        payload.extend_from_slice(&(total_len as i32).to_le_bytes());
        payload.extend_from_slice(&(code_len as i32).to_le_bytes());
        payload.extend_from_slice(source.as_bytes());
        payload.push(0);
        payload.extend_from_slice(scope);
        self.append_raw(key, ElementType::CodeWithScope, &payload)
    }

    /// `0x10`
    pub fn append_i32(&mut self, key: &str, value: i32) -> Result<(), BuilderError> {
        let mut payload = [0u8; 4];
        write_i32_le(&mut payload, value);
        self.append_raw(key, ElementType::Int32, &payload)
    }

    /// `0x11` — packed as a little-endian `u64` with `seconds` in the high
    /// 32 bits and `increment` in the low 32 bits.
    pub fn append_timestamp(&mut self, key: &str, seconds: u32, increment: u32) -> Result<(), BuilderError> {
        let value = (u64::from(seconds) << 32) | u64::from(increment);
        let mut payload = [0u8; 8];
        write_u64_le(&mut payload, value);
        self.append_raw(key, ElementType::Timestamp, &payload)
    }

    /// `0x12`
    pub fn append_i64(&mut self, key: &str, value: i64) -> Result<(), BuilderError> {
        let mut payload = [0u8; 8];
        write_i64_le(&mut payload, value);
        self.append_raw(key, ElementType::Int64, &payload)
    }

    /// `0x7F`
    pub fn append_min_key(&mut self, key: &str) -> Result<(), BuilderError> {
        self.append_raw(key, ElementType::MinKey, &[])
    }

    /// `0xFF`
    pub fn append_max_key(&mut self, key: &str) -> Result<(), BuilderError> {
        self.append_raw(key, ElementType::MaxKey, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iter::{DocumentIterator, RawValue};
    use bson_core::error::BsonError;

    /// A fixed-capacity `Vec`-backed external buffer, standing in for an
    /// arena or memory-mapped region a caller might grow into.
    #[derive(Debug)]
    struct VecExternalBuffer {
        data: Vec<u8>,
        capacity: usize,
    }

    impl ExternalBuffer for VecExternalBuffer {
        fn len(&self) -> usize {
            self.data.len()
        }

        fn as_slice(&self) -> &[u8] {
            &self.data
        }

        fn as_mut_slice(&mut self) -> &mut [u8] {
            &mut self.data
        }

        fn grow_to(&mut self, new_len: usize) -> Result<(), BsonError> {
            if new_len > self.capacity {
                return Err(BsonError::CapacityExceeded { requested: new_len });
            }
            self.data.resize(new_len, 0);
            Ok(())
        }
    }

    #[test]
    fn empty_document_is_five_bytes() {
        let b = DocumentBuilder::new();
        assert_eq!(b.as_bytes(), &EMPTY_DOC_SKELETON);
    }

    #[test]
    fn one_int32_layout_matches_wire_format() {
        let mut b = DocumentBuilder::new();
        b.append_i32("x", 42).unwrap();
        let doc = b.finish().unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&14i32.to_le_bytes());
        expected.push(0x10);
        expected.extend_from_slice(b"x\0");
        expected.extend_from_slice(&42i32.to_le_bytes());
        expected.push(0);
        assert_eq!(doc.as_bytes(), expected.as_slice());
    }

    #[test]
    fn nested_sub_document_round_trips() {
        let mut b = DocumentBuilder::new();
        b.start_document("inner").unwrap();
        b.append_i32("x", 1).unwrap();
        b.end_document().unwrap();
        let doc = b.finish().unwrap();

        let mut iter = DocumentIterator::new(doc.as_bytes()).unwrap();
        let element = iter.next().unwrap();
        assert_eq!(element.key_bytes(), b"inner");
        match element.value() {
            RawValue::Document(view) => {
                let mut inner_iter = view.iter().unwrap();
                let inner = inner_iter.next().unwrap();
                assert_eq!(inner.key_bytes(), b"x");
                assert!(matches!(inner.value(), RawValue::Int32(1)));
                assert!(inner_iter.next().is_none());
            }
            other => panic!("expected a document, got {other:?}"),
        }
    }

    #[test]
    fn finish_rejects_unclosed_frame() {
        let mut b = DocumentBuilder::new();
        b.start_document("inner").unwrap();
        assert!(matches!(b.finish(), Err(BuilderError::UnfinishedFrames { open: 1 })));
    }

    #[test]
    fn end_document_without_start_is_rejected() {
        let mut b = DocumentBuilder::new();
        assert!(matches!(b.end_document(), Err(BuilderError::NoOpenFrame)));
    }

    #[test]
    fn rejects_key_with_embedded_nul() {
        let mut b = DocumentBuilder::new();
        assert!(matches!(b.append_i32("a\0b", 1), Err(BuilderError::InvalidKey)));
    }

    #[test]
    fn code_with_scope_round_trips_and_leaves_cursor_on_the_next_sibling() {
        let mut scope_builder = DocumentBuilder::new();
        scope_builder.append_i32("y", 1).unwrap();
        let scope = scope_builder.finish().unwrap();

        let mut b = DocumentBuilder::new();
        b.append_code_with_scope("fn", "x", scope.as_bytes()).unwrap();
        b.append_i32("after", 7).unwrap();
        let doc = b.finish().unwrap();

        let mut iter = DocumentIterator::new(doc.as_bytes()).unwrap();
        let first = iter.next().unwrap();
        assert_eq!(first.key_bytes(), b"fn");
        match first.value() {
            RawValue::CodeWithScope { code, scope: view } => {
                assert_eq!(code, b"x");
                assert_eq!(view.as_bytes(), scope.as_bytes());
                let mut scope_iter = view.iter().unwrap();
                let field = scope_iter.next().unwrap();
                assert_eq!(field.key_bytes(), b"y");
                assert!(matches!(field.value(), RawValue::Int32(1)));
                assert!(scope_iter.next().is_none());
            }
            other => panic!("expected code_w_scope, got {other:?}"),
        }

        let second = iter.next().expect("sibling field after code_w_scope");
        assert_eq!(second.key_bytes(), b"after");
        assert!(matches!(second.value(), RawValue::Int32(7)));
        assert!(iter.next().is_none());
        assert!(iter.corrupt_reason().is_none());
    }

    #[test]
    fn builds_into_caller_supplied_external_buffer() {
        let external = VecExternalBuffer { data: Vec::new(), capacity: 256 };
        let mut b = DocumentBuilder::from_external(Box::new(external)).unwrap();
        b.append_i32("x", 42).unwrap();
        let doc = b.finish().unwrap();

        let mut iter = DocumentIterator::new(doc.as_bytes()).unwrap();
        let element = iter.next().unwrap();
        assert_eq!(element.key_bytes(), b"x");
        assert!(matches!(element.value(), RawValue::Int32(42)));
    }

    #[test]
    fn external_buffer_capacity_exhaustion_is_a_typed_error() {
        let external = VecExternalBuffer { data: Vec::new(), capacity: 5 };
        let mut b = DocumentBuilder::from_external(Box::new(external)).unwrap();
        assert!(matches!(b.append_i32("x", 1), Err(BuilderError::Storage(BsonError::CapacityExceeded { .. }))));
    }
}
