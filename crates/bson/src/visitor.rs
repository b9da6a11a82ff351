//! Visitor-dispatch traversal (§4.4): a single walk over a document's
//! elements that both [`crate::validate::validate`] and
//! [`crate::json::to_json`] are built on top of.

use crate::document::DocumentView;
use crate::element_type::ElementType;
use crate::error::BsonError;
use crate::iter::{DocumentIterator, RawValue};

/// Whether traversal should keep going after a callback returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep visiting subsequent elements.
    Continue,
    /// Stop immediately; no further callbacks fire for this document.
    Stop,
}

/// A traversal callback. Every method defaults to a no-op returning
/// [`Flow::Continue`]; implementors override only the ones they care
/// about. `before`/`after` bracket every element regardless of type;
/// the `visit_*` methods fire once per element, dispatched on its type.
///
/// All offsets and byte slices passed to these methods are absolute and
/// borrowed directly from the document being walked — no copies are made
/// on your behalf.
pub trait Visitor {
    /// Called before an element's type-specific `visit_*` callback.
    fn before(&mut self, _offset: usize, _key: &[u8], _element_type: ElementType) -> Flow {
        Flow::Continue
    }

    /// Called after an element's type-specific `visit_*` callback.
    fn after(&mut self, _offset: usize, _key: &[u8], _element_type: ElementType) -> Flow {
        Flow::Continue
    }

    /// Called once, after traversal ends, if the document turned out to be
    /// corrupt partway through.
    fn corrupt(&mut self, _offset: usize, _reason: &crate::error::CorruptReason) {}

    /// `0x01`
    fn visit_double(&mut self, _offset: usize, _key: &[u8], _value: f64) -> Flow {
        Flow::Continue
    }
    /// `0x02`
    fn visit_utf8(&mut self, _offset: usize, _key: &[u8], _value: &[u8]) -> Flow {
        Flow::Continue
    }
    /// `0x03`
    fn visit_document(&mut self, _offset: usize, _key: &[u8], _value: DocumentView<'_>) -> Flow {
        Flow::Continue
    }
    /// `0x04`
    fn visit_array(&mut self, _offset: usize, _key: &[u8], _value: DocumentView<'_>) -> Flow {
        Flow::Continue
    }
    /// `0x05`
    fn visit_binary(&mut self, _offset: usize, _key: &[u8], _subtype: u8, _data: &[u8]) -> Flow {
        Flow::Continue
    }
    /// `0x06`
    fn visit_undefined(&mut self, _offset: usize, _key: &[u8]) -> Flow {
        Flow::Continue
    }
    /// `0x07`
    fn visit_object_id(&mut self, _offset: usize, _key: &[u8], _oid: [u8; 12]) -> Flow {
        Flow::Continue
    }
    /// `0x08`
    fn visit_bool(&mut self, _offset: usize, _key: &[u8], _value: bool) -> Flow {
        Flow::Continue
    }
    /// `0x09`
    fn visit_datetime(&mut self, _offset: usize, _key: &[u8], _millis_since_epoch: i64) -> Flow {
        Flow::Continue
    }
    /// `0x0A`
    fn visit_null(&mut self, _offset: usize, _key: &[u8]) -> Flow {
        Flow::Continue
    }
    /// `0x0B`
    fn visit_regex(&mut self, _offset: usize, _key: &[u8], _pattern: &[u8], _options: &[u8]) -> Flow {
        Flow::Continue
    }
    /// `0x0C`
    fn visit_db_pointer(&mut self, _offset: usize, _key: &[u8], _collection: &[u8], _oid: [u8; 12]) -> Flow {
        Flow::Continue
    }
    /// `0x0D`
    fn visit_code(&mut self, _offset: usize, _key: &[u8], _source: &[u8]) -> Flow {
        Flow::Continue
    }
    /// `0x0E`
    fn visit_symbol(&mut self, _offset: usize, _key: &[u8], _symbol: &[u8]) -> Flow {
        Flow::Continue
    }
    /// `0x0F`
    fn visit_code_with_scope(&mut self, _offset: usize, _key: &[u8], _code: &[u8], _scope: DocumentView<'_>) -> Flow {
        Flow::Continue
    }
    /// `0x10`
    fn visit_int32(&mut self, _offset: usize, _key: &[u8], _value: i32) -> Flow {
        Flow::Continue
    }
    /// `0x11`
    fn visit_timestamp(&mut self, _offset: usize, _key: &[u8], _seconds: u32, _increment: u32) -> Flow {
        Flow::Continue
    }
    /// `0x12`
    fn visit_int64(&mut self, _offset: usize, _key: &[u8], _value: i64) -> Flow {
        Flow::Continue
    }
    /// `0x7F`
    fn visit_min_key(&mut self, _offset: usize, _key: &[u8]) -> Flow {
        Flow::Continue
    }
    /// `0xFF`
    fn visit_max_key(&mut self, _offset: usize, _key: &[u8]) -> Flow {
        Flow::Continue
    }
}

/// Walk every top-level element of `bytes`, dispatching each to `visitor`.
///
/// Returns `Err` only if the header itself (length prefix / terminator) is
/// invalid. A document that parses but then turns corrupt partway through
/// its elements is not an error here: traversal simply ends and
/// `visitor.corrupt` is invoked with the details before this function
/// returns `Ok(Flow::Continue)`.
pub fn visit_all(bytes: &[u8], visitor: &mut impl Visitor) -> Result<Flow, BsonError> {
    let mut iter = DocumentIterator::new(bytes)?;
    while let Some(element) = iter.next() {
        let offset = element.offset();
        let key = element.key_bytes();
        let element_type = element.element_type();

        if visitor.before(offset, key, element_type) == Flow::Stop {
            return Ok(Flow::Stop);
        }

        let flow = dispatch(visitor, offset, key, element.value());

        if visitor.after(offset, key, element_type) == Flow::Stop || flow == Flow::Stop {
            return Ok(Flow::Stop);
        }
    }
    if let Some(corrupt) = iter.corrupt_reason() {
        visitor.corrupt(corrupt.offset, &corrupt.reason);
    }
    Ok(Flow::Continue)
}

fn dispatch(visitor: &mut impl Visitor, offset: usize, key: &[u8], value: RawValue<'_>) -> Flow {
    match value {
        RawValue::Double(v) => visitor.visit_double(offset, key, v),
        RawValue::Utf8(v) => visitor.visit_utf8(offset, key, v),
        RawValue::Document(v) => visitor.visit_document(offset, key, v),
        RawValue::Array(v) => visitor.visit_array(offset, key, v),
        RawValue::Binary { subtype, data } => visitor.visit_binary(offset, key, subtype, data),
        RawValue::Undefined => visitor.visit_undefined(offset, key),
        RawValue::ObjectId(oid) => visitor.visit_object_id(offset, key, oid),
        RawValue::Bool(v) => visitor.visit_bool(offset, key, v),
        RawValue::DateTime(v) => visitor.visit_datetime(offset, key, v),
        RawValue::Null => visitor.visit_null(offset, key),
        RawValue::Regex { pattern, options } => visitor.visit_regex(offset, key, pattern, options),
        RawValue::DbPointer { collection, oid } => visitor.visit_db_pointer(offset, key, collection, oid),
        RawValue::Code(v) => visitor.visit_code(offset, key, v),
        RawValue::Symbol(v) => visitor.visit_symbol(offset, key, v),
        RawValue::CodeWithScope { code, scope } => visitor.visit_code_with_scope(offset, key, code, scope),
        RawValue::Int32(v) => visitor.visit_int32(offset, key, v),
        RawValue::Timestamp { seconds, increment } => visitor.visit_timestamp(offset, key, seconds, increment),
        RawValue::Int64(v) => visitor.visit_int64(offset, key, v),
        RawValue::MinKey => visitor.visit_min_key(offset, key),
        RawValue::MaxKey => visitor.visit_max_key(offset, key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DocumentBuilder;

    #[derive(Default)]
    struct Counter {
        visited: usize,
        stop_after: Option<usize>,
    }

    impl Visitor for Counter {
        fn before(&mut self, _offset: usize, _key: &[u8], _element_type: ElementType) -> Flow {
            self.visited += 1;
            if self.stop_after == Some(self.visited) {
                Flow::Stop
            } else {
                Flow::Continue
            }
        }
    }

    #[test]
    fn stop_halts_traversal() {
        let mut b = DocumentBuilder::new();
        b.append_i32("a", 1).unwrap();
        b.append_i32("b", 2).unwrap();
        b.append_i32("c", 3).unwrap();
        let doc = b.finish().unwrap();

        let mut counter = Counter { stop_after: Some(2), ..Default::default() };
        let flow = visit_all(doc.as_bytes(), &mut counter).unwrap();
        assert_eq!(flow, Flow::Stop);
        assert_eq!(counter.visited, 2);
    }
}
