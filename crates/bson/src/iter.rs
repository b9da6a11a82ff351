//! Single-pass, zero-copy element iterator (§4.3).
//!
//! `DocumentIterator` never allocates and never copies: every value it
//! yields borrows directly from the buffer it was built over. It is
//! forward-only and latches on the first corruption it finds — once
//! `next()` returns `None` because the bytes stopped making sense, the
//! cause is available from [`DocumentIterator::corrupt_reason`] for as
//! long as the iterator lives, but no further elements will ever be
//! produced.

use crate::document::{validate_header, DocumentView};
use crate::element_type::ElementType;
use crate::error::{BsonCorruption, BsonError, CorruptReason};
use bson_core::io::{read_f64_le, read_i32_le, read_i64_le, read_u32_le};

/// One decoded element: a key plus its type-tagged value.
///
/// Key bytes and any embedded string/binary bytes are returned raw and
/// unvalidated — this type makes no claim about UTF-8 validity. Call
/// [`Element::key_str`] or match on [`RawValue::Utf8`] and validate with
/// `std::str::from_utf8` yourself if you need that guarantee. Structural
/// validation (including UTF-8) is [`crate::validate::validate`]'s job, not
/// the iterator's.
#[derive(Debug, Clone, Copy)]
pub struct Element<'a> {
    offset: usize,
    key: &'a [u8],
    element_type: ElementType,
    value: RawValue<'a>,
}

impl<'a> Element<'a> {
    /// Absolute byte offset of this element's type tag within the root
    /// document.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The element's key, exactly as it appears on the wire (no trailing nul).
    #[must_use]
    pub fn key_bytes(&self) -> &'a [u8] {
        self.key
    }

    /// The element's key, validated as UTF-8.
    pub fn key_str(&self) -> Result<&'a str, std::str::Utf8Error> {
        std::str::from_utf8(self.key)
    }

    /// The element's type tag.
    #[must_use]
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// The element's decoded value.
    #[must_use]
    pub fn value(&self) -> RawValue<'a> {
        self.value
    }
}

/// A decoded element value, still carrying raw (unvalidated) bytes for any
/// string-like field.
#[derive(Debug, Clone, Copy)]
pub enum RawValue<'a> {
    /// `0x01`
    Double(f64),
    /// `0x02` — payload bytes, not including the trailing nul.
    Utf8(&'a [u8]),
    /// `0x03` — raw bytes of the embedded document, including its own
    /// length prefix and terminator.
    Document(DocumentView<'a>),
    /// `0x04` — same representation as `Document`; the distinction is the
    /// type tag under which it was stored.
    Array(DocumentView<'a>),
    /// `0x05`
    Binary {
        /// Binary subtype byte.
        subtype: u8,
        /// Payload bytes.
        data: &'a [u8],
    },
    /// `0x06`
    Undefined,
    /// `0x07`
    ObjectId([u8; 12]),
    /// `0x08`
    Bool(bool),
    /// `0x09` — milliseconds since the Unix epoch.
    DateTime(i64),
    /// `0x0A`
    Null,
    /// `0x0B`
    Regex {
        /// Pattern bytes, not including the trailing nul.
        pattern: &'a [u8],
        /// Options bytes, not including the trailing nul.
        options: &'a [u8],
    },
    /// `0x0C`
    DbPointer {
        /// Collection name bytes, not including the trailing nul.
        collection: &'a [u8],
        /// 12-byte ObjectId.
        oid: [u8; 12],
    },
    /// `0x0D` — payload bytes, not including the trailing nul.
    Code(&'a [u8]),
    /// `0x0E` — payload bytes, not including the trailing nul.
    Symbol(&'a [u8]),
    /// `0x0F`
    CodeWithScope {
        /// Source bytes, not including the trailing nul.
        code: &'a [u8],
        /// Scope document view.
        scope: DocumentView<'a>,
    },
    /// `0x10`
    Int32(i32),
    /// `0x11`
    Timestamp {
        /// High 32 bits.
        seconds: u32,
        /// Low 32 bits.
        increment: u32,
    },
    /// `0x12`
    Int64(i64),
    /// `0x7F`
    MinKey,
    /// `0xFF`
    MaxKey,
}

/// Forward-only, single-pass iterator over the top-level elements of a
/// document's bytes.
#[derive(Debug)]
pub struct DocumentIterator<'a> {
    data: &'a [u8],
    base_offset: usize,
    offset: usize,
    current_offset: usize,
    done: bool,
    corrupt: Option<BsonCorruption>,
}

impl<'a> DocumentIterator<'a> {
    /// Build an iterator over a complete, independently-valid document
    /// (its own length prefix is checked against `data.len()`).
    pub fn new(data: &'a [u8]) -> Result<Self, BsonError> {
        Self::with_base(data, 0)
    }

    pub(crate) fn with_base(data: &'a [u8], base_offset: usize) -> Result<Self, BsonError> {
        validate_header(data)?;
        Ok(Self { data, base_offset, offset: 4, current_offset: 4, done: false, corrupt: None })
    }

    /// The reason iteration stopped early, if it did. `None` both before
    /// exhaustion and after a clean run to the terminating `0x00`.
    #[must_use]
    pub fn corrupt_reason(&self) -> Option<&BsonCorruption> {
        self.corrupt.as_ref()
    }

    fn mark_corrupt(&mut self, local_offset: usize, reason: CorruptReason) {
        self.done = true;
        self.corrupt = Some(BsonCorruption { offset: self.base_offset + local_offset, reason });
    }
}

impl<'a> Iterator for DocumentIterator<'a> {
    type Item = Element<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.current_offset = self.offset;

        let tag_byte = self.data[self.offset];
        if tag_byte == 0x00 {
            self.done = true;
            return None;
        }

        let element_type = match ElementType::try_from(tag_byte) {
            Ok(ty) => ty,
            Err(_) => {
                let at = self.offset;
                self.mark_corrupt(at, CorruptReason::UnknownType(tag_byte));
                return None;
            }
        };

        let mut pos = self.offset + 1;
        let key_start = pos;
        let key_end = match find_nul(self.data, pos) {
            Some(i) => i,
            None => {
                self.mark_corrupt(key_start, CorruptReason::UnterminatedKey);
                return None;
            }
        };
        let key = &self.data[key_start..key_end];
        pos = key_end + 1;

        let (value, new_pos) = match decode_value(self.data, pos, element_type, self.base_offset) {
            Ok(pair) => pair,
            Err(reason) => {
                self.mark_corrupt(pos, reason);
                return None;
            }
        };

        let offset = self.base_offset + self.current_offset;
        self.offset = new_pos;
        Some(Element { offset, key, element_type, value })
    }
}

fn find_nul(data: &[u8], from: usize) -> Option<usize> {
    data[from..].iter().position(|&b| b == 0).map(|i| from + i)
}

/// Decode the value for `element_type` starting at `pos` in `data`,
/// returning the value and the offset just past it. `base_offset` is
/// threaded into any nested `DocumentView` so its own element offsets
/// remain absolute.
fn decode_value(
    data: &[u8],
    pos: usize,
    element_type: ElementType,
    base_offset: usize,
) -> Result<(RawValue<'_>, usize), CorruptReason> {
    let remaining = |at: usize| data.len().saturating_sub(at);

    match element_type {
        ElementType::Double => {
            need(data, pos, 8, "double")?;
            Ok((RawValue::Double(read_f64_le(&data[pos..])), pos + 8))
        }
        ElementType::Int32 => {
            need(data, pos, 4, "int32")?;
            Ok((RawValue::Int32(read_i32_le(&data[pos..])), pos + 4))
        }
        ElementType::Int64 => {
            need(data, pos, 8, "int64")?;
            Ok((RawValue::Int64(read_i64_le(&data[pos..])), pos + 8))
        }
        ElementType::Timestamp => {
            need(data, pos, 8, "timestamp")?;
            let increment = read_u32_le(&data[pos..]);
            let seconds = read_u32_le(&data[pos + 4..]);
            Ok((RawValue::Timestamp { seconds, increment }, pos + 8))
        }
        ElementType::DateTime => {
            need(data, pos, 8, "datetime")?;
            Ok((RawValue::DateTime(read_i64_le(&data[pos..])), pos + 8))
        }
        ElementType::Bool => {
            need(data, pos, 1, "bool")?;
            Ok((RawValue::Bool(data[pos] != 0), pos + 1))
        }
        ElementType::Null => Ok((RawValue::Null, pos)),
        ElementType::Undefined => Ok((RawValue::Undefined, pos)),
        ElementType::MinKey => Ok((RawValue::MinKey, pos)),
        ElementType::MaxKey => Ok((RawValue::MaxKey, pos)),
        ElementType::ObjectId => {
            need(data, pos, 12, "object id")?;
            let mut oid = [0u8; 12];
            oid.copy_from_slice(&data[pos..pos + 12]);
            Ok((RawValue::ObjectId(oid), pos + 12))
        }
        ElementType::Utf8 | ElementType::Code | ElementType::Symbol => {
            let field = match element_type {
                ElementType::Utf8 => "utf8",
                ElementType::Code => "code",
                _ => "symbol",
            };
            let (bytes, end) = read_length_prefixed_cstring(data, pos, field)?;
            let value = match element_type {
                ElementType::Utf8 => RawValue::Utf8(bytes),
                ElementType::Code => RawValue::Code(bytes),
                _ => RawValue::Symbol(bytes),
            };
            Ok((value, end))
        }
        ElementType::Document | ElementType::Array => {
            need(data, pos, 4, "embedded document length")?;
            let declared = read_i32_le(&data[pos..]);
            if declared < 5 {
                return Err(CorruptReason::InvalidLength { field: "embedded document", declared: i64::from(declared) });
            }
            let len = declared as usize;
            if len > remaining(pos) {
                return Err(CorruptReason::LengthOverrun { field: "embedded document", needed: len, remaining: remaining(pos) });
            }
            let view = DocumentView::from_embedded(&data[pos..pos + len], base_offset + pos);
            let value = if matches!(element_type, ElementType::Array) { RawValue::Array(view) } else { RawValue::Document(view) };
            Ok((value, pos + len))
        }
        ElementType::Binary => {
            need(data, pos, 5, "binary")?;
            let declared = read_i32_le(&data[pos..]);
            if declared < 0 {
                return Err(CorruptReason::InvalidLength { field: "binary", declared: i64::from(declared) });
            }
            let len = declared as usize;
            let subtype = data[pos + 4];
            let data_start = pos + 5;
            if len > remaining(data_start) {
                return Err(CorruptReason::LengthOverrun { field: "binary", needed: len, remaining: remaining(data_start) });
            }
            Ok((RawValue::Binary { subtype, data: &data[data_start..data_start + len] }, data_start + len))
        }
        ElementType::Regex => {
            let pattern_end = find_nul(data, pos).ok_or(CorruptReason::MissingTerminator { field: "regex pattern" })?;
            let pattern = &data[pos..pattern_end];
            let options_start = pattern_end + 1;
            let options_end =
                find_nul(data, options_start).ok_or(CorruptReason::MissingTerminator { field: "regex options" })?;
            let options = &data[options_start..options_end];
            Ok((RawValue::Regex { pattern, options }, options_end + 1))
        }
        ElementType::DbPointer => {
            let (collection, after_name) = read_length_prefixed_cstring(data, pos, "db pointer collection")?;
            need(data, after_name, 12, "db pointer object id")?;
            let mut oid = [0u8; 12];
            oid.copy_from_slice(&data[after_name..after_name + 12]);
            Ok((RawValue::DbPointer { collection, oid }, after_name + 12))
        }
        ElementType::CodeWithScope => {
            need(data, pos, 4, "code_w_scope total length")?;
            let declared = read_i32_le(&data[pos..]);
            if declared < 4 {
                return Err(CorruptReason::InvalidLength { field: "code_w_scope", declared: i64::from(declared) });
            }
            let total_len = declared as usize;
            if total_len > remaining(pos) {
                return Err(CorruptReason::LengthOverrun { field: "code_w_scope", needed: total_len, remaining: remaining(pos) });
            }
            let end = pos + total_len;
            let (code, after_code) = read_length_prefixed_cstring(data, pos + 4, "code_w_scope source")?;
            if after_code > end {
                return Err(CorruptReason::LengthOverrun {
                    field: "code_w_scope scope",
                    needed: after_code - (pos + 4),
                    remaining: end.saturating_sub(pos + 4),
                });
            }
            let scope_bytes = &data[after_code..end];
            let view = DocumentView::from_embedded(scope_bytes, base_offset + after_code);
            Ok((RawValue::CodeWithScope { code, scope: view }, end))
        }
    }
}

fn need(data: &[u8], pos: usize, len: usize, field: &'static str) -> Result<(), CorruptReason> {
    let remaining = data.len().saturating_sub(pos);
    if remaining < len {
        return Err(CorruptReason::LengthOverrun { field, needed: len, remaining });
    }
    Ok(())
}

/// Read a BSON "string"-shaped field: an int32 length (including the
/// trailing nul), followed by that many bytes whose last byte must be nul.
fn read_length_prefixed_cstring<'a>(
    data: &'a [u8],
    pos: usize,
    field: &'static str,
) -> Result<(&'a [u8], usize), CorruptReason> {
    need(data, pos, 4, field)?;
    let declared = read_i32_le(&data[pos..]);
    if declared < 1 {
        return Err(CorruptReason::InvalidLength { field, declared: i64::from(declared) });
    }
    let len = declared as usize;
    let start = pos + 4;
    if len > data.len().saturating_sub(start) {
        return Err(CorruptReason::LengthOverrun { field, needed: len, remaining: data.len().saturating_sub(start) });
    }
    let end = start + len;
    if data[end - 1] != 0 {
        return Err(CorruptReason::MissingTerminator { field });
    }
    Ok((&data[start..end - 1], end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DocumentBuilder;

    #[test]
    fn iterates_flat_document() {
        let mut b = DocumentBuilder::new();
        b.append_i32("a", 1).unwrap();
        b.append_bool("b", true).unwrap();
        let doc = b.finish().unwrap();

        let iter = DocumentIterator::new(doc.as_bytes()).unwrap();
        let elements: Vec<_> = iter.collect();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].key_bytes(), b"a");
        assert!(matches!(elements[0].value(), RawValue::Int32(1)));
        assert_eq!(elements[1].key_bytes(), b"b");
        assert!(matches!(elements[1].value(), RawValue::Bool(true)));
    }

    #[test]
    fn flags_unknown_type_tag() {
        let mut bytes = vec![0u8; 0];
        bytes.extend_from_slice(&8i32.to_le_bytes()); // length
        bytes.push(0x99); // bogus tag
        bytes.push(b'a');
        bytes.push(0);
        bytes.push(0); // terminator
        let mut iter = DocumentIterator::new(&bytes).unwrap();
        assert!(iter.next().is_none());
        let corrupt = iter.corrupt_reason().unwrap();
        assert!(matches!(corrupt.reason, CorruptReason::UnknownType(0x99)));
        assert_eq!(corrupt.offset, 4);
    }
}
