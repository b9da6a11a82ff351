//! The BSON type tag (§3.1 of the format).

use std::fmt;

/// One of the wire type tags a document element can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ElementType {
    /// `0x01` — IEEE-754 double.
    Double = 0x01,
    /// `0x02` — UTF-8 string.
    Utf8 = 0x02,
    /// `0x03` — embedded document.
    Document = 0x03,
    /// `0x04` — embedded document whose keys are decimal indices.
    Array = 0x04,
    /// `0x05` — length-prefixed binary blob with a subtype byte.
    Binary = 0x05,
    /// `0x06` — the deprecated `undefined` value.
    Undefined = 0x06,
    /// `0x07` — 12-byte ObjectId.
    ObjectId = 0x07,
    /// `0x08` — single-byte boolean.
    Bool = 0x08,
    /// `0x09` — milliseconds since the Unix epoch.
    DateTime = 0x09,
    /// `0x0A` — the `null` value.
    Null = 0x0A,
    /// `0x0B` — regular expression (pattern, options).
    Regex = 0x0B,
    /// `0x0C` — the deprecated DBPointer type.
    DbPointer = 0x0C,
    /// `0x0D` — JavaScript code.
    Code = 0x0D,
    /// `0x0E` — the deprecated symbol type.
    Symbol = 0x0E,
    /// `0x0F` — JavaScript code with a scope document.
    CodeWithScope = 0x0F,
    /// `0x10` — 32-bit signed integer.
    Int32 = 0x10,
    /// `0x11` — replication timestamp (seconds, increment).
    Timestamp = 0x11,
    /// `0x12` — 64-bit signed integer.
    Int64 = 0x12,
    /// `0xFF` — sorts before every other BSON value.
    MinKey = 0xFF,
    /// `0x7F` — sorts after every other BSON value.
    MaxKey = 0x7F,
}

impl ElementType {
    /// The wire tag byte for this type.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }
}

/// A byte that does not correspond to any known [`ElementType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownElementType(pub u8);

impl fmt::Display for UnknownElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown bson element type tag 0x{:02X}", self.0)
    }
}

impl std::error::Error for UnknownElementType {}

impl TryFrom<u8> for ElementType {
    type Error = UnknownElementType;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Ok(match tag {
            0x01 => ElementType::Double,
            0x02 => ElementType::Utf8,
            0x03 => ElementType::Document,
            0x04 => ElementType::Array,
            0x05 => ElementType::Binary,
            0x06 => ElementType::Undefined,
            0x07 => ElementType::ObjectId,
            0x08 => ElementType::Bool,
            0x09 => ElementType::DateTime,
            0x0A => ElementType::Null,
            0x0B => ElementType::Regex,
            0x0C => ElementType::DbPointer,
            0x0D => ElementType::Code,
            0x0E => ElementType::Symbol,
            0x0F => ElementType::CodeWithScope,
            0x10 => ElementType::Int32,
            0x11 => ElementType::Timestamp,
            0x12 => ElementType::Int64,
            0x7F => ElementType::MinKey,
            0xFF => ElementType::MaxKey,
            other => return Err(UnknownElementType(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_roundtrip() {
        for ty in [
            ElementType::Double,
            ElementType::Utf8,
            ElementType::Document,
            ElementType::Array,
            ElementType::Binary,
            ElementType::Undefined,
            ElementType::ObjectId,
            ElementType::Bool,
            ElementType::DateTime,
            ElementType::Null,
            ElementType::Regex,
            ElementType::DbPointer,
            ElementType::Code,
            ElementType::Symbol,
            ElementType::CodeWithScope,
            ElementType::Int32,
            ElementType::Timestamp,
            ElementType::Int64,
            ElementType::MinKey,
            ElementType::MaxKey,
        ] {
            assert_eq!(ElementType::try_from(ty.tag()), Ok(ty));
        }
    }

    #[test]
    fn rejects_unknown_tag() {
        assert!(ElementType::try_from(0x99).is_err());
    }
}
