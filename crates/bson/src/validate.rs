//! Structural and semantic validation (§4.6), built on the same
//! [`crate::visitor::Visitor`] dispatch the JSON renderer uses.

use crate::document::DocumentView;
use crate::element_type::ElementType;
use crate::error::{CorruptReason, ValidateError, ValidationError, ValidationReason};
use crate::visitor::{visit_all, Flow, Visitor};

/// Which semantic rules [`validate`] enforces. All default to off: a
/// document that merely parses is considered valid unless a flag says
/// otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationFlags {
    /// Reject any key that begins with `$`.
    pub reject_dollar_keys: bool,
    /// Reject any key that contains `.`.
    pub reject_dot_keys: bool,
    /// Reject any UTF-8 field (keys and string-typed values) that is not
    /// valid UTF-8.
    pub require_utf8: bool,
}

/// Walk every element of `bytes`, recursing into sub-documents and
/// arrays, checking it against `flags`.
///
/// Reports the absolute byte offset of the innermost offending element —
/// a nested violation is never conflated with the offset of the
/// sub-document that contains it.
pub fn validate(bytes: &[u8], flags: ValidationFlags) -> Result<(), ValidateError> {
    let mut validator = Validator { flags, error: None };
    let _ = visit_all(bytes, &mut validator)?;
    if let Some(error) = validator.error {
        #[cfg(feature = "tracing")]
        tracing::debug!(offset = error.offset, reason = %error.reason, "bson document failed validation");
        return Err(error.into());
    }
    Ok(())
}

struct Validator {
    flags: ValidationFlags,
    error: Option<ValidationError>,
}

impl Validator {
    fn check_key(&mut self, offset: usize, key: &[u8]) -> Flow {
        if self.flags.reject_dollar_keys && key.first() == Some(&b'$') {
            self.error = Some(ValidationError { offset, reason: ValidationReason::DollarKey });
            return Flow::Stop;
        }
        if self.flags.reject_dot_keys && key.contains(&b'.') {
            self.error = Some(ValidationError { offset, reason: ValidationReason::DotKey });
            return Flow::Stop;
        }
        if self.flags.require_utf8 && std::str::from_utf8(key).is_err() {
            self.error = Some(ValidationError { offset, reason: ValidationReason::InvalidUtf8 { field: "key" } });
            return Flow::Stop;
        }
        Flow::Continue
    }

    fn check_utf8_value(&mut self, offset: usize, field: &'static str, bytes: &[u8]) -> Flow {
        if self.flags.require_utf8 && std::str::from_utf8(bytes).is_err() {
            self.error = Some(ValidationError { offset, reason: ValidationReason::InvalidUtf8 { field } });
            return Flow::Stop;
        }
        Flow::Continue
    }

    /// Recurses into a nested document or array by re-running the same
    /// visitor over its bytes, reusing [`visit_all`]'s dispatch and
    /// corruption handling instead of re-implementing the traversal here.
    fn recurse(&mut self, offset: usize, view: DocumentView<'_>) -> Flow {
        match visit_all(view.as_bytes(), self) {
            Ok(flow) => flow,
            Err(_) => {
                self.error = Some(ValidationError { offset, reason: ValidationReason::InvalidUtf8 { field: "<header>" } });
                Flow::Stop
            }
        }
    }
}

/// Best-effort mapping from an iterator-level corruption into a
/// validation-level reason, for callers who only want a single error type
/// out of [`validate`]. The offset is already absolute and is preserved
/// by the caller.
fn corrupt_as_validation(reason: &CorruptReason) -> ValidationReason {
    ValidationReason::InvalidUtf8 { field: match reason {
        CorruptReason::UnknownType(_) => "<unknown type>",
        CorruptReason::UnterminatedKey => "<key>",
        CorruptReason::LengthOverrun { field, .. }
        | CorruptReason::InvalidLength { field, .. }
        | CorruptReason::MissingTerminator { field } => field,
    } }
}

impl Visitor for Validator {
    fn before(&mut self, offset: usize, key: &[u8], _element_type: ElementType) -> Flow {
        self.check_key(offset, key)
    }

    fn visit_utf8(&mut self, offset: usize, _key: &[u8], value: &[u8]) -> Flow {
        self.check_utf8_value(offset, "utf8 value", value)
    }

    fn visit_code(&mut self, offset: usize, _key: &[u8], source: &[u8]) -> Flow {
        self.check_utf8_value(offset, "code", source)
    }

    fn visit_symbol(&mut self, offset: usize, _key: &[u8], symbol: &[u8]) -> Flow {
        self.check_utf8_value(offset, "symbol", symbol)
    }

    fn visit_document(&mut self, offset: usize, _key: &[u8], value: DocumentView<'_>) -> Flow {
        self.recurse(offset, value)
    }

    fn visit_array(&mut self, offset: usize, _key: &[u8], value: DocumentView<'_>) -> Flow {
        self.recurse(offset, value)
    }

    fn visit_code_with_scope(&mut self, offset: usize, _key: &[u8], code: &[u8], scope: DocumentView<'_>) -> Flow {
        if self.check_utf8_value(offset, "code_w_scope source", code) == Flow::Stop {
            return Flow::Stop;
        }
        self.recurse(offset, scope)
    }

    fn corrupt(&mut self, offset: usize, reason: &CorruptReason) {
        if self.error.is_none() {
            self.error = Some(ValidationError { offset, reason: corrupt_as_validation(reason) });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DocumentBuilder;

    #[test]
    fn default_flags_accept_anything_well_formed() {
        let mut b = DocumentBuilder::new();
        b.append_str("$weird", "still fine by default").unwrap();
        let doc = b.finish().unwrap();
        assert!(validate(doc.as_bytes(), ValidationFlags::default()).is_ok());
    }

    #[test]
    fn dollar_key_rejected_with_offset() {
        let mut b = DocumentBuilder::new();
        b.append_i32("$bad", 1).unwrap();
        let doc = b.finish().unwrap();
        let flags = ValidationFlags { reject_dollar_keys: true, ..Default::default() };
        let err = validate(doc.as_bytes(), flags).unwrap_err();
        match err {
            ValidateError::Semantic(ValidationError { offset, reason: ValidationReason::DollarKey }) => {
                assert_eq!(offset, 4);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn dot_key_rejected_in_nested_document() {
        let mut b = DocumentBuilder::new();
        b.start_document("outer").unwrap();
        b.append_i32("a.b", 1).unwrap();
        b.end_document().unwrap();
        let doc = b.finish().unwrap();
        let flags = ValidationFlags { reject_dot_keys: true, ..Default::default() };
        let err = validate(doc.as_bytes(), flags).unwrap_err();
        assert!(matches!(
            err,
            ValidateError::Semantic(ValidationError { reason: ValidationReason::DotKey, .. })
        ));
    }
}
