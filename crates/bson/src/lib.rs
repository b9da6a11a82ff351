//! BSON document construction, parsing, validation and rendering.
//!
//! - [`builder::DocumentBuilder`] builds a document element by element over
//!   a growable [`bson_core::Buffer`], with an explicit frame stack for
//!   nested sub-documents and arrays.
//! - [`iter::DocumentIterator`] walks an already-encoded document's
//!   top-level elements without allocating or copying.
//! - [`visitor::Visitor`] dispatches a traversal by element type; it powers
//!   both [`validate::validate`] and [`json::to_json`].
//! - [`compare::compare`]/[`compare::equal`] compare documents byte-exactly.

#![deny(missing_docs)]

pub mod builder;
pub mod compare;
pub mod document;
pub mod element_type;
pub mod error;
pub mod iter;
pub mod json;
pub mod validate;
pub mod visitor;

pub use builder::DocumentBuilder;
pub use compare::{compare, equal};
pub use document::{Document, DocumentView};
pub use element_type::ElementType;
pub use error::{
    BsonCorruption, BsonError, BuilderError, CorruptReason, ExternalBuffer, RenderError, ValidateError, ValidationError,
    ValidationReason,
};
pub use iter::{DocumentIterator, Element, RawValue};
pub use json::to_json;
pub use validate::{validate, ValidationFlags};
pub use visitor::{visit_all, Flow, Visitor};

/// Convenient re-exports for callers that just want the essentials.
pub mod prelude {
    pub use crate::{
        builder::DocumentBuilder, document::Document, document::DocumentView, element_type::ElementType,
        validate::ValidationFlags, visitor::Flow, visitor::Visitor,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_round_trips() {
        let doc = Document::empty();
        assert_eq!(doc.len(), 5);
        assert_eq!(to_json(doc.as_bytes()).unwrap(), "{}");
    }

    #[test]
    fn builder_then_iterator_then_json_agree() {
        let mut b = DocumentBuilder::new();
        b.append_str("name", "ferris").unwrap();
        b.append_i32("legs", 0).unwrap();
        b.start_array("colors").unwrap();
        b.append_str("0", "orange").unwrap();
        b.end_array().unwrap();
        let doc = b.finish().unwrap();

        assert_eq!(doc.count_fields(), 3);
        assert_eq!(
            to_json(doc.as_bytes()).unwrap(),
            r#"{ "name" : "ferris", "legs" : 0, "colors" : [ "orange" ] }"#
        );
    }

    #[test]
    fn byte_exact_equality_is_reflexive_and_order_sensitive() {
        let mut a = DocumentBuilder::new();
        a.append_i32("x", 1).unwrap();
        a.append_i32("y", 2).unwrap();
        let a = a.finish().unwrap();

        let mut b = DocumentBuilder::new();
        b.append_i32("y", 2).unwrap();
        b.append_i32("x", 1).unwrap();
        let b = b.finish().unwrap();

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert!(equal(a.as_bytes(), a.as_bytes()));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_field() -> impl Strategy<Value = (String, i32)> {
        ("[a-z]{1,8}", any::<i32>())
    }

    proptest! {
        #[test]
        fn round_trip_preserves_fields(fields in prop::collection::vec(arb_field(), 0..16)) {
            let mut seen = std::collections::HashSet::new();
            let mut builder = DocumentBuilder::new();
            let mut expected = Vec::new();
            for (key, value) in fields {
                if !seen.insert(key.clone()) {
                    continue;
                }
                builder.append_i32(&key, value).unwrap();
                expected.push((key, value));
            }
            let doc = builder.finish().unwrap();

            prop_assert_eq!(doc.count_fields(), expected.len());

            let mut iter = doc.iter().unwrap();
            for (key, value) in &expected {
                let element = iter.next().expect("field present after round trip");
                prop_assert_eq!(element.key_str().unwrap(), key.as_str());
                match element.value() {
                    RawValue::Int32(decoded) => prop_assert_eq!(decoded, *value),
                    other => panic!("expected Int32, got {other:?}"),
                }
            }
            prop_assert!(iter.next().is_none());
            prop_assert!(iter.corrupt_reason().is_none());
        }

        #[test]
        fn byte_exact_equality_agrees_with_field_order(a in any::<i32>(), b in any::<i32>()) {
            let mut first = DocumentBuilder::new();
            first.append_i32("a", a).unwrap();
            first.append_i32("b", b).unwrap();
            let first = first.finish().unwrap();

            let mut second = DocumentBuilder::new();
            second.append_i32("a", a).unwrap();
            second.append_i32("b", b).unwrap();
            let second = second.finish().unwrap();

            prop_assert_eq!(&first, &second);
            prop_assert!(equal(first.as_bytes(), second.as_bytes()));

            if a != b {
                let mut swapped = DocumentBuilder::new();
                swapped.append_i32("b", b).unwrap();
                swapped.append_i32("a", a).unwrap();
                let swapped = swapped.finish().unwrap();
                prop_assert_ne!(&first, &swapped);
            }
        }
    }
}

