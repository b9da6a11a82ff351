//! Canonical extended-JSON rendering (§4.5 / §6.2), driven by the same
//! [`crate::visitor::Visitor`] dispatch [`crate::validate::validate`] uses.
//!
//! Types with a direct JSON equivalent (doubles, strings, booleans, nulls,
//! nested documents/arrays, `code`, `symbol`) render as themselves.
//! Everything else renders in the flat legacy extended-JSON form §6.2
//! specifies (`{ "$oid" : "..." }`, `{ "$type" : "HH", "$binary" : "..." }`,
//! `{ "$ref" : "...", "$id" : "..." }`, and so on) rather than MongoDB's
//! newer nested Extended JSON v2 shapes. `code_w_scope` in particular
//! always renders its full `{"$code": ..., "$scope": {...}}` form — there
//! is no legacy consumer here to accommodate by dropping the scope.

use std::fmt::Write as _;

use base64::Engine as _;

use crate::document::DocumentView;
use crate::element_type::ElementType;
use crate::error::RenderError;
use crate::visitor::{visit_all, Flow, Visitor};

/// Render `bytes` as canonical extended JSON.
///
/// The 5-byte empty document always renders as the literal `"{}"` without
/// walking any elements.
pub fn to_json(bytes: &[u8]) -> Result<String, RenderError> {
    render_container(bytes, false)
}

fn render_container(bytes: &[u8], is_array: bool) -> Result<String, RenderError> {
    if bytes.len() == 5 && bytes == [5, 0, 0, 0, 0] {
        return Ok(if is_array { "[]".to_string() } else { "{}".to_string() });
    }

    let mut renderer = JsonRenderer::new(is_array);
    visit_all(bytes, &mut renderer)?;
    if let Some(err) = renderer.error {
        return Err(err);
    }
    Ok(if is_array { format!("[ {} ]", renderer.out) } else { format!("{{ {} }}", renderer.out) })
}

struct JsonRenderer {
    out: String,
    first: bool,
    is_array: bool,
    error: Option<RenderError>,
}

impl JsonRenderer {
    fn new(is_array: bool) -> Self {
        Self { out: String::new(), first: true, is_array, error: None }
    }

    fn prefix(&mut self, key: &[u8]) {
        if !self.first {
            self.out.push_str(", ");
        }
        self.first = false;
        if !self.is_array {
            self.out.push('"');
            escape_json_bytes(&mut self.out, key);
            self.out.push_str("\" : ");
        }
    }

    fn push_nested(&mut self, bytes: &[u8], is_array: bool) {
        match render_container(bytes, is_array) {
            Ok(rendered) => self.out.push_str(&rendered),
            Err(err) => {
                self.error.get_or_insert(err);
            }
        }
    }

    fn push_wrapper(&mut self, tag: &str, body: impl FnOnce(&mut String)) {
        self.out.push_str("{ \"");
        self.out.push_str(tag);
        self.out.push_str("\" : ");
        body(&mut self.out);
        self.out.push_str(" }");
    }

    fn flow(&self) -> Flow {
        if self.error.is_some() {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }
}

fn escape_json_bytes(out: &mut String, bytes: &[u8]) {
    match std::str::from_utf8(bytes) {
        Ok(s) => escape_json_str(out, s),
        Err(_) => {
            // Not valid UTF-8: fall back to hex so rendering never panics
            // or silently drops bytes.
            let _ = write!(out, "<invalid-utf8:{}>", hex::encode(bytes));
        }
    }
}

fn escape_json_str(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
}

fn quoted(out: &mut String, bytes: &[u8]) {
    out.push('"');
    escape_json_bytes(out, bytes);
    out.push('"');
}

impl Visitor for JsonRenderer {
    fn before(&mut self, _offset: usize, key: &[u8], _element_type: ElementType) -> Flow {
        self.prefix(key);
        self.flow()
    }

    fn corrupt(&mut self, offset: usize, reason: &crate::error::CorruptReason) {
        self.error.get_or_insert(RenderError::Corrupt(crate::error::BsonCorruption { offset, reason: reason.clone() }));
    }

    fn visit_double(&mut self, _offset: usize, _key: &[u8], value: f64) -> Flow {
        if value.is_finite() {
            let _ = write!(self.out, "{value}");
        } else if value.is_nan() {
            self.out.push_str("\"NaN\"");
        } else if value > 0.0 {
            self.out.push_str("\"Infinity\"");
        } else {
            self.out.push_str("\"-Infinity\"");
        }
        Flow::Continue
    }

    fn visit_utf8(&mut self, _offset: usize, _key: &[u8], value: &[u8]) -> Flow {
        quoted(&mut self.out, value);
        Flow::Continue
    }

    fn visit_document(&mut self, _offset: usize, _key: &[u8], value: DocumentView<'_>) -> Flow {
        self.push_nested(value.as_bytes(), false);
        self.flow()
    }

    fn visit_array(&mut self, _offset: usize, _key: &[u8], value: DocumentView<'_>) -> Flow {
        self.push_nested(value.as_bytes(), true);
        self.flow()
    }

    fn visit_binary(&mut self, _offset: usize, _key: &[u8], subtype: u8, data: &[u8]) -> Flow {
        let encoded = base64::engine::general_purpose::STANDARD.encode(data);
        let _ = write!(self.out, "{{ \"$type\" : \"{subtype:02x}\", \"$binary\" : \"{encoded}\" }}");
        Flow::Continue
    }

    fn visit_undefined(&mut self, _offset: usize, _key: &[u8]) -> Flow {
        self.out.push_str("{ \"$undefined\" : true }");
        Flow::Continue
    }

    fn visit_object_id(&mut self, _offset: usize, _key: &[u8], oid: [u8; 12]) -> Flow {
        let encoded = hex::encode(oid);
        self.push_wrapper("$oid", |out| {
            let _ = write!(out, "\"{encoded}\"");
        });
        Flow::Continue
    }

    fn visit_bool(&mut self, _offset: usize, _key: &[u8], value: bool) -> Flow {
        self.out.push_str(if value { "true" } else { "false" });
        Flow::Continue
    }

    fn visit_datetime(&mut self, _offset: usize, _key: &[u8], millis_since_epoch: i64) -> Flow {
        self.push_wrapper("$date", |out| {
            let _ = write!(out, "{millis_since_epoch}");
        });
        Flow::Continue
    }

    fn visit_null(&mut self, _offset: usize, _key: &[u8]) -> Flow {
        self.out.push_str("null");
        Flow::Continue
    }

    fn visit_regex(&mut self, _offset: usize, _key: &[u8], pattern: &[u8], options: &[u8]) -> Flow {
        let mut pattern_str = String::new();
        escape_json_bytes(&mut pattern_str, pattern);
        let mut options_str = String::new();
        escape_json_bytes(&mut options_str, options);
        let _ = write!(self.out, "{{ \"$regex\" : \"{pattern_str}\", \"$options\" : \"{options_str}\" }}");
        Flow::Continue
    }

    fn visit_db_pointer(&mut self, _offset: usize, _key: &[u8], collection: &[u8], oid: [u8; 12]) -> Flow {
        let mut collection_str = String::new();
        escape_json_bytes(&mut collection_str, collection);
        let oid_hex = hex::encode(oid);
        let _ = write!(self.out, "{{ \"$ref\" : \"{collection_str}\", \"$id\" : \"{oid_hex}\" }}");
        Flow::Continue
    }

    fn visit_code(&mut self, _offset: usize, _key: &[u8], source: &[u8]) -> Flow {
        quoted(&mut self.out, source);
        Flow::Continue
    }

    fn visit_symbol(&mut self, _offset: usize, _key: &[u8], symbol: &[u8]) -> Flow {
        quoted(&mut self.out, symbol);
        Flow::Continue
    }

    fn visit_code_with_scope(&mut self, _offset: usize, _key: &[u8], code: &[u8], scope: DocumentView<'_>) -> Flow {
        let scope_rendered = match render_container(scope.as_bytes(), false) {
            Ok(s) => s,
            Err(err) => {
                self.error.get_or_insert(err);
                return Flow::Stop;
            }
        };
        self.out.push_str("{ \"$code\" : ");
        quoted(&mut self.out, code);
        self.out.push_str(", \"$scope\" : ");
        self.out.push_str(&scope_rendered);
        self.out.push_str(" }");
        Flow::Continue
    }

    fn visit_int32(&mut self, _offset: usize, _key: &[u8], value: i32) -> Flow {
        let _ = write!(self.out, "{value}");
        Flow::Continue
    }

    fn visit_timestamp(&mut self, _offset: usize, _key: &[u8], seconds: u32, increment: u32) -> Flow {
        self.push_wrapper("$timestamp", |out| {
            let _ = write!(out, "{{ \"t\" : {seconds}, \"i\" : {increment} }}");
        });
        Flow::Continue
    }

    fn visit_int64(&mut self, _offset: usize, _key: &[u8], value: i64) -> Flow {
        let _ = write!(self.out, "{value}");
        Flow::Continue
    }

    fn visit_min_key(&mut self, _offset: usize, _key: &[u8]) -> Flow {
        self.out.push_str("{ \"$minKey\" : 1 }");
        Flow::Continue
    }

    fn visit_max_key(&mut self, _offset: usize, _key: &[u8]) -> Flow {
        self.out.push_str("{ \"$maxKey\" : 1 }");
        Flow::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DocumentBuilder;

    #[test]
    fn empty_document_is_brace_pair() {
        let doc = DocumentBuilder::new().finish().unwrap();
        assert_eq!(to_json(doc.as_bytes()).unwrap(), "{}");
    }

    #[test]
    fn flat_document_renders_expected_shape() {
        let mut b = DocumentBuilder::new();
        b.append_i32("a", 1).unwrap();
        b.append_bool("b", true).unwrap();
        b.append_null("c").unwrap();
        let doc = b.finish().unwrap();
        assert_eq!(to_json(doc.as_bytes()).unwrap(), r#"{ "a" : 1, "b" : true, "c" : null }"#);
    }

    #[test]
    fn array_omits_keys() {
        let mut b = DocumentBuilder::new();
        b.start_array("xs").unwrap();
        b.append_i32("0", 1).unwrap();
        b.append_i32("1", 2).unwrap();
        b.end_array().unwrap();
        let doc = b.finish().unwrap();
        assert_eq!(to_json(doc.as_bytes()).unwrap(), r#"{ "xs" : [ 1, 2 ] }"#);
    }

    #[test]
    fn object_id_renders_extended_json_wrapper() {
        let mut b = DocumentBuilder::new();
        b.append_object_id("_id", [0; 12]).unwrap();
        let doc = b.finish().unwrap();
        assert_eq!(to_json(doc.as_bytes()).unwrap(), r#"{ "_id" : { "$oid" : "000000000000000000000000" } }"#);
    }

    #[test]
    fn binary_renders_flat_legacy_form() {
        let mut b = DocumentBuilder::new();
        b.append_binary("data", 0x00, b"hi").unwrap();
        let doc = b.finish().unwrap();
        assert_eq!(to_json(doc.as_bytes()).unwrap(), r#"{ "data" : { "$type" : "00", "$binary" : "aGk=" } }"#);
    }

    #[test]
    fn datetime_renders_bare_millis() {
        let mut b = DocumentBuilder::new();
        b.append_datetime("at", 1_700_000_000_000).unwrap();
        let doc = b.finish().unwrap();
        assert_eq!(to_json(doc.as_bytes()).unwrap(), r#"{ "at" : { "$date" : 1700000000000 } }"#);
    }

    #[test]
    fn regex_renders_flat_legacy_form() {
        let mut b = DocumentBuilder::new();
        b.append_regex("pat", "^a+$", "i").unwrap();
        let doc = b.finish().unwrap();
        assert_eq!(to_json(doc.as_bytes()).unwrap(), r#"{ "pat" : { "$regex" : "^a+$", "$options" : "i" } }"#);
    }

    #[test]
    fn db_pointer_renders_flat_legacy_form_with_bare_hex_id() {
        let mut b = DocumentBuilder::new();
        b.append_db_pointer("ptr", "things", [0; 12]).unwrap();
        let doc = b.finish().unwrap();
        assert_eq!(
            to_json(doc.as_bytes()).unwrap(),
            r#"{ "ptr" : { "$ref" : "things", "$id" : "000000000000000000000000" } }"#
        );
    }

    #[test]
    fn code_and_symbol_render_as_bare_strings() {
        let mut b = DocumentBuilder::new();
        b.append_code("fn", "x").unwrap();
        b.append_symbol("sym", "y").unwrap();
        let doc = b.finish().unwrap();
        assert_eq!(to_json(doc.as_bytes()).unwrap(), r#"{ "fn" : "x", "sym" : "y" }"#);
    }

    #[test]
    fn int64_renders_as_plain_decimal_like_int32() {
        let mut b = DocumentBuilder::new();
        b.append_i64("big", 9_000_000_000).unwrap();
        let doc = b.finish().unwrap();
        assert_eq!(to_json(doc.as_bytes()).unwrap(), r#"{ "big" : 9000000000 }"#);
    }
}
