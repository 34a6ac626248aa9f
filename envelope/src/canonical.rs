//! Canonical byte serialization for signable documents (C1).
//!
//! Object keys are sorted recursively by UTF-16 code unit order — not
//! `str`'s default byte-wise `Ord` — so that signatures agree with a
//! reference implementation built on JavaScript's `Array.prototype.sort`.
//! `serde_json::Value`'s own `Map` serializes in `BTreeMap` (byte) order
//! regardless of insertion order, so canonicalization here is a manual
//! recursive writer rather than a re-serialization of a sorted `Value`.

use serde_json::Value;
use std::cmp::Ordering;

/// Compare two strings by UTF-16 code unit sequence, matching the
/// reference implementation's default string comparison.
fn utf16_cmp(a: &str, b: &str) -> Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

/// Render `value` as its canonical byte string: object keys sorted
/// recursively (code-unit order), null-valued object fields omitted,
/// array order preserved, no whitespace.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out.into_bytes()
}

/// Same as [`canonical_bytes`] but returns a `String` (the bytes are
/// always valid UTF-8 since they come from `serde_json`'s own escaping).
pub fn canonical_string(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> =
                map.iter().filter(|(_, v)| !v.is_null()).collect();
            entries.sort_by(|(a, _), (b, _)| utf16_cmp(a, b));

            out.push('{');
            for (i, (k, v)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // serde_json's string serialization already applies the
                // correct JSON escaping rules; reuse it for keys.
                out.push_str(&serde_json::to_string(k).expect("string keys always serialize"));
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => {
            out.push_str(&serde_json::to_string(scalar).expect("scalar always serializes"));
        }
    }
}

/// A raw string treated as already-canonical: `canonical_bytes` of a
/// `SignedString` is the string's own bytes, verbatim, with no JSON
/// quoting or escaping. Used to concatenate two canonical forms (for
/// example `meta || data`) into one signable unit without re-wrapping
/// them in an outer JSON value.
pub struct SignedString<'a>(pub &'a str);

impl<'a> SignedString<'a> {
    pub fn canonical_bytes(&self) -> Vec<u8> {
        self.0.as_bytes().to_vec()
    }
}
