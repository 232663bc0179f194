use serde_json::Value;
use sha2::{Digest, Sha256};

/// Canonical byte form of a JSON document: object keys sorted, no
/// insignificant whitespace.
pub fn canonical_bytes(document: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write_canonical(document, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                out.extend_from_slice(Value::String((*key).clone()).to_string().as_bytes());
                out.push(b':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out);
            }
            out.push(b']');
        }
        scalar => out.extend_from_slice(scalar.to_string().as_bytes()),
    }
}

/// SHA-256 (hex) of the canonical document; the key the revocation ledger
/// is indexed by.
pub fn content_hash(document: &Value) -> String {
    hex::encode(Sha256::digest(canonical_bytes(document)))
}

/// Content hash of the document with its `proof` block removed; what a
/// signature commits to.
pub fn unsigned_hash(document: &Value) -> String {
    match document {
        Value::Object(map) if map.contains_key("proof") => {
            let mut stripped = map.clone();
            stripped.remove("proof");
            content_hash(&Value::Object(stripped))
        }
        other => content_hash(other),
    }
}
