//! Query identity: (product, selection, upstream fingerprint).
//!
//! Key equality is the staleness mechanism: a selection change or an
//! upstream value change produces a different key, so the old entry is
//! simply no longer looked at.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::domain::{Product, Selection};

/// Deterministic summary of the upstream values used to build a request.
pub type Fingerprint = u64;

/// Cache identity for one product fetch.
///
/// Two keys are equal iff product, selection, and fingerprint all are.
/// Root products carry no fingerprint; derived products embed the hash of
/// the request payload built from their upstream values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub product: Product,
    pub selection: Selection,
    pub upstream_fingerprint: Option<Fingerprint>,
}

impl QueryKey {
    pub fn root(product: Product, selection: Selection) -> Self {
        Self {
            product,
            selection,
            upstream_fingerprint: None,
        }
    }

    pub fn derived(product: Product, selection: Selection, fingerprint: Fingerprint) -> Self {
        Self {
            product,
            selection,
            upstream_fingerprint: Some(fingerprint),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upstream_fingerprint {
            Some(fingerprint) => write!(
                f,
                "{}/{}#{fingerprint:016x}",
                self.product,
                self.selection.label()
            ),
            None => write!(f, "{}/{}", self.product, self.selection.label()),
        }
    }
}

/// Hash a serializable payload into a [`Fingerprint`].
///
/// The payload is canonicalized first (object keys sorted recursively), so
/// the result is independent of field declaration or map iteration order:
/// two payloads that would produce the same request produce the same
/// fingerprint.
pub fn fingerprint_of<T: Serialize>(payload: &T) -> Fingerprint {
    let value = match serde_json::to_value(payload) {
        Ok(value) => value,
        Err(error) => {
            warn!(%error, "Fingerprint payload failed to serialize; using null");
            Value::Null
        }
    };
    let mut canonical = String::new();
    write_canonical(&value, &mut canonical);
    let mut hasher = DefaultHasher::new();
    canonical.hash(&mut hasher);
    hasher.finish()
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (index, key) in keys.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        leaf => out.push_str(&leaf.to_string()),
    }
}
