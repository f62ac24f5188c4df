//! Document shape detection and legacy-to-canonical mapping.
//!
//! Normalization is a two-step pipeline over raw JSON:
//! 1. [`detect_shape`] classifies the document structurally (flat vs nested signal fields)
//! 2. [`normalize`] maps a legacy document onto the canonical shape
//!
//! Canonical documents pass through unchanged, so normalization is idempotent.

use crate::domain::document::{CANONICAL_VERSION, LEGACY_VERSION};
use crate::domain::error::GenerationError;
use serde_json::{json, Map, Value};

const FLAT_FIELDS: [&str; 2] = ["entryConditions", "exitConditions"];
const NESTED_FIELDS: [&str; 2] = ["long", "short"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentShape {
    /// Top-level `entryConditions` / `exitConditions`, long only.
    Legacy,
    /// Nested `long` / `short` signal configs.
    Canonical,
}

pub fn detect_shape(document: &Value) -> Result<DocumentShape, GenerationError> {
    let fields = document
        .as_object()
        .ok_or_else(|| GenerationError::schema("document must be a JSON object"))?;

    let has_flat = FLAT_FIELDS.iter().any(|k| fields.contains_key(*k));
    let has_nested = NESTED_FIELDS.iter().any(|k| fields.contains_key(*k));

    let shape = match (has_flat, has_nested) {
        (true, true) => {
            return Err(GenerationError::schema(
                "document mixes flat entry/exit conditions with nested long/short configs",
            ));
        }
        (true, false) => DocumentShape::Legacy,
        (false, true) => DocumentShape::Canonical,
        (false, false) => {
            return Err(GenerationError::schema(
                "document has neither entry/exit conditions nor long/short signal configs",
            ));
        }
    };

    if let Some(version) = fields.get("version") {
        let version = version
            .as_u64()
            .ok_or_else(|| GenerationError::schema("version must be a non-negative integer"))?;
        let expected = match shape {
            DocumentShape::Legacy => LEGACY_VERSION,
            DocumentShape::Canonical => CANONICAL_VERSION,
        };
        if version != expected {
            return Err(GenerationError::schema(format!(
                "version {} does not match the document shape (expected {})",
                version, expected
            )));
        }
    }

    Ok(shape)
}

/// Map any accepted document onto the canonical shape.
pub fn normalize(document: Value) -> Result<Value, GenerationError> {
    match detect_shape(&document)? {
        DocumentShape::Canonical => Ok(document),
        DocumentShape::Legacy => {
            tracing::debug!("normalizing legacy flat document");
            let Value::Object(fields) = document else {
                return Err(GenerationError::schema("document must be a JSON object"));
            };
            Ok(Value::Object(from_legacy(fields)))
        }
    }
}

fn from_legacy(mut fields: Map<String, Value>) -> Map<String, Value> {
    let never = || json!({"type": "OR", "children": []});

    let entry = fields.remove("entryConditions").unwrap_or_else(never);
    let exit = fields.remove("exitConditions").unwrap_or_else(never);

    fields.insert("version".into(), json!(CANONICAL_VERSION));
    fields.insert("positionMode".into(), json!("long_only"));
    fields.insert(
        "long".into(),
        json!({"entryConditions": entry, "exitConditions": exit}),
    );
    fields.insert(
        "short".into(),
        json!({"entryConditions": never(), "exitConditions": never()}),
    );
    fields
}
