//! Structural size/depth gate applied to raw documents before any traversal.

use crate::domain::error::GenerationError;
use serde_json::Value;

pub const DEFAULT_MAX_NODES: usize = 10_000;
pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of JSON values (objects, arrays and scalars) in a document.
    pub max_nodes: usize,
    /// Maximum nesting depth of the JSON document and of any expression tree.
    pub max_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_nodes: DEFAULT_MAX_NODES,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Size statistics of a document that passed the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentSize {
    pub nodes: usize,
    pub depth: usize,
}

/// Count values and measure nesting with an explicit stack, failing as soon as a ceiling is crossed.
pub fn check_document(document: &Value, limits: &Limits) -> Result<DocumentSize, GenerationError> {
    let mut stack: Vec<(&Value, usize)> = vec![(document, 1)];
    let mut nodes = 0usize;
    let mut deepest = 0usize;

    while let Some((value, depth)) = stack.pop() {
        nodes += 1;
        if nodes > limits.max_nodes {
            return Err(GenerationError::size_limit(format!(
                "document has more than {} nodes",
                limits.max_nodes
            )));
        }
        if depth > limits.max_depth {
            return Err(GenerationError::size_limit(format!(
                "document nesting exceeds depth {}",
                limits.max_depth
            )));
        }
        deepest = deepest.max(depth);
        match value {
            Value::Array(items) => stack.extend(items.iter().map(|v| (v, depth + 1))),
            Value::Object(fields) => stack.extend(fields.values().map(|v| (v, depth + 1))),
            _ => {}
        }
    }

    Ok(DocumentSize {
        nodes,
        depth: deepest,
    })
}

/// Parse JSON text, reporting parser recursion overflow as a size-limit failure.
pub fn parse_document(text: &str) -> Result<Value, GenerationError> {
    serde_json::from_str(text).map_err(|e| {
        if e.to_string().contains("recursion limit exceeded") {
            GenerationError::size_limit("document nesting exceeds the parser's recursion limit")
        } else {
            GenerationError::schema(format!("invalid JSON: {}", e))
        }
    })
}
