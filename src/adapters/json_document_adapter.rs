//! JSON file document adapter.

use crate::domain::error::SignalsmithError;
use crate::domain::limits::parse_document;
use crate::ports::document_port::DocumentPort;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

pub struct JsonDocumentAdapter {
    path: PathBuf,
}

impl JsonDocumentAdapter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl DocumentPort for JsonDocumentAdapter {
    fn source_name(&self) -> String {
        self.path.display().to_string()
    }

    fn load_document(&self) -> Result<Value, SignalsmithError> {
        let text = fs::read_to_string(&self.path).map_err(|e| SignalsmithError::DocumentLoad {
            source_name: self.source_name(),
            reason: e.to_string(),
        })?;
        tracing::debug!(source = %self.source_name(), bytes = text.len(), "document read");
        Ok(parse_document(&text)?)
    }
}
