//! Strategy document source port trait.

use crate::domain::error::SignalsmithError;
use serde_json::Value;

pub trait DocumentPort {
    /// Human-readable origin of the document, used in error messages.
    fn source_name(&self) -> String;

    /// Load the raw, not yet normalized document.
    fn load_document(&self) -> Result<Value, SignalsmithError>;
}
