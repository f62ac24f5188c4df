//! Domain error types.

use serde::Serialize;
use std::fmt;

/// Category of a fatal generation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Schema,
    Reference,
    Scope,
    Type,
    SizeLimit,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Schema => "SchemaError",
            ErrorKind::Reference => "ReferenceError",
            ErrorKind::Scope => "ScopeError",
            ErrorKind::Type => "TypeError",
            ErrorKind::SizeLimit => "SizeLimitError",
        };
        f.write_str(name)
    }
}

/// A fatal error that aborts a generation call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("schema error: {reason}")]
    Schema { reason: String },

    #[error("schema error: {what} is not implemented")]
    NotImplemented { what: String },

    #[error("invalid parameters for indicator '{indicator_id}': {reason}")]
    InvalidParameters { indicator_id: String, reason: String },

    #[error("reference error: indicator '{indicator_id}' is not declared")]
    UnresolvedIndicator { indicator_id: String },

    #[error("scope error: {operand} is only valid inside a callback, not in {scope}")]
    Scope { operand: String, scope: String },

    #[error("type error: {reason}")]
    Type { reason: String },

    #[error("size limit exceeded: {reason}")]
    SizeLimit { reason: String },
}

impl GenerationError {
    pub fn schema(reason: impl Into<String>) -> Self {
        GenerationError::Schema {
            reason: reason.into(),
        }
    }

    pub fn type_error(reason: impl Into<String>) -> Self {
        GenerationError::Type {
            reason: reason.into(),
        }
    }

    pub fn size_limit(reason: impl Into<String>) -> Self {
        GenerationError::SizeLimit {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GenerationError::Schema { .. }
            | GenerationError::NotImplemented { .. }
            | GenerationError::InvalidParameters { .. } => ErrorKind::Schema,
            GenerationError::UnresolvedIndicator { .. } => ErrorKind::Reference,
            GenerationError::Scope { .. } => ErrorKind::Scope,
            GenerationError::Type { .. } => ErrorKind::Type,
            GenerationError::SizeLimit { .. } => ErrorKind::SizeLimit,
        }
    }
}

impl From<serde_json::Error> for GenerationError {
    fn from(err: serde_json::Error) -> Self {
        GenerationError::schema(err.to_string())
    }
}

/// A non-fatal deficiency reported alongside successfully generated code.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Warning {
    #[error(
        "LeverageFallbackWarning: no unconditional leverage rule, falling back to {fallback:?}"
    )]
    LeverageFallback { fallback: f64 },
}

/// Top-level error type for signalsmith.
#[derive(Debug, thiserror::Error)]
pub enum SignalsmithError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("cannot read document {source_name}: {reason}")]
    DocumentLoad { source_name: String, reason: String },

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SignalsmithError {
    pub fn exit_status(&self) -> u8 {
        match self {
            SignalsmithError::Io(_) | SignalsmithError::DocumentLoad { .. } => 1,
            SignalsmithError::ConfigParse { .. } | SignalsmithError::ConfigInvalid { .. } => 2,
            SignalsmithError::Generation(e) => exit_code_for(e.kind()),
        }
    }
}

impl From<&SignalsmithError> for std::process::ExitCode {
    fn from(err: &SignalsmithError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}

pub fn exit_code_for(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Schema => 3,
        ErrorKind::Reference => 4,
        ErrorKind::Scope => 5,
        ErrorKind::Type => 6,
        ErrorKind::SizeLimit => 7,
    }
}
