//! Document-to-strategy generation pipeline.
//!
//! Stages run in a fixed order and the first failure aborts the call:
//! size gate, normalization, deserialization, id checks, mirroring, indicator
//! resolution, class settings, leverage compilation, emission.

use crate::domain::document::StrategyDocument;
use crate::domain::emitter::{validate_class_name, ClassSettings, StrategyClass};
use crate::domain::error::{ErrorKind, GenerationError, Warning};
use crate::domain::generator_config::GeneratorConfig;
use crate::domain::indicator::IndicatorRegistry;
use crate::domain::{leverage, limits, mirror, normalizer};
use serde::Serialize;
use serde_json::Value;

/// Successfully generated source plus any non-fatal findings.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedStrategy {
    pub code: String,
    pub warnings: Vec<Warning>,
}

/// Outcome of one generation call as seen by external collaborators.
///
/// Exactly one of `code` and `error` is set; `success` tells which.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub warnings: Vec<String>,
}

impl From<Result<GeneratedStrategy, GenerationError>> for GenerationResult {
    fn from(outcome: Result<GeneratedStrategy, GenerationError>) -> Self {
        match outcome {
            Ok(generated) => GenerationResult {
                success: true,
                code: Some(generated.code),
                error: None,
                error_kind: None,
                warnings: generated.warnings.iter().map(|w| w.to_string()).collect(),
            },
            Err(e) => GenerationResult {
                success: false,
                code: None,
                error: Some(e.to_string()),
                error_kind: Some(e.kind()),
                warnings: Vec::new(),
            },
        }
    }
}

/// Run the full pipeline over an untrusted document.
pub fn generate(
    document: &Value,
    target_name: &str,
    config: &GeneratorConfig,
) -> Result<GeneratedStrategy, GenerationError> {
    validate_class_name(target_name)?;

    let size = limits::check_document(document, &config.limits)?;
    tracing::debug!(nodes = size.nodes, depth = size.depth, "document passed size gate");

    let canonical = normalizer::normalize(document.clone())?;
    let mut strategy: StrategyDocument = serde_json::from_value(canonical)?;
    strategy.check_unique_ids(config.limits.max_depth)?;

    if mirror::apply_mirror_policy(&mut strategy) {
        tracing::debug!("mirror policy applied");
    }

    let indicators = IndicatorRegistry::builtin().resolve_all(&strategy.indicators)?;
    tracing::debug!(count = strategy.indicators.len(), "indicators resolved");

    let settings = ClassSettings::from_document(
        &strategy.parameters,
        &strategy.callbacks,
        &config.defaults,
    )?;
    let plan = leverage::compile(&strategy.leverage_rules, config.fallback_leverage);

    let code = StrategyClass {
        name: target_name,
        document: &strategy,
        indicators: &indicators,
        settings: &settings,
        leverage: plan.as_ref(),
        fallback_leverage: config.fallback_leverage,
        max_depth: config.limits.max_depth,
    }
    .emit()?;

    let warnings = match (&plan, settings.leverage_callback) {
        (Some(plan), true) => plan.warning().into_iter().collect(),
        _ => Vec::new(),
    };
    tracing::debug!(bytes = code.len(), warnings = warnings.len(), "strategy generated");
    Ok(GeneratedStrategy { code, warnings })
}

/// Generate with the default configuration.
pub fn generate_code(document: &Value, target_name: &str) -> GenerationResult {
    generate_code_with(document, target_name, &GeneratorConfig::default())
}

pub fn generate_code_with(
    document: &Value,
    target_name: &str,
    config: &GeneratorConfig,
) -> GenerationResult {
    let outcome = generate(document, target_name, config);
    if let Err(e) = &outcome {
        tracing::debug!(kind = %e.kind(), error = %e, "generation failed");
    }
    GenerationResult::from(outcome)
}

/// Parse JSON text first; parse failures are reported like any other generation error.
pub fn generate_code_from_str(
    text: &str,
    target_name: &str,
    config: &GeneratorConfig,
) -> GenerationResult {
    match limits::parse_document(text) {
        Ok(document) => generate_code_with(&document, target_name, config),
        Err(e) => GenerationResult::from(Err(e)),
    }
}
