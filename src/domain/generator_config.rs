//! Generator configuration, read from the `[generator]` INI section and validated per field.

use crate::domain::emitter::settings::{is_timeframe, SettingsDefaults};
use crate::domain::error::SignalsmithError;
use crate::domain::leverage::NEUTRAL_LEVERAGE;
use crate::domain::limits::Limits;
use crate::ports::config_port::ConfigPort;

pub const SECTION: &str = "generator";

/// Largest accepted `max_depth`.
const MAX_DEPTH_CEILING: i64 = 512;

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    pub limits: Limits,
    /// Leverage returned when no unconditional rule exists or too few candles are available.
    pub fallback_leverage: f64,
    pub defaults: SettingsDefaults,
}

impl GeneratorConfig {
    pub fn new() -> Self {
        Self {
            limits: Limits::default(),
            fallback_leverage: NEUTRAL_LEVERAGE,
            defaults: SettingsDefaults::default(),
        }
    }

    /// Build from a config source; missing keys keep their defaults.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SignalsmithError> {
        let mut generator = Self::new();
        if let Some(value) = validate_fallback_leverage(config)? {
            generator.fallback_leverage = value;
        }
        if let Some(value) = validate_count(config, "max_nodes", 1, i64::MAX)? {
            generator.limits.max_nodes = value;
        }
        if let Some(value) = validate_count(config, "max_depth", 2, MAX_DEPTH_CEILING)? {
            generator.limits.max_depth = value;
        }
        if let Some(value) = validate_timeframe(config)? {
            generator.defaults.timeframe = value;
        }
        if let Some(value) = validate_stoploss(config)? {
            generator.defaults.stoploss = value;
        }
        tracing::debug!(?generator, "generator configuration loaded");
        Ok(generator)
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> SignalsmithError {
    SignalsmithError::ConfigInvalid {
        section: SECTION.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn validate_fallback_leverage(config: &dyn ConfigPort) -> Result<Option<f64>, SignalsmithError> {
    let key = "fallback_leverage";
    let Some(value) = config.get_double(SECTION, key).map_err(|e| invalid(key, e))? else {
        return Ok(None);
    };
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(key, "fallback_leverage must be a positive number"));
    }
    Ok(Some(value))
}

fn validate_count(
    config: &dyn ConfigPort,
    key: &str,
    min: i64,
    max: i64,
) -> Result<Option<usize>, SignalsmithError> {
    let Some(value) = config.get_int(SECTION, key).map_err(|e| invalid(key, e))? else {
        return Ok(None);
    };
    if value < min || value > max {
        return Err(invalid(key, format!("{} must be between {} and {}", key, min, max)));
    }
    usize::try_from(value)
        .map(Some)
        .map_err(|_| invalid(key, format!("{} is too large", key)))
}

fn validate_timeframe(config: &dyn ConfigPort) -> Result<Option<String>, SignalsmithError> {
    let key = "timeframe";
    let Some(value) = config.get_string(SECTION, key) else {
        return Ok(None);
    };
    if !is_timeframe(&value) {
        return Err(invalid(key, format!("'{}' is not a timeframe like 5m or 1h", value)));
    }
    Ok(Some(value))
}

fn validate_stoploss(config: &dyn ConfigPort) -> Result<Option<f64>, SignalsmithError> {
    let key = "stoploss";
    let Some(value) = config.get_double(SECTION, key).map_err(|e| invalid(key, e))? else {
        return Ok(None);
    };
    if !(-1.0..0.0).contains(&value) {
        return Err(invalid(key, "stoploss must be in [-1, 0)"));
    }
    Ok(Some(value))
}
