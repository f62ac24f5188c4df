//! Class-level attributes taken from the document's `parameters` and `callbacks` maps.

use crate::domain::error::GenerationError;
use serde_json::{Map, Value};

pub const DEFAULT_TIMEFRAME: &str = "5m";
pub const DEFAULT_STOPLOSS: f64 = -0.10;

/// Fallbacks for attributes the document leaves unset.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsDefaults {
    pub timeframe: String,
    pub stoploss: f64,
}

impl Default for SettingsDefaults {
    fn default() -> Self {
        Self {
            timeframe: DEFAULT_TIMEFRAME.to_string(),
            stoploss: DEFAULT_STOPLOSS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrailingStop {
    pub positive: Option<f64>,
    pub positive_offset: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassSettings {
    pub timeframe: String,
    pub stoploss: f64,
    /// `(minutes, ratio)` in ascending minute order.
    pub minimal_roi: Vec<(u64, f64)>,
    pub trailing_stop: Option<TrailingStop>,
    pub startup_candle_count: Option<u64>,
    pub leverage_callback: bool,
}

const KNOWN_PARAMETERS: [&str; 7] = [
    "timeframe",
    "stoploss",
    "minimalRoi",
    "trailingStop",
    "trailingStopPositive",
    "trailingStopPositiveOffset",
    "startupCandleCount",
];

const TIMEFRAME_UNITS: [char; 5] = ['m', 'h', 'd', 'w', 'M'];

impl ClassSettings {
    pub fn from_document(
        parameters: &Map<String, Value>,
        callbacks: &Map<String, Value>,
        defaults: &SettingsDefaults,
    ) -> Result<Self, GenerationError> {
        for key in parameters.keys() {
            if !KNOWN_PARAMETERS.contains(&key.as_str()) {
                tracing::debug!(parameter = %key, "ignoring unrecognised strategy parameter");
            }
        }

        let timeframe = match parameters.get("timeframe") {
            Some(v) => validate_timeframe(v)?,
            None => defaults.timeframe.clone(),
        };

        let stoploss = match parameters.get("stoploss") {
            Some(v) => {
                let s = number(v, "stoploss")?;
                if !(-1.0..0.0).contains(&s) {
                    return Err(invalid("stoploss", format!("must be in [-1, 0), got {}", s)));
                }
                s
            }
            None => defaults.stoploss,
        };

        let minimal_roi = match parameters.get("minimalRoi") {
            Some(v) => validate_roi(v)?,
            None => vec![(0, 0.01), (30, 0.03), (60, 0.05)],
        };

        let trailing_stop = match parameters.get("trailingStop") {
            Some(Value::Bool(true)) => Some(TrailingStop {
                positive: optional_ratio(parameters, "trailingStopPositive")?,
                positive_offset: optional_ratio(parameters, "trailingStopPositiveOffset")?,
            }),
            Some(Value::Bool(false)) | None => None,
            Some(other) => {
                return Err(invalid("trailingStop", format!("must be a boolean, got {}", other)));
            }
        };

        let startup_candle_count = match parameters.get("startupCandleCount") {
            Some(v) => Some(
                v.as_u64()
                    .ok_or_else(|| invalid("startupCandleCount", format!("must be a non-negative integer, got {}", v)))?,
            ),
            None => None,
        };

        Ok(Self {
            timeframe,
            stoploss,
            minimal_roi,
            trailing_stop,
            startup_candle_count,
            leverage_callback: leverage_callback_enabled(callbacks)?,
        })
    }
}

/// `callbacks.leverage.enabled`, defaulting to true.
fn leverage_callback_enabled(callbacks: &Map<String, Value>) -> Result<bool, GenerationError> {
    for key in callbacks.keys() {
        if key != "leverage" {
            tracing::debug!(callback = %key, "ignoring unrecognised callback setting");
        }
    }
    let Some(leverage) = callbacks.get("leverage") else {
        return Ok(true);
    };
    let settings = leverage
        .as_object()
        .ok_or_else(|| invalid("callbacks.leverage", "must be an object"))?;
    match settings.get("enabled") {
        None => Ok(true),
        Some(Value::Bool(enabled)) => Ok(*enabled),
        Some(other) => Err(invalid(
            "callbacks.leverage.enabled",
            format!("must be a boolean, got {}", other),
        )),
    }
}

fn validate_timeframe(value: &Value) -> Result<String, GenerationError> {
    let text = value
        .as_str()
        .ok_or_else(|| invalid("timeframe", format!("must be a string, got {}", value)))?;
    if !is_timeframe(text) {
        return Err(invalid("timeframe", format!("'{}' is not a timeframe like 5m or 1h", text)));
    }
    Ok(text.to_string())
}

/// A positive candle count followed by a unit: `5m`, `1h`, `1d`, `1w`, `1M`.
pub fn is_timeframe(text: &str) -> bool {
    text.strip_suffix(|c: char| TIMEFRAME_UNITS.contains(&c))
        .is_some_and(|count| {
            !count.is_empty() && count.chars().all(|c| c.is_ascii_digit()) && !count.starts_with('0')
        })
}

fn validate_roi(value: &Value) -> Result<Vec<(u64, f64)>, GenerationError> {
    let table = value
        .as_object()
        .ok_or_else(|| invalid("minimalRoi", "must map minutes to ratios"))?;
    let mut roi = Vec::with_capacity(table.len());
    for (minutes, ratio) in table {
        let minutes: u64 = minutes
            .parse()
            .map_err(|_| invalid("minimalRoi", format!("key '{}' is not a whole number of minutes", minutes)))?;
        if roi.iter().any(|(seen, _)| *seen == minutes) {
            return Err(invalid("minimalRoi", format!("lists minute {} more than once", minutes)));
        }
        roi.push((minutes, number(ratio, "minimalRoi")?));
    }
    roi.sort_by_key(|(minutes, _)| *minutes);
    Ok(roi)
}

fn optional_ratio(parameters: &Map<String, Value>, key: &str) -> Result<Option<f64>, GenerationError> {
    match parameters.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => {
            let ratio = number(v, key)?;
            if ratio <= 0.0 {
                return Err(invalid(key, format!("must be positive, got {}", ratio)));
            }
            Ok(Some(ratio))
        }
    }
}

fn number(value: &Value, key: &str) -> Result<f64, GenerationError> {
    value
        .as_f64()
        .filter(|n| n.is_finite())
        .ok_or_else(|| invalid(key, format!("must be a number, got {}", value)))
}

fn invalid(key: &str, reason: impl std::fmt::Display) -> GenerationError {
    GenerationError::schema(format!("parameter '{}' {}", key, reason))
}
