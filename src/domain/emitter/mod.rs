//! Strategy class assembly.
//!
//! Produces one Python module containing a single `IStrategy` subclass:
//! 1. header and imports
//! 2. class attributes (timeframe, stoploss, ROI table, trailing stop, warm-up)
//! 3. `populate_indicators` from the resolved indicator table
//! 4. `populate_entry_trend` / `populate_exit_trend` for every traded direction
//! 5. the `leverage` callback, when a leverage plan exists and is enabled
//!
//! Every section is rendered before anything is concatenated, so an error anywhere
//! yields no output at all.

pub mod expression;
pub mod settings;

pub use expression::{ExpressionEmitter, Fragment, Scope, ValueKind};
pub use settings::{ClassSettings, SettingsDefaults, TrailingStop};

use crate::domain::document::{Direction, PositionMode, StrategyDocument};
use crate::domain::error::GenerationError;
use crate::domain::indicator::IndicatorTable;
use crate::domain::leverage::{LeverageDefault, LeveragePlan};

const INDENT: &str = "    ";

// Hard keywords of Python 3.12 (`keyword.kwlist`).
const PYTHON_KEYWORDS: [&str; 35] = [
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise",
    "return", "try", "while", "with", "yield",
];

// Module-level names bound by the generated imports; a class with one of
// these names would rebind it.
const RESERVED_NAMES: [&str; 7] = ["datetime", "np", "pd", "DataFrame", "ta", "qtpylib", "IStrategy"];

/// Reject class names that are not plain Python identifiers.
pub fn validate_class_name(name: &str) -> Result<(), GenerationError> {
    let mut chars = name.chars();
    let starts_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !starts_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(GenerationError::schema(format!(
            "target name '{}' is not a valid class identifier",
            name
        )));
    }
    if PYTHON_KEYWORDS.contains(&name) {
        return Err(GenerationError::schema(format!(
            "target name '{}' is a reserved word",
            name
        )));
    }
    if RESERVED_NAMES.contains(&name) {
        return Err(GenerationError::schema(format!(
            "target name '{}' would shadow a name imported by the generated module",
            name
        )));
    }
    Ok(())
}

/// Everything needed to render one strategy class.
pub struct StrategyClass<'a> {
    pub name: &'a str,
    pub document: &'a StrategyDocument,
    pub indicators: &'a IndicatorTable,
    pub settings: &'a ClassSettings,
    pub leverage: Option<&'a LeveragePlan<'a>>,
    pub fallback_leverage: f64,
    pub max_depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Entry,
    Exit,
}

impl Signal {
    fn column(self, direction: Direction) -> String {
        let prefix = match self {
            Signal::Entry => "enter",
            Signal::Exit => "exit",
        };
        format!("{}_{}", prefix, direction)
    }
}

impl StrategyClass<'_> {
    pub fn emit(&self) -> Result<String, GenerationError> {
        validate_class_name(self.name)?;

        let indicators = self.render_indicators()?;
        let entries = self.render_signals(Signal::Entry)?;
        let exits = self.render_signals(Signal::Exit)?;
        let leverage = match (self.leverage, self.settings.leverage_callback) {
            (Some(plan), true) => Some(self.render_leverage(plan)?),
            (Some(_), false) => {
                tracing::debug!("leverage callback disabled by document callbacks");
                None
            }
            (None, _) => None,
        };

        let mut output = String::new();
        output.push_str(&self.render_header());
        output.push_str(&self.render_attributes());
        output.push_str(&indicators);
        output.push_str(&entries);
        output.push_str(&exits);
        if let Some(leverage) = leverage {
            output.push_str(&leverage);
        }
        Ok(output)
    }

    fn render_header(&self) -> String {
        let mode = match self.document.position_mode {
            PositionMode::LongOnly => "long_only",
            PositionMode::ShortOnly => "short_only",
            PositionMode::LongAndShort => "long_and_short",
        };
        let mut output = String::new();
        output.push_str("# Generated by signalsmith. Do not edit by hand.\n");
        output.push_str(&format!("# Position mode: {}\n", mode));
        output.push_str("from datetime import datetime\n\n");
        output.push_str("import numpy as np\n");
        output.push_str("import pandas as pd\n");
        output.push_str("from pandas import DataFrame\n");
        output.push_str("import talib.abstract as ta\n");
        output.push_str("import freqtrade.vendor.qtpylib.indicators as qtpylib\n");
        output.push_str("from freqtrade.strategy import IStrategy\n\n\n");
        output.push_str(&format!("class {}(IStrategy):\n", self.name));
        output
    }

    fn render_attributes(&self) -> String {
        let s = self.settings;
        let can_short = self.document.position_mode.trades(Direction::Short);
        let mut output = String::new();
        output.push_str(&format!("{}INTERFACE_VERSION = 3\n\n", INDENT));
        output.push_str(&format!("{}can_short = {}\n", INDENT, python_bool(can_short)));
        output.push_str(&format!("{}timeframe = '{}'\n", INDENT, s.timeframe));
        output.push_str(&format!("{}stoploss = {:?}\n\n", INDENT, s.stoploss));

        output.push_str(&format!("{}minimal_roi = {{\n", INDENT));
        for (minutes, ratio) in &s.minimal_roi {
            output.push_str(&format!("{}{}\"{}\": {:?},\n", INDENT, INDENT, minutes, ratio));
        }
        output.push_str(&format!("{}}}\n\n", INDENT));

        if let Some(trailing) = &s.trailing_stop {
            output.push_str(&format!("{}trailing_stop = True\n", INDENT));
            if let Some(positive) = trailing.positive {
                output.push_str(&format!("{}trailing_stop_positive = {:?}\n", INDENT, positive));
            }
            if let Some(offset) = trailing.positive_offset {
                output.push_str(&format!(
                    "{}trailing_stop_positive_offset = {:?}\n",
                    INDENT, offset
                ));
                output.push_str(&format!("{}trailing_only_offset_is_reached = True\n", INDENT));
            }
            output.push('\n');
        }

        output.push_str(&format!(
            "{}startup_candle_count = {}\n",
            INDENT,
            self.startup_candle_count()
        ));
        output
    }

    fn startup_candle_count(&self) -> u64 {
        let warmup = self.indicators.max_warmup() as u64;
        match self.settings.startup_candle_count {
            Some(requested) => {
                if requested < warmup {
                    tracing::warn!(
                        requested,
                        warmup,
                        "startup candle count is shorter than the longest indicator warm-up"
                    );
                }
                requested
            }
            None => warmup,
        }
    }

    fn render_indicators(&self) -> Result<String, GenerationError> {
        let mut output = String::new();
        output.push_str(&format!(
            "\n{}def populate_indicators(self, dataframe: DataFrame, metadata: dict) -> DataFrame:\n",
            INDENT
        ));
        for indicator in self.indicators.iter() {
            for line in indicator.render()? {
                output.push_str(&format!("{}{}{}\n", INDENT, INDENT, line));
            }
        }
        output.push_str(&format!("{}{}return dataframe\n", INDENT, INDENT));
        Ok(output)
    }

    fn render_signals(&self, signal: Signal) -> Result<String, GenerationError> {
        let routine = match signal {
            Signal::Entry => "populate_entry_trend",
            Signal::Exit => "populate_exit_trend",
        };
        let emitter = ExpressionEmitter::new(Scope::Vectorized, self.indicators, self.max_depth);

        let mut output = String::new();
        output.push_str(&format!(
            "\n{}def {}(self, dataframe: DataFrame, metadata: dict) -> DataFrame:\n",
            INDENT, routine
        ));
        for direction in [Direction::Long, Direction::Short] {
            if !self.document.position_mode.trades(direction) {
                continue;
            }
            let signals = self.document.signals(direction);
            let tree = match signal {
                Signal::Entry => &signals.entry_conditions,
                Signal::Exit => &signals.exit_conditions,
            };
            let condition = emitter.condition(tree)?;
            output.push_str(&format!(
                "{}{}dataframe.loc[{}, '{}'] = 1\n",
                INDENT,
                INDENT,
                condition,
                signal.column(direction)
            ));
        }
        output.push_str(&format!("{}{}return dataframe\n", INDENT, INDENT));
        Ok(output)
    }

    fn render_leverage(&self, plan: &LeveragePlan<'_>) -> Result<String, GenerationError> {
        let emitter = ExpressionEmitter::new(Scope::Callback, self.indicators, self.max_depth);
        let body = format!("{}{}", INDENT, INDENT);

        let mut output = String::new();
        output.push_str(&format!(
            "\n{}def leverage(self, pair: str, current_time: datetime, current_rate: float,\n",
            INDENT
        ));
        output.push_str(&format!(
            "{}{}{}proposed_leverage: float, max_leverage: float, entry_tag: str | None,\n",
            INDENT, INDENT, INDENT
        ));
        output.push_str(&format!(
            "{}{}{}side: str, **kwargs) -> float:\n",
            INDENT, INDENT, INDENT
        ));
        output.push_str(&format!(
            "{}dataframe, _ = self.dp.get_analyzed_dataframe(pair, self.timeframe)\n",
            body
        ));
        output.push_str(&format!("{}if len(dataframe) < 2:\n", body));
        output.push_str(&format!(
            "{}{}return {:?}\n",
            body, INDENT, self.fallback_leverage
        ));
        output.push_str(&format!("{}candle = dataframe.iloc[-1].squeeze()\n", body));
        output.push_str(&format!("{}previous = dataframe.iloc[-2].squeeze()\n", body));

        for branch in &plan.branches {
            let condition = emitter.condition(branch.condition)?;
            let leverage = emitter.operand(branch.leverage)?;
            output.push_str(&format!("{}if {}:\n", body, condition));
            output.push_str(&format!("{}{}return float({})\n", body, INDENT, leverage.text));
        }
        match &plan.default {
            LeverageDefault::Rule(operand) => {
                let leverage = emitter.operand(operand)?;
                output.push_str(&format!("{}return float({})\n", body, leverage.text));
            }
            LeverageDefault::Synthesized(fallback) => {
                output.push_str(&format!("{}return {:?}\n", body, fallback));
            }
        }
        Ok(output)
    }
}

fn python_bool(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}
