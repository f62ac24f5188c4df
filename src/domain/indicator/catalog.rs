//! Built-in indicator table.
//!
//! Templates target TA-Lib's abstract API (`ta`) and qtpylib, both available
//! to freqtrade strategies.

use super::{IndicatorSpec, ParamKind, ParamSpec};

const fn integer(name: &'static str, default: f64, min: f64, max: f64) -> ParamSpec {
    ParamSpec {
        name,
        kind: ParamKind::Integer,
        default: Some(default),
        min,
        max,
    }
}

const fn float(name: &'static str, default: f64, min: f64, max: f64) -> ParamSpec {
    ParamSpec {
        name,
        kind: ParamKind::Float,
        default: Some(default),
        min,
        max,
    }
}

const fn period(default: f64) -> ParamSpec {
    integer("period", default, 1.0, 1000.0)
}

const PERIOD_10: &[ParamSpec] = &[period(10.0)];
const PERIOD_14: &[ParamSpec] = &[period(14.0)];
const PERIOD_20: &[ParamSpec] = &[period(20.0)];
const STDDEV: &[ParamSpec] = &[period(20.0), float("nbdev", 1.0, 0.1, 10.0)];

const fn single(
    type_id: &'static str,
    description: &'static str,
    params: &'static [ParamSpec],
    template: &'static [&'static str],
) -> IndicatorSpec {
    IndicatorSpec {
        type_id,
        description,
        params,
        outputs: &[],
        template,
        warmup: &["period"],
        ordering: &[],
    }
}

pub static BUILTIN: [IndicatorSpec; 15] = [
    single(
        "SMA",
        "Simple moving average of close",
        PERIOD_20,
        &["dataframe['{col}'] = ta.SMA(dataframe, timeperiod={period})"],
    ),
    single(
        "EMA",
        "Exponential moving average of close",
        PERIOD_20,
        &["dataframe['{col}'] = ta.EMA(dataframe, timeperiod={period})"],
    ),
    single(
        "WMA",
        "Weighted moving average of close",
        PERIOD_20,
        &["dataframe['{col}'] = ta.WMA(dataframe, timeperiod={period})"],
    ),
    single(
        "RSI",
        "Relative strength index",
        PERIOD_14,
        &["dataframe['{col}'] = ta.RSI(dataframe, timeperiod={period})"],
    ),
    single(
        "ROC",
        "Rate of change",
        PERIOD_10,
        &["dataframe['{col}'] = ta.ROC(dataframe, timeperiod={period})"],
    ),
    single(
        "ATR",
        "Average true range",
        PERIOD_14,
        &["dataframe['{col}'] = ta.ATR(dataframe, timeperiod={period})"],
    ),
    single(
        "ADX",
        "Average directional index",
        PERIOD_14,
        &["dataframe['{col}'] = ta.ADX(dataframe, timeperiod={period})"],
    ),
    single(
        "CCI",
        "Commodity channel index",
        PERIOD_20,
        &["dataframe['{col}'] = ta.CCI(dataframe, timeperiod={period})"],
    ),
    single(
        "MFI",
        "Money flow index",
        PERIOD_14,
        &["dataframe['{col}'] = ta.MFI(dataframe, timeperiod={period})"],
    ),
    single(
        "STDDEV",
        "Rolling standard deviation of close",
        STDDEV,
        &["dataframe['{col}'] = ta.STDDEV(dataframe, timeperiod={period}, nbdev={nbdev})"],
    ),
    IndicatorSpec {
        type_id: "OBV",
        description: "On-balance volume",
        params: &[],
        outputs: &[],
        template: &["dataframe['{col}'] = ta.OBV(dataframe)"],
        warmup: &[],
        ordering: &[],
    },
    IndicatorSpec {
        type_id: "VWAP",
        description: "Rolling volume-weighted average price",
        params: &[integer("window", 200.0, 1.0, 5000.0)],
        outputs: &[],
        template: &["dataframe['{col}'] = qtpylib.rolling_vwap(dataframe, window={window})"],
        warmup: &["window"],
        ordering: &[],
    },
    IndicatorSpec {
        type_id: "MACD",
        description: "Moving average convergence/divergence",
        params: &[
            integer("fast", 12.0, 1.0, 500.0),
            integer("slow", 26.0, 2.0, 1000.0),
            integer("signal", 9.0, 1.0, 500.0),
        ],
        outputs: &["macd", "signal", "hist"],
        template: &[
            "{var} = ta.MACD(dataframe, fastperiod={fast}, slowperiod={slow}, signalperiod={signal})",
            "dataframe['{col:macd}'] = {var}['macd']",
            "dataframe['{col:signal}'] = {var}['macdsignal']",
            "dataframe['{col:hist}'] = {var}['macdhist']",
        ],
        warmup: &["slow"],
        ordering: &[("fast", "slow")],
    },
    IndicatorSpec {
        type_id: "BBANDS",
        description: "Bollinger bands",
        params: &[period(20.0), float("stddev", 2.0, 0.1, 10.0)],
        outputs: &["upper", "middle", "lower"],
        template: &[
            "{var} = ta.BBANDS(dataframe, timeperiod={period}, nbdevup={stddev}, nbdevdn={stddev})",
            "dataframe['{col:upper}'] = {var}['upperband']",
            "dataframe['{col:middle}'] = {var}['middleband']",
            "dataframe['{col:lower}'] = {var}['lowerband']",
        ],
        warmup: &["period"],
        ordering: &[],
    },
    IndicatorSpec {
        type_id: "STOCH",
        description: "Slow stochastic oscillator",
        params: &[
            integer("k_period", 14.0, 1.0, 500.0),
            integer("smooth_k", 3.0, 1.0, 100.0),
            integer("d_period", 3.0, 1.0, 100.0),
        ],
        outputs: &["k", "d"],
        template: &[
            "{var} = ta.STOCH(dataframe, fastk_period={k_period}, slowk_period={smooth_k}, slowd_period={d_period})",
            "dataframe['{col:k}'] = {var}['slowk']",
            "dataframe['{col:d}'] = {var}['slowd']",
        ],
        warmup: &["k_period"],
        ordering: &[],
    },
];
