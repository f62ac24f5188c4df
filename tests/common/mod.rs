#![allow(dead_code)]

//! Test support: strategy document fixtures and an evaluator for the Python subset
//! the generator emits (column expressions, comparisons, boolean combinators,
//! numpy/qtpylib helpers and the leverage callback body).

use serde_json::{json, Value};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn rsi_document() -> Value {
    json!({
        "indicators": [{"id": "RSI_14", "type": "RSI", "params": {"period": 14}}],
        "entryConditions": {
            "type": "COMPARE",
            "id": "entry",
            "left": {"type": "INDICATOR", "indicatorId": "RSI_14"},
            "operator": "lt",
            "right": {"type": "CONSTANT", "value": 30}
        },
        "exitConditions": {
            "type": "COMPARE",
            "id": "exit",
            "left": {"type": "INDICATOR", "indicatorId": "RSI_14"},
            "operator": "gt",
            "right": {"type": "CONSTANT", "value": 70}
        }
    })
}

pub fn rsi_above(threshold: f64) -> Value {
    json!({
        "type": "COMPARE",
        "left": {"type": "INDICATOR", "indicatorId": "RSI_14"},
        "operator": "gt",
        "right": {"type": "CONSTANT", "value": threshold}
    })
}

pub fn ema_cross_document() -> Value {
    json!({
        "version": 2,
        "positionMode": "long_and_short",
        "indicators": [
            {"id": "EMA_fast", "type": "EMA", "params": {"period": 9}},
            {"id": "EMA_slow", "type": "EMA", "params": {"period": 21}}
        ],
        "long": {
            "entryConditions": {
                "type": "CROSSOVER",
                "left": {"type": "INDICATOR", "indicatorId": "EMA_fast"},
                "right": {"type": "INDICATOR", "indicatorId": "EMA_slow"}
            }
        },
        "mirror": {"enabled": true, "source": "LONG", "invertCrossovers": true}
    })
}

// ---------------------------------------------------------------------------
// Extracting pieces of generated code
// ---------------------------------------------------------------------------

/// Mask expression assigned to `column` (`enter_long`, `exit_short`, ...).
pub fn signal_expression(code: &str, column: &str) -> Option<String> {
    let suffix = format!(", '{}'] = 1", column);
    code.lines().find_map(|line| {
        let line = line.trim();
        let rest = line.strip_prefix("dataframe.loc[")?;
        rest.strip_suffix(&suffix).map(str::to_string)
    })
}

/// Body lines of the `leverage` method, with the method's indentation removed.
pub fn leverage_body(code: &str) -> Option<Vec<String>> {
    let start = code.lines().position(|l| l.trim_start().starts_with("def leverage("))?;
    let signature_end = code
        .lines()
        .enumerate()
        .skip(start)
        .find(|(_, l)| l.trim_end().ends_with("-> float:"))?
        .0;
    let body = code
        .lines()
        .skip(signature_end + 1)
        .take_while(|l| l.starts_with("        ") || l.trim().is_empty())
        .filter(|l| !l.trim().is_empty())
        .map(|l| l[8..].to_string())
        .collect();
    Some(body)
}

// ---------------------------------------------------------------------------
// Evaluation environment
// ---------------------------------------------------------------------------

/// A dataframe of float columns, all of equal length.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub columns: HashMap<String, Vec<f64>>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, values: &[f64]) -> Self {
        self.columns.insert(name.to_string(), values.to_vec());
        self
    }

    pub fn len(&self) -> usize {
        self.columns.values().map(Vec::len).max().unwrap_or(0)
    }

    fn column(&self, name: &str) -> Vec<f64> {
        self.columns
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("frame has no column '{}'", name))
    }
}

/// Arguments of the leverage callback.
#[derive(Debug, Clone)]
pub struct CallbackArgs {
    pub current_rate: f64,
    pub proposed_leverage: f64,
    pub max_leverage: f64,
    pub side: String,
}

impl Default for CallbackArgs {
    fn default() -> Self {
        Self {
            current_rate: 100.0,
            proposed_leverage: 1.0,
            max_leverage: 10.0,
            side: "long".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Val {
    Frame,
    Row(usize),
    Series(Vec<f64>),
    Mask(Vec<bool>),
    Num(f64),
    Bool(bool),
    List(Vec<f64>),
    Str(String),
    Unit,
}

impl Val {
    fn num(&self) -> f64 {
        match self {
            Val::Num(n) => *n,
            Val::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            other => panic!("expected a number, got {:?}", other),
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Val::Bool(b) => *b,
            Val::Num(n) => *n != 0.0,
            other => panic!("expected a scalar truth value, got {:?}", other),
        }
    }
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Ident(String),
    Str(String),
    Op(&'static str),
}

const OPERATORS: [&str; 20] = [
    "==", "!=", ">=", "<=", ">", "<", "(", ")", "[", "]", ",", "+", "-", "*", "/", "~", "&", "|",
    ".", "=",
];

fn tokenize(src: &str) -> Vec<Tok> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len()
                && (chars[i].is_ascii_digit()
                    || chars[i] == '.'
                    || chars[i] == 'e'
                    || (matches!(chars[i], '-' | '+') && chars[i - 1] == 'e'))
            {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            tokens.push(Tok::Num(text.parse().unwrap_or_else(|_| panic!("bad number {}", text))));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Tok::Ident(chars[start..i].iter().collect()));
        } else if c == '\'' || c == '"' {
            let start = i + 1;
            i += 1;
            while chars[i] != c {
                i += 1;
            }
            tokens.push(Tok::Str(chars[start..i].iter().collect()));
            i += 1;
        } else {
            let rest: String = chars[i..chars.len().min(i + 2)].iter().collect();
            let op = OPERATORS
                .iter()
                .find(|op| rest.starts_with(**op))
                .unwrap_or_else(|| panic!("unexpected character '{}' in {}", c, src));
            tokens.push(Tok::Op(*op));
            i += op.len();
        }
    }
    tokens
}

// ---------------------------------------------------------------------------
// Evaluator (recursive descent, evaluating while parsing)
// ---------------------------------------------------------------------------

struct Eval<'a> {
    tokens: Vec<Tok>,
    pos: usize,
    frame: &'a Frame,
    args: &'a CallbackArgs,
}

impl<'a> Eval<'a> {
    fn new(src: &str, frame: &'a Frame, args: &'a CallbackArgs) -> Self {
        Self {
            tokens: tokenize(src),
            pos: 0,
            frame,
            args,
        }
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Tok> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Tok {
        let tok = self.tokens[self.pos].clone();
        self.pos += 1;
        tok
    }

    fn is_op(&self, op: &str) -> bool {
        matches!(self.peek(), Some(Tok::Op(o)) if *o == op)
    }

    fn is_word(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Tok::Ident(w)) if w == word)
    }

    fn expect(&mut self, op: &str) {
        assert!(self.is_op(op), "expected '{}' at {:?}", op, self.peek());
        self.pos += 1;
    }

    fn finish(mut self) -> Val {
        let value = self.conditional();
        assert!(self.peek().is_none(), "trailing tokens: {:?}", &self.tokens[self.pos..]);
        value
    }

    // a if cond else b
    fn conditional(&mut self) -> Val {
        let value = self.or();
        if self.is_word("if") {
            self.pos += 1;
            let cond = self.or();
            assert!(self.is_word("else"));
            self.pos += 1;
            let other = self.conditional();
            return if cond.truthy() { value } else { other };
        }
        value
    }

    fn or(&mut self) -> Val {
        let mut left = self.and();
        while self.is_word("or") {
            self.pos += 1;
            let right = self.and();
            left = Val::Bool(left.truthy() || right.truthy());
        }
        left
    }

    fn and(&mut self) -> Val {
        let mut left = self.not();
        while self.is_word("and") {
            self.pos += 1;
            let right = self.not();
            left = Val::Bool(left.truthy() && right.truthy());
        }
        left
    }

    fn not(&mut self) -> Val {
        if self.is_word("not") {
            self.pos += 1;
            return Val::Bool(!self.not().truthy());
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Val {
        let left = self.bit_or();
        for op in ["==", "!=", ">=", "<=", ">", "<"] {
            if self.is_op(op) {
                self.pos += 1;
                let right = self.bit_or();
                return compare(op, &left, &right);
            }
        }
        if self.is_word("in") {
            self.pos += 1;
            let list = self.bit_or();
            return Val::Bool(member(&left, &list));
        }
        if self.is_word("not") && matches!(self.peek_at(1), Some(Tok::Ident(w)) if w == "in") {
            self.pos += 2;
            let list = self.bit_or();
            return Val::Bool(!member(&left, &list));
        }
        left
    }

    fn bit_or(&mut self) -> Val {
        let mut left = self.bit_and();
        while self.is_op("|") {
            self.pos += 1;
            let right = self.bit_and();
            left = logical(&left, &right, |a, b| a || b);
        }
        left
    }

    fn bit_and(&mut self) -> Val {
        let mut left = self.additive();
        while self.is_op("&") {
            self.pos += 1;
            let right = self.additive();
            left = logical(&left, &right, |a, b| a && b);
        }
        left
    }

    fn additive(&mut self) -> Val {
        let mut left = self.term();
        loop {
            if self.is_op("+") {
                self.pos += 1;
                left = arithmetic(&left, &self.term(), |a, b| a + b);
            } else if self.is_op("-") {
                self.pos += 1;
                left = arithmetic(&left, &self.term(), |a, b| a - b);
            } else {
                return left;
            }
        }
    }

    fn term(&mut self) -> Val {
        let mut left = self.unary();
        loop {
            if self.is_op("*") {
                self.pos += 1;
                left = arithmetic(&left, &self.unary(), |a, b| a * b);
            } else if self.is_op("/") {
                self.pos += 1;
                left = arithmetic(&left, &self.unary(), |a, b| a / b);
            } else {
                return left;
            }
        }
    }

    fn unary(&mut self) -> Val {
        if self.is_op("-") {
            self.pos += 1;
            return arithmetic(&Val::Num(0.0), &self.unary(), |a, b| a - b);
        }
        if self.is_op("~") {
            self.pos += 1;
            return match self.unary() {
                Val::Mask(m) => Val::Mask(m.into_iter().map(|b| !b).collect()),
                Val::Bool(b) => Val::Bool(!b),
                other => panic!("cannot invert {:?}", other),
            };
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Val {
        let mut value = self.primary();
        loop {
            if self.is_op("[") {
                self.pos += 1;
                let key = self.conditional();
                self.expect("]");
                value = self.subscript(value, key);
            } else if self.is_op(".") {
                self.pos += 1;
                let Tok::Ident(method) = self.next() else {
                    panic!("expected method name");
                };
                let args = self.call_args();
                value = method_call(&method, value, args);
            } else {
                return value;
            }
        }
    }

    fn primary(&mut self) -> Val {
        match self.next() {
            Tok::Num(n) => Val::Num(n),
            Tok::Str(s) => Val::Str(s),
            Tok::Op("(") => {
                let value = self.conditional();
                self.expect(")");
                value
            }
            Tok::Op("[") => {
                let mut items = Vec::new();
                while !self.is_op("]") {
                    items.push(self.conditional().num());
                    if self.is_op(",") {
                        self.pos += 1;
                    }
                }
                self.expect("]");
                Val::List(items)
            }
            Tok::Ident(name) => {
                let mut path = name;
                while self.is_op(".")
                    && matches!(self.peek_at(1), Some(Tok::Ident(_)))
                    && matches!(path.as_str(), "np" | "pd" | "qtpylib" | "dataframe")
                    && !(path == "dataframe" && !matches!(self.peek_at(1), Some(Tok::Ident(w)) if w == "index"))
                {
                    self.pos += 1;
                    if let Tok::Ident(part) = self.next() {
                        path = format!("{}.{}", path, part);
                    }
                }
                if self.is_op("(") {
                    let args = self.call_args();
                    return self.function(&path, args);
                }
                self.variable(&path)
            }
            other => panic!("unexpected token {:?}", other),
        }
    }

    fn call_args(&mut self) -> Vec<Val> {
        self.expect("(");
        let mut args = Vec::new();
        while !self.is_op(")") {
            // keyword arguments: the name is irrelevant here
            if matches!(self.peek(), Some(Tok::Ident(_))) && matches!(self.peek_at(1), Some(Tok::Op("="))) {
                self.pos += 2;
            }
            args.push(self.conditional());
            if self.is_op(",") {
                self.pos += 1;
            }
        }
        self.expect(")");
        args
    }

    fn variable(&self, name: &str) -> Val {
        let rows = self.frame.len();
        match name {
            "True" => Val::Bool(true),
            "False" => Val::Bool(false),
            "dataframe" => Val::Frame,
            "dataframe.index" => Val::Unit,
            "candle" => Val::Row(rows - 1),
            "previous" => Val::Row(rows - 2),
            "current_rate" => Val::Num(self.args.current_rate),
            "proposed_leverage" => Val::Num(self.args.proposed_leverage),
            "max_leverage" => Val::Num(self.args.max_leverage),
            "side" => Val::Str(self.args.side.clone()),
            other => panic!("unknown name '{}'", other),
        }
    }

    fn subscript(&self, target: Val, key: Val) -> Val {
        let Val::Str(column) = key else {
            panic!("column key must be a string");
        };
        match target {
            Val::Frame => Val::Series(self.frame.column(&column)),
            Val::Row(i) => Val::Num(self.frame.column(&column)[i]),
            other => panic!("cannot subscript {:?}", other),
        }
    }

    fn function(&self, name: &str, args: Vec<Val>) -> Val {
        let rows = self.frame.len();
        match (name, args.as_slice()) {
            ("np.minimum", [a, b]) => arithmetic(a, b, f64::min),
            ("np.maximum", [a, b]) => arithmetic(a, b, f64::max),
            ("np.abs", [a]) => arithmetic(a, &Val::Num(0.0), |x, _| x.abs()),
            ("float", [a]) => Val::Num(a.num()),
            ("pd.Series", [fill, ..]) => Val::Mask(vec![fill.truthy(); rows]),
            ("qtpylib.crossed_above", [Val::Series(a), Val::Series(b)]) => crossed(a, b, true),
            ("qtpylib.crossed_below", [Val::Series(a), Val::Series(b)]) => crossed(a, b, false),
            (other, args) => panic!("unsupported call {}({:?})", other, args),
        }
    }
}

fn method_call(method: &str, target: Val, args: Vec<Val>) -> Val {
    match (method, target, args.as_slice()) {
        ("isin", Val::Series(s), [list]) => {
            Val::Mask(s.iter().map(|v| member(&Val::Num(*v), list)).collect())
        }
        (other, target, _) => panic!("unsupported method {} on {:?}", other, target),
    }
}

fn member(value: &Val, list: &Val) -> bool {
    let Val::List(items) = list else {
        panic!("membership needs a list, got {:?}", list);
    };
    let v = value.num();
    items.iter().any(|i| *i == v)
}

fn crossed(a: &[f64], b: &[f64], above: bool) -> Val {
    Val::Mask(
        (0..a.len())
            .map(|i| {
                i > 0
                    && if above {
                        a[i] > b[i] && a[i - 1] <= b[i - 1]
                    } else {
                        a[i] < b[i] && a[i - 1] >= b[i - 1]
                    }
            })
            .collect(),
    )
}

fn arithmetic(left: &Val, right: &Val, f: impl Fn(f64, f64) -> f64) -> Val {
    match (left, right) {
        (Val::Series(a), Val::Series(b)) => Val::Series(a.iter().zip(b).map(|(x, y)| f(*x, *y)).collect()),
        (Val::Series(a), s) => {
            let y = s.num();
            Val::Series(a.iter().map(|x| f(*x, y)).collect())
        }
        (s, Val::Series(b)) => {
            let x = s.num();
            Val::Series(b.iter().map(|y| f(x, *y)).collect())
        }
        (a, b) => Val::Num(f(a.num(), b.num())),
    }
}

fn compare(op: &str, left: &Val, right: &Val) -> Val {
    let test = |a: f64, b: f64| match op {
        "==" => a == b,
        "!=" => a != b,
        ">=" => a >= b,
        "<=" => a <= b,
        ">" => a > b,
        "<" => a < b,
        _ => unreachable!(),
    };
    match (left, right) {
        (Val::Series(a), Val::Series(b)) => Val::Mask(a.iter().zip(b).map(|(x, y)| test(*x, *y)).collect()),
        (Val::Series(a), s) => {
            let y = s.num();
            Val::Mask(a.iter().map(|x| test(*x, y)).collect())
        }
        (s, Val::Series(b)) => {
            let x = s.num();
            Val::Mask(b.iter().map(|y| test(x, *y)).collect())
        }
        (Val::Str(a), Val::Str(b)) => Val::Bool(test(0.0, if a == b { 0.0 } else { 1.0 })),
        (a, b) => Val::Bool(test(a.num(), b.num())),
    }
}

fn logical(left: &Val, right: &Val, f: impl Fn(bool, bool) -> bool) -> Val {
    match (left, right) {
        (Val::Mask(a), Val::Mask(b)) => Val::Mask(a.iter().zip(b).map(|(x, y)| f(*x, *y)).collect()),
        (Val::Mask(a), s) | (s, Val::Mask(a)) => {
            let y = s.truthy();
            Val::Mask(a.iter().map(|x| f(*x, y)).collect())
        }
        (a, b) => Val::Bool(f(a.truthy(), b.truthy())),
    }
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Evaluate a vectorized condition into one flag per row.
pub fn evaluate_mask(expression: &str, frame: &Frame) -> Vec<bool> {
    let args = CallbackArgs::default();
    match Eval::new(expression, frame, &args).finish() {
        Val::Mask(mask) => mask,
        Val::Bool(b) => vec![b; frame.len()],
        other => panic!("expression is not a mask: {:?}", other),
    }
}

/// Evaluate a scalar expression against the last two rows of `frame`.
pub fn evaluate_scalar(expression: &str, frame: &Frame, args: &CallbackArgs) -> f64 {
    Eval::new(expression, frame, args).finish().num()
}

/// Run the generated `leverage` method body against an analysed dataframe.
pub fn run_leverage(code: &str, frame: &Frame, args: &CallbackArgs) -> f64 {
    let body = leverage_body(code).expect("code has no leverage method");
    let mut lines = body.iter().peekable();
    while let Some(line) = lines.next() {
        let line = line.as_str();
        if line.starts_with("dataframe, _ =") || line.starts_with("candle =") || line.starts_with("previous =") {
            continue;
        }
        if let Some(cond) = line.strip_prefix("if ").and_then(|l| l.strip_suffix(':')) {
            let ret = lines.next().expect("if without body");
            let ret = ret
                .trim()
                .strip_prefix("return ")
                .expect("branch body must return");
            let holds = match cond {
                "len(dataframe) < 2" => frame.len() < 2,
                _ => Eval::new(cond, frame, args).finish().truthy(),
            };
            if holds {
                return evaluate_scalar(ret, frame, args);
            }
            continue;
        }
        if let Some(ret) = line.strip_prefix("return ") {
            return evaluate_scalar(ret, frame, args);
        }
        panic!("unsupported statement: {}", line);
    }
    panic!("leverage method fell through without returning");
}
