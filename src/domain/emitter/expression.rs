//! Operand and condition trees to Python expression text.
//!
//! Rendering runs on an explicit task stack: visiting a node schedules a combine step
//! followed by its children, and finished children leave their text on a result stack.
//! Depth is tracked per task, so a malformed tree can never exhaust the call stack.

use crate::domain::error::GenerationError;
use crate::domain::expr::{
    ArithmeticOp, CompareOp, ConditionNode, ConstantValue, NodeRef, OperandNode, PriceField,
    TimeComponent, TradeField,
};
use crate::domain::indicator::IndicatorTable;
use std::fmt;

/// Where the rendered expression will be evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Population routines: whole dataframe columns.
    Vectorized,
    /// Per-trade callbacks: single candle rows and callback arguments.
    Callback,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Vectorized => write!(f, "vectorized signal population"),
            Scope::Callback => write!(f, "callback"),
        }
    }
}

/// Candle row an operand reads in callback scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Row {
    Current,
    Previous,
}

impl Row {
    fn name(self) -> &'static str {
        match self {
            Row::Current => "candle",
            Row::Previous => "previous",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Derived from market columns (indicators, prices).
    Market,
    /// Derived from the candle timestamp only.
    Clock,
    /// A single number or boolean.
    Scalar,
    /// A constant array, only valid as the right side of `in` / `not_in`.
    List,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub text: String,
    pub kind: ValueKind,
}

impl Fragment {
    fn new(text: String, kind: ValueKind) -> Self {
        Self { text, kind }
    }

    fn is_series(&self, scope: Scope) -> bool {
        scope == Scope::Vectorized && matches!(self.kind, ValueKind::Market | ValueKind::Clock)
    }
}

enum Task<'a> {
    Condition(&'a ConditionNode, usize),
    Operand(&'a OperandNode, Row, usize),
    Combine(&'a ConditionNode),
    Compute(&'a OperandNode, ArithmeticOp),
}

pub struct ExpressionEmitter<'t> {
    scope: Scope,
    indicators: &'t IndicatorTable,
    max_depth: usize,
}

impl<'t> ExpressionEmitter<'t> {
    pub fn new(scope: Scope, indicators: &'t IndicatorTable, max_depth: usize) -> Self {
        Self {
            scope,
            indicators,
            max_depth,
        }
    }

    pub fn condition(&self, root: &ConditionNode) -> Result<String, GenerationError> {
        let (mut conditions, _) = self.run(Task::Condition(root, 1))?;
        conditions.pop().ok_or_else(unbalanced)
    }

    pub fn operand(&self, root: &OperandNode) -> Result<Fragment, GenerationError> {
        let (_, mut values) = self.run(Task::Operand(root, Row::Current, 1))?;
        let value = values.pop().ok_or_else(unbalanced)?;
        if value.kind == ValueKind::List {
            return Err(GenerationError::type_error(format!(
                "{} is an array where a single value is required",
                NodeRef::Operand(root)
            )));
        }
        Ok(value)
    }

    fn run<'a>(&self, start: Task<'a>) -> Result<(Vec<String>, Vec<Fragment>), GenerationError> {
        let mut tasks = vec![start];
        let mut conditions: Vec<String> = Vec::new();
        let mut values: Vec<Fragment> = Vec::new();

        while let Some(task) = tasks.pop() {
            match task {
                Task::Condition(node, depth) => {
                    self.check_depth(depth)?;
                    tasks.push(Task::Combine(node));
                    let before = tasks.len();
                    self.schedule_condition(node, depth + 1, &mut tasks);
                    tasks[before..].reverse();
                }
                Task::Operand(node, row, depth) => {
                    self.check_depth(depth)?;
                    if let OperandNode::Computed {
                        operator, operands, ..
                    } = node
                    {
                        if operands.len() != operator.arity() {
                            return Err(GenerationError::schema(format!(
                                "{} uses '{:?}' with {} operands, expected {}",
                                NodeRef::Operand(node),
                                operator,
                                operands.len(),
                                operator.arity()
                            )));
                        }
                        tasks.push(Task::Compute(node, *operator));
                        tasks.extend(
                            operands
                                .iter()
                                .rev()
                                .map(|o| Task::Operand(o, row, depth + 1)),
                        );
                    } else {
                        values.push(self.leaf(node, row)?);
                    }
                }
                Task::Combine(node) => {
                    let text = self.combine(node, &mut conditions, &mut values)?;
                    conditions.push(text);
                }
                Task::Compute(node, operator) => {
                    let fragment = self.compute(node, operator, &mut values)?;
                    values.push(fragment);
                }
            }
        }
        Ok((conditions, values))
    }

    fn check_depth(&self, depth: usize) -> Result<(), GenerationError> {
        if depth > self.max_depth {
            return Err(GenerationError::size_limit(format!(
                "tree depth exceeds {}",
                self.max_depth
            )));
        }
        Ok(())
    }

    /// Push the children of `node` in document order; the caller reverses them.
    fn schedule_condition<'a>(&self, node: &'a ConditionNode, depth: usize, tasks: &mut Vec<Task<'a>>) {
        match node {
            ConditionNode::And { children, .. } | ConditionNode::Or { children, .. } => {
                tasks.extend(children.iter().map(|c| Task::Condition(c, depth)));
            }
            ConditionNode::Not { child, .. } => tasks.push(Task::Condition(child, depth)),
            ConditionNode::Compare { left, right, .. } => {
                tasks.push(Task::Operand(left, Row::Current, depth));
                tasks.push(Task::Operand(right, Row::Current, depth));
            }
            ConditionNode::Crossover { left, right, .. }
            | ConditionNode::Crossunder { left, right, .. } => {
                if self.scope == Scope::Callback {
                    tasks.push(Task::Operand(left, Row::Previous, depth));
                    tasks.push(Task::Operand(right, Row::Previous, depth));
                }
                tasks.push(Task::Operand(left, Row::Current, depth));
                tasks.push(Task::Operand(right, Row::Current, depth));
            }
            ConditionNode::InRange {
                value, min, max, ..
            } => {
                tasks.push(Task::Operand(value, Row::Current, depth));
                tasks.push(Task::Operand(min, Row::Current, depth));
                tasks.push(Task::Operand(max, Row::Current, depth));
            }
        }
    }

    fn leaf(&self, node: &OperandNode, row: Row) -> Result<Fragment, GenerationError> {
        match node {
            OperandNode::Constant { value, .. } => constant(node, value),
            OperandNode::Indicator {
                indicator_id,
                output,
                ..
            } => {
                let column = self
                    .indicators
                    .get(indicator_id)?
                    .column(output.as_deref())?;
                Ok(Fragment::new(self.column(&column, row), ValueKind::Market))
            }
            OperandNode::Price { field, .. } => {
                Ok(Fragment::new(self.price(*field, row), ValueKind::Market))
            }
            OperandNode::TradeContext { field, .. } => match self.scope {
                Scope::Callback => Ok(Fragment::new(trade_field(*field).to_string(), ValueKind::Scalar)),
                Scope::Vectorized => Err(GenerationError::Scope {
                    operand: NodeRef::Operand(node).to_string(),
                    scope: self.scope.to_string(),
                }),
            },
            OperandNode::Time { component, .. } => {
                Ok(Fragment::new(self.time(*component, row), ValueKind::Clock))
            }
            OperandNode::External { .. } | OperandNode::Custom { .. } => {
                Err(GenerationError::NotImplemented {
                    what: NodeRef::Operand(node).to_string(),
                })
            }
            OperandNode::Computed { .. } => Err(unbalanced()),
        }
    }

    fn column(&self, name: &str, row: Row) -> String {
        match self.scope {
            Scope::Vectorized => format!("dataframe['{}']", name),
            Scope::Callback => format!("{}['{}']", row.name(), name),
        }
    }

    fn price(&self, field: PriceField, row: Row) -> String {
        let col = |name: &str| self.column(name, row);
        match field {
            PriceField::Open => col("open"),
            PriceField::High => col("high"),
            PriceField::Low => col("low"),
            PriceField::Close => col("close"),
            PriceField::Volume => col("volume"),
            PriceField::Hl2 => format!("(({} + {}) / 2)", col("high"), col("low")),
            PriceField::Hlc3 => format!("(({} + {} + {}) / 3)", col("high"), col("low"), col("close")),
            PriceField::Ohlc4 => format!(
                "(({} + {} + {} + {}) / 4)",
                col("open"),
                col("high"),
                col("low"),
                col("close")
            ),
        }
    }

    fn time(&self, component: TimeComponent, row: Row) -> String {
        let attr = match component {
            TimeComponent::Minute => "minute",
            TimeComponent::Hour => "hour",
            TimeComponent::DayOfWeek => "dayofweek",
            TimeComponent::DayOfMonth => "day",
            TimeComponent::Month => "month",
        };
        match self.scope {
            Scope::Vectorized => format!("dataframe['date'].dt.{}", attr),
            Scope::Callback => format!("{}['date'].{}", row.name(), attr),
        }
    }

    fn compute(
        &self,
        node: &OperandNode,
        operator: ArithmeticOp,
        values: &mut Vec<Fragment>,
    ) -> Result<Fragment, GenerationError> {
        let operands = values.split_off(
            values
                .len()
                .checked_sub(operator.arity())
                .ok_or_else(unbalanced)?,
        );
        if operands.iter().any(|o| o.kind == ValueKind::List) {
            return Err(GenerationError::type_error(format!(
                "{} applies arithmetic to an array constant",
                NodeRef::Operand(node)
            )));
        }
        let kind = if operands.iter().any(|o| o.kind == ValueKind::Market) {
            ValueKind::Market
        } else if operands.iter().any(|o| o.kind == ValueKind::Clock) {
            ValueKind::Clock
        } else {
            ValueKind::Scalar
        };
        let text = match (operator, operands.as_slice()) {
            (ArithmeticOp::Add, [a, b]) => format!("({} + {})", a.text, b.text),
            (ArithmeticOp::Sub, [a, b]) => format!("({} - {})", a.text, b.text),
            (ArithmeticOp::Mul, [a, b]) => format!("({} * {})", a.text, b.text),
            (ArithmeticOp::Div, [a, b]) => format!("({} / {})", a.text, b.text),
            (ArithmeticOp::Min, [a, b]) => format!("np.minimum({}, {})", a.text, b.text),
            (ArithmeticOp::Max, [a, b]) => format!("np.maximum({}, {})", a.text, b.text),
            (ArithmeticOp::Abs, [a]) => format!("np.abs({})", a.text),
            (ArithmeticOp::Neg, [a]) => format!("(-{})", a.text),
            _ => return Err(unbalanced()),
        };
        Ok(Fragment::new(text, kind))
    }

    fn combine(
        &self,
        node: &ConditionNode,
        conditions: &mut Vec<String>,
        values: &mut Vec<Fragment>,
    ) -> Result<String, GenerationError> {
        match node {
            ConditionNode::And { children, .. } => {
                let parts = take(conditions, children.len())?;
                Ok(self.junction(parts, true))
            }
            ConditionNode::Or { children, .. } => {
                let parts = take(conditions, children.len())?;
                Ok(self.junction(parts, false))
            }
            ConditionNode::Not { .. } => {
                let [child] = take_array(conditions)?;
                Ok(match self.scope {
                    Scope::Vectorized => format!("(~{})", child),
                    Scope::Callback => format!("(not {})", child),
                })
            }
            ConditionNode::Compare { operator, .. } => {
                let [left, right] = take_array(values)?;
                self.compare(node, *operator, left, right)
            }
            ConditionNode::Crossover { .. } | ConditionNode::Crossunder { .. } => {
                let above = matches!(node, ConditionNode::Crossover { .. });
                self.crossing(node, above, values)
            }
            ConditionNode::InRange { .. } => {
                let [value, min, max] = take_array(values)?;
                let operands = [&value, &min, &max];
                if operands.iter().any(|o| o.kind == ValueKind::List) {
                    return Err(GenerationError::type_error(format!(
                        "{} has an array bound or value",
                        NodeRef::Condition(node)
                    )));
                }
                self.require_series(node, &operands)?;
                let and = self.and_operator();
                Ok(format!(
                    "(({} >= {}) {} ({} <= {}))",
                    value.text, min.text, and, value.text, max.text
                ))
            }
        }
    }

    fn junction(&self, parts: Vec<String>, all: bool) -> String {
        match parts.len() {
            0 => self.literal(all),
            1 => parts.into_iter().next().unwrap_or_else(|| self.literal(all)),
            _ => {
                let joiner = match (self.scope, all) {
                    (Scope::Vectorized, true) => " & ",
                    (Scope::Vectorized, false) => " | ",
                    (Scope::Callback, true) => " and ",
                    (Scope::Callback, false) => " or ",
                };
                format!("({})", parts.join(joiner))
            }
        }
    }

    /// Constant truth value: a full boolean column when vectorized.
    fn literal(&self, value: bool) -> String {
        let python = if value { "True" } else { "False" };
        match self.scope {
            Scope::Vectorized => format!("pd.Series({}, index=dataframe.index)", python),
            Scope::Callback => python.to_string(),
        }
    }

    fn and_operator(&self) -> &'static str {
        match self.scope {
            Scope::Vectorized => "&",
            Scope::Callback => "and",
        }
    }

    fn require_series(&self, node: &ConditionNode, operands: &[&Fragment]) -> Result<(), GenerationError> {
        if self.scope == Scope::Vectorized && !operands.iter().any(|o| o.is_series(self.scope)) {
            return Err(GenerationError::type_error(format!(
                "{} has only scalar operands where a series is required",
                NodeRef::Condition(node)
            )));
        }
        Ok(())
    }

    fn compare(
        &self,
        node: &ConditionNode,
        operator: CompareOp,
        left: Fragment,
        right: Fragment,
    ) -> Result<String, GenerationError> {
        if left.kind == ValueKind::List {
            return Err(GenerationError::type_error(format!(
                "{} has an array on its left side",
                NodeRef::Condition(node)
            )));
        }
        if operator.is_membership() {
            if right.kind != ValueKind::List {
                return Err(GenerationError::type_error(format!(
                    "{} requires a constant array on its right side",
                    NodeRef::Condition(node)
                )));
            }
            self.require_series(node, &[&left])?;
            let negate = operator == CompareOp::NotIn;
            return Ok(match (self.scope, negate) {
                (Scope::Vectorized, false) => format!("{}.isin({})", left.text, right.text),
                (Scope::Vectorized, true) => format!("(~{}.isin({}))", left.text, right.text),
                (Scope::Callback, false) => format!("({} in {})", left.text, right.text),
                (Scope::Callback, true) => format!("({} not in {})", left.text, right.text),
            });
        }
        if right.kind == ValueKind::List {
            return Err(GenerationError::type_error(format!(
                "{} compares against an array; use 'in' or 'not_in'",
                NodeRef::Condition(node)
            )));
        }
        self.require_series(node, &[&left, &right])?;
        let symbol = match operator {
            CompareOp::Eq => "==",
            CompareOp::Neq => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::In | CompareOp::NotIn => return Err(unbalanced()),
        };
        Ok(format!("({} {} {})", left.text, symbol, right.text))
    }

    fn crossing(
        &self,
        node: &ConditionNode,
        above: bool,
        values: &mut Vec<Fragment>,
    ) -> Result<String, GenerationError> {
        let count = match self.scope {
            Scope::Vectorized => 2,
            Scope::Callback => 4,
        };
        let operands = take(values, count)?;
        for operand in &operands {
            if operand.kind != ValueKind::Market {
                return Err(GenerationError::type_error(format!(
                    "{} requires two market series, got '{}'",
                    NodeRef::Condition(node),
                    operand.text
                )));
            }
        }
        match operands.as_slice() {
            [left, right] => {
                let function = if above { "crossed_above" } else { "crossed_below" };
                Ok(format!("qtpylib.{}({}, {})", function, left.text, right.text))
            }
            [prev_left, prev_right, left, right] => {
                let (before, after) = if above { ("<=", ">") } else { (">=", "<") };
                Ok(format!(
                    "(({} {} {}) and ({} {} {}))",
                    prev_left.text, before, prev_right.text, left.text, after, right.text
                ))
            }
            _ => Err(unbalanced()),
        }
    }
}

fn constant(node: &OperandNode, value: &ConstantValue) -> Result<Fragment, GenerationError> {
    let non_finite = || {
        GenerationError::schema(format!("{} holds a non-finite number", NodeRef::Operand(node)))
    };
    match value {
        ConstantValue::Bool(b) => Ok(Fragment::new(
            if *b { "True" } else { "False" }.to_string(),
            ValueKind::Scalar,
        )),
        ConstantValue::Number(n) if n.is_finite() => Ok(Fragment::new(number(*n), ValueKind::Scalar)),
        ConstantValue::Number(_) => Err(non_finite()),
        ConstantValue::List(items) => {
            if items.iter().any(|n| !n.is_finite()) {
                return Err(non_finite());
            }
            let items: Vec<String> = items.iter().map(|n| number(*n)).collect();
            Ok(Fragment::new(format!("[{}]", items.join(", ")), ValueKind::List))
        }
    }
}

/// Python float literal; negative values are parenthesised.
pub fn number(value: f64) -> String {
    if value < 0.0 {
        format!("({:?})", value)
    } else {
        format!("{:?}", value)
    }
}

fn trade_field(field: TradeField) -> &'static str {
    match field {
        TradeField::CurrentRate => "current_rate",
        TradeField::ProposedLeverage => "proposed_leverage",
        TradeField::MaxLeverage => "max_leverage",
        TradeField::IsShort => "(1.0 if side == 'short' else 0.0)",
    }
}

fn take<T>(stack: &mut Vec<T>, count: usize) -> Result<Vec<T>, GenerationError> {
    let at = stack.len().checked_sub(count).ok_or_else(unbalanced)?;
    Ok(stack.split_off(at))
}

fn take_array<T, const N: usize>(stack: &mut Vec<T>) -> Result<[T; N], GenerationError> {
    take(stack, N)?.try_into().map_err(|_| unbalanced())
}

fn unbalanced() -> GenerationError {
    GenerationError::schema("expression could not be assembled")
}
