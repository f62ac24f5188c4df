//! Expression tree data structures.
//!
//! - `OperandNode`: value-producing nodes (constants, indicator columns, prices, arithmetic)
//! - `ConditionNode`: boolean-producing nodes (combinators, comparisons, crossings, ranges)
//!
//! Both are closed sum types deserialized from `{"type": "...", ...}` objects. Unknown tags
//! fail deserialization; there is no catch-all variant.

use crate::domain::error::GenerationError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstantValue {
    Bool(bool),
    Number(f64),
    List(Vec<f64>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Volume,
    Hl2,
    Hlc3,
    Ohlc4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeField {
    CurrentRate,
    ProposedLeverage,
    MaxLeverage,
    IsShort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeComponent {
    Minute,
    Hour,
    DayOfWeek,
    DayOfMonth,
    Month,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
    Abs,
    Neg,
}

impl ArithmeticOp {
    pub fn arity(self) -> usize {
        match self {
            ArithmeticOp::Abs | ArithmeticOp::Neg => 1,
            _ => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
}

impl CompareOp {
    /// Ordering inverse: `gt`↔`lt`, `gte`↔`lte`. Operators without an ordering are returned as is.
    pub fn inverted(self) -> Self {
        match self {
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Gte => CompareOp::Lte,
            CompareOp::Lte => CompareOp::Gte,
            other => other,
        }
    }

    pub fn is_membership(self) -> bool {
        matches!(self, CompareOp::In | CompareOp::NotIn)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum OperandNode {
    Constant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        value: ConstantValue,
    },
    Indicator {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        indicator_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<String>,
    },
    Price {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        field: PriceField,
    },
    TradeContext {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        field: TradeField,
    },
    Time {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        component: TimeComponent,
    },
    Computed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        operator: ArithmeticOp,
        operands: Vec<OperandNode>,
    },
    External {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    Custom {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl OperandNode {
    pub fn constant(value: f64) -> Self {
        OperandNode::Constant {
            id: None,
            value: ConstantValue::Number(value),
        }
    }

    pub fn indicator(indicator_id: impl Into<String>) -> Self {
        OperandNode::Indicator {
            id: None,
            indicator_id: indicator_id.into(),
            output: None,
        }
    }

    pub fn price(field: PriceField) -> Self {
        OperandNode::Price { id: None, field }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            OperandNode::Constant { id, .. }
            | OperandNode::Indicator { id, .. }
            | OperandNode::Price { id, .. }
            | OperandNode::TradeContext { id, .. }
            | OperandNode::Time { id, .. }
            | OperandNode::Computed { id, .. }
            | OperandNode::External { id, .. }
            | OperandNode::Custom { id, .. } => id.as_deref(),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            OperandNode::Constant { .. } => "CONSTANT",
            OperandNode::Indicator { .. } => "INDICATOR",
            OperandNode::Price { .. } => "PRICE",
            OperandNode::TradeContext { .. } => "TRADE_CONTEXT",
            OperandNode::Time { .. } => "TIME",
            OperandNode::Computed { .. } => "COMPUTED",
            OperandNode::External { .. } => "EXTERNAL",
            OperandNode::Custom { .. } => "CUSTOM",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ConditionNode {
    And {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        children: Vec<ConditionNode>,
    },
    Or {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        children: Vec<ConditionNode>,
    },
    Not {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        child: Box<ConditionNode>,
    },
    Compare {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        left: OperandNode,
        operator: CompareOp,
        right: OperandNode,
    },
    Crossover {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        left: OperandNode,
        right: OperandNode,
    },
    Crossunder {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        left: OperandNode,
        right: OperandNode,
    },
    InRange {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        value: OperandNode,
        min: OperandNode,
        max: OperandNode,
    },
}

impl ConditionNode {
    /// `OR[]`: a condition that never holds.
    pub fn never() -> Self {
        ConditionNode::Or {
            id: None,
            children: Vec::new(),
        }
    }

    /// `AND[]`: a condition that always holds.
    pub fn always() -> Self {
        ConditionNode::And {
            id: None,
            children: Vec::new(),
        }
    }

    pub fn compare(left: OperandNode, operator: CompareOp, right: OperandNode) -> Self {
        ConditionNode::Compare {
            id: None,
            left,
            operator,
            right,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            ConditionNode::And { id, .. }
            | ConditionNode::Or { id, .. }
            | ConditionNode::Not { id, .. }
            | ConditionNode::Compare { id, .. }
            | ConditionNode::Crossover { id, .. }
            | ConditionNode::Crossunder { id, .. }
            | ConditionNode::InRange { id, .. } => id.as_deref(),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            ConditionNode::And { .. } => "AND",
            ConditionNode::Or { .. } => "OR",
            ConditionNode::Not { .. } => "NOT",
            ConditionNode::Compare { .. } => "COMPARE",
            ConditionNode::Crossover { .. } => "CROSSOVER",
            ConditionNode::Crossunder { .. } => "CROSSUNDER",
            ConditionNode::InRange { .. } => "IN_RANGE",
        }
    }
}

/// A borrowed node of either kind, as yielded by [`walk`].
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Condition(&'a ConditionNode),
    Operand(&'a OperandNode),
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> Option<&'a str> {
        match *self {
            NodeRef::Condition(c) => c.id(),
            NodeRef::Operand(o) => o.id(),
        }
    }
}

impl fmt::Display for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            NodeRef::Condition(c) => c.tag(),
            NodeRef::Operand(o) => o.tag(),
        };
        match self.id() {
            Some(id) => write!(f, "{} node '{}'", tag, id),
            None => write!(f, "{} node", tag),
        }
    }
}

/// Visit every node below `root` in pre-order with an explicit stack.
///
/// The visitor receives each node with its depth (root = 1). Exceeding `max_depth`
/// aborts with a size-limit error before the offending node is visited.
pub fn walk<'a, F>(root: NodeRef<'a>, max_depth: usize, mut visit: F) -> Result<(), GenerationError>
where
    F: FnMut(NodeRef<'a>, usize) -> Result<(), GenerationError>,
{
    let mut stack: Vec<(NodeRef<'a>, usize)> = vec![(root, 1)];
    while let Some((node, depth)) = stack.pop() {
        if depth > max_depth {
            return Err(GenerationError::size_limit(format!(
                "tree depth exceeds {}",
                max_depth
            )));
        }
        visit(node, depth)?;
        let before = stack.len();
        match node {
            NodeRef::Condition(c) => match c {
                ConditionNode::And { children, .. } | ConditionNode::Or { children, .. } => {
                    stack.extend(children.iter().map(|ch| (NodeRef::Condition(ch), depth + 1)));
                }
                ConditionNode::Not { child, .. } => {
                    stack.push((NodeRef::Condition(child), depth + 1));
                }
                ConditionNode::Compare { left, right, .. }
                | ConditionNode::Crossover { left, right, .. }
                | ConditionNode::Crossunder { left, right, .. } => {
                    stack.push((NodeRef::Operand(left), depth + 1));
                    stack.push((NodeRef::Operand(right), depth + 1));
                }
                ConditionNode::InRange {
                    value, min, max, ..
                } => {
                    stack.push((NodeRef::Operand(value), depth + 1));
                    stack.push((NodeRef::Operand(min), depth + 1));
                    stack.push((NodeRef::Operand(max), depth + 1));
                }
            },
            NodeRef::Operand(OperandNode::Computed { operands, .. }) => {
                stack.extend(operands.iter().map(|o| (NodeRef::Operand(o), depth + 1)));
            }
            NodeRef::Operand(_) => {}
        }
        // children were pushed left to right; reverse so they pop in document order
        stack[before..].reverse();
    }
    Ok(())
}
