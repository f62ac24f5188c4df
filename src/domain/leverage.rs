//! Leverage rule compilation.
//!
//! Rules are ordered by descending priority (ties keep document order). Every conditional
//! rule becomes a guarded branch; the first unconditional rule is the default, emitted last.
//! Without one, a neutral constant is synthesized so every path yields a value.

use crate::domain::document::LeverageRule;
use crate::domain::error::Warning;
use crate::domain::expr::{ConditionNode, OperandNode};

pub const NEUTRAL_LEVERAGE: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct LeverageBranch<'a> {
    pub priority: i64,
    pub condition: &'a ConditionNode,
    pub leverage: &'a OperandNode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LeverageDefault<'a> {
    /// The highest-priority unconditional rule.
    Rule(&'a OperandNode),
    /// No unconditional rule exists.
    Synthesized(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeveragePlan<'a> {
    pub branches: Vec<LeverageBranch<'a>>,
    pub default: LeverageDefault<'a>,
}

impl LeveragePlan<'_> {
    pub fn warning(&self) -> Option<Warning> {
        match self.default {
            LeverageDefault::Synthesized(fallback) => Some(Warning::LeverageFallback { fallback }),
            LeverageDefault::Rule(_) => None,
        }
    }
}

/// Compile `rules` into a decision plan; `None` when there are no rules at all.
pub fn compile(rules: &[LeverageRule], fallback: f64) -> Option<LeveragePlan<'_>> {
    if rules.is_empty() {
        return None;
    }

    let mut ordered: Vec<&LeverageRule> = rules.iter().collect();
    // stable: equal priorities keep document order
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut branches = Vec::new();
    let mut default = None;
    for rule in ordered {
        match (&rule.condition, default.is_some()) {
            (Some(condition), _) => branches.push(LeverageBranch {
                priority: rule.priority,
                condition,
                leverage: &rule.leverage,
            }),
            (None, false) => default = Some(LeverageDefault::Rule(&rule.leverage)),
            (None, true) => {
                tracing::warn!(
                    priority = rule.priority,
                    rule = rule.id.as_deref().unwrap_or("<unnamed>"),
                    "ignoring unreachable unconditional leverage rule"
                );
            }
        }
    }

    let default = default.unwrap_or_else(|| {
        tracing::warn!(fallback, "no unconditional leverage rule, synthesizing fallback");
        LeverageDefault::Synthesized(fallback)
    });

    Some(LeveragePlan { branches, default })
}
