//! Direction mirroring.
//!
//! Derives the opposite direction's signal trees by inverting comparison operators
//! and swapping crossings. Operand subtrees are never touched and nothing is evaluated.

use crate::domain::document::{MirrorPolicy, SignalConfig, StrategyDocument};
use crate::domain::expr::ConditionNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inversion {
    pub comparisons: bool,
    pub crossovers: bool,
}

impl From<&MirrorPolicy> for Inversion {
    fn from(policy: &MirrorPolicy) -> Self {
        Self {
            comparisons: policy.invert_comparisons,
            crossovers: policy.invert_crossovers,
        }
    }
}

/// Return an inverted deep copy of `node`.
pub fn mirror_condition(node: &ConditionNode, inversion: Inversion) -> ConditionNode {
    let mut copy = node.clone();
    let mut stack: Vec<&mut ConditionNode> = vec![&mut copy];

    while let Some(current) = stack.pop() {
        if inversion.crossovers
            && matches!(
                current,
                ConditionNode::Crossover { .. } | ConditionNode::Crossunder { .. }
            )
        {
            swap_crossing(current);
            continue;
        }
        match current {
            ConditionNode::And { children, .. } | ConditionNode::Or { children, .. } => {
                stack.extend(children.iter_mut());
            }
            ConditionNode::Not { child, .. } => stack.push(child.as_mut()),
            ConditionNode::Compare { operator, .. } => {
                if inversion.comparisons {
                    *operator = operator.inverted();
                }
            }
            ConditionNode::Crossover { .. }
            | ConditionNode::Crossunder { .. }
            | ConditionNode::InRange { .. } => {}
        }
    }
    copy
}

fn swap_crossing(node: &mut ConditionNode) {
    let taken = std::mem::replace(node, ConditionNode::never());
    *node = match taken {
        ConditionNode::Crossover { id, left, right } => ConditionNode::Crossunder { id, left, right },
        ConditionNode::Crossunder { id, left, right } => ConditionNode::Crossover { id, left, right },
        other => other,
    };
}

pub fn mirror_signals(signals: &SignalConfig, inversion: Inversion) -> SignalConfig {
    SignalConfig {
        entry_conditions: mirror_condition(&signals.entry_conditions, inversion),
        exit_conditions: mirror_condition(&signals.exit_conditions, inversion),
    }
}

/// Replace the mirror target's signals with the derived ones when the policy is enabled.
///
/// Returns whether mirroring took place.
pub fn apply_mirror_policy(document: &mut StrategyDocument) -> bool {
    let Some(policy) = document.mirror.filter(|m| m.enabled) else {
        return false;
    };
    let target = policy.source.opposite();
    tracing::debug!(source = %policy.source, target = %target, "deriving mirrored signals");
    let derived = mirror_signals(document.signals(policy.source), Inversion::from(&policy));
    *document.signals_mut(target) = derived;
    true
}
