//! Canonical strategy document.
//!
//! A document is deserialized only after normalization (see [`crate::domain::normalizer`]),
//! so this module knows a single shape. It is treated as an immutable snapshot for the
//! duration of one generation call.

use crate::domain::error::GenerationError;
use crate::domain::expr::{walk, ConditionNode, NodeRef, OperandNode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

pub const CANONICAL_VERSION: u64 = 2;
pub const LEGACY_VERSION: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionMode {
    #[default]
    LongOnly,
    ShortOnly,
    LongAndShort,
}

impl PositionMode {
    pub fn trades(self, direction: Direction) -> bool {
        matches!(
            (self, direction),
            (PositionMode::LongAndShort, _)
                | (PositionMode::LongOnly, Direction::Long)
                | (PositionMode::ShortOnly, Direction::Short)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    #[serde(alias = "LONG")]
    Long,
    #[serde(alias = "SHORT")]
    Short,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorDeclaration {
    pub id: String,
    #[serde(rename = "type")]
    pub indicator_type: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalConfig {
    #[serde(default = "ConditionNode::never")]
    pub entry_conditions: ConditionNode,
    #[serde(default = "ConditionNode::never")]
    pub exit_conditions: ConditionNode,
}

impl SignalConfig {
    /// A config that never enters and never exits.
    pub fn no_op() -> Self {
        Self {
            entry_conditions: ConditionNode::never(),
            exit_conditions: ConditionNode::never(),
        }
    }
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self::no_op()
    }
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorPolicy {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub source: Direction,
    #[serde(default = "enabled_by_default")]
    pub invert_comparisons: bool,
    #[serde(default = "enabled_by_default")]
    pub invert_crossovers: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeverageRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub condition: Option<ConditionNode>,
    pub leverage: OperandNode,
}

fn canonical_version() -> u64 {
    CANONICAL_VERSION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyDocument {
    #[serde(default = "canonical_version")]
    pub version: u64,
    #[serde(default)]
    pub position_mode: PositionMode,
    #[serde(default)]
    pub indicators: Vec<IndicatorDeclaration>,
    #[serde(default)]
    pub long: SignalConfig,
    #[serde(default)]
    pub short: SignalConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror: Option<MirrorPolicy>,
    #[serde(default)]
    pub leverage_rules: Vec<LeverageRule>,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub callbacks: Map<String, Value>,
}

impl StrategyDocument {
    pub fn signals(&self, direction: Direction) -> &SignalConfig {
        match direction {
            Direction::Long => &self.long,
            Direction::Short => &self.short,
        }
    }

    pub fn signals_mut(&mut self, direction: Direction) -> &mut SignalConfig {
        match direction {
            Direction::Long => &mut self.long,
            Direction::Short => &mut self.short,
        }
    }

    /// Check that declared indicator ids and tree node ids are each unique.
    ///
    /// A mirror target's authored trees are skipped since they are replaced before emission.
    pub fn check_unique_ids(&self, max_depth: usize) -> Result<(), GenerationError> {
        let mut indicator_ids = HashSet::new();
        for decl in &self.indicators {
            if decl.id.trim().is_empty() {
                return Err(GenerationError::schema("indicator declaration with empty id"));
            }
            if !indicator_ids.insert(decl.id.as_str()) {
                return Err(GenerationError::schema(format!(
                    "indicator id '{}' is declared more than once",
                    decl.id
                )));
            }
        }

        let mirror_target = self
            .mirror
            .filter(|m| m.enabled)
            .map(|m| m.source.opposite());

        let mut roots: Vec<NodeRef<'_>> = Vec::new();
        for direction in [Direction::Long, Direction::Short] {
            if Some(direction) == mirror_target {
                continue;
            }
            let signals = self.signals(direction);
            roots.push(NodeRef::Condition(&signals.entry_conditions));
            roots.push(NodeRef::Condition(&signals.exit_conditions));
        }
        for rule in &self.leverage_rules {
            if let Some(condition) = &rule.condition {
                roots.push(NodeRef::Condition(condition));
            }
            roots.push(NodeRef::Operand(&rule.leverage));
        }

        let mut node_ids: HashSet<&str> = HashSet::new();
        for root in roots {
            walk(root, max_depth, |node, _| match node.id() {
                Some(id) if !node_ids.insert(id) => Err(GenerationError::schema(format!(
                    "node id '{}' is used more than once",
                    id
                ))),
                _ => Ok(()),
            })?;
        }
        Ok(())
    }
}
