//! Indicator registry.
//!
//! A closed table maps indicator type ids to:
//! - `ParamSpec`: parameter names, kinds, defaults and valid ranges
//! - output names and the column naming rule derived from the instance id
//! - a code template computing the indicator over the OHLCV dataframe
//!
//! Adding an indicator type means adding one entry to [`catalog::BUILTIN`].

pub mod catalog;

use crate::domain::document::IndicatorDeclaration;
use crate::domain::error::GenerationError;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// Dataframe columns the emitted class reads or writes itself.
pub const RESERVED_COLUMNS: [&str; 10] = [
    "date",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "enter_long",
    "exit_long",
    "enter_short",
    "exit_short",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Integer,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub default: Option<f64>,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSpec {
    pub type_id: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
    /// Named outputs; empty for single-column indicators.
    pub outputs: &'static [&'static str],
    /// Lines of Python with `{col}`, `{col:<output>}`, `{var}` and `{<param>}` placeholders.
    pub template: &'static [&'static str],
    /// Parameters whose largest value is the number of warm-up candles.
    pub warmup: &'static [&'static str],
    /// Pairs `(a, b)` requiring `a < b`.
    pub ordering: &'static [(&'static str, &'static str)],
}

impl IndicatorSpec {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// Derive the base column name of an indicator instance from its id.
pub fn column_base(id: &str) -> String {
    let mut base: String = id
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if base.is_empty() || base.starts_with(|c: char| c.is_ascii_digit()) {
        base.insert_str(0, "ind_");
    }
    base
}

pub struct IndicatorRegistry {
    specs: &'static [IndicatorSpec],
}

impl IndicatorRegistry {
    pub fn builtin() -> Self {
        Self {
            specs: &catalog::BUILTIN,
        }
    }

    pub fn specs(&self) -> &'static [IndicatorSpec] {
        self.specs
    }

    /// Look up a type id, ignoring ASCII case.
    pub fn get(&self, type_id: &str) -> Option<&'static IndicatorSpec> {
        self.specs
            .iter()
            .find(|s| s.type_id.eq_ignore_ascii_case(type_id))
    }

    /// Validate one declaration against its type's schema.
    pub fn resolve(&self, decl: &IndicatorDeclaration) -> Result<ResolvedIndicator, GenerationError> {
        let invalid = |reason: String| GenerationError::InvalidParameters {
            indicator_id: decl.id.clone(),
            reason,
        };
        let spec = self.get(&decl.indicator_type).ok_or_else(|| {
            GenerationError::schema(format!(
                "indicator '{}' has unknown type '{}'",
                decl.id, decl.indicator_type
            ))
        })?;

        for name in decl.params.keys() {
            if spec.param(name).is_none() {
                return Err(invalid(format!(
                    "unknown parameter '{}' for {}",
                    name, spec.type_id
                )));
            }
        }

        let mut params = BTreeMap::new();
        for p in spec.params {
            let value = match decl.params.get(p.name) {
                Some(Value::Number(n)) => n
                    .as_f64()
                    .ok_or_else(|| invalid(format!("'{}' is not a finite number", p.name)))?,
                Some(other) => {
                    return Err(invalid(format!(
                        "'{}' must be a number, got {}",
                        p.name, other
                    )));
                }
                None => p
                    .default
                    .ok_or_else(|| invalid(format!("missing required parameter '{}'", p.name)))?,
            };
            if p.kind == ParamKind::Integer && value.fract() != 0.0 {
                return Err(invalid(format!("'{}' must be an integer, got {}", p.name, value)));
            }
            if value < p.min || value > p.max {
                return Err(invalid(format!(
                    "'{}' = {} is outside [{}, {}]",
                    p.name, value, p.min, p.max
                )));
            }
            params.insert(p.name, value);
        }

        for (lower, upper) in spec.ordering {
            if params[lower] >= params[upper] {
                return Err(invalid(format!("'{}' must be less than '{}'", lower, upper)));
            }
        }

        Ok(ResolvedIndicator {
            id: decl.id.clone(),
            spec,
            base: column_base(&decl.id),
            params,
        })
    }

    /// Resolve every declaration and check that the resulting columns do not collide.
    pub fn resolve_all(&self, decls: &[IndicatorDeclaration]) -> Result<IndicatorTable, GenerationError> {
        let mut entries = Vec::with_capacity(decls.len());
        let mut by_id = HashMap::new();
        let mut columns: HashSet<String> = RESERVED_COLUMNS.iter().map(|c| c.to_string()).collect();

        for decl in decls {
            let resolved = self.resolve(decl)?;
            for column in resolved.columns() {
                if !columns.insert(column.clone()) {
                    return Err(GenerationError::schema(format!(
                        "indicator '{}' produces column '{}' which is already in use",
                        decl.id, column
                    )));
                }
            }
            if by_id.insert(decl.id.clone(), entries.len()).is_some() {
                return Err(GenerationError::schema(format!(
                    "indicator id '{}' is declared more than once",
                    decl.id
                )));
            }
            entries.push(resolved);
        }
        Ok(IndicatorTable { entries, by_id })
    }
}

impl Default for IndicatorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// A declaration validated against its spec.
#[derive(Debug, Clone)]
pub struct ResolvedIndicator {
    pub id: String,
    pub spec: &'static IndicatorSpec,
    pub base: String,
    pub params: BTreeMap<&'static str, f64>,
}

impl ResolvedIndicator {
    pub fn columns(&self) -> Vec<String> {
        if self.spec.outputs.is_empty() {
            vec![self.base.clone()]
        } else {
            self.spec
                .outputs
                .iter()
                .map(|o| format!("{}_{}", self.base, o))
                .collect()
        }
    }

    /// Column for `output`, or the primary output when none is requested.
    pub fn column(&self, output: Option<&str>) -> Result<String, GenerationError> {
        match (self.spec.outputs, output) {
            ([], None) => Ok(self.base.clone()),
            ([], Some(o)) => Err(GenerationError::schema(format!(
                "indicator '{}' ({}) has a single output, '{}' was requested",
                self.id, self.spec.type_id, o
            ))),
            ([primary, ..], None) => Ok(format!("{}_{}", self.base, primary)),
            (outputs, Some(o)) if outputs.iter().any(|x| *x == o) => Ok(format!("{}_{}", self.base, o)),
            (outputs, Some(o)) => Err(GenerationError::schema(format!(
                "indicator '{}' ({}) has no output '{}' (expected one of {})",
                self.id,
                self.spec.type_id,
                o,
                outputs.join(", ")
            ))),
        }
    }

    pub fn warmup(&self) -> usize {
        self.spec
            .warmup
            .iter()
            .filter_map(|p| self.params.get(p))
            .fold(0.0_f64, |acc, v| acc.max(*v)) as usize
    }

    pub fn render(&self) -> Result<Vec<String>, GenerationError> {
        self.spec
            .template
            .iter()
            .map(|line| self.render_line(line))
            .collect()
    }

    fn render_line(&self, line: &str) -> Result<String, GenerationError> {
        let mut out = String::with_capacity(line.len() + 16);
        let mut rest = line;
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let end = after.find('}').ok_or_else(|| self.template_error(line))?;
            out.push_str(&self.placeholder(&after[..end], line)?);
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn placeholder(&self, key: &str, line: &str) -> Result<String, GenerationError> {
        if key == "col" {
            return self.column(None);
        }
        if key == "var" {
            return Ok(format!("{}_out", self.base));
        }
        if let Some(output) = key.strip_prefix("col:") {
            return self.column(Some(output));
        }
        match (self.spec.param(key), self.params.get(key)) {
            (Some(spec), Some(value)) => Ok(match spec.kind {
                ParamKind::Integer => format!("{}", *value as i64),
                ParamKind::Float => format!("{:?}", value),
            }),
            _ => Err(self.template_error(line)),
        }
    }

    fn template_error(&self, line: &str) -> GenerationError {
        GenerationError::schema(format!(
            "malformed code template for {}: {}",
            self.spec.type_id, line
        ))
    }
}

/// Resolved indicators of one document, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct IndicatorTable {
    entries: Vec<ResolvedIndicator>,
    by_id: HashMap<String, usize>,
}

impl IndicatorTable {
    pub fn get(&self, id: &str) -> Result<&ResolvedIndicator, GenerationError> {
        self.by_id
            .get(id)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| GenerationError::UnresolvedIndicator {
                indicator_id: id.to_string(),
            })
    }

    /// Declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedIndicator> {
        self.entries.iter()
    }

    pub fn max_warmup(&self) -> usize {
        self.entries.iter().map(|e| e.warmup()).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for IndicatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_id)?;
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| match (p.kind, p.default) {
                (ParamKind::Integer, Some(d)) => format!("{}={}", p.name, d as i64),
                (ParamKind::Float, Some(d)) => format!("{}={}", p.name, d),
                (_, None) => p.name.to_string(),
            })
            .collect();
        write!(f, "({})", params.join(", "))?;
        if !self.outputs.is_empty() {
            write!(f, " -> {}", self.outputs.join(", "))?;
        }
        Ok(())
    }
}
