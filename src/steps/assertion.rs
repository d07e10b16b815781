//! Assertion steps

use std::fmt;
use std::path::Path;

use serde_json::Value as JsonValue;

use super::{compare, StepOutput};
use crate::common::{Error, Result};
use crate::parse::ParserRegistry;
use crate::resolve::resolve;
use crate::value::Value;

/// The comparator an assertion applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssertionKind {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    NotIn,
    Contains,
    DoesNotContain,
    KeysContain,
    ValuesContain,
    ItemsContain,
    DataFrameContains,
}

impl AssertionKind {
    pub const ALL: [AssertionKind; 14] = [
        AssertionKind::Eq,
        AssertionKind::Ne,
        AssertionKind::Gt,
        AssertionKind::Ge,
        AssertionKind::Lt,
        AssertionKind::Le,
        AssertionKind::In,
        AssertionKind::NotIn,
        AssertionKind::Contains,
        AssertionKind::DoesNotContain,
        AssertionKind::KeysContain,
        AssertionKind::ValuesContain,
        AssertionKind::ItemsContain,
        AssertionKind::DataFrameContains,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            AssertionKind::Eq => "==",
            AssertionKind::Ne => "!=",
            AssertionKind::Gt => ">",
            AssertionKind::Ge => "≥",
            AssertionKind::Lt => "<",
            AssertionKind::Le => "≤",
            AssertionKind::In => "in",
            AssertionKind::NotIn => "not in",
            AssertionKind::Contains | AssertionKind::DataFrameContains => "contains",
            AssertionKind::DoesNotContain => "does not contain",
            AssertionKind::KeysContain => "keys contain",
            AssertionKind::ValuesContain => "values contain",
            AssertionKind::ItemsContain => "items contain",
        }
    }

    pub fn class_name(self) -> &'static str {
        match self {
            AssertionKind::Eq => "AssertEQ",
            AssertionKind::Ne => "AssertNE",
            AssertionKind::Gt => "AssertGT",
            AssertionKind::Ge => "AssertGE",
            AssertionKind::Lt => "AssertLT",
            AssertionKind::Le => "AssertLE",
            AssertionKind::In => "AssertIn",
            AssertionKind::NotIn => "AssertNotIn",
            AssertionKind::Contains => "AssertContains",
            AssertionKind::DoesNotContain => "AssertDoesNotContain",
            AssertionKind::KeysContain => "AssertKeysContain",
            AssertionKind::ValuesContain => "AssertValuesContain",
            AssertionKind::ItemsContain => "AssertItemsContain",
            AssertionKind::DataFrameContains => "AssertDataFrameContains",
        }
    }

    /// The config `action` naming this kind
    pub fn action(self) -> &'static str {
        match self {
            AssertionKind::Eq => "assert_eq",
            AssertionKind::Ne => "assert_ne",
            AssertionKind::Gt => "assert_gt",
            AssertionKind::Ge => "assert_ge",
            AssertionKind::Lt => "assert_lt",
            AssertionKind::Le => "assert_le",
            AssertionKind::In => "assert_in",
            AssertionKind::NotIn => "assert_not_in",
            AssertionKind::Contains => "assert_contains",
            AssertionKind::DoesNotContain => "assert_does_not_contain",
            AssertionKind::KeysContain => "assert_keys_contain",
            AssertionKind::ValuesContain => "assert_values_contain",
            AssertionKind::ItemsContain => "assert_items_contain",
            AssertionKind::DataFrameContains => "assert_data_frame_contains",
        }
    }

    pub fn from_action(action: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.action() == action)
    }

    /// Variadic kinds compare every neighbouring pair; the rest take two
    /// arguments
    pub fn is_variadic(self) -> bool {
        matches!(
            self,
            AssertionKind::Eq
                | AssertionKind::Ne
                | AssertionKind::Gt
                | AssertionKind::Ge
                | AssertionKind::Lt
                | AssertionKind::Le
        )
    }

    pub fn evaluate(self, args: &[Value]) -> bool {
        if !self.is_variadic() {
            let [lhs, rhs] = args else {
                return false;
            };
            return match self {
                AssertionKind::In => compare::is_in(lhs, rhs),
                AssertionKind::NotIn => compare::not_in(lhs, rhs),
                AssertionKind::Contains => compare::contains(lhs, rhs),
                AssertionKind::DoesNotContain => compare::does_not_contain(lhs, rhs),
                AssertionKind::KeysContain => compare::keys_contain(lhs, rhs),
                AssertionKind::ValuesContain => compare::values_contain(lhs, rhs),
                AssertionKind::ItemsContain => compare::items_contain(lhs, rhs),
                _ => compare::table_contains(lhs, rhs),
            };
        }
        match self {
            AssertionKind::Eq => compare::eq(args),
            AssertionKind::Ne => compare::ne(args),
            AssertionKind::Gt => compare::gt(args),
            AssertionKind::Ge => compare::ge(args),
            AssertionKind::Lt => compare::lt(args),
            _ => compare::le(args),
        }
    }
}

/// Compares its arguments once they are resolved
///
/// The output of a finished assertion is its rendering, whether it passed or
/// failed.
#[derive(Debug, Clone)]
pub struct AssertionStep {
    kind: AssertionKind,
    args: Vec<JsonValue>,
    resolved: Option<Vec<Value>>,
}

impl AssertionStep {
    pub fn new(kind: AssertionKind, args: Vec<JsonValue>) -> Result<Self> {
        if !kind.is_variadic() && args.len() != 2 {
            return Err(Error::InvalidOperation(format!(
                "{} takes exactly 2 arguments, got {}",
                kind.class_name(),
                args.len()
            )));
        }
        Ok(Self {
            kind,
            args,
            resolved: None,
        })
    }

    pub fn kind(&self) -> AssertionKind {
        self.kind
    }

    pub fn args(&self) -> &[JsonValue] {
        &self.args
    }

    pub fn resolved(&self) -> Option<&[Value]> {
        self.resolved.as_deref()
    }

    pub(super) fn pre_process(
        &mut self,
        base: Option<&Path>,
        registry: &ParserRegistry,
    ) -> Result<()> {
        let resolved = self
            .args
            .iter()
            .map(|a| resolve(a, base, registry))
            .collect::<Result<Vec<_>>>()?;
        self.resolved = Some(resolved);
        Ok(())
    }

    pub fn evaluate(&self) -> Result<StepOutput> {
        let args = self
            .resolved
            .as_deref()
            .ok_or_else(|| Error::invalid_step_state("evaluate", "unresolved"))?;
        let text = self.to_string();
        Ok(if self.kind.evaluate(args) {
            StepOutput::pass(text)
        } else {
            StepOutput::fail(text)
        })
    }
}

impl fmt::Display for AssertionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = format!(" {} ", self.kind.symbol());
        let rendered: Vec<String> = self.args.iter().map(JsonValue::to_string).collect();
        f.write_str(&rendered.join(&sep))
    }
}
