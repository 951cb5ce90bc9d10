//! The rule algebra: pure predicates over a single attribute value,
//! composable via logical combinators, and the handful of rules that
//! read from the whole `Inquiry` instead of a single attribute.
//!
//! Every rule is a variant of the sealed [`Rule`] enum rather than a
//! trait object — the discriminator `serde` attaches to each variant
//! ("comparison.Eq", "net.Cidr", ...) doubles as the JSON codec's
//! registry key, so there is nothing extra to register by hand.

mod compiled;

pub use compiled::{CompiledCidrSet, CompiledRegex};

use crate::error::EngineError;
use crate::inquiry::Inquiry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::net::IpAddr;

/// A predicate over an attribute value (and, for a few variants, the
/// full inquiry). `satisfied` never panics and never returns an
/// error: an incompatible value is simply not satisfied (spec_full
/// §4.1, "Rule totality").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Rule {
    // -- comparison -----------------------------------------------------
    #[serde(rename = "comparison.Eq")]
    Eq { value: Value },
    #[serde(rename = "comparison.NotEq")]
    NotEq { value: Value },
    #[serde(rename = "comparison.Greater")]
    Greater { value: Value },
    #[serde(rename = "comparison.Less")]
    Less { value: Value },
    #[serde(rename = "comparison.GreaterOrEqual")]
    GreaterOrEqual { value: Value },
    #[serde(rename = "comparison.LessOrEqual")]
    LessOrEqual { value: Value },

    // -- logic ------------------------------------------------------------
    #[serde(rename = "logic.IsTrue")]
    IsTrue,
    #[serde(rename = "logic.IsFalse")]
    IsFalse,
    #[serde(rename = "logic.Not")]
    Not { rule: Box<Rule> },
    #[serde(rename = "logic.And")]
    And { rules: Vec<Rule> },
    #[serde(rename = "logic.Or")]
    Or { rules: Vec<Rule> },
    #[serde(rename = "logic.Any")]
    Any,
    #[serde(rename = "logic.Neither")]
    Neither,

    // -- string -----------------------------------------------------------
    #[serde(rename = "string.Equal")]
    Equal {
        value: String,
        #[serde(default)]
        ci: bool,
    },
    #[serde(rename = "string.PairsEqual")]
    PairsEqual,
    #[serde(rename = "string.RegexMatch")]
    RegexMatch { pattern: CompiledRegex },
    #[serde(rename = "string.StartsWith")]
    StartsWith {
        value: String,
        #[serde(default)]
        ci: bool,
    },
    #[serde(rename = "string.EndsWith")]
    EndsWith {
        value: String,
        #[serde(default)]
        ci: bool,
    },
    #[serde(rename = "string.Contains")]
    Contains {
        value: String,
        #[serde(default)]
        ci: bool,
    },

    // -- inquiry-scoped -----------------------------------------------------
    #[serde(rename = "inquiry.SubjectEqual")]
    SubjectEqual { value: Value },
    #[serde(rename = "inquiry.ActionEqual")]
    ActionEqual { value: Value },
    #[serde(rename = "inquiry.ResourceIn")]
    ResourceIn { value: Value },

    // -- network -----------------------------------------------------------
    #[serde(rename = "net.Cidr")]
    Cidr { cidr: CompiledCidrSet },

    // -- list -----------------------------------------------------------
    #[serde(rename = "list.In")]
    In { list: Vec<Value> },
    #[serde(rename = "list.NotIn")]
    NotIn { list: Vec<Value> },
    #[serde(rename = "list.AllIn")]
    AllIn { list: Vec<Value> },
    #[serde(rename = "list.AllNotIn")]
    AllNotIn { list: Vec<Value> },
    #[serde(rename = "list.AnyIn")]
    AnyIn { list: Vec<Value> },
    #[serde(rename = "list.AnyNotIn")]
    AnyNotIn { list: Vec<Value> },
}

impl Rule {
    /// Evaluates the rule against `value` (the attribute under test)
    /// and `inquiry` (used only by the inquiry-scoped variants).
    pub fn satisfied(&self, value: &Value, inquiry: &Inquiry) -> bool {
        use Rule::*;
        match self {
            Eq { value: v } => try_cmp(value, v) == Some(Ordering::Equal),
            NotEq { value: v } => matches!(try_cmp(value, v), Some(Ordering::Less) | Some(Ordering::Greater)),
            Greater { value: v } => try_cmp(value, v) == Some(Ordering::Greater),
            Less { value: v } => try_cmp(value, v) == Some(Ordering::Less),
            GreaterOrEqual { value: v } => {
                matches!(try_cmp(value, v), Some(Ordering::Greater) | Some(Ordering::Equal))
            }
            LessOrEqual { value: v } => {
                matches!(try_cmp(value, v), Some(Ordering::Less) | Some(Ordering::Equal))
            }

            IsTrue => value.as_bool() == Some(true),
            IsFalse => value.as_bool() == Some(false),
            Not { rule } => !rule.satisfied(value, inquiry),
            And { rules } => rules.iter().all(|r| r.satisfied(value, inquiry)),
            Or { rules } => rules.iter().any(|r| r.satisfied(value, inquiry)),
            Any => true,
            Neither => false,

            Equal { value: s, ci } => str_eq(value, s, *ci),
            PairsEqual => pairs_equal(value),
            RegexMatch { pattern } => value.as_str().map_or(false, |s| pattern.is_full_match(s)),
            StartsWith { value: s, ci } => {
                str_cmp(value, *ci, |haystack, needle| haystack.starts_with(needle), s)
            }
            EndsWith { value: s, ci } => {
                str_cmp(value, *ci, |haystack, needle| haystack.ends_with(needle), s)
            }
            Contains { value: s, ci } => {
                str_cmp(value, *ci, |haystack, needle| haystack.contains(needle), s)
            }

            SubjectEqual { value: v } => v == &inquiry.subject,
            ActionEqual { value: v } => v == &inquiry.action,
            ResourceIn { value: v } => resource_in(v, &inquiry.resource),

            Cidr { cidr } => value
                .as_str()
                .and_then(|s| s.parse::<IpAddr>().ok())
                .map_or(false, |ip| cidr.contains(ip)),

            In { list } => list.contains(value),
            NotIn { list } => !list.contains(value),
            AllIn { list } => array_all(value, |item| list.contains(item)),
            AllNotIn { list } => array_all(value, |item| !list.contains(item)),
            AnyIn { list } => array_any(value, |item| list.contains(item)),
            AnyNotIn { list } => array_any(value, |item| !list.contains(item)),
        }
    }

    // -- constructors -----------------------------------------------------

    pub fn eq(value: Value) -> Rule {
        Rule::Eq { value }
    }
    pub fn not_eq(value: Value) -> Rule {
        Rule::NotEq { value }
    }
    pub fn greater(value: Value) -> Rule {
        Rule::Greater { value }
    }
    pub fn less(value: Value) -> Rule {
        Rule::Less { value }
    }
    pub fn greater_or_equal(value: Value) -> Rule {
        Rule::GreaterOrEqual { value }
    }
    pub fn less_or_equal(value: Value) -> Rule {
        Rule::LessOrEqual { value }
    }

    pub fn is_true() -> Rule {
        Rule::IsTrue
    }
    pub fn is_false() -> Rule {
        Rule::IsFalse
    }
    pub fn not(rule: Rule) -> Rule {
        Rule::Not { rule: Box::new(rule) }
    }
    pub fn and(rules: Vec<Rule>) -> Rule {
        Rule::And { rules }
    }
    pub fn or(rules: Vec<Rule>) -> Rule {
        Rule::Or { rules }
    }
    pub fn any() -> Rule {
        Rule::Any
    }
    pub fn neither() -> Rule {
        Rule::Neither
    }

    pub fn equal<S: Into<String>>(value: S, ci: bool) -> Rule {
        Rule::Equal {
            value: value.into(),
            ci,
        }
    }
    pub fn pairs_equal() -> Rule {
        Rule::PairsEqual
    }
    pub fn regex_match(pattern: &str) -> Result<Rule, EngineError> {
        Ok(Rule::RegexMatch {
            pattern: CompiledRegex::new(pattern)?,
        })
    }
    pub fn starts_with<S: Into<String>>(value: S, ci: bool) -> Rule {
        Rule::StartsWith {
            value: value.into(),
            ci,
        }
    }
    pub fn ends_with<S: Into<String>>(value: S, ci: bool) -> Rule {
        Rule::EndsWith {
            value: value.into(),
            ci,
        }
    }
    pub fn contains<S: Into<String>>(value: S, ci: bool) -> Rule {
        Rule::Contains {
            value: value.into(),
            ci,
        }
    }

    pub fn subject_equal(value: Value) -> Rule {
        Rule::SubjectEqual { value }
    }
    pub fn action_equal(value: Value) -> Rule {
        Rule::ActionEqual { value }
    }
    pub fn resource_in(value: Value) -> Rule {
        Rule::ResourceIn { value }
    }

    pub fn cidr(cidr: &str) -> Result<Rule, EngineError> {
        Ok(Rule::Cidr {
            cidr: CompiledCidrSet::new(cidr)?,
        })
    }

    pub fn in_list(list: Vec<Value>) -> Rule {
        Rule::In { list }
    }
    pub fn not_in(list: Vec<Value>) -> Rule {
        Rule::NotIn { list }
    }
    pub fn all_in(list: Vec<Value>) -> Rule {
        Rule::AllIn { list }
    }
    pub fn all_not_in(list: Vec<Value>) -> Rule {
        Rule::AllNotIn { list }
    }
    pub fn any_in(list: Vec<Value>) -> Rule {
        Rule::AnyIn { list }
    }
    pub fn any_not_in(list: Vec<Value>) -> Rule {
        Rule::AnyNotIn { list }
    }

    /// Decodes a `Rule` from a JSON value, reporting an unknown
    /// discriminator or malformed shape as `EngineError::TypeError`
    /// rather than the generic `JsonError` (spec_full §4.8).
    pub fn from_json(value: &Value) -> Result<Rule, EngineError> {
        serde_json::from_value(value.clone())
            .map_err(|e| EngineError::type_error(format!("invalid rule: {}", e)))
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).expect("Rule serialization is infallible")
    }
}

fn try_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn str_eq(value: &Value, pattern: &str, ci: bool) -> bool {
    match value.as_str() {
        Some(s) if ci => s.to_lowercase() == pattern.to_lowercase(),
        Some(s) => s == pattern,
        None => false,
    }
}

fn str_cmp<F>(value: &Value, ci: bool, op: F, pattern: &str) -> bool
where
    F: Fn(&str, &str) -> bool,
{
    match value.as_str() {
        Some(s) if ci => op(&s.to_lowercase(), &pattern.to_lowercase()),
        Some(s) => op(s, pattern),
        None => false,
    }
}

fn pairs_equal(value: &Value) -> bool {
    let pairs = match value.as_array() {
        Some(p) => p,
        None => return false,
    };
    if pairs.is_empty() {
        return false;
    }
    pairs.iter().all(|pair| match pair.as_array() {
        Some(p) if p.len() == 2 => p[0] == p[1],
        _ => false,
    })
}

fn resource_in(needle: &Value, resource: &Value) -> bool {
    if needle == resource {
        return true;
    }
    let n = match needle.as_str() {
        Some(n) => n,
        None => return false,
    };
    match resource {
        Value::String(r) => r.contains(n),
        // A rules-typed inquiry may carry an attribute mapping as its
        // resource (spec.md §3); "contained in" then means key
        // membership rather than substring containment.
        Value::Object(map) => map.contains_key(n),
        _ => false,
    }
}

fn array_all<F: Fn(&Value) -> bool>(value: &Value, pred: F) -> bool {
    value.as_array().map_or(false, |items| items.iter().all(pred))
}

fn array_any<F: Fn(&Value) -> bool>(value: &Value, pred: F) -> bool {
    value.as_array().map_or(false, |items| items.iter().any(pred))
}
