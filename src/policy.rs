//! The `Policy` aggregate: a uid, an effect, three lists of
//! field-matchers (subjects/actions/resources) and a map of context
//! rules, plus the dialect detection that decides whether the
//! field-matchers are compared as plain strings or as rules.

use crate::effect::Effect;
use crate::error::EngineError;
use crate::inquiry::Inquiry;
use crate::rules::Rule;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A single entry in a policy's `subjects`/`actions`/`resources` list.
///
/// `Literal` is the string dialect; `RuleMatcher` and `Mapping` are
/// the rules dialect. `#[serde(untagged)]` tries each variant in
/// order, so a bare JSON string decodes as `Literal`, an object
/// carrying the rule discriminator key decodes as `RuleMatcher`, and
/// any other object decodes as `Mapping`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldMatcher {
    Literal(String),
    RuleMatcher(Rule),
    Mapping(HashMap<String, Rule>),
}

impl FieldMatcher {
    fn is_literal(&self) -> bool {
        matches!(self, FieldMatcher::Literal(_))
    }

    /// Rules-typed matching semantics (spec_full §4.2): a scalar
    /// value must satisfy a `RuleMatcher` directly; a mapping value
    /// must satisfy every rule in a `Mapping` matcher for the keys it
    /// declares, and fail on any key missing from the inquiry value.
    fn matches_value(&self, value: &Value, inquiry: &Inquiry) -> bool {
        match self {
            FieldMatcher::Literal(_) => false,
            FieldMatcher::RuleMatcher(rule) => rule.satisfied(value, inquiry),
            FieldMatcher::Mapping(matcher) => {
                let object = match value.as_object() {
                    Some(o) => o,
                    None => return false,
                };
                matcher.iter().all(|(key, rule)| {
                    object
                        .get(key)
                        .map_or(false, |attr| rule.satisfied(attr, inquiry))
                })
            }
        }
    }
}

/// Whether a policy's field-matchers are plain strings or rules/mappings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    StringTyped,
    RulesTyped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub uid: String,
    pub effect: Effect,
    pub subjects: Vec<FieldMatcher>,
    pub actions: Vec<FieldMatcher>,
    pub resources: Vec<FieldMatcher>,
    #[serde(default)]
    pub context: HashMap<String, Rule>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_start_tag")]
    pub start_tag: String,
    #[serde(default = "default_end_tag")]
    pub end_tag: String,
}

fn default_start_tag() -> String {
    "<".to_string()
}
fn default_end_tag() -> String {
    ">".to_string()
}

impl Policy {
    /// Constructs a policy, detecting its dialect from the field
    /// lists. Fails with `InvalidArgument` if a list mixes plain
    /// strings with rules/mappings (dialect purity, spec_full §3).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        uid: impl Into<String>,
        subjects: Vec<FieldMatcher>,
        actions: Vec<FieldMatcher>,
        resources: Vec<FieldMatcher>,
        context: HashMap<String, Rule>,
        effect: Effect,
        description: impl Into<String>,
    ) -> Result<Policy, EngineError> {
        let all = subjects.iter().chain(actions.iter()).chain(resources.iter());
        let literal_count = all.clone().filter(|m| m.is_literal()).count();
        let total = all.count();
        if literal_count != 0 && literal_count != total {
            return Err(EngineError::invalid_argument(
                "policy field-matchers mix plain strings with rules/mappings",
            ));
        }
        Ok(Policy {
            uid: uid.into(),
            effect,
            subjects,
            actions,
            resources,
            context,
            description: description.into(),
            start_tag: default_start_tag(),
            end_tag: default_end_tag(),
        })
    }

    /// Convenience constructor for a string-typed policy: always
    /// dialect-pure since every matcher is a `Literal`.
    #[allow(clippy::too_many_arguments)]
    pub fn string_typed<S>(
        uid: impl Into<String>,
        subjects: Vec<S>,
        actions: Vec<S>,
        resources: Vec<S>,
        context: HashMap<String, Rule>,
        effect: Effect,
        description: impl Into<String>,
    ) -> Policy
    where
        S: Into<String>,
    {
        let lit = |v: Vec<S>| v.into_iter().map(|s| FieldMatcher::Literal(s.into())).collect();
        Policy {
            uid: uid.into(),
            effect,
            subjects: lit(subjects),
            actions: lit(actions),
            resources: lit(resources),
            context,
            description: description.into(),
            start_tag: default_start_tag(),
            end_tag: default_end_tag(),
        }
    }

    pub fn with_tags(mut self, start_tag: impl Into<String>, end_tag: impl Into<String>) -> Policy {
        self.start_tag = start_tag.into();
        self.end_tag = end_tag.into();
        self
    }

    pub fn dialect(&self) -> Dialect {
        let any_rule_like = self
            .subjects
            .iter()
            .chain(self.actions.iter())
            .chain(self.resources.iter())
            .any(|m| !m.is_literal());
        if any_rule_like {
            Dialect::RulesTyped
        } else {
            Dialect::StringTyped
        }
    }

    /// Rules-typed matching for one field list (spec_full §4.2): the
    /// inquiry value must satisfy at least one matcher. Always false
    /// for an empty list ("never matches").
    pub fn matches_rules_field(matchers: &[FieldMatcher], value: &Value, inquiry: &Inquiry) -> bool {
        matchers.iter().any(|m| m.matches_value(value, inquiry))
    }

    /// Every context key the policy declares must be present on the
    /// inquiry and satisfy the associated rule (spec_full §4.6 step 2).
    pub fn context_fits(&self, inquiry: &Inquiry) -> bool {
        self.context.iter().all(|(key, rule)| {
            inquiry
                .context
                .get(key)
                .map_or(false, |value| rule.satisfied(value, inquiry))
        })
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).expect("Policy serialization is infallible")
    }

    pub fn from_json(value: &Value) -> Result<Policy, EngineError> {
        serde_json::from_value(value.clone())
            .map_err(|e| EngineError::type_error(format!("invalid policy: {}", e)))
    }
}
