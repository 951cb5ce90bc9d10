//! The `Inquiry` is the question put to the `Guard`: may this subject
//! perform this action on this resource, given this context?

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A single authorization question.
///
/// `subject`, `action` and `resource` are JSON values: a plain string
/// for string-typed policies, or an attribute mapping for rules-typed
/// policies. `context` is always a mapping of attribute name to value,
/// regardless of dialect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inquiry {
    pub subject: Value,
    pub action: Value,
    pub resource: Value,
    #[serde(default)]
    pub context: HashMap<String, Value>,
}

impl Inquiry {
    /// Constructs an `Inquiry` from string subject/action/resource,
    /// the common case for string-typed policies.
    pub fn new<S, A, R>(subject: S, action: A, resource: R) -> Inquiry
    where
        S: Into<String>,
        A: Into<String>,
        R: Into<String>,
    {
        Inquiry {
            subject: Value::String(subject.into()),
            action: Value::String(action.into()),
            resource: Value::String(resource.into()),
            context: HashMap::new(),
        }
    }

    pub fn with_context(mut self, context: HashMap<String, Value>) -> Inquiry {
        self.context = context;
        self
    }

    pub fn with_context_value<S: Into<String>>(mut self, key: S, value: Value) -> Inquiry {
        self.context.insert(key.into(), value);
        self
    }

    /// True iff subject, action and resource are all plain JSON
    /// strings — the shape string-typed policies require.
    pub fn is_string_scoped(&self) -> bool {
        self.subject.is_string() && self.action.is_string() && self.resource.is_string()
    }

    pub fn subject_as_str(&self) -> Option<&str> {
        self.subject.as_str()
    }

    pub fn action_as_str(&self) -> Option<&str> {
        self.action.as_str()
    }

    pub fn resource_as_str(&self) -> Option<&str> {
        self.resource.as_str()
    }
}
