//! The two-valued outcome a `Policy` contributes to a decision.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a `Policy`, once it fits an inquiry, grants or denies it.
///
/// Deny always takes precedence over allow (see `Guard::is_allowed`),
/// so the default, absent any fitting policy, is `Deny`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

impl Default for Effect {
    fn default() -> Self {
        Effect::Deny
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Effect::Allow => write!(f, "allow"),
            Effect::Deny => write!(f, "deny"),
        }
    }
}
