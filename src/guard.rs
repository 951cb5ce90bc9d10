//! The `Guard`: composes storage lookup, checker dispatch and context
//! evaluation into a single allow/deny decision, with deny-overrides
//! precedence (spec_full §4.6).

use crate::checker::{Checker, RulesChecker};
use crate::effect::Effect;
use crate::error::EngineError;
use crate::inquiry::Inquiry;
use crate::policy::{Dialect, Policy};
use crate::storage::Storage;
use log::{debug, error, info, trace};

/// Decides whether an `Inquiry` is allowed, given a `Storage` of
/// policies and a `Checker` used for string-typed policies.
/// Rules-typed policies always use an internal `RulesChecker`
/// regardless of the configured checker (spec_full §4.4).
///
/// Stateless across calls: concurrent `is_allowed` calls are safe as
/// long as the storage and checker are.
pub struct Guard {
    storage: Box<dyn Storage>,
    checker: Box<dyn Checker>,
    rules_checker: RulesChecker,
}

impl Guard {
    pub fn new(storage: Box<dyn Storage>, checker: Box<dyn Checker>) -> Guard {
        Guard {
            storage,
            checker,
            rules_checker: RulesChecker,
        }
    }

    /// Evaluates `inquiry` against every candidate policy returned by
    /// storage and returns the deny-overrides decision. A storage
    /// failure propagates; a failure evaluating a single candidate's
    /// rules/checker is caught, logged, and treated as "did not fit"
    /// (spec_full §4.6 step 5).
    pub fn is_allowed(&self, inquiry: &Inquiry) -> Result<bool, EngineError> {
        trace!(
            "is_allowed(subject={:?}, action={:?}, resource={:?})",
            inquiry.subject,
            inquiry.action,
            inquiry.resource
        );
        let candidates = self
            .storage
            .find_for_inquiry(inquiry, Some(self.checker.kind()))?;

        let mut any_allow = false;
        let mut any_deny = false;
        for policy in &candidates {
            match self.fits(policy, inquiry) {
                Ok(true) => {
                    debug!("policy '{}' fits", policy.uid);
                    match policy.effect {
                        Effect::Allow => any_allow = true,
                        Effect::Deny => any_deny = true,
                    }
                }
                Ok(false) => {
                    debug!("policy '{}' does not fit", policy.uid);
                }
                Err(e) => {
                    error!("policy '{}' failed to evaluate: {}", policy.uid, e);
                }
            }
        }

        let decision = any_allow && !any_deny;
        info!(
            "decision for subject={:?} action={:?} resource={:?}: {}",
            inquiry.subject, inquiry.action, inquiry.resource, decision
        );
        Ok(decision)
    }

    fn fits(&self, policy: &Policy, inquiry: &Inquiry) -> Result<bool, EngineError> {
        match policy.dialect() {
            Dialect::StringTyped => {
                if !inquiry.is_string_scoped() {
                    return Ok(false);
                }
                if !self
                    .checker
                    .fits_field(&policy.subjects, &inquiry.subject, inquiry, policy)?
                {
                    return Ok(false);
                }
                if !self
                    .checker
                    .fits_field(&policy.actions, &inquiry.action, inquiry, policy)?
                {
                    return Ok(false);
                }
                if !self
                    .checker
                    .fits_field(&policy.resources, &inquiry.resource, inquiry, policy)?
                {
                    return Ok(false);
                }
            }
            Dialect::RulesTyped => {
                if !self.rules_checker.fits_field(
                    &policy.subjects,
                    &inquiry.subject,
                    inquiry,
                    policy,
                )? {
                    return Ok(false);
                }
                if !self
                    .rules_checker
                    .fits_field(&policy.actions, &inquiry.action, inquiry, policy)?
                {
                    return Ok(false);
                }
                if !self.rules_checker.fits_field(
                    &policy.resources,
                    &inquiry.resource,
                    inquiry,
                    policy,
                )? {
                    return Ok(false);
                }
            }
        }
        Ok(policy.context_fits(inquiry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::RegexChecker;
    use crate::rules::Rule;
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use std::collections::HashMap;

    fn guard() -> Guard {
        Guard::new(Box::new(MemoryStorage::new()), Box::new(RegexChecker::default()))
    }

    #[test]
    fn test_default_deny_on_empty_storage() {
        let g = guard();
        let inquiry = Inquiry::new("Alice", "read", "book:moby");
        assert!(!g.is_allowed(&inquiry).unwrap());
    }

    #[test]
    fn test_s1_string_typed_allow() {
        let g = guard();
        g.storage
            .add(Policy::string_typed(
                "p1",
                vec!["<[A-Z][a-z]+>"],
                vec!["<read|get>"],
                vec!["book:<.+>"],
                HashMap::new(),
                Effect::Allow,
                "",
            ))
            .unwrap();
        let inquiry = Inquiry::new("Alice", "read", "book:moby");
        assert!(g.is_allowed(&inquiry).unwrap());
    }

    #[test]
    fn test_s2_deny_overrides() {
        let g = guard();
        g.storage
            .add(Policy::string_typed(
                "p1",
                vec!["<[A-Z][a-z]+>"],
                vec!["<read|get>"],
                vec!["book:<.+>"],
                HashMap::new(),
                Effect::Allow,
                "",
            ))
            .unwrap();
        g.storage
            .add(Policy::string_typed(
                "p2",
                vec!["<.+>"],
                vec!["<.+>"],
                vec!["<.+>"],
                HashMap::new(),
                Effect::Deny,
                "",
            ))
            .unwrap();
        let inquiry = Inquiry::new("Alice", "read", "book:moby");
        assert!(!g.is_allowed(&inquiry).unwrap());
    }

    #[test]
    fn test_s3_rules_typed_numeric() {
        let g = guard();
        let mut subject_matcher = HashMap::new();
        subject_matcher.insert("name".to_string(), Rule::any());
        subject_matcher.insert(
            "stars".to_string(),
            Rule::and(vec![Rule::greater(json!(50)), Rule::less(json!(999))]),
        );
        let policy = Policy::new(
            "p1",
            vec![crate::policy::FieldMatcher::Mapping(subject_matcher)],
            vec![crate::policy::FieldMatcher::RuleMatcher(Rule::equal(
                "fork", false,
            ))],
            vec![crate::policy::FieldMatcher::RuleMatcher(
                Rule::starts_with("repos/Google", true),
            )],
            HashMap::new(),
            Effect::Allow,
            "",
        )
        .unwrap();
        g.storage.add(policy).unwrap();

        let inquiry = Inquiry {
            subject: json!({"name": "Brin", "stars": 80}),
            action: json!("fork"),
            resource: json!("repos/google/tensorflow"),
            context: HashMap::new(),
        };
        assert!(g.is_allowed(&inquiry).unwrap());

        let denied_inquiry = Inquiry {
            subject: json!({"name": "Brin", "stars": 1000}),
            action: json!("fork"),
            resource: json!("repos/google/tensorflow"),
            context: HashMap::new(),
        };
        assert!(!g.is_allowed(&denied_inquiry).unwrap());
    }

    #[test]
    fn test_s4_context_cidr() {
        let g = guard();
        let mut context = HashMap::new();
        context.insert("ip".to_string(), Rule::cidr("192.168.2.0/24").unwrap());
        g.storage
            .add(Policy::string_typed(
                "p1",
                vec!["Alice"],
                vec!["read"],
                vec!["book:moby"],
                context,
                Effect::Allow,
                "",
            ))
            .unwrap();

        let ok = Inquiry::new("Alice", "read", "book:moby")
            .with_context_value("ip", json!("192.168.2.42"));
        assert!(g.is_allowed(&ok).unwrap());

        let bad = Inquiry::new("Alice", "read", "book:moby")
            .with_context_value("ip", json!("10.0.0.1"));
        assert!(!g.is_allowed(&bad).unwrap());
    }

    #[test]
    fn test_s5_missing_context_key() {
        let g = guard();
        let mut context = HashMap::new();
        context.insert("secret".to_string(), Rule::equal("x", false));
        g.storage
            .add(Policy::string_typed(
                "p1",
                vec!["Alice"],
                vec!["read"],
                vec!["book:moby"],
                context,
                Effect::Allow,
                "",
            ))
            .unwrap();
        let inquiry = Inquiry::new("Alice", "read", "book:moby");
        assert!(!g.is_allowed(&inquiry).unwrap());
    }

    #[test]
    fn test_string_typed_policy_ignores_attribute_scoped_inquiry() {
        let g = guard();
        g.storage
            .add(Policy::string_typed(
                "p1",
                vec!["<.+>"],
                vec!["<.+>"],
                vec!["<.+>"],
                HashMap::new(),
                Effect::Allow,
                "",
            ))
            .unwrap();
        let inquiry = Inquiry {
            subject: json!({"name": "Brin"}),
            action: json!("fork"),
            resource: json!("repos/x"),
            context: HashMap::new(),
        };
        assert!(!g.is_allowed(&inquiry).unwrap());
    }

    /// Round-trips each S1-S5 policy through JSON, rebuilds a fresh
    /// `Guard` from the decoded policies, and checks the same verdicts
    /// hold — a regression in round-trip fidelity (e.g. a dropped
    /// `start_tag`/`end_tag`) would otherwise only surface as a silent
    /// field mismatch, never as a decision flipping.
    #[test]
    fn test_s6_json_round_trip_preserves_s1_through_s5_verdicts() {
        fn round_tripped(policy: Policy) -> Policy {
            Policy::from_json(&policy.to_json()).unwrap()
        }

        // S1 + S2: string-typed allow, then deny-overrides.
        let g = guard();
        g.storage
            .add(round_tripped(Policy::string_typed(
                "p1",
                vec!["<[A-Z][a-z]+>"],
                vec!["<read|get>"],
                vec!["book:<.+>"],
                HashMap::new(),
                Effect::Allow,
                "",
            )))
            .unwrap();
        let s1_inquiry = Inquiry::new("Alice", "read", "book:moby");
        assert!(g.is_allowed(&s1_inquiry).unwrap());

        g.storage
            .add(round_tripped(Policy::string_typed(
                "p2",
                vec!["<.+>"],
                vec!["<.+>"],
                vec!["<.+>"],
                HashMap::new(),
                Effect::Deny,
                "",
            )))
            .unwrap();
        assert!(!g.is_allowed(&s1_inquiry).unwrap());

        // S3: rules-typed numeric.
        let g3 = guard();
        let mut subject_matcher = HashMap::new();
        subject_matcher.insert("name".to_string(), Rule::any());
        subject_matcher.insert(
            "stars".to_string(),
            Rule::and(vec![Rule::greater(json!(50)), Rule::less(json!(999))]),
        );
        let policy3 = Policy::new(
            "p1",
            vec![crate::policy::FieldMatcher::Mapping(subject_matcher)],
            vec![crate::policy::FieldMatcher::RuleMatcher(Rule::equal(
                "fork", false,
            ))],
            vec![crate::policy::FieldMatcher::RuleMatcher(
                Rule::starts_with("repos/Google", true),
            )],
            HashMap::new(),
            Effect::Allow,
            "",
        )
        .unwrap();
        g3.storage.add(round_tripped(policy3)).unwrap();

        let fits = Inquiry {
            subject: json!({"name": "Brin", "stars": 80}),
            action: json!("fork"),
            resource: json!("repos/google/tensorflow"),
            context: HashMap::new(),
        };
        assert!(g3.is_allowed(&fits).unwrap());
        let too_many_stars = Inquiry {
            subject: json!({"name": "Brin", "stars": 1000}),
            action: json!("fork"),
            resource: json!("repos/google/tensorflow"),
            context: HashMap::new(),
        };
        assert!(!g3.is_allowed(&too_many_stars).unwrap());

        // S4: context CIDR.
        let g4 = guard();
        let mut context = HashMap::new();
        context.insert("ip".to_string(), Rule::cidr("192.168.2.0/24").unwrap());
        g4.storage
            .add(round_tripped(Policy::string_typed(
                "p1",
                vec!["Alice"],
                vec!["read"],
                vec!["book:moby"],
                context,
                Effect::Allow,
                "",
            )))
            .unwrap();
        let ok = Inquiry::new("Alice", "read", "book:moby")
            .with_context_value("ip", json!("192.168.2.42"));
        assert!(g4.is_allowed(&ok).unwrap());
        let bad = Inquiry::new("Alice", "read", "book:moby")
            .with_context_value("ip", json!("10.0.0.1"));
        assert!(!g4.is_allowed(&bad).unwrap());

        // S5: missing context key.
        let g5 = guard();
        let mut context = HashMap::new();
        context.insert("secret".to_string(), Rule::equal("x", false));
        g5.storage
            .add(round_tripped(Policy::string_typed(
                "p1",
                vec!["Alice"],
                vec!["read"],
                vec!["book:moby"],
                context,
                Effect::Allow,
                "",
            )))
            .unwrap();
        let inquiry = Inquiry::new("Alice", "read", "book:moby");
        assert!(!g5.is_allowed(&inquiry).unwrap());
    }
}
