//! Checkers: the strategies that compare an inquiry field against a
//! policy's field-matchers. String-typed policies use one of
//! [`StringExactChecker`], [`StringFuzzyChecker`] or [`RegexChecker`];
//! rules-typed policies always use [`RulesChecker`], which just
//! delegates to the rule algebra.

use crate::error::EngineError;
use crate::inquiry::Inquiry;
use crate::policy::{FieldMatcher, Policy};
use lru::LruCache;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Identifies which checker strategy is in play, so a `Storage` can
/// use it as a pre-filtering hint (spec_full §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckerKind {
    StringExact,
    StringFuzzy,
    Regex,
    Rules,
}

/// A strategy for matching an inquiry field against a policy's
/// field-matcher list.
pub trait Checker: fmt::Debug + Send + Sync {
    fn kind(&self) -> CheckerKind;

    /// Whether `value` satisfies at least one matcher in `matchers`,
    /// under this checker's dialect.
    fn fits_field(
        &self,
        matchers: &[FieldMatcher],
        value: &Value,
        inquiry: &Inquiry,
        policy: &Policy,
    ) -> Result<bool, EngineError>;
}

fn literal_patterns<'a>(matchers: &'a [FieldMatcher]) -> impl Iterator<Item = &'a str> {
    matchers.iter().filter_map(|m| match m {
        FieldMatcher::Literal(s) => Some(s.as_str()),
        _ => None,
    })
}

/// Case-sensitive equality between policy pattern and inquiry value.
#[derive(Debug, Default)]
pub struct StringExactChecker;

impl Checker for StringExactChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::StringExact
    }

    fn fits_field(
        &self,
        matchers: &[FieldMatcher],
        value: &Value,
        _inquiry: &Inquiry,
        _policy: &Policy,
    ) -> Result<bool, EngineError> {
        let value = match value.as_str() {
            Some(v) => v,
            None => return Ok(false),
        };
        Ok(literal_patterns(matchers).any(|pattern| pattern == value))
    }
}

/// Case-sensitive substring test: the policy pattern must be
/// contained within the inquiry value.
#[derive(Debug, Default)]
pub struct StringFuzzyChecker;

impl Checker for StringFuzzyChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::StringFuzzy
    }

    fn fits_field(
        &self,
        matchers: &[FieldMatcher],
        value: &Value,
        _inquiry: &Inquiry,
        _policy: &Policy,
    ) -> Result<bool, EngineError> {
        let value = match value.as_str() {
            Some(v) => v,
            None => return Ok(false),
        };
        Ok(literal_patterns(matchers).any(|pattern| value.contains(pattern)))
    }
}

/// Treats the part of a pattern between `start_tag` and `end_tag` as
/// a regular expression, and the rest as literal text; falls back to
/// exact equality when a pattern carries no tagged section. Compiled
/// regexes are cached in a bounded, thread-safe LRU (default 1024).
pub struct RegexChecker {
    cache: Mutex<LruCache<String, Regex>>,
}

impl fmt::Debug for RegexChecker {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "RegexChecker")
    }
}

const DEFAULT_CACHE_SIZE: usize = 1024;

impl Default for RegexChecker {
    fn default() -> Self {
        RegexChecker::new(DEFAULT_CACHE_SIZE)
    }
}

impl RegexChecker {
    /// Constructs a `RegexChecker` with the given LRU cache bound.
    /// `cache_size` of 0 is treated as 1 (an `LruCache` must hold at
    /// least one entry).
    pub fn new(cache_size: usize) -> RegexChecker {
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::new(1).unwrap());
        RegexChecker {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn compiled(&self, pattern: &str, start_tag: &str, end_tag: &str) -> Result<Regex, EngineError> {
        {
            let mut cache = self.cache.lock().unwrap();
            if let Some(re) = cache.get(pattern) {
                return Ok(re.clone());
            }
        }
        let source = Self::to_regex_source(pattern, start_tag, end_tag);
        let compiled = Regex::new(&source)?;
        let mut cache = self.cache.lock().unwrap();
        cache.put(pattern.to_string(), compiled.clone());
        Ok(compiled)
    }

    /// Builds the anchored regex source for a pattern: literal text
    /// outside the first `start_tag`/`end_tag` pair is escaped; the
    /// text between the tags is used verbatim. A pattern with no
    /// tagged section becomes an exact-match regex.
    fn to_regex_source(pattern: &str, start_tag: &str, end_tag: &str) -> String {
        if let Some(start_idx) = pattern.find(start_tag) {
            let after_start = start_idx + start_tag.len();
            if let Some(end_rel) = pattern[after_start..].find(end_tag) {
                let end_idx = after_start + end_rel;
                let prefix = &pattern[..start_idx];
                let inner = &pattern[after_start..end_idx];
                let suffix = &pattern[end_idx + end_tag.len()..];
                return format!(
                    "^{}(?:{}){}$",
                    regex::escape(prefix),
                    inner,
                    regex::escape(suffix)
                );
            }
        }
        format!("^{}$", regex::escape(pattern))
    }
}

impl Checker for RegexChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::Regex
    }

    fn fits_field(
        &self,
        matchers: &[FieldMatcher],
        value: &Value,
        _inquiry: &Inquiry,
        policy: &Policy,
    ) -> Result<bool, EngineError> {
        let value = match value.as_str() {
            Some(v) => v,
            None => return Ok(false),
        };
        for pattern in literal_patterns(matchers) {
            let re = self.compiled(pattern, &policy.start_tag, &policy.end_tag)?;
            if re.is_match(value) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Used for rules-typed policies; ignores `start_tag`/`end_tag` and
/// dispatches straight to the rule algebra (spec_full §4.4).
#[derive(Debug, Default)]
pub struct RulesChecker;

impl Checker for RulesChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::Rules
    }

    fn fits_field(
        &self,
        matchers: &[FieldMatcher],
        value: &Value,
        inquiry: &Inquiry,
        _policy: &Policy,
    ) -> Result<bool, EngineError> {
        Ok(Policy::matches_rules_field(matchers, value, inquiry))
    }
}
