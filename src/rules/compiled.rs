//! Thin wrappers that let a compiled `Regex` / CIDR set round-trip
//! through JSON as the plain pattern string they were built from,
//! while keeping the compiled form around for evaluation.

use ipnetwork::IpNetwork;
use regex::Regex;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::IpAddr;

/// A regular expression compiled once, at rule-construction time, and
/// anchored so that `is_match` behaves like a full-string match (the
/// source library calls this `fullmatch`).
#[derive(Clone)]
pub struct CompiledRegex {
    source: String,
    anchored: Regex,
}

impl CompiledRegex {
    pub fn new(pattern: &str) -> Result<CompiledRegex, regex::Error> {
        let anchored = Regex::new(&format!("^(?:{})$", pattern))?;
        Ok(CompiledRegex {
            source: pattern.to_string(),
            anchored,
        })
    }

    pub fn is_full_match(&self, text: &str) -> bool {
        self.anchored.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for CompiledRegex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CompiledRegex({:?})", self.source)
    }
}

impl PartialEq for CompiledRegex {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Serialize for CompiledRegex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for CompiledRegex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pattern = String::deserialize(deserializer)?;
        CompiledRegex::new(&pattern).map_err(|e| D::Error::custom(format!("{}", e)))
    }
}

/// One or more comma-separated CIDR blocks, parsed once at
/// construction time.
#[derive(Clone)]
pub struct CompiledCidrSet {
    source: String,
    networks: Vec<IpNetwork>,
}

impl CompiledCidrSet {
    pub fn new(cidr: &str) -> Result<CompiledCidrSet, ipnetwork::IpNetworkError> {
        let networks = cidr
            .split(',')
            .map(|part| part.trim().parse::<IpNetwork>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CompiledCidrSet {
            source: cidr.to_string(),
            networks,
        })
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        self.networks.iter().any(|net| net.contains(ip))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for CompiledCidrSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CompiledCidrSet({:?})", self.source)
    }
}

impl PartialEq for CompiledCidrSet {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Serialize for CompiledCidrSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for CompiledCidrSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let cidr = String::deserialize(deserializer)?;
        CompiledCidrSet::new(&cidr).map_err(|e| D::Error::custom(format!("{}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compiled_regex_full_match() {
        let re = CompiledRegex::new("[A-Z][a-z]+").unwrap();
        assert!(re.is_full_match("Alice"));
        assert!(!re.is_full_match("Alice Smith"));
        assert!(!re.is_full_match("alice"));
    }

    #[test]
    fn test_compiled_regex_rejects_invalid_pattern() {
        assert!(CompiledRegex::new("(unterminated").is_err());
    }

    #[test]
    fn test_compiled_cidr_set_multi() {
        let set = CompiledCidrSet::new("10.0.0.0/8, 192.168.2.0/24").unwrap();
        assert!(set.contains("10.1.2.3".parse().unwrap()));
        assert!(set.contains("192.168.2.42".parse().unwrap()));
        assert!(!set.contains("172.16.0.1".parse().unwrap()));
    }
}
