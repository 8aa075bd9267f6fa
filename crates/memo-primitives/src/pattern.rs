use std::hash::{Hash, Hasher};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::MemoTx;

/// A literal string or compiled regex, matched against a single memo
/// field.
///
/// Per DESIGN NOTES §9 ("Regex-or-literal patterns"): equality and hashing
/// compare the source pattern string, not compiled regex internals.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Exact string match.
    Literal(String),
    /// Regex match (`Regex::is_match`).
    Regex(Regex),
}

impl Pattern {
    /// Compile a pattern from a regex source string.
    pub fn regex(source: impl AsRef<str>) -> Result<Self, regex::Error> {
        Ok(Self::Regex(Regex::new(source.as_ref())?))
    }

    /// The pattern's source string, used for equality/hashing and
    /// diagnostics.
    pub fn source(&self) -> &str {
        match self {
            Self::Literal(s) => s,
            Self::Regex(r) => r.as_str(),
        }
    }

    /// Whether `value` matches this pattern.
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::Literal(s) => s == value,
            Self::Regex(r) => r.is_match(value),
        }
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source() == other.source()
    }
}

impl Eq for Pattern {}

impl Hash for Pattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source().hash(state);
    }
}

impl Serialize for Pattern {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Literal(s) => serializer.serialize_newtype_variant("Pattern", 0, "Literal", s),
            Self::Regex(r) => {
                serializer.serialize_newtype_variant("Pattern", 1, "Regex", r.as_str())
            }
        }
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        enum Repr {
            Literal(String),
            Regex(String),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Literal(s) => Ok(Self::Literal(s)),
            Repr::Regex(s) => {
                Regex::new(&s).map(Self::Regex).map_err(serde::de::Error::custom)
            }
        }
    }
}

/// A conjunction of per-field patterns matched against a transaction's
/// memo triple.
///
/// Corresponds to spec.md §4.F step 1: "a pattern whose `MemoPattern`...
/// matches". A `None` field is unconstrained (always matches).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoPattern {
    /// Constraint on `memo_type`, if any.
    pub memo_type: Option<Pattern>,
    /// Constraint on `memo_format`, if any.
    pub memo_format: Option<Pattern>,
    /// Constraint on `memo_data`, if any.
    pub memo_data: Option<Pattern>,
}

impl MemoPattern {
    /// Whether every constrained field matches `tx`.
    pub fn matches(&self, tx: &MemoTx) -> bool {
        self.memo_type.as_ref().map_or(true, |p| p.matches(&tx.memo_type))
            && self.memo_format.as_ref().map_or(true, |p| p.matches(&tx.memo_format))
            && self.memo_data.as_ref().map_or(true, |p| p.matches(&tx.memo_data))
    }
}

/// The three interaction types a pattern can be classified as (spec.md
/// GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionType {
    /// Expects exactly one response.
    Request,
    /// Answers a request.
    Response,
    /// Self-contained, no response expected.
    Standalone,
}
