//! FHIR search parameter types.
//!
//! This module defines the vocabulary of a search request: parameter types,
//! modifiers, comparator prefixes, and the parsed form of a (possibly chained)
//! parameter name.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::escape::split_unescaped;

/// FHIR search parameter types.
///
/// See: https://build.fhir.org/search.html#ptypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchParamType {
    /// A simple string, like a name or description.
    String,
    /// A search against a URI.
    Uri,
    /// A search for a number.
    Number,
    /// A search for a date, dateTime, or period.
    Date,
    /// A quantity, with a number and units.
    Quantity,
    /// A code from a code system or value set.
    Token,
    /// A reference to another resource.
    Reference,
    /// A composite search parameter that combines others.
    Composite,
    /// Special search parameters (_text, _filter, etc.).
    Special,
}

impl fmt::Display for SearchParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchParamType::String => write!(f, "string"),
            SearchParamType::Uri => write!(f, "uri"),
            SearchParamType::Number => write!(f, "number"),
            SearchParamType::Date => write!(f, "date"),
            SearchParamType::Quantity => write!(f, "quantity"),
            SearchParamType::Token => write!(f, "token"),
            SearchParamType::Reference => write!(f, "reference"),
            SearchParamType::Composite => write!(f, "composite"),
            SearchParamType::Special => write!(f, "special"),
        }
    }
}

impl FromStr for SearchParamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "string" => Ok(SearchParamType::String),
            "uri" => Ok(SearchParamType::Uri),
            "number" => Ok(SearchParamType::Number),
            "date" => Ok(SearchParamType::Date),
            "quantity" => Ok(SearchParamType::Quantity),
            "token" => Ok(SearchParamType::Token),
            "reference" => Ok(SearchParamType::Reference),
            "composite" => Ok(SearchParamType::Composite),
            "special" => Ok(SearchParamType::Special),
            _ => Err(format!("unknown search parameter type: {}", s)),
        }
    }
}

/// Search modifiers understood by the query model.
///
/// See: https://build.fhir.org/search.html#modifiers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchModifier {
    /// Exact string match (string parameters).
    Exact,
    /// Contains substring (string parameters).
    Contains,
    /// Match if value is missing.
    Missing,
    /// Negation of a token match.
    Not,
    /// Restrict a reference to a resource type (reference parameters).
    Type(String),
}

impl fmt::Display for SearchModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchModifier::Exact => write!(f, "exact"),
            SearchModifier::Contains => write!(f, "contains"),
            SearchModifier::Missing => write!(f, "missing"),
            SearchModifier::Not => write!(f, "not"),
            SearchModifier::Type(t) => write!(f, "{}", t),
        }
    }
}

impl SearchModifier {
    /// Parses a modifier string, returning None for unknown modifiers.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "exact" => Some(SearchModifier::Exact),
            "contains" => Some(SearchModifier::Contains),
            "missing" => Some(SearchModifier::Missing),
            "not" => Some(SearchModifier::Not),
            _ => {
                // Resource type names are the only upper-case modifiers
                if s.chars().next().is_some_and(|c| c.is_ascii_uppercase())
                    && s.chars().all(|c| c.is_ascii_alphanumeric())
                {
                    Some(SearchModifier::Type(s.to_string()))
                } else {
                    None
                }
            }
        }
    }

    /// Returns true if this modifier is valid for the given parameter type.
    pub fn is_valid_for(&self, param_type: SearchParamType) -> bool {
        match self {
            SearchModifier::Exact | SearchModifier::Contains => {
                param_type == SearchParamType::String
            }
            SearchModifier::Missing => param_type != SearchParamType::Special,
            SearchModifier::Not => param_type == SearchParamType::Token,
            SearchModifier::Type(_) => param_type == SearchParamType::Reference,
        }
    }

    /// Returns the resource type named by a type modifier.
    pub fn as_type(&self) -> Option<&str> {
        match self {
            SearchModifier::Type(t) => Some(t),
            _ => None,
        }
    }
}

/// Comparison prefixes for search parameters.
///
/// See: https://build.fhir.org/search.html#prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchPrefix {
    /// Equal (default).
    #[default]
    Eq,
    /// Not equal.
    Ne,
    /// Greater than.
    Gt,
    /// Less than.
    Lt,
    /// Greater than or equal.
    Ge,
    /// Less than or equal.
    Le,
    /// Starts after.
    Sa,
    /// Ends before.
    Eb,
    /// Approximately equal.
    Ap,
}

impl fmt::Display for SearchPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchPrefix::Eq => write!(f, "eq"),
            SearchPrefix::Ne => write!(f, "ne"),
            SearchPrefix::Gt => write!(f, "gt"),
            SearchPrefix::Lt => write!(f, "lt"),
            SearchPrefix::Ge => write!(f, "ge"),
            SearchPrefix::Le => write!(f, "le"),
            SearchPrefix::Sa => write!(f, "sa"),
            SearchPrefix::Eb => write!(f, "eb"),
            SearchPrefix::Ap => write!(f, "ap"),
        }
    }
}

impl FromStr for SearchPrefix {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" => Ok(SearchPrefix::Eq),
            "ne" => Ok(SearchPrefix::Ne),
            "gt" => Ok(SearchPrefix::Gt),
            "lt" => Ok(SearchPrefix::Lt),
            "ge" => Ok(SearchPrefix::Ge),
            "le" => Ok(SearchPrefix::Le),
            "sa" => Ok(SearchPrefix::Sa),
            "eb" => Ok(SearchPrefix::Eb),
            "ap" => Ok(SearchPrefix::Ap),
            _ => Err(format!("unknown search prefix: {}", s)),
        }
    }
}

impl SearchPrefix {
    /// Extracts a prefix from the beginning of a value string.
    ///
    /// Returns the prefix and the remaining value. Values without a
    /// recognised prefix default to `eq`.
    pub fn extract(value: &str) -> (Self, &str) {
        if let Some(prefix) = value.get(..2) {
            if let Ok(p) = prefix.parse() {
                return (p, &value[2..]);
            }
        }
        (SearchPrefix::Eq, value)
    }

    /// Returns true if this prefix is valid for the given parameter type.
    pub fn is_valid_for(&self, param_type: SearchParamType) -> bool {
        match self {
            SearchPrefix::Eq => true,
            SearchPrefix::Ne
            | SearchPrefix::Gt
            | SearchPrefix::Lt
            | SearchPrefix::Ge
            | SearchPrefix::Le
            | SearchPrefix::Ap => {
                matches!(
                    param_type,
                    SearchParamType::Number | SearchParamType::Date | SearchParamType::Quantity
                )
            }
            SearchPrefix::Sa | SearchPrefix::Eb => param_type == SearchParamType::Date,
        }
    }
}

/// One dot-separated segment of a parameter name (`subject:Patient`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameSegment {
    /// The parameter code.
    pub name: String,
    /// Modifier attached to this segment, if any.
    pub modifier: Option<SearchModifier>,
}

impl NameSegment {
    /// Returns the resource type named by this segment's type modifier.
    pub fn type_modifier(&self) -> Option<&str> {
        self.modifier.as_ref().and_then(SearchModifier::as_type)
    }
}

impl fmt::Display for NameSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.modifier {
            Some(m) => write!(f, "{}:{}", self.name, m),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A parsed search parameter name.
///
/// `subject:Patient.organization.name:exact` parses into three segments. The
/// first segment is the parameter declared on the searched resource type;
/// any further segments form the chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterName {
    raw: String,
    segments: Vec<NameSegment>,
}

impl ParameterName {
    /// Parses a raw query-string parameter name.
    pub fn parse(raw: &str) -> Result<Self, DecodeError> {
        let invalid = || DecodeError::InvalidName {
            raw: raw.to_string(),
        };

        let parts = split_unescaped(raw, '.');
        let mut segments = Vec::with_capacity(parts.len());
        for part in parts {
            let (name, modifier) = match part.split_once(':') {
                Some((name, modifier)) => (name, Some(modifier)),
                None => (part, None),
            };
            if !is_parameter_code(name) {
                return Err(invalid());
            }
            let modifier = match modifier {
                Some(m) => Some(SearchModifier::parse(m).ok_or_else(|| {
                    DecodeError::UnknownModifier {
                        raw: raw.to_string(),
                        modifier: m.to_string(),
                    }
                })?),
                None => None,
            };
            segments.push(NameSegment {
                name: name.to_string(),
                modifier,
            });
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// Returns the name as it appeared in the request.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Returns all segments, base first.
    pub fn segments(&self) -> &[NameSegment] {
        &self.segments
    }

    /// Returns the segment declared on the searched resource type.
    pub fn base(&self) -> &NameSegment {
        // parse() never produces an empty segment list
        &self.segments[0]
    }

    /// Returns the final segment (the one whose value is being matched).
    pub fn terminal(&self) -> &NameSegment {
        &self.segments[self.segments.len() - 1]
    }

    /// Returns true if the name chains through at least one reference.
    pub fn is_chained(&self) -> bool {
        self.segments.len() > 1
    }

    /// Returns the chain below the base segment (`organization.name`), or an
    /// empty string for an unchained name.
    pub fn chain_path(&self) -> String {
        chain_key(&self.segments[1..])
    }

    /// Returns the key under which repeated occurrences are ANDed together.
    ///
    /// The key is the full name with the terminal segment's modifier removed,
    /// so `name=a&name:exact=b` combine while `subject:Patient.name` and
    /// `subject:Group.name` stay apart.
    pub fn grouping_key(&self) -> String {
        let mut parts: Vec<String> = self.segments[..self.segments.len() - 1]
            .iter()
            .map(|s| s.to_string())
            .collect();
        parts.push(self.terminal().name.clone());
        parts.join(".")
    }
}

impl fmt::Display for ParameterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl FromStr for ParameterName {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Joins segment names (without modifiers) with dots.
pub(crate) fn chain_key(segments: &[NameSegment]) -> String {
    segments
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(".")
}

fn is_parameter_code(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
