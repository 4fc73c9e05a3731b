//! Typed search values.
//!
//! A [`ParameterValue`] is the decoded form of one comma-separated token of a
//! query-string value. It is a closed set of variants so the matcher can
//! dispatch exhaustively. Every variant keeps the raw token it was decoded
//! from for diagnostics.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{SearchParamType, SearchPrefix};

/// Precision of a FHIR date or dateTime literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePrecision {
    /// Year only (e.g., "2024")
    Year,
    /// Year and month (e.g., "2024-01")
    Month,
    /// Full date (e.g., "2024-01-15")
    Day,
    /// Date and time to minutes (e.g., "2024-01-15T10:30")
    Minute,
    /// Date and time to seconds (e.g., "2024-01-15T10:30:00")
    Second,
    /// Fractional seconds
    Millisecond,
}

impl fmt::Display for DatePrecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatePrecision::Year => write!(f, "year"),
            DatePrecision::Month => write!(f, "month"),
            DatePrecision::Day => write!(f, "day"),
            DatePrecision::Minute => write!(f, "minute"),
            DatePrecision::Second => write!(f, "second"),
            DatePrecision::Millisecond => write!(f, "millisecond"),
        }
    }
}

/// A date search value: the inclusive instant range implied by a date literal
/// at its precision, plus the comparator prefix.
///
/// `2001` covers `2001-01-01T00:00:00Z ..= 2001-12-31T23:59:59.999999999Z`.
/// A missing bound is open.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    /// Comparator prefix.
    pub prefix: SearchPrefix,
    /// Inclusive lower bound.
    pub lower_bound: Option<DateTime<Utc>>,
    /// Inclusive upper bound.
    pub upper_bound: Option<DateTime<Utc>>,
    /// Precision of the literal.
    pub precision: DatePrecision,
}

/// How a string value is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StringMatchMode {
    /// Case-insensitive prefix match (FHIR default).
    #[default]
    StartsWith,
    /// Case-insensitive substring match (`:contains`).
    Contains,
    /// Case-sensitive whole-value match (`:exact`).
    Exact,
}

/// A resolved reference target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceTarget {
    /// Resource type, when the token or a type hint names one.
    pub resource_type: Option<String>,
    /// Logical id of the target.
    pub id: String,
}

impl ReferenceTarget {
    /// Returns the relative form (`Patient/123`), or the bare id if the type is unknown.
    pub fn relative(&self) -> String {
        match &self.resource_type {
            Some(t) => format!("{}/{}", t, self.id),
            None => self.id.clone(),
        }
    }
}

/// The variant-specific payload of a decoded search value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ValueKind {
    /// Code with optional system. `system: None` matches any system.
    Token {
        /// Code system URI.
        system: Option<String>,
        /// Code value.
        code: String,
        /// Negated by `:not`.
        negated: bool,
    },

    /// Date or dateTime range.
    Date(DateRange),

    /// Quantity with optional unit system and unit code.
    Quantity {
        /// Comparator prefix.
        prefix: SearchPrefix,
        /// Decimal value, scale preserved from the token.
        value: Decimal,
        /// Unit system URI.
        system: Option<String>,
        /// Unit code.
        units: Option<String>,
    },

    /// String value.
    String {
        /// The unescaped search text.
        value: String,
        /// Comparison mode.
        mode: StringMatchMode,
    },

    /// Reference to another resource.
    Reference(ReferenceTarget),

    /// Number with comparator prefix.
    Number {
        /// Comparator prefix.
        prefix: SearchPrefix,
        /// Decimal value, scale preserved from the token.
        value: Decimal,
    },

    /// URI value (exact match).
    Uri {
        /// The URI.
        value: String,
    },

    /// Composite value: one decoded value per component, in declaration order.
    Composite {
        /// Component values.
        components: Vec<ParameterValue>,
    },

    /// `:missing` predicate.
    Missing {
        /// True to match owners without any value for the parameter.
        missing: bool,
    },
}

/// A decoded search value together with the raw token it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterValue {
    /// The raw token, before unescaping.
    pub raw: String,
    /// The typed payload.
    #[serde(flatten)]
    pub kind: ValueKind,
}

impl ParameterValue {
    /// Creates a value from its raw token and payload.
    pub fn new(raw: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            raw: raw.into(),
            kind,
        }
    }

    /// Returns the parameter type this value belongs to, or `None` for a
    /// `:missing` predicate (which is valid for every type).
    pub fn param_type(&self) -> Option<SearchParamType> {
        match &self.kind {
            ValueKind::Token { .. } => Some(SearchParamType::Token),
            ValueKind::Date(_) => Some(SearchParamType::Date),
            ValueKind::Quantity { .. } => Some(SearchParamType::Quantity),
            ValueKind::String { .. } => Some(SearchParamType::String),
            ValueKind::Reference(_) => Some(SearchParamType::Reference),
            ValueKind::Number { .. } => Some(SearchParamType::Number),
            ValueKind::Uri { .. } => Some(SearchParamType::Uri),
            ValueKind::Composite { .. } => Some(SearchParamType::Composite),
            ValueKind::Missing { .. } => None,
        }
    }

    /// Returns the comparator prefix for prefix-bearing values.
    pub fn prefix(&self) -> Option<SearchPrefix> {
        match &self.kind {
            ValueKind::Date(range) => Some(range.prefix),
            ValueKind::Quantity { prefix, .. } | ValueKind::Number { prefix, .. } => Some(*prefix),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
