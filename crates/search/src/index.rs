//! Indexed value model.
//!
//! Flattened, storage-oriented records produced when a resource version is
//! indexed. Each record is owned by one resource version and identifies the
//! parameter it was produced for. Derived `Eq`/`Hash` cover every field, so a
//! `HashSet<IndexedRecord>` de-duplicates index rows.

// Row fields mirror the storage columns
#![allow(missing_docs)]

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::codec::parse_date_literal;
use crate::types::{ParameterValue, ReferenceTarget, SearchParamType, ValueKind};

/// Identity of the resource that owns an index row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    /// Resource type of the owner.
    pub resource_type: String,
    /// Logical id of the owner.
    pub id: String,
}

impl ResourceId {
    /// Creates a resource identity.
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.id)
    }
}

/// An indexed quantity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexedQuantity {
    pub param_name: String,
    pub owner: ResourceId,
    pub system: Option<String>,
    pub units: Option<String>,
    pub value: Decimal,
}

/// An indexed coded value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexedToken {
    pub param_name: String,
    pub owner: ResourceId,
    pub system: Option<String>,
    pub code: String,
}

/// An indexed reference, normalised to its relative form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexedReference {
    pub param_name: String,
    pub owner: ResourceId,
    pub target: ReferenceTarget,
}

/// An indexed date, stored as the inclusive instant range it covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexedDate {
    pub param_name: String,
    pub owner: ResourceId,
    /// Inclusive lower bound; `None` is open.
    pub low: Option<DateTime<Utc>>,
    /// Inclusive upper bound; `None` is open.
    pub high: Option<DateTime<Utc>>,
}

impl IndexedDate {
    /// Indexes a FHIR date/dateTime literal at its own precision.
    ///
    /// Returns `None` if the literal is not a valid FHIR date.
    pub fn from_literal(
        param_name: impl Into<String>,
        owner: ResourceId,
        literal: &str,
    ) -> Option<Self> {
        let (low, high, _) = parse_date_literal(literal)?;
        Some(Self {
            param_name: param_name.into(),
            owner,
            low: Some(low),
            high: Some(high),
        })
    }
}

/// An indexed string, kept both normalised and verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexedString {
    pub param_name: String,
    pub owner: ResourceId,
    /// Lower-cased form used by starts-with and contains matching.
    pub normalized: String,
    /// Original form used by `:exact` matching.
    pub exact: String,
}

impl IndexedString {
    /// Indexes a string value.
    pub fn new(param_name: impl Into<String>, owner: ResourceId, value: &str) -> Self {
        Self {
            param_name: param_name.into(),
            owner,
            normalized: normalize_string(value),
            exact: value.to_string(),
        }
    }
}

/// An indexed number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexedNumber {
    pub param_name: String,
    pub owner: ResourceId,
    pub value: Decimal,
}

/// An indexed URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexedUri {
    pub param_name: String,
    pub owner: ResourceId,
    pub uri: String,
}

/// An indexed composite: one record per component, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexedComposite {
    pub param_name: String,
    pub owner: ResourceId,
    pub components: Vec<IndexedRecord>,
}

/// Any indexed row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IndexedRecord {
    Quantity(IndexedQuantity),
    Token(IndexedToken),
    Reference(IndexedReference),
    Date(IndexedDate),
    String(IndexedString),
    Number(IndexedNumber),
    Uri(IndexedUri),
    Composite(IndexedComposite),
}

impl IndexedRecord {
    /// Returns the parameter this row was produced for.
    pub fn param_name(&self) -> &str {
        match self {
            IndexedRecord::Quantity(r) => &r.param_name,
            IndexedRecord::Token(r) => &r.param_name,
            IndexedRecord::Reference(r) => &r.param_name,
            IndexedRecord::Date(r) => &r.param_name,
            IndexedRecord::String(r) => &r.param_name,
            IndexedRecord::Number(r) => &r.param_name,
            IndexedRecord::Uri(r) => &r.param_name,
            IndexedRecord::Composite(r) => &r.param_name,
        }
    }

    /// Returns the owning resource.
    pub fn owner(&self) -> &ResourceId {
        match self {
            IndexedRecord::Quantity(r) => &r.owner,
            IndexedRecord::Token(r) => &r.owner,
            IndexedRecord::Reference(r) => &r.owner,
            IndexedRecord::Date(r) => &r.owner,
            IndexedRecord::String(r) => &r.owner,
            IndexedRecord::Number(r) => &r.owner,
            IndexedRecord::Uri(r) => &r.owner,
            IndexedRecord::Composite(r) => &r.owner,
        }
    }

    /// Returns the parameter type of this row.
    pub fn param_type(&self) -> SearchParamType {
        match self {
            IndexedRecord::Quantity(_) => SearchParamType::Quantity,
            IndexedRecord::Token(_) => SearchParamType::Token,
            IndexedRecord::Reference(_) => SearchParamType::Reference,
            IndexedRecord::Date(_) => SearchParamType::Date,
            IndexedRecord::String(_) => SearchParamType::String,
            IndexedRecord::Number(_) => SearchParamType::Number,
            IndexedRecord::Uri(_) => SearchParamType::Uri,
            IndexedRecord::Composite(_) => SearchParamType::Composite,
        }
    }
}

/// Maps a decoded value to the index row it would produce for `owner`.
///
/// The row records the value itself; comparator prefixes and the `:not`
/// flag describe a comparison and are not stored. `:missing` predicates
/// have no row and yield `None`.
pub fn to_indexed(
    value: &ParameterValue,
    owner: &ResourceId,
    param_name: &str,
) -> Option<IndexedRecord> {
    let param_name = param_name.to_string();
    let owner = owner.clone();
    let record = match &value.kind {
        ValueKind::Quantity {
            value,
            system,
            units,
            ..
        } => IndexedRecord::Quantity(IndexedQuantity {
            param_name,
            owner,
            system: system.clone(),
            units: units.clone(),
            value: *value,
        }),
        ValueKind::Token { system, code, .. } => IndexedRecord::Token(IndexedToken {
            param_name,
            owner,
            system: system.clone(),
            code: code.clone(),
        }),
        ValueKind::Reference(target) => IndexedRecord::Reference(IndexedReference {
            param_name,
            owner,
            target: target.clone(),
        }),
        ValueKind::Date(range) => IndexedRecord::Date(IndexedDate {
            param_name,
            owner,
            low: range.lower_bound,
            high: range.upper_bound,
        }),
        ValueKind::String { value, .. } => {
            IndexedRecord::String(IndexedString::new(param_name, owner, value))
        }
        ValueKind::Number { value, .. } => IndexedRecord::Number(IndexedNumber {
            param_name,
            owner,
            value: *value,
        }),
        ValueKind::Uri { value } => IndexedRecord::Uri(IndexedUri {
            param_name,
            owner,
            uri: value.clone(),
        }),
        ValueKind::Composite { components } => IndexedRecord::Composite(IndexedComposite {
            components: components
                .iter()
                .map(|c| to_indexed(c, &owner, &param_name))
                .collect::<Option<Vec<_>>>()?,
            param_name,
            owner,
        }),
        ValueKind::Missing { .. } => return None,
    };
    Some(record)
}

pub(crate) fn normalize_string(value: &str) -> String {
    value.trim().to_lowercase()
}
