//! Compound parameter composition.
//!
//! Repeated query-string occurrences of one parameter form an AND of OR
//! groups: `date=2001,2002&date=2003,2004` is `(2001 OR 2002) AND (2003 OR 2004)`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::{DecodeHints, decode_with};
use crate::error::ComposeError;
use crate::escape::split_unescaped;
use crate::types::{ParameterValue, SearchModifier, SearchParamType};

/// One query-string occurrence: the raw value plus the modifier its name carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence<'a> {
    /// Modifier on this occurrence's name (`name:exact=...`).
    pub modifier: Option<SearchModifier>,
    /// The raw, already percent-decoded value.
    pub value: &'a str,
}

impl<'a> Occurrence<'a> {
    /// Creates an occurrence with a modifier.
    pub fn new(modifier: Option<SearchModifier>, value: &'a str) -> Self {
        Self { modifier, value }
    }
}

impl<'a> From<&'a str> for Occurrence<'a> {
    fn from(value: &'a str) -> Self {
        Self {
            modifier: None,
            value,
        }
    }
}

impl<'a> From<&'a String> for Occurrence<'a> {
    fn from(value: &'a String) -> Self {
        Self::from(value.as_str())
    }
}

/// Values from one occurrence; any of them may match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrGroup {
    /// Modifier the occurrence carried.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<SearchModifier>,
    /// Decoded values, in request order.
    pub values: Vec<ParameterValue>,
}

impl OrGroup {
    /// Returns the number of alternatives.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the group has no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// All occurrences of one parameter; every group must match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundParameter {
    /// Parameter name as grouped (chain path without the terminal modifier).
    pub name: String,
    /// Declared type shared by every value.
    pub param_type: SearchParamType,
    /// OR groups, one per occurrence, in request order.
    pub groups: Vec<OrGroup>,
}

impl CompoundParameter {
    /// Returns the number of AND groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns true if there are no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Iterates every value across all groups.
    pub fn values(&self) -> impl Iterator<Item = &ParameterValue> {
        self.groups.iter().flat_map(|g| g.values.iter())
    }
}

/// Composes repeated occurrences of `name` into a [`CompoundParameter`].
///
/// `hints` supplies context shared by all occurrences (reference target,
/// composite components). An occurrence's own modifier takes precedence over
/// `hints.modifier`.
pub fn compose<'a, I, O>(
    name: &str,
    declared: SearchParamType,
    hints: &DecodeHints,
    occurrences: I,
) -> Result<CompoundParameter, ComposeError>
where
    I: IntoIterator<Item = O>,
    O: Into<Occurrence<'a>>,
{
    let mut groups = Vec::new();

    for (occurrence_index, occurrence) in occurrences.into_iter().enumerate() {
        let occurrence = occurrence.into();
        if occurrence.value.trim().is_empty() {
            return Err(ComposeError::EmptyGroup {
                name: name.to_string(),
                occurrence: occurrence_index,
            });
        }

        let occurrence_hints = hints_for(hints, occurrence.modifier.as_ref());
        let tokens = split_unescaped(occurrence.value, ',');
        let mut values = Vec::with_capacity(tokens.len());

        for (index, token) in tokens.into_iter().enumerate() {
            let value = decode_with(token, declared, &occurrence_hints).map_err(|source| {
                ComposeError::InvalidToken {
                    name: name.to_string(),
                    occurrence: occurrence_index,
                    index,
                    raw: token.to_string(),
                    source,
                }
            })?;

            if let Some(found) = value.param_type() {
                if found != declared {
                    return Err(ComposeError::TypeMismatch {
                        name: name.to_string(),
                        expected: declared,
                        found,
                    });
                }
            }
            values.push(value);
        }

        groups.push(OrGroup {
            modifier: occurrence_hints.modifier,
            values,
        });
    }

    debug!(
        param = name,
        param_type = %declared,
        groups = groups.len(),
        "composed search parameter"
    );

    Ok(CompoundParameter {
        name: name.to_string(),
        param_type: declared,
        groups,
    })
}

fn hints_for(base: &DecodeHints, modifier: Option<&SearchModifier>) -> DecodeHints {
    let Some(modifier) = modifier else {
        return base.clone();
    };
    let mut hints = base.clone();
    hints.modifier = Some(modifier.clone());
    if let Some(target) = modifier.as_type() {
        hints.target_type = Some(target.to_string());
    }
    hints
}
