//! Query-level parsing.
//!
//! [`SearchQueryParser`] turns the decoded `(name, value)` pairs of one
//! search request into a [`SearchQuery`]: result-control parameters are
//! passed through, everything else is resolved against the registry and
//! composed into one [`CompoundParameter`] per parameter.
//!
//! # Example
//!
//! ```rust
//! use helios_search::registry::{ParamDefinition, ParameterRegistry};
//! use helios_search::{SearchConfig, SearchParamType, SearchQueryParser};
//!
//! let registry = ParameterRegistry::builder()
//!     .add(
//!         ParamDefinition::new("http://example.org/sp/birthdate", "birthdate", SearchParamType::Date)
//!             .with_base(["Patient"]),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let parser = SearchQueryParser::new(&registry, SearchConfig::default());
//! let query = parser
//!     .parse("Patient", [("birthdate", "ge2001,2002"), ("_count", "10")])
//!     .unwrap();
//! assert_eq!(query.parameters.len(), 1);
//! assert_eq!(query.control, vec![("_count".to_string(), "10".to_string())]);
//! ```

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::chain::{ChainResolver, ChainSpec, TerminalParam};
use crate::codec::DecodeHints;
use crate::compose::{CompoundParameter, Occurrence, compose};
use crate::config::{Handling, SearchConfig};
use crate::error::{ChainError, DecodeError, SearchResult};
use crate::index::IndexedRecord;
use crate::matcher::Matcher;
use crate::registry::ParameterLookup;
use crate::types::{ParameterName, SearchParamType};

/// Parameters that control the result set rather than filter it.
pub const CONTROL_PARAMETERS: &[&str] = &[
    "_count",
    "_offset",
    "_sort",
    "_include",
    "_revinclude",
    "_summary",
    "_elements",
    "_total",
    "_format",
    "_pretty",
    "_query",
    "_contained",
    "_containedType",
];

/// Returns true if `name` (with or without modifier) is a result-control parameter.
pub fn is_control_parameter(name: &str) -> bool {
    let base = name.split(':').next().unwrap_or(name);
    CONTROL_PARAMETERS.contains(&base)
}

/// One search criterion after resolution and composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedParameter {
    /// Grouping key (`subject:Patient.name`).
    pub name: String,
    /// Declared type of the matched parameter.
    pub param_type: SearchParamType,
    /// The reference hops, for chained names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<ChainSpec>,
    /// The AND-of-OR values.
    pub compound: CompoundParameter,
    /// Matcher configured by the parser that produced this criterion.
    #[serde(skip)]
    pub matcher: Matcher,
}

impl ResolvedParameter {
    /// Returns true if an owner with `rows` for this parameter satisfies it.
    pub fn matches_rows(&self, rows: &[IndexedRecord]) -> bool {
        self.matcher.matches_rows(&self.compound, rows)
    }

    /// Tests a referenced resource against a chained criterion.
    ///
    /// `rows` are the referenced resource's rows for the terminal parameter.
    /// Only target types the chain admits can succeed; an unchained
    /// parameter ignores `target_type`.
    pub fn matches_chain_target(&self, target_type: &str, rows: &[IndexedRecord]) -> bool {
        let admitted = self.chain.as_ref().is_none_or(|c| c.admits(target_type));
        admitted && self.matches_rows(rows)
    }
}

/// A fully parsed search request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    /// The searched resource type.
    pub resource_type: String,
    /// Search criteria, in order of first appearance.
    pub parameters: Vec<ResolvedParameter>,
    /// Result-control parameters, verbatim and in request order.
    pub control: Vec<(String, String)>,
    /// Unknown parameter names skipped under lenient handling.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

impl SearchQuery {
    /// Returns the criterion with the given grouping key.
    pub fn parameter(&self, name: &str) -> Option<&ResolvedParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// Parses search requests against a registry.
pub struct SearchQueryParser<'r, L: ?Sized> {
    registry: &'r L,
    config: SearchConfig,
}

impl<'r, L: ParameterLookup + ?Sized> SearchQueryParser<'r, L> {
    /// Creates a parser.
    pub fn new(registry: &'r L, config: SearchConfig) -> Self {
        Self { registry, config }
    }

    /// Returns the parser configuration.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Parses the decoded `(name, value)` pairs of a search on `resource_type`.
    pub fn parse<I, K, V>(&self, resource_type: &str, params: I) -> SearchResult<SearchQuery>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut query = SearchQuery {
            resource_type: resource_type.to_string(),
            ..Default::default()
        };

        let mut groups: Vec<(String, Vec<(ParameterName, String)>)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for (name, value) in params {
            let (name, value) = (name.as_ref(), value.as_ref());
            if is_control_parameter(name) {
                query.control.push((name.to_string(), value.to_string()));
                continue;
            }

            let parsed = ParameterName::parse(name)?;
            let key = parsed.grouping_key();
            match positions.get(&key) {
                Some(&i) => groups[i].1.push((parsed, value.to_string())),
                None => {
                    positions.insert(key.clone(), groups.len());
                    groups.push((key, vec![(parsed, value.to_string())]));
                }
            }
        }

        let resolver = ChainResolver::new(self.registry).with_max_depth(self.config.max_chain_depth);
        let matcher = Matcher::from_config(&self.config);

        for (key, occurrences) in groups {
            let Some((first, _)) = occurrences.first() else {
                continue;
            };

            let spec = match resolver.resolve(resource_type, first) {
                Ok(spec) => spec,
                Err(ChainError::UnknownParameter { param, .. })
                    if self.config.handling == Handling::Lenient =>
                {
                    warn!(
                        resource_type,
                        param = %param,
                        name = %key,
                        "skipping unknown search parameter"
                    );
                    query.skipped.push(key);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            for (name, _) in &occurrences {
                if let Some(modifier) = &name.terminal().modifier {
                    if !modifier.is_valid_for(spec.terminal.param_type) {
                        return Err(DecodeError::InvalidModifier {
                            modifier: modifier.to_string(),
                            param_type: spec.terminal.param_type,
                        }
                        .into());
                    }
                }
            }

            let compound = compose(
                &key,
                spec.terminal.param_type,
                &base_hints(&spec.terminal),
                occurrences
                    .iter()
                    .map(|(name, value)| Occurrence::new(name.terminal().modifier.clone(), value)),
            )?;

            debug!(
                resource_type,
                name = %key,
                param_type = %spec.terminal.param_type,
                chained = spec.is_chained(),
                groups = compound.len(),
                "resolved search parameter"
            );

            query.parameters.push(ResolvedParameter {
                name: key,
                param_type: spec.terminal.param_type,
                chain: spec.is_chained().then_some(spec),
                compound,
                matcher,
            });
        }

        Ok(query)
    }
}

fn base_hints(terminal: &TerminalParam) -> DecodeHints {
    let mut hints = DecodeHints::default().with_components(terminal.components.clone());
    if let Some(target) = terminal.sole_target() {
        hints = hints.with_target_type(target);
    }
    hints
}
