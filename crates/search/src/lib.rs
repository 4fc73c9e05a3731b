//! Helios FHIR Server Search Parameter Core
//!
//! This crate parses, validates and matches FHIR search parameters. It sits
//! between the transport layer (which hands it decoded `name -> value` pairs)
//! and the storage layer (which consumes index rows and compound parameters).
//!
//! # Pipeline
//!
//! - [`codec`] - types one raw token (`ge2001`, `5.4|http://unitsofmeasure.org|mg`)
//! - [`compose`] - combines repeated occurrences into AND-of-OR groups
//! - [`chain`] - resolves chained names (`subject:Patient.name`) against the registry
//! - [`registry`] - search parameter definitions and chain policy
//! - [`index`] - storage-oriented index rows
//! - [`matcher`] - evaluates query values against index rows
//! - [`query`] - the whole request, end to end
//!
//! # Quick Start
//!
//! ```
//! use helios_search::registry::{ChainPolicy, ParamDefinition, ParameterRegistry};
//! use helios_search::{SearchConfig, SearchParamType, SearchQueryParser};
//!
//! let registry = ParameterRegistry::builder()
//!     .add(
//!         ParamDefinition::new("http://example.org/sp/subject", "subject", SearchParamType::Reference)
//!             .with_base(["Observation"])
//!             .with_targets(["Patient", "Group"])
//!             .with_chain_policy(ChainPolicy::whitelist(["", "name"])),
//!     )
//!     .add(
//!         ParamDefinition::new("http://example.org/sp/patient-name", "name", SearchParamType::String)
//!             .with_base(["Patient"]),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let parser = SearchQueryParser::new(&registry, SearchConfig::default());
//! let query = parser.parse("Observation", [("subject.name", "smith")]).unwrap();
//!
//! let chain = query.parameters[0].chain.as_ref().unwrap();
//! assert_eq!(chain.target_types(), ["Patient".to_string()]);
//! ```
//!
//! # Errors
//!
//! Request-time failures are [`SearchError`]s carrying the offending raw input
//! and a FHIR issue code. Registry construction failures are
//! [`RegistryError`]s and belong to startup.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod chain;
pub mod codec;
pub mod compose;
pub mod config;
pub mod error;
mod escape;
pub mod index;
pub mod matcher;
pub mod query;
pub mod registry;
pub mod types;

// Re-export commonly used types at crate root
pub use chain::{ChainLink, ChainResolver, ChainSpec, TerminalParam, resolve};
pub use codec::{DecodeHints, decode, decode_with};
pub use compose::{CompoundParameter, Occurrence, OrGroup, compose};
pub use config::{Handling, SearchConfig};
pub use error::{ChainError, ComposeError, DecodeError, RegistryError, SearchError, SearchResult};
pub use index::{IndexedRecord, ResourceId, to_indexed};
pub use matcher::{Matcher, matches};
pub use query::{ResolvedParameter, SearchQuery, SearchQueryParser};
pub use registry::{ParameterLookup, ParameterRegistry};
pub use types::{ParameterName, ParameterValue, SearchModifier, SearchParamType, SearchPrefix};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
