//! Core types for the search query model.
//!
//! - [`SearchParamType`], [`SearchModifier`], [`SearchPrefix`] - the search vocabulary
//! - [`ParameterName`] - a parsed, possibly chained, parameter name
//! - [`ParameterValue`] - a decoded, typed search value
//!
//! # Examples
//!
//! ```
//! use helios_search::types::{ParameterName, SearchModifier, SearchPrefix};
//!
//! let name = ParameterName::parse("subject:Patient.name:exact").unwrap();
//! assert_eq!(name.base().type_modifier(), Some("Patient"));
//! assert_eq!(name.terminal().modifier, Some(SearchModifier::Exact));
//!
//! assert_eq!(SearchPrefix::extract("ge2001"), (SearchPrefix::Ge, "2001"));
//! ```

mod search_params;
mod value;

pub(crate) use search_params::chain_key;
pub use search_params::{NameSegment, ParameterName, SearchModifier, SearchParamType, SearchPrefix};
pub use value::{
    DatePrecision, DateRange, ParameterValue, ReferenceTarget, StringMatchMode, ValueKind,
};
