//! Search parameter registry.
//!
//! The registry answers `(resource type, code) -> definition` for the chain
//! resolver and the query parser. Two implementations share the
//! [`ParameterLookup`] trait:
//!
//! - [`ParameterRegistry`] is built once by [`ParameterRegistryBuilder`] and
//!   never mutated afterwards
//! - [`LazyParameterRegistry`] populates one resource type at a time on first
//!   use from a [`DefinitionSource`]
//!
//! Definitions come from FHIR `SearchParameter` JSON via
//! [`SearchParameterLoader`] or are constructed directly.

mod builder;
mod definition;
mod lazy;
mod loader;

use std::collections::HashMap;
use std::sync::Arc;

use crate::types::SearchParamType;

pub use builder::ParameterRegistryBuilder;
pub use definition::{ChainPolicy, ParamDefinition};
pub use lazy::{DefinitionSource, LazyParameterRegistry};
pub use loader::{CHAIN_BLACKLIST_EXTENSION, CHAIN_WHITELIST_EXTENSION, SearchParameterLoader};

/// Definitions declared on one resource type, by code.
pub(crate) type TypeTable = HashMap<String, Arc<ParamDefinition>>;

/// Read-only parameter lookup shared by both registry flavours.
pub trait ParameterLookup: Send + Sync {
    /// Returns the definition of `code` on `resource_type`.
    fn get_param(&self, resource_type: &str, code: &str) -> Option<Arc<ParamDefinition>>;

    /// Returns a definition by canonical URL.
    fn get_by_url(&self, url: &str) -> Option<Arc<ParamDefinition>>;

    /// Resolves the declared types of a composite parameter's components.
    ///
    /// Returns `None` if any component URL is unknown.
    fn component_types(&self, definition: &ParamDefinition) -> Option<Vec<SearchParamType>> {
        definition
            .components
            .iter()
            .map(|url| self.get_by_url(url).map(|d| d.param_type))
            .collect()
    }
}

/// An immutable, fully built registry.
#[derive(Debug, Clone, Default)]
pub struct ParameterRegistry {
    by_type: HashMap<String, TypeTable>,
    universal: TypeTable,
    by_url: HashMap<String, Arc<ParamDefinition>>,
}

impl ParameterRegistry {
    /// Starts building a registry.
    pub fn builder() -> ParameterRegistryBuilder {
        ParameterRegistryBuilder::new()
    }

    /// Returns the number of distinct definitions.
    pub fn len(&self) -> usize {
        self.by_url.len()
    }

    /// Returns true if the registry holds no definitions.
    pub fn is_empty(&self) -> bool {
        self.by_url.is_empty()
    }

    /// Returns every definition applicable to a resource type.
    pub fn params_for(&self, resource_type: &str) -> Vec<Arc<ParamDefinition>> {
        let mut params: Vec<_> = self
            .by_type
            .get(resource_type)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default();
        params.extend(
            self.universal
                .iter()
                .filter(|(code, _)| {
                    self.by_type
                        .get(resource_type)
                        .is_none_or(|t| !t.contains_key(*code))
                })
                .map(|(_, def)| Arc::clone(def)),
        );
        params
    }

    /// Returns all resource types with type-specific definitions.
    pub fn resource_types(&self) -> Vec<String> {
        self.by_type.keys().cloned().collect()
    }
}

impl ParameterLookup for ParameterRegistry {
    fn get_param(&self, resource_type: &str, code: &str) -> Option<Arc<ParamDefinition>> {
        self.by_type
            .get(resource_type)
            .and_then(|t| t.get(code))
            .or_else(|| self.universal.get(code))
            .cloned()
    }

    fn get_by_url(&self, url: &str) -> Option<Arc<ParamDefinition>> {
        self.by_url.get(url).cloned()
    }
}

impl<T: ParameterLookup + ?Sized> ParameterLookup for Arc<T> {
    fn get_param(&self, resource_type: &str, code: &str) -> Option<Arc<ParamDefinition>> {
        (**self).get_param(resource_type, code)
    }

    fn get_by_url(&self, url: &str) -> Option<Arc<ParamDefinition>> {
        (**self).get_by_url(url)
    }
}
