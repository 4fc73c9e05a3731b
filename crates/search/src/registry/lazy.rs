//! Lazily populated registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error, trace};

use crate::error::RegistryError;

use super::builder::{insert_unique, validate};
use super::{ParamDefinition, ParameterLookup, TypeTable};

/// Supplies the definitions for one resource type on demand.
pub trait DefinitionSource: Send + Sync {
    /// Returns every definition applicable to `resource_type`.
    fn definitions_for(&self, resource_type: &str) -> Result<Vec<ParamDefinition>, RegistryError>;
}

impl<F> DefinitionSource for F
where
    F: Fn(&str) -> Result<Vec<ParamDefinition>, RegistryError> + Send + Sync,
{
    fn definitions_for(&self, resource_type: &str) -> Result<Vec<ParamDefinition>, RegistryError> {
        self(resource_type)
    }
}

/// Registry that builds each resource type's table on first use.
///
/// Population is compute-once: concurrent first lookups for the same type
/// run the source exactly once, and readers only ever see a complete table.
/// Only non-empty tables are published. A type with no definitions, or whose
/// source fails, misses every lookup and is asked for again next time, so
/// type names taken from requests never accumulate in the cache.
pub struct LazyParameterRegistry<S> {
    source: S,
    tables: RwLock<HashMap<String, Arc<TypeTable>>>,
}

impl<S: DefinitionSource> LazyParameterRegistry<S> {
    /// Creates a registry over a definition source.
    pub fn new(source: S) -> Self {
        Self {
            source,
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the definition source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Returns the number of resource types populated so far.
    pub fn populated_types(&self) -> usize {
        self.tables.read().len()
    }

    fn table(&self, resource_type: &str) -> Arc<TypeTable> {
        if let Some(table) = self.tables.read().get(resource_type) {
            trace!(resource_type, "search parameter table cache hit");
            return Arc::clone(table);
        }

        let mut tables = self.tables.write();
        // Another writer may have populated it while we waited
        if let Some(table) = tables.get(resource_type) {
            return Arc::clone(table);
        }

        let table = match self.populate(resource_type) {
            Ok(table) if table.is_empty() => {
                trace!(resource_type, "no search parameters for resource type");
                return Arc::new(table);
            }
            Ok(table) => {
                debug!(
                    resource_type,
                    parameters = table.len(),
                    "populated search parameter table"
                );
                Arc::new(table)
            }
            Err(e) => {
                error!(
                    resource_type,
                    error = %e,
                    "failed to load search parameters; resource type has no parameters"
                );
                return Arc::new(TypeTable::new());
            }
        };

        tables.insert(resource_type.to_string(), Arc::clone(&table));
        table
    }

    fn populate(&self, resource_type: &str) -> Result<TypeTable, RegistryError> {
        let mut table = TypeTable::new();
        for definition in self.source.definitions_for(resource_type)? {
            validate(&definition)?;
            if !definition.applies_to(resource_type) {
                continue;
            }
            insert_unique(&mut table, resource_type, &Arc::new(definition))?;
        }
        Ok(table)
    }
}

impl<S: DefinitionSource> ParameterLookup for LazyParameterRegistry<S> {
    fn get_param(&self, resource_type: &str, code: &str) -> Option<Arc<ParamDefinition>> {
        self.table(resource_type).get(code).cloned()
    }

    fn get_by_url(&self, url: &str) -> Option<Arc<ParamDefinition>> {
        self.tables
            .read()
            .values()
            .flat_map(|t| t.values())
            .find(|d| d.url == url)
            .cloned()
    }
}

impl<S> std::fmt::Debug for LazyParameterRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyParameterRegistry")
            .field("populated_types", &self.tables.read().len())
            .finish()
    }
}
