//! Construct-then-publish registry building.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::RegistryError;

use super::{ParamDefinition, ParameterRegistry, TypeTable};

/// Collects definitions and publishes them as an immutable [`ParameterRegistry`].
///
/// Validation happens in [`build`](Self::build); a registry is never visible
/// until every definition has been accepted.
#[derive(Debug, Default)]
pub struct ParameterRegistryBuilder {
    definitions: Vec<ParamDefinition>,
}

impl ParameterRegistryBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition.
    pub fn add(mut self, definition: ParamDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    /// Adds many definitions.
    pub fn extend<I>(mut self, definitions: I) -> Self
    where
        I: IntoIterator<Item = ParamDefinition>,
    {
        self.definitions.extend(definitions);
        self
    }

    /// Validates every definition and publishes the registry.
    pub fn build(self) -> Result<ParameterRegistry, RegistryError> {
        let mut by_url: HashMap<String, Arc<ParamDefinition>> = HashMap::new();
        let mut by_type: HashMap<String, TypeTable> = HashMap::new();
        let mut universal: TypeTable = HashMap::new();

        for definition in self.definitions {
            validate(&definition)?;
            let definition = Arc::new(definition);

            if definition.is_universal() {
                insert_unique(&mut universal, "Resource", &definition)?;
            }
            for base in definition
                .base
                .iter()
                .filter(|b| *b != "Resource" && *b != "DomainResource")
            {
                insert_unique(by_type.entry(base.clone()).or_default(), base, &definition)?;
            }
            by_url.insert(definition.url.clone(), definition);
        }

        info!(
            parameters = by_url.len(),
            resource_types = by_type.len(),
            universal = universal.len(),
            "published search parameter registry"
        );

        Ok(ParameterRegistry {
            by_type,
            universal,
            by_url,
        })
    }
}

/// Checks a single definition for configuration errors.
pub(crate) fn validate(definition: &ParamDefinition) -> Result<(), RegistryError> {
    if definition.code.is_empty() {
        return Err(RegistryError::MissingField {
            field: "code".to_string(),
            url: Some(definition.url.clone()),
        });
    }
    if definition.chain_policy.is_conflicting() {
        return Err(RegistryError::ConflictingChainPolicy {
            resource_type: definition.base.join(","),
            code: definition.code.clone(),
        });
    }
    if !definition.is_reference()
        && (!definition.targets.is_empty() || !definition.chain_policy.is_unrestricted())
    {
        return Err(RegistryError::InvalidDefinition {
            code: definition.code.clone(),
            message: "only reference parameters may declare targets or a chain policy"
                .to_string(),
        });
    }
    Ok(())
}

pub(crate) fn insert_unique(
    table: &mut TypeTable,
    resource_type: &str,
    definition: &Arc<ParamDefinition>,
) -> Result<(), RegistryError> {
    if table.contains_key(&definition.code) {
        return Err(RegistryError::DuplicateParameter {
            resource_type: resource_type.to_string(),
            code: definition.code.clone(),
        });
    }
    debug!(resource_type, code = %definition.code, "registered search parameter");
    table.insert(definition.code.clone(), Arc::clone(definition));
    Ok(())
}
