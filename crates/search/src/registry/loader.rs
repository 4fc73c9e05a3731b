//! SearchParameter loader.
//!
//! Reads FHIR `SearchParameter` resources into [`ParamDefinition`]s. Accepts
//! a single resource, a JSON array of resources, or a Bundle.
//!
//! Chain policy is read from the `chainWhitelist` / `chainBlacklist` string
//! arrays on the resource, or from the equivalent extensions:
//!
//! ```json
//! { "url": "http://helios.dev/fhir/StructureDefinition/chain-whitelist", "valueString": "name" }
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::RegistryError;
use crate::types::SearchParamType;

use super::{ChainPolicy, ParamDefinition};

/// Extension URL carrying one allowed chain per extension.
pub const CHAIN_WHITELIST_EXTENSION: &str =
    "http://helios.dev/fhir/StructureDefinition/chain-whitelist";

/// Extension URL carrying one forbidden chain per extension.
pub const CHAIN_BLACKLIST_EXTENSION: &str =
    "http://helios.dev/fhir/StructureDefinition/chain-blacklist";

/// Loader for SearchParameter definitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchParameterLoader;

impl SearchParameterLoader {
    /// Creates a loader.
    pub fn new() -> Self {
        Self
    }

    /// Returns the parameters every resource type supports.
    pub fn load_embedded(&self) -> Vec<ParamDefinition> {
        [
            ("Resource-id", "_id", SearchParamType::Token),
            ("Resource-lastUpdated", "_lastUpdated", SearchParamType::Date),
            ("Resource-tag", "_tag", SearchParamType::Token),
            ("Resource-profile", "_profile", SearchParamType::Uri),
            ("Resource-security", "_security", SearchParamType::Token),
            ("Resource-source", "_source", SearchParamType::Uri),
        ]
        .into_iter()
        .map(|(id, code, param_type)| {
            ParamDefinition::new(
                format!("http://hl7.org/fhir/SearchParameter/{}", id),
                code,
                param_type,
            )
            .with_base(["Resource"])
        })
        .collect()
    }

    /// Loads SearchParameter resources from a JSON bundle, array or single resource.
    pub fn load_from_json(&self, json: &Value) -> Result<Vec<ParamDefinition>, RegistryError> {
        let resources: Vec<&Value> = if let Some(entries) = json.get("entry").and_then(|e| e.as_array()) {
            entries.iter().filter_map(|e| e.get("resource")).collect()
        } else if let Some(array) = json.as_array() {
            array.iter().collect()
        } else {
            vec![json]
        };

        let mut params = Vec::new();
        for resource in resources {
            if resource.get("resourceType").and_then(|t| t.as_str()) != Some("SearchParameter") {
                continue;
            }
            if resource.get("status").and_then(|s| s.as_str()) == Some("retired") {
                debug!(
                    url = resource.get("url").and_then(|u| u.as_str()).unwrap_or_default(),
                    "skipping retired search parameter"
                );
                continue;
            }
            params.push(self.parse_resource(resource)?);
        }
        Ok(params)
    }

    /// Loads parameters from a JSON file.
    pub fn load_file(&self, path: &Path) -> Result<Vec<ParamDefinition>, RegistryError> {
        let content = std::fs::read_to_string(path).map_err(|e| RegistryError::LoadFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let json: Value = serde_json::from_str(&content).map_err(|e| RegistryError::LoadFailed {
            path: path.display().to_string(),
            message: format!("Invalid JSON: {}", e),
        })?;

        let params = self.load_from_json(&json)?;
        debug!(path = %path.display(), count = params.len(), "loaded search parameters");
        Ok(params)
    }

    /// Parses a SearchParameter FHIR resource into a definition.
    pub fn parse_resource(&self, resource: &Value) -> Result<ParamDefinition, RegistryError> {
        let url = resource
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| RegistryError::MissingField {
                field: "url".to_string(),
                url: None,
            })?
            .to_string();

        let code = resource
            .get("code")
            .and_then(|v| v.as_str())
            .ok_or_else(|| RegistryError::MissingField {
                field: "code".to_string(),
                url: Some(url.clone()),
            })?
            .to_string();

        let type_str = resource
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| RegistryError::MissingField {
                field: "type".to_string(),
                url: Some(url.clone()),
            })?;

        let param_type = type_str
            .parse::<SearchParamType>()
            .map_err(|message| RegistryError::InvalidDefinition {
                code: code.clone(),
                message,
            })?;

        let base = string_array(resource, "base");
        if base.is_empty() {
            return Err(RegistryError::MissingField {
                field: "base".to_string(),
                url: Some(url),
            });
        }

        let components = match resource.get("component").and_then(|v| v.as_array()) {
            Some(components) => components
                .iter()
                .map(|c| {
                    c.get("definition")
                        .and_then(|d| d.as_str())
                        .map(String::from)
                        .ok_or_else(|| RegistryError::InvalidDefinition {
                            code: code.clone(),
                            message: "composite component missing definition".to_string(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        Ok(ParamDefinition {
            url,
            code,
            param_type,
            base,
            targets: string_array(resource, "target").into_iter().collect(),
            chain_policy: parse_chain_policy(resource),
            components,
        })
    }
}

fn string_array(resource: &Value, field: &str) -> Vec<String> {
    resource
        .get(field)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

fn parse_chain_policy(resource: &Value) -> ChainPolicy {
    let from_extensions = |ext_url: &str| -> Vec<String> {
        resource
            .get("extension")
            .and_then(|v| v.as_array())
            .map(|exts| {
                exts.iter()
                    .filter(|e| e.get("url").and_then(|u| u.as_str()) == Some(ext_url))
                    .filter_map(|e| e.get("valueString").and_then(|v| v.as_str()))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    };

    let collect = |field: &str, ext_url: &str| -> Option<BTreeSet<String>> {
        let mut entries: BTreeSet<String> = string_array(resource, field).into_iter().collect();
        entries.extend(from_extensions(ext_url));
        let present = resource.get(field).is_some() || !entries.is_empty();
        present.then_some(entries)
    };

    ChainPolicy {
        whitelist: collect("chainWhitelist", CHAIN_WHITELIST_EXTENSION),
        blacklist: collect("chainBlacklist", CHAIN_BLACKLIST_EXTENSION),
    }
}
