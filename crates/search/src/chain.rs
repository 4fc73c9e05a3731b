//! Chain resolution.
//!
//! Resolves a parameter name such as `subject:Patient.organization.name`
//! against the registry, level by level:
//!
//! 1. The segment must exist on the current resource type(s) and be a
//!    reference parameter.
//! 2. Target types come from the segment's type modifier, or else from every
//!    declared target that itself declares the next segment. Several matching
//!    targets are carried forward together.
//! 3. The segment's chain policy is checked against the next parameter name
//!    and against the full remaining chain (`organization` and
//!    `organization.name`).
//!
//! A plain (unchained) reference parameter is checked against the empty chain
//! `""`, so a whitelist that does not list `""` rejects plain use.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace};

use crate::error::ChainError;
use crate::registry::{ParamDefinition, ParameterLookup};
use crate::types::{ParameterName, SearchModifier, SearchParamType, chain_key};

/// One reference hop in a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainLink {
    /// Resource types the reference parameter is evaluated on.
    pub source_types: Vec<String>,
    /// The reference parameter being chained through.
    pub reference_param: String,
    /// Target named by an explicit type modifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_target: Option<String>,
    /// Target types admitted for the rest of the chain, sorted.
    pub targets: Vec<String>,
}

/// The parameter whose value is matched at the end of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerminalParam {
    /// Parameter code.
    pub name: String,
    /// Declared type, identical on every candidate resource type.
    pub param_type: SearchParamType,
    /// Modifier on the terminal segment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifier: Option<SearchModifier>,
    /// Declared reference targets of the terminal parameter.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
    /// Component types when the terminal parameter is composite.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<SearchParamType>,
}

impl TerminalParam {
    /// Returns the single reference target type, if exactly one is declared.
    pub fn sole_target(&self) -> Option<&str> {
        match self.targets.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}

/// A resolved parameter name: zero or more reference hops and a terminal parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainSpec {
    /// Reference hops, outermost first. Empty for an unchained name.
    pub links: Vec<ChainLink>,
    /// The matched parameter.
    pub terminal: TerminalParam,
}

impl ChainSpec {
    /// Returns true if the name goes through at least one reference.
    pub fn is_chained(&self) -> bool {
        !self.links.is_empty()
    }

    /// Number of reference hops.
    pub fn depth(&self) -> usize {
        self.links.len()
    }

    /// Target named by the first segment's type modifier.
    pub fn declared_target(&self) -> Option<&str> {
        self.links.first().and_then(|l| l.declared_target.as_deref())
    }

    /// Resource types the terminal parameter is evaluated on.
    pub fn target_types(&self) -> &[String] {
        self.links.last().map(|l| l.targets.as_slice()).unwrap_or(&[])
    }

    /// Returns true if a referenced resource of `resource_type` can satisfy the chain.
    pub fn admits(&self, resource_type: &str) -> bool {
        self.target_types().iter().any(|t| t == resource_type)
    }
}

/// Resolves parameter names against a registry.
pub struct ChainResolver<'r, L: ?Sized> {
    registry: &'r L,
    max_depth: Option<usize>,
}

impl<'r, L: ParameterLookup + ?Sized> ChainResolver<'r, L> {
    /// Creates a resolver with no depth limit.
    pub fn new(registry: &'r L) -> Self {
        Self {
            registry,
            max_depth: None,
        }
    }

    /// Limits the number of reference hops.
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Resolves `name` as used in a search on `resource_type`.
    pub fn resolve(&self, resource_type: &str, name: &ParameterName) -> Result<ChainSpec, ChainError> {
        let segments = name.segments();
        let depth = segments.len() - 1;
        if let Some(max) = self.max_depth {
            if depth > max {
                return Err(ChainError::MaxDepthExceeded {
                    raw: name.raw().to_string(),
                    depth,
                    max,
                });
            }
        }

        let base = name.base();
        let base_def = self.registry.get_param(resource_type, &base.name).ok_or_else(|| {
            ChainError::UnknownParameter {
                resource_type: resource_type.to_string(),
                param: base.name.clone(),
            }
        })?;

        if !name.is_chained() {
            if base_def.is_reference() && !base_def.chain_policy.allows([""]) {
                debug!(
                    resource_type,
                    param = %base.name,
                    "plain use of reference parameter not in chain whitelist"
                );
                return Err(forbidden(&base.name, ""));
            }
            return self.terminal(&base.name, base.modifier.clone(), vec![base_def]);
        }

        let mut current_types = vec![resource_type.to_string()];
        let mut current_defs = vec![base_def];
        let mut links = Vec::with_capacity(depth);

        for (level, segment) in segments[..depth].iter().enumerate() {
            let next = &segments[level + 1];
            let remaining = chain_key(&segments[level + 1..]);

            for (source_type, def) in current_types.iter().zip(&current_defs) {
                if !def.is_reference() {
                    return Err(ChainError::NotChainable {
                        resource_type: source_type.clone(),
                        param: segment.name.clone(),
                    });
                }
            }

            let declared: BTreeSet<&str> = current_defs
                .iter()
                .flat_map(|d| d.targets.iter().map(String::as_str))
                .collect();

            let targets: Vec<String> = match segment.type_modifier() {
                Some(explicit) => {
                    let listed = declared.is_empty() || declared.contains(explicit);
                    if !listed || self.registry.get_param(explicit, &next.name).is_none() {
                        debug!(
                            param = %segment.name,
                            target = explicit,
                            next = %next.name,
                            "explicit chain target does not declare next parameter"
                        );
                        return Err(unknown_target(&segment.name, &remaining));
                    }
                    vec![explicit.to_string()]
                }
                None => declared
                    .iter()
                    .filter(|candidate| {
                        let found = self.registry.get_param(candidate, &next.name).is_some();
                        trace!(
                            param = %segment.name,
                            candidate = *candidate,
                            next = %next.name,
                            found,
                            "chain target candidate"
                        );
                        found
                    })
                    .map(|t| t.to_string())
                    .collect(),
            };

            if targets.is_empty() {
                debug!(param = %segment.name, chain = %remaining, "no chain target declares parameter");
                return Err(unknown_target(&segment.name, &remaining));
            }

            for def in &current_defs {
                if !def.chain_policy.allows([next.name.as_str(), remaining.as_str()]) {
                    debug!(
                        param = %segment.name,
                        chain = %remaining,
                        policy = ?def.chain_policy,
                        "chain rejected by chain policy"
                    );
                    return Err(forbidden(&segment.name, &remaining));
                }
            }

            debug!(
                param = %segment.name,
                targets = ?targets,
                level,
                "resolved chain link"
            );

            current_defs = targets
                .iter()
                .filter_map(|t| self.registry.get_param(t, &next.name))
                .collect();
            links.push(ChainLink {
                source_types: std::mem::replace(&mut current_types, targets.clone()),
                reference_param: segment.name.clone(),
                declared_target: segment.type_modifier().map(String::from),
                targets,
            });
        }

        let terminal = name.terminal();
        let mut spec = self.terminal(&terminal.name, terminal.modifier.clone(), current_defs)?;
        spec.links = links;
        Ok(spec)
    }

    fn terminal(
        &self,
        name: &str,
        modifier: Option<SearchModifier>,
        defs: Vec<Arc<ParamDefinition>>,
    ) -> Result<ChainSpec, ChainError> {
        let Some(first) = defs.first() else {
            return Err(unknown_target(name, name));
        };
        if let Some(other) = defs.iter().find(|d| d.param_type != first.param_type) {
            return Err(ChainError::InconsistentChainType {
                chain: name.to_string(),
                first: first.param_type,
                second: other.param_type,
            });
        }

        let targets: BTreeSet<String> = defs.iter().flat_map(|d| d.targets.iter().cloned()).collect();
        let components = if first.param_type == SearchParamType::Composite {
            self.registry.component_types(first).unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(ChainSpec {
            links: Vec::new(),
            terminal: TerminalParam {
                name: name.to_string(),
                param_type: first.param_type,
                modifier,
                targets: targets.into_iter().collect(),
                components,
            },
        })
    }
}

/// Resolves `name` on `resource_type` with no depth limit.
pub fn resolve<L: ParameterLookup + ?Sized>(
    resource_type: &str,
    name: &ParameterName,
    registry: &L,
) -> Result<ChainSpec, ChainError> {
    ChainResolver::new(registry).resolve(resource_type, name)
}

fn unknown_target(param: &str, chain: &str) -> ChainError {
    ChainError::UnknownChainTarget {
        param: param.to_string(),
        chain: chain.to_string(),
    }
}

fn forbidden(param: &str, chain: &str) -> ChainError {
    ChainError::Forbidden {
        param: param.to_string(),
        chain: chain.to_string(),
    }
}
