//! Search parameter definitions and chain policy.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::SearchParamType;

/// Per-parameter restriction on which chains may follow a reference parameter.
///
/// An absent or empty list allows any chain. A definition carrying both a
/// non-empty whitelist and a non-empty blacklist is rejected when the
/// registry is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainPolicy {
    /// Chains that are allowed; everything else is forbidden.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whitelist: Option<BTreeSet<String>>,
    /// Chains that are forbidden.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blacklist: Option<BTreeSet<String>>,
}

impl ChainPolicy {
    /// A policy that allows only the given chains.
    pub fn whitelist<I, S>(chains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            whitelist: Some(chains.into_iter().map(Into::into).collect()),
            blacklist: None,
        }
    }

    /// A policy that forbids the given chains.
    pub fn blacklist<I, S>(chains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            whitelist: None,
            blacklist: Some(chains.into_iter().map(Into::into).collect()),
        }
    }

    /// Returns true if neither list restricts anything.
    pub fn is_unrestricted(&self) -> bool {
        !self.has_whitelist() && !self.has_blacklist()
    }

    fn has_whitelist(&self) -> bool {
        self.whitelist.as_ref().is_some_and(|w| !w.is_empty())
    }

    fn has_blacklist(&self) -> bool {
        self.blacklist.as_ref().is_some_and(|b| !b.is_empty())
    }

    /// Returns true if both lists are non-empty (a configuration error).
    pub fn is_conflicting(&self) -> bool {
        self.has_whitelist() && self.has_blacklist()
    }

    /// Returns true if a chain described by any of `keys` is allowed.
    ///
    /// Under a whitelist, at least one key must be listed. Under a blacklist,
    /// no key may be listed.
    pub fn allows<'a, I>(&self, keys: I) -> bool
    where
        I: IntoIterator<Item = &'a str> + Clone,
    {
        if let Some(whitelist) = self.whitelist.as_ref().filter(|w| !w.is_empty()) {
            if !keys.clone().into_iter().any(|k| whitelist.contains(k)) {
                return false;
            }
        }
        if let Some(blacklist) = &self.blacklist {
            if keys.into_iter().any(|k| blacklist.contains(k)) {
                return false;
            }
        }
        true
    }
}

/// A search parameter as the resolver and query parser need it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDefinition {
    /// Canonical URL.
    pub url: String,
    /// Code used in the query string.
    pub code: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub param_type: SearchParamType,
    /// Resource types the parameter is declared on.
    pub base: Vec<String>,
    /// Permissible target types for reference parameters.
    #[serde(default)]
    pub targets: BTreeSet<String>,
    /// Chain restrictions for reference parameters.
    #[serde(default)]
    pub chain_policy: ChainPolicy,
    /// Component definition URLs for composite parameters, in order.
    #[serde(default)]
    pub components: Vec<String>,
}

impl ParamDefinition {
    /// Creates a definition with no base, targets, policy or components.
    pub fn new(
        url: impl Into<String>,
        code: impl Into<String>,
        param_type: SearchParamType,
    ) -> Self {
        Self {
            url: url.into(),
            code: code.into(),
            param_type,
            base: Vec::new(),
            targets: BTreeSet::new(),
            chain_policy: ChainPolicy::default(),
            components: Vec::new(),
        }
    }

    /// Sets the base resource types.
    pub fn with_base<I, S>(mut self, base: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base = base.into_iter().map(Into::into).collect();
        self
    }

    /// Sets target types for reference parameters.
    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the chain policy.
    pub fn with_chain_policy(mut self, policy: ChainPolicy) -> Self {
        self.chain_policy = policy;
        self
    }

    /// Sets composite component definition URLs.
    pub fn with_components<I, S>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.components = components.into_iter().map(Into::into).collect();
        self
    }

    /// Returns true if this is a reference parameter.
    pub fn is_reference(&self) -> bool {
        self.param_type == SearchParamType::Reference
    }

    /// Returns true if the parameter applies to every resource type.
    pub fn is_universal(&self) -> bool {
        self.base
            .iter()
            .any(|b| b == "Resource" || b == "DomainResource")
    }

    /// Returns whether this parameter applies to the given resource type.
    pub fn applies_to(&self, resource_type: &str) -> bool {
        self.is_universal() || self.base.iter().any(|b| b == resource_type)
    }

    /// Returns the single declared target type, if there is exactly one.
    pub fn sole_target(&self) -> Option<&str> {
        match self.targets.len() {
            1 => self.targets.iter().next().map(String::as_str),
            _ => None,
        }
    }
}
