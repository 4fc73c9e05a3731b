//! Error types for search parameter handling.
//!
//! Errors are split by the stage that produces them:
//!
//! - [`DecodeError`] - a single raw token or parameter name could not be typed
//! - [`ComposeError`] - repeated occurrences could not be combined
//! - [`ChainError`] - a parameter name could not be resolved against the registry
//! - [`RegistryError`] - a registry could not be built (configuration, never per request)
//!
//! [`SearchError`] unifies the three request-time kinds. Every request-time
//! error carries the offending raw input so the transport layer can report it
//! verbatim, and maps to a FHIR OperationOutcome issue code through
//! [`SearchError::issue_code`].
//!
//! # Error Mapping
//!
//! | Error | Issue code |
//! |-------|------------|
//! | DecodeError | invalid / value |
//! | ComposeError | invalid |
//! | ChainError::UnknownParameter | not-supported |
//! | ChainError::NotChainable | invalid |
//! | ChainError::UnknownChainTarget | not-supported |
//! | ChainError::Forbidden | not-supported |
//! | ChainError::MaxDepthExceeded | too-costly |
//! | ChainError::InconsistentChainType | invalid |

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

use crate::types::SearchParamType;

/// Result alias for request-time search operations.
pub type SearchResult<T> = Result<T, SearchError>;

/// The primary error type for parsing and resolving a search request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    /// A token or name could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Occurrences could not be composed into a compound parameter.
    #[error(transparent)]
    Compose(#[from] ComposeError),

    /// A parameter name could not be resolved.
    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl SearchError {
    /// Returns the raw client input that caused this error.
    pub fn raw_input(&self) -> &str {
        match self {
            SearchError::Decode(e) => e.raw_input(),
            SearchError::Compose(e) => e.raw_input(),
            SearchError::Chain(e) => e.raw_input(),
        }
    }

    /// Returns the FHIR OperationOutcome issue code for this error.
    pub fn issue_code(&self) -> &'static str {
        match self {
            SearchError::Decode(e) => e.issue_code(),
            SearchError::Compose(_) => "invalid",
            SearchError::Chain(e) => e.issue_code(),
        }
    }

    /// Every request-time error is a client input error (HTTP 400 class).
    pub fn is_client_error(&self) -> bool {
        true
    }
}

/// Errors produced while typing a single raw token or parameter name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty search value")]
    EmptyValue,

    #[error("invalid escape sequence in '{raw}'")]
    InvalidEscape { raw: String },

    #[error("malformed quantity '{raw}': value must be a decimal number")]
    MalformedQuantity { raw: String },

    #[error("malformed number '{raw}'")]
    MalformedNumber { raw: String },

    #[error("malformed date '{raw}'")]
    MalformedDate { raw: String },

    #[error("malformed reference '{raw}'")]
    MalformedReference { raw: String },

    #[error("reference '{raw}' names type {found} but the parameter is restricted to {expected}")]
    ReferenceTypeMismatch {
        raw: String,
        expected: String,
        found: String,
    },

    #[error("ambiguous token '{raw}': use 'code' to match any system")]
    AmbiguousToken { raw: String },

    #[error("malformed token '{raw}'")]
    MalformedToken { raw: String },

    #[error("malformed composite value '{raw}': expected {expected} components")]
    MalformedComposite { raw: String, expected: usize },

    #[error("invalid :missing value '{raw}': expected true or false")]
    InvalidMissing { raw: String },

    #[error("prefix '{prefix}' is not valid for {param_type} parameters in '{raw}'")]
    InvalidPrefix {
        raw: String,
        prefix: String,
        param_type: SearchParamType,
    },

    #[error("modifier '{modifier}' is not valid for {param_type} parameters")]
    InvalidModifier {
        modifier: String,
        param_type: SearchParamType,
    },

    #[error("unknown modifier '{modifier}' in '{raw}'")]
    UnknownModifier { raw: String, modifier: String },

    #[error("malformed parameter name '{raw}'")]
    InvalidName { raw: String },

    #[error("{param_type} parameters cannot be used as search criteria ('{raw}')")]
    UnsupportedType {
        raw: String,
        param_type: SearchParamType,
    },
}

impl DecodeError {
    /// Returns the raw input carried by this error.
    pub fn raw_input(&self) -> &str {
        match self {
            DecodeError::EmptyValue => "",
            DecodeError::InvalidModifier { modifier, .. } => modifier,
            DecodeError::InvalidEscape { raw }
            | DecodeError::MalformedQuantity { raw }
            | DecodeError::MalformedNumber { raw }
            | DecodeError::MalformedDate { raw }
            | DecodeError::MalformedReference { raw }
            | DecodeError::ReferenceTypeMismatch { raw, .. }
            | DecodeError::AmbiguousToken { raw }
            | DecodeError::MalformedToken { raw }
            | DecodeError::MalformedComposite { raw, .. }
            | DecodeError::InvalidMissing { raw }
            | DecodeError::InvalidPrefix { raw, .. }
            | DecodeError::UnknownModifier { raw, .. }
            | DecodeError::InvalidName { raw }
            | DecodeError::UnsupportedType { raw, .. } => raw,
        }
    }

    /// Returns the FHIR OperationOutcome issue code for this error.
    pub fn issue_code(&self) -> &'static str {
        match self {
            DecodeError::InvalidModifier { .. }
            | DecodeError::UnknownModifier { .. }
            | DecodeError::InvalidName { .. }
            | DecodeError::UnsupportedType { .. } => "invalid",
            _ => "value",
        }
    }
}

/// Errors produced while composing repeated occurrences of one parameter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComposeError {
    #[error("parameter '{name}' has an empty value in occurrence {occurrence}")]
    EmptyGroup { name: String, occurrence: usize },

    #[error("invalid value '{raw}' for parameter '{name}' (occurrence {occurrence}, value {index}): {source}")]
    InvalidToken {
        name: String,
        occurrence: usize,
        index: usize,
        raw: String,
        #[source]
        source: DecodeError,
    },

    #[error("parameter '{name}' mixes {expected} and {found} values")]
    TypeMismatch {
        name: String,
        expected: SearchParamType,
        found: SearchParamType,
    },
}

impl ComposeError {
    /// Returns the raw input carried by this error.
    pub fn raw_input(&self) -> &str {
        match self {
            ComposeError::InvalidToken { raw, .. } => raw,
            ComposeError::EmptyGroup { name, .. } | ComposeError::TypeMismatch { name, .. } => {
                name
            }
        }
    }
}

/// Errors produced while resolving a (possibly chained) parameter name.
///
/// `UnknownChainTarget` and `Forbidden` render identically so a client cannot
/// tell a disallowed chain from one that does not exist.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("unknown search parameter '{param}' for resource type '{resource_type}'")]
    UnknownParameter { resource_type: String, param: String },

    #[error("search parameter '{param}' on '{resource_type}' is not a reference and cannot be chained")]
    NotChainable { resource_type: String, param: String },

    #[error("unsupported chain '{chain}' on search parameter '{param}'")]
    UnknownChainTarget { param: String, chain: String },

    #[error("unsupported chain '{chain}' on search parameter '{param}'")]
    Forbidden { param: String, chain: String },

    #[error("chain depth {depth} exceeds maximum allowed depth {max}")]
    MaxDepthExceeded { raw: String, depth: usize, max: usize },

    #[error("chain '{chain}' ends in parameters of different types ({first} and {second})")]
    InconsistentChainType {
        chain: String,
        first: SearchParamType,
        second: SearchParamType,
    },
}

impl ChainError {
    /// Returns the raw input carried by this error.
    pub fn raw_input(&self) -> &str {
        match self {
            ChainError::UnknownParameter { param, .. }
            | ChainError::NotChainable { param, .. }
            | ChainError::UnknownChainTarget { param, .. }
            | ChainError::Forbidden { param, .. } => param,
            ChainError::MaxDepthExceeded { raw, .. } => raw,
            ChainError::InconsistentChainType { chain, .. } => chain,
        }
    }

    /// Returns the FHIR OperationOutcome issue code for this error.
    pub fn issue_code(&self) -> &'static str {
        match self {
            ChainError::UnknownParameter { .. }
            | ChainError::UnknownChainTarget { .. }
            | ChainError::Forbidden { .. } => "not-supported",
            ChainError::NotChainable { .. } | ChainError::InconsistentChainType { .. } => {
                "invalid"
            }
            ChainError::MaxDepthExceeded { .. } => "too-costly",
        }
    }
}

/// Errors produced while building or loading a parameter registry.
///
/// These are configuration errors: they surface at startup and are never
/// returned from a request-time operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("search parameter '{code}' on '{resource_type}' declares both a chain whitelist and a chain blacklist")]
    ConflictingChainPolicy { resource_type: String, code: String },

    #[error("search parameter '{code}' is declared twice for '{resource_type}'")]
    DuplicateParameter { resource_type: String, code: String },

    #[error("SearchParameter {} is missing required field '{field}'", .url.as_deref().unwrap_or("<unknown>"))]
    MissingField { field: String, url: Option<String> },

    #[error("invalid search parameter definition '{code}': {message}")]
    InvalidDefinition { code: String, message: String },

    #[error("failed to load search parameters from '{path}': {message}")]
    LoadFailed { path: String, message: String },
}
