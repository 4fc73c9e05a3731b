//! Search configuration.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `HFS_SEARCH_MAX_CHAIN_DEPTH` | unbounded | Maximum reference hops in a chained name |
//! | `HFS_SEARCH_HANDLING` | strict | `strict` rejects unknown parameters, `lenient` skips them |
//! | `HFS_SEARCH_AP_TOLERANCE` | 10 | Tolerance of the `ap` prefix, in percent |
//!
//! # Example
//!
//! ```rust
//! use helios_search::{Handling, SearchConfig};
//!
//! let config = SearchConfig {
//!     max_chain_depth: Some(3),
//!     handling: Handling::Lenient,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use clap::{Args, Parser, ValueEnum};
use serde::{Deserialize, Serialize};

/// How unknown search parameters are treated (FHIR `Prefer: handling=`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handling {
    /// Unknown parameters are an error.
    #[default]
    Strict,
    /// Unknown parameters are logged and ignored.
    Lenient,
}

impl Handling {
    /// Parses the value of a `Prefer: handling=...` directive.
    pub fn from_prefer(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Some(Handling::Strict),
            "lenient" => Some(Handling::Lenient),
            _ => None,
        }
    }
}

/// Options for parsing and matching search requests.
#[derive(Debug, Clone, PartialEq, Eq, Args, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Maximum number of reference hops in a chained parameter name.
    #[arg(long, env = "HFS_SEARCH_MAX_CHAIN_DEPTH")]
    pub max_chain_depth: Option<usize>,

    /// Handling of unknown search parameters.
    #[arg(long, env = "HFS_SEARCH_HANDLING", value_enum, default_value = "strict")]
    pub handling: Handling,

    /// Tolerance of the `ap` prefix, in percent of the query value.
    #[arg(long, env = "HFS_SEARCH_AP_TOLERANCE", default_value = "10")]
    pub approximate_tolerance_percent: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_chain_depth: None,
            handling: Handling::Strict,
            approximate_tolerance_percent: 10,
        }
    }
}

#[derive(Parser)]
struct EnvOnly {
    #[command(flatten)]
    config: SearchConfig,
}

impl SearchConfig {
    /// Reads the configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        EnvOnly::try_parse_from(["hfs-search"])
            .map(|p| p.config)
            .unwrap_or_default()
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.max_chain_depth == Some(0) {
            errors.push("Max chain depth cannot be 0; omit it for no limit".to_string());
        }

        if self.approximate_tolerance_percent > 100 {
            errors.push("Approximate tolerance cannot exceed 100 percent".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
