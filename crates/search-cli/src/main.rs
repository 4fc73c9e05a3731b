//! Helios FHIR search request inspector (`hfs-search`)
//!
//! Parses a search query string against the search parameter registry and
//! prints the resolved request as JSON.
//!
//! ```text
//! hfs-search --registry search-parameters.json Observation 'subject:Patient.name=smith&date=ge2001'
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use helios_search::registry::SearchParameterLoader;
use helios_search::{ParameterRegistry, SearchConfig, SearchQueryParser};
use tracing::{debug, info};

/// Parses a FHIR search query string and prints the resolved request.
#[derive(Debug, Parser)]
#[command(name = "hfs-search", version, about)]
struct Cli {
    #[command(flatten)]
    search: SearchConfig,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "HFS_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// SearchParameter Bundle, array or single resource to load on top of
    /// the built-in `Resource` parameters.
    #[arg(long, short = 'r')]
    registry: Option<PathBuf>,

    /// Print compact JSON.
    #[arg(long)]
    compact: bool,

    /// Resource type being searched.
    resource_type: String,

    /// URL-encoded query string, with or without a leading `?`.
    query: String,
}

fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("helios_search={},hfs_search={}", level, level)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn build_registry(path: Option<&PathBuf>) -> anyhow::Result<ParameterRegistry> {
    let loader = SearchParameterLoader;
    let mut definitions = loader.load_embedded();

    if let Some(path) = path {
        let loaded = loader
            .load_file(path)
            .with_context(|| format!("loading search parameters from {}", path.display()))?;
        info!(path = %path.display(), count = loaded.len(), "Loaded search parameters");
        definitions.extend(loaded);
    }

    ParameterRegistry::builder()
        .extend(definitions)
        .build()
        .context("building search parameter registry")
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    if let Err(errors) = cli.search.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    let registry = build_registry(cli.registry.as_ref())?;

    let raw = cli.query.strip_prefix('?').unwrap_or(&cli.query);
    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(raw.as_bytes())
        .into_owned()
        .collect();
    debug!(resource_type = %cli.resource_type, pairs = pairs.len(), "Decoded query string");

    let parser = SearchQueryParser::new(&registry, cli.search.clone());
    let query = parser.parse(&cli.resource_type, pairs).map_err(|e| {
        anyhow::anyhow!(
            "{} (issue code '{}', input '{}')",
            e,
            e.issue_code(),
            e.raw_input()
        )
    })?;

    let output = if cli.compact {
        serde_json::to_string(&query)
    } else {
        serde_json::to_string_pretty(&query)
    }
    .context("serializing search query")?;
    println!("{}", output);

    Ok(())
}
