//! Index build commands
//!
//! The registry is application-specific, so the CLI is embedded: an
//! application builds its registry and hands it to [`main_with`] from its
//! own binary.
//!
//! # Usage
//!
//! ```bash
//! # Drop and recreate every mapping, then index everything
//! myapp-index create-index
//!
//! # Re-index books changed in the last two hours, at most 500
//! myapp-index update-index library.book --since 2h --limit 500
//! ```

pub mod since;

pub use since::parse_since;

use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::errors::Result;
use crate::features::registry::IndexRegistry;
use crate::shared::clock::{Clock, SystemClock};
use crate::shared::models::IndexKey;

#[derive(Parser, Debug)]
#[command(name = "indexsync")]
#[command(about = "Build and refresh search indexes", long_about = None)]
pub struct IndexCli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: IndexCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum IndexCommand {
    /// Create mappings (dropping existing ones) and populate them
    CreateIndex(IndexArgs),

    /// Populate existing mappings
    UpdateIndex(IndexArgs),
}

impl IndexCommand {
    pub fn args(&self) -> &IndexArgs {
        match self {
            IndexCommand::CreateIndex(args) | IndexCommand::UpdateIndex(args) => args,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct IndexArgs {
    /// Indexes to build: app, app.model or app.model.index (default: all)
    pub selectors: Vec<String>,

    /// Index data updated after this time: yyyy-mm-dd[-hh:mm] or [#d][#h][#m][#s]
    #[arg(long)]
    pub since: Option<String>,

    /// Index at most this many entities per index
    #[arg(long)]
    pub limit: Option<usize>,
}

/// Per-index outcome of a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRun {
    pub index: IndexKey,
    pub mapping_created: bool,
    /// Entities selected by the query
    pub selected: usize,
    /// Entities the backend reported as indexed
    pub indexed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandReport {
    pub runs: Vec<IndexRun>,
}

impl CommandReport {
    pub fn total_indexed(&self) -> usize {
        self.runs.iter().map(|r| r.indexed).sum()
    }
}

/// Execute a parsed command, writing progress lines to `out`
///
/// Selectors are resolved before anything else: when none match, the
/// command fails without touching the backend.
pub fn run<W: Write>(
    cli: &IndexCli,
    registry: &IndexRegistry,
    clock: &dyn Clock,
    out: &mut W,
) -> Result<CommandReport> {
    let args = cli.command.args();
    let create = matches!(cli.command, IndexCommand::CreateIndex(_));

    let indexes = registry.indexes_matching(args.selectors.as_slice())?;
    let since = args
        .since
        .as_deref()
        .map(|text| parse_since(text, clock.now()))
        .transpose()?;

    let mut report = CommandReport::default();
    for entry in indexes {
        let definition = entry.definition();
        let query = definition.filtered_query(since, args.limit)?;

        if create {
            writeln!(out, "Creating mapping for {}", entry.key())?;
            definition.put_mapping()?;
        }

        let selected = definition.count(&query)?;
        writeln!(out, "Indexing {} {} objects", selected, entry.entity_type())?;
        let indexed = definition.index_batch(&query)?;
        info!("Indexed {} documents into {}", indexed, entry.key());

        report.runs.push(IndexRun {
            index: entry.key().clone(),
            mapping_created: create,
            selected,
            indexed,
        });
    }

    Ok(report)
}

/// Install the fmt subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A subscriber installed by the host application takes precedence.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Entry point for an application's index binary
pub fn main_with(registry: &IndexRegistry) -> ExitCode {
    let cli = IndexCli::parse();
    init_logging(cli.verbose);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match run(&cli, registry, &SystemClock, &mut out) {
        Ok(report) => {
            info!(
                "Done: {} documents across {} indexes",
                report.total_indexed(),
                report.runs.len()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_update_index_args() {
        let cli = IndexCli::try_parse_from([
            "indexsync",
            "update-index",
            "library.book",
            "library.author.authors",
            "--since",
            "2h",
            "--limit",
            "50",
        ])
        .unwrap();

        assert!(matches!(cli.command, IndexCommand::UpdateIndex(_)));
        let args = cli.command.args();
        assert_eq!(args.selectors, vec!["library.book", "library.author.authors"]);
        assert_eq!(args.since.as_deref(), Some("2h"));
        assert_eq!(args.limit, Some(50));
    }

    #[test]
    fn test_parse_create_index_defaults() {
        let cli = IndexCli::try_parse_from(["indexsync", "-v", "create-index"]).unwrap();
        assert!(cli.verbose);
        let args = cli.command.args();
        assert!(args.selectors.is_empty());
        assert!(args.since.is_none());
        assert!(args.limit.is_none());
    }

    #[test]
    fn test_limit_must_be_a_number() {
        assert!(IndexCli::try_parse_from(["indexsync", "update-index", "--limit", "lots"]).is_err());
    }
}
