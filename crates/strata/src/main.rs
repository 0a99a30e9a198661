// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Strata - layered long-term memory for agents.
//!
//! This is the binary entry point for the `strata` command.

mod context;
mod maintenance;
mod memory;
mod output;

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use strata_config::model::StrataConfig;
use strata_core::StrataError;
use strata_memory::{Direction, MemoryEngine};

/// Strata - layered long-term memory for agents.
#[derive(Parser, Debug)]
#[command(name = "strata", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Disable colors.
    #[arg(long, global = true)]
    plain: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a memory, classifying and linking it.
    Add {
        /// Memory content.
        #[arg(required = true)]
        content: Vec<String>,
        /// Declared memory type (fact, decision, preference, ...).
        #[arg(long = "type")]
        memory_type: Option<String>,
        /// Base salience before boosts.
        #[arg(long)]
        salience: Option<f64>,
    },
    /// Extract and store memories from free text (reads stdin when no text is given).
    Capture {
        text: Vec<String>,
        #[arg(long, default_value_t = 0.3)]
        min_confidence: f64,
    },
    /// Search memories, resolving superseded results.
    Recall {
        #[arg(required = true)]
        query: Vec<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = 0.0)]
        min_salience: f64,
    },
    /// Surface memories relevant to a conversation context.
    Surface {
        #[arg(required = true)]
        context: Vec<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        min_confidence: Option<f64>,
        /// Include confidence, tags and contradiction warnings.
        #[arg(long, short)]
        verbose: bool,
    },
    /// Print the session startup context.
    Startup,
    /// Manage identity facts.
    Identity {
        #[command(subcommand)]
        action: Option<context::KvAction>,
    },
    /// Manage active context.
    Active {
        #[command(subcommand)]
        action: Option<context::KvAction>,
    },
    /// List relationship edges of a memory.
    Edges {
        id: i64,
        /// out, in or both.
        #[arg(long, default_value = "both")]
        direction: Direction,
    },
    /// Mark memories past their expiry as superseded.
    Expire,
    /// Prune stale memories and merge near-duplicates.
    Consolidate {
        #[arg(long)]
        no_prune: bool,
        #[arg(long)]
        no_merge: bool,
        #[arg(long)]
        dry_run: bool,
    },
    /// Show store and graph statistics.
    Stats,
}

/// How results are printed.
#[derive(Debug, Clone, Copy)]
pub struct OutputMode {
    pub json: bool,
    pub color: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => strata_config::load_and_validate_path(path),
        None => strata_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            strata_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.log.level);
    tracing::debug!(database = %config.storage.database_path, "configuration loaded");

    let mode = OutputMode {
        json: cli.json,
        color: !cli.plain && !cli.json && std::io::stdout().is_terminal(),
    };

    if let Err(e) = run(cli.command, &config, mode).await {
        eprintln!("strata: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: &StrataConfig, mode: OutputMode) -> Result<(), StrataError> {
    let engine = MemoryEngine::open(config).await?;
    let rendered = dispatch(&engine, command, mode).await;
    engine.shutdown().await?;
    println!("{}", rendered?);
    Ok(())
}

async fn dispatch(
    engine: &MemoryEngine,
    command: Commands,
    mode: OutputMode,
) -> Result<String, StrataError> {
    match command {
        Commands::Add {
            content,
            memory_type,
            salience,
        } => memory::run_add(engine, &content.join(" "), memory_type, salience, mode).await,
        Commands::Capture {
            text,
            min_confidence,
        } => {
            let text = if text.is_empty() {
                read_stdin()?
            } else {
                text.join(" ")
            };
            memory::run_capture(engine, &text, min_confidence, mode).await
        }
        Commands::Recall {
            query,
            limit,
            min_salience,
        } => {
            let limit = limit.unwrap_or(engine.config().search.default_limit);
            memory::run_recall(engine, &query.join(" "), limit, min_salience, mode).await
        }
        Commands::Surface {
            context,
            limit,
            min_confidence,
            verbose,
        } => {
            let surfacing = &engine.config().surfacing;
            memory::run_surface(
                engine,
                &context.join(" "),
                limit.unwrap_or(surfacing.default_limit),
                min_confidence.unwrap_or(surfacing.min_confidence),
                verbose,
                mode,
            )
            .await
        }
        Commands::Startup => memory::run_startup(engine, mode).await,
        Commands::Identity { action } => {
            context::run_kv(engine, context::KvScope::Identity, action, mode).await
        }
        Commands::Active { action } => {
            context::run_kv(engine, context::KvScope::Active, action, mode).await
        }
        Commands::Edges { id, direction } => {
            maintenance::run_edges(engine, strata_memory::MemoryId(id), direction, mode).await
        }
        Commands::Expire => maintenance::run_expire(engine, mode).await,
        Commands::Consolidate {
            no_prune,
            no_merge,
            dry_run,
        } => {
            let options = strata_memory::ConsolidateOptions {
                prune: !no_prune,
                merge: !no_merge,
                dry_run,
            };
            maintenance::run_consolidate(engine, options, mode).await
        }
        Commands::Stats => maintenance::run_stats(engine, mode).await,
    }
}

fn read_stdin() -> Result<String, StrataError> {
    std::io::read_to_string(std::io::stdin())
        .map_err(|e| StrataError::Internal(format!("failed to read stdin: {e}")))
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("strata={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_add_with_options() {
        let cli = Cli::try_parse_from([
            "strata", "add", "--type", "decision", "--salience", "0.7", "use", "rust",
        ])
        .unwrap();
        match cli.command {
            Commands::Add {
                content,
                memory_type,
                salience,
            } => {
                assert_eq!(content.join(" "), "use rust");
                assert_eq!(memory_type.as_deref(), Some("decision"));
                assert_eq!(salience, Some(0.7));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_json_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["strata", "stats", "--json"]).unwrap();
        assert!(cli.json);
    }

    #[test]
    fn edges_direction_accepts_short_names() {
        let cli = Cli::try_parse_from(["strata", "edges", "4", "--direction", "in"]).unwrap();
        match cli.command {
            Commands::Edges { id, direction } => {
                assert_eq!(id, 4);
                assert_eq!(direction, Direction::Inbound);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn recall_requires_a_query() {
        assert!(Cli::try_parse_from(["strata", "recall"]).is_err());
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = strata_config::load_and_validate_str("").expect("defaults should be valid");
        assert_eq!(config.search.default_limit, 5);
    }
}
