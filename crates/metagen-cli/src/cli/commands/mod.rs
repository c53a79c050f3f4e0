//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod annotate;
mod batch;
mod config_cmd;
mod helpers;
mod models;
mod targets;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use metagen::models::{Operation, PriorityMode, TargetFilter, TargetKind};

use helpers::Context;

#[derive(Parser)]
#[command(name = "metagen")]
#[command(about = "Generate catalog metadata, business rules and forms with AI models")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Catalog file (overrides config and METAGEN_CATALOG)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (before full parsing).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

fn parse_kind(s: &str) -> Result<TargetKind, String> {
    TargetKind::from_str(s)
        .ok_or_else(|| format!("unknown kind '{}' (category, product, service, procedure)", s))
}

/// Target selection shared by batch-style commands.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Only these target ids (repeatable)
    #[arg(long = "id")]
    ids: Vec<String>,
    /// Only targets of this kind
    #[arg(long, value_parser = parse_kind)]
    kind: Option<TargetKind>,
    /// Only targets under this path, e.g. "Finance/Billing"
    #[arg(long = "path-prefix", alias = "path")]
    path: Option<String>,
    /// Only targets without metadata
    #[arg(long = "only-missing", alias = "missing")]
    missing: bool,
    /// Maximum number of targets
    #[arg(short, long)]
    limit: Option<usize>,
}

impl FilterArgs {
    fn into_filter(self) -> TargetFilter {
        TargetFilter {
            ids: self.ids,
            kind: self.kind,
            path_prefix: self.path,
            only_missing: self.missing,
            limit: self.limit,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Annotate a single catalog entry
    Annotate {
        /// Target id
        target_id: String,
        /// What to generate
        #[arg(short, long, value_enum, default_value = "meta")]
        operation: Operation,
    },

    /// Annotate many catalog entries in chunks
    Batch {
        /// What to generate
        #[arg(short, long, value_enum, default_value = "meta")]
        operation: Operation,
        #[command(flatten)]
        filter: FilterArgs,
        /// Targets per chunk (default from config)
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Concurrent workers per chunk (default from config)
        #[arg(short = 'w', long)]
        parallelism: Option<usize>,
        /// Retries per item (default from config)
        #[arg(long)]
        max_retries: Option<u32>,
    },

    /// Manage catalog entries
    Targets {
        #[command(subcommand)]
        command: TargetCommands,
    },

    /// Inspect configured models
    Models {
        #[command(subcommand)]
        command: ModelCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum TargetCommands {
    /// List catalog entries
    List {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Add or replace one entry
    Add {
        /// Target id
        id: String,
        /// Display title
        title: String,
        #[arg(long, value_parser = parse_kind, default_value = "product")]
        kind: TargetKind,
        /// Ancestor path, e.g. "Finance/Billing"
        #[arg(long)]
        path: Option<String>,
    },
    /// Import entries from a JSON array file
    Import {
        /// JSON file containing an array of targets
        file: PathBuf,
    },
    /// Show saved artifacts for an entry
    Show {
        /// Target id
        id: String,
    },
}

#[derive(Subcommand)]
enum ModelCommands {
    /// List models with health and performance
    List {
        /// Probe model health before listing
        #[arg(long)]
        probe: bool,
    },
    /// Show how models rank for an operation
    Rank {
        #[arg(short, long, value_enum, default_value = "meta")]
        operation: Operation,
        #[arg(short, long, value_enum, default_value = "balanced")]
        mode: PriorityMode,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Validate the configuration
    Check,
    /// Show where config and catalog are read from
    Paths,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let ctx = Context::load(cli.config.as_deref(), cli.catalog, cli.json).await?;

    match cli.command {
        Commands::Annotate {
            target_id,
            operation,
        } => annotate::cmd_annotate(&ctx, &target_id, operation).await,
        Commands::Batch {
            operation,
            filter,
            chunk_size,
            parallelism,
            max_retries,
        } => {
            let mut options = ctx.config.batch.clone();
            if let Some(chunk_size) = chunk_size {
                options.chunk_size = chunk_size;
            }
            if let Some(parallelism) = parallelism {
                options.parallelism = parallelism;
            }
            if let Some(max_retries) = max_retries {
                options.max_retries = max_retries;
            }
            batch::cmd_batch(&ctx, operation, filter.into_filter(), options).await
        }
        Commands::Targets { command } => match command {
            TargetCommands::List { filter } => {
                targets::cmd_targets_list(&ctx, filter.into_filter()).await
            }
            TargetCommands::Add {
                id,
                title,
                kind,
                path,
            } => targets::cmd_targets_add(&ctx, id, title, kind, path.as_deref()).await,
            TargetCommands::Import { file } => targets::cmd_targets_import(&ctx, &file).await,
            TargetCommands::Show { id } => targets::cmd_targets_show(&ctx, &id).await,
        },
        Commands::Models { command } => match command {
            ModelCommands::List { probe } => models::cmd_models_list(&ctx, probe).await,
            ModelCommands::Rank { operation, mode } => {
                models::cmd_models_rank(&ctx, operation, mode)
            }
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => config_cmd::cmd_config_show(&ctx),
            ConfigCommands::Check => config_cmd::cmd_config_check(&ctx),
            ConfigCommands::Paths => config_cmd::cmd_config_paths(&ctx),
        },
    }
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
    fn parses_batch_flags() {
        let cli = Cli::try_parse_from([
            "metagen", "batch", "-o", "rules", "--kind", "service", "--path", "Finance",
            "--missing", "-w", "4", "--json",
        ])
        .unwrap();
        assert!(cli.json);
        let Commands::Batch {
            operation,
            filter,
            parallelism,
            ..
        } = cli.command
        else {
            panic!("expected batch");
        };
        assert_eq!(operation, Operation::GenerateRules);
        assert_eq!(parallelism, Some(4));
        let filter = filter.into_filter();
        assert_eq!(filter.kind, Some(TargetKind::Service));
        assert_eq!(filter.path_prefix.as_deref(), Some("Finance"));
        assert!(filter.only_missing);
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(Cli::try_parse_from(["metagen", "targets", "list", "--kind", "gadget"]).is_err());
    }
}
