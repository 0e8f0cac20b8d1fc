//! pgmask CLI
//!
//! Checks masking rule files, prints the rules they define and resolves the
//! masking function for concrete columns.

#![warn(missing_docs)]
#![warn(clippy::all)]

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, WrapErr};
use color_eyre::Result;
use pgmask_core::{FunctionReference, RuleKey};
use pgmask_rules::{parse_rule_file_with, Config, ErrorReporter, Resolver, RuleStore};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pgmask")]
#[command(about = "pgmask - masking rule checker and resolver", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log parser activity at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Validate a rule file
    Check {
        /// Rule file
        rules: PathBuf,
    },
    /// Print the rules a file defines
    Show {
        /// Rule file
        rules: PathBuf,
        /// Print the rule store as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve the masking function for columns
    Resolve {
        /// Rule file
        rules: PathBuf,
        /// Columns as schema.table.field
        #[arg(required = true)]
        columns: Vec<String>,
        /// Function substituted where a rule names `default`
        #[arg(long)]
        default_function: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pgmask={level},pgmask_rules={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            let config = Config::load(path)?;
            tracing::debug!("Loaded config from {}", path.display());
            Ok(config)
        }
        None => Ok(Config::default()),
    }
}

fn load_rules(path: &Path, config: &Config) -> Result<RuleStore> {
    match parse_rule_file_with(path, &config.parser) {
        Ok(store) => {
            tracing::debug!("Loaded {} rule(s) from {}", store.len(), path.display());
            Ok(store)
        }
        Err(err) => {
            tracing::debug!("Rejected {}: {}", path.display(), err);
            let source = std::fs::read_to_string(path).unwrap_or_default();
            let report = ErrorReporter::new(path.display().to_string(), &source).render(&err);
            eprint!("{}", report);
            bail!("{} is not a valid rule file", path.display())
        }
    }
}

fn run(cli: Cli, out: &mut impl Write) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Check { rules } => {
            let store = load_rules(&rules, &config)?;
            writeln!(
                out,
                "{}: {} rule(s), {} function file(s)",
                rules.display(),
                store.len(),
                store.function_files().len()
            )?;
        }
        Commands::Show { rules, json } => {
            let store = load_rules(&rules, &config)?;
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&store)?)?;
            } else {
                write!(out, "{}", store)?;
                for file in store.function_files() {
                    writeln!(out, "function file: {}", file.display())?;
                }
            }
        }
        Commands::Resolve {
            rules,
            columns,
            default_function,
        } => {
            if let Some(name) = default_function {
                config.resolve.default_function = FunctionReference::new(&name)
                    .wrap_err_with(|| format!("Invalid default function {:?}", name))?;
            }

            let store = load_rules(&rules, &config)?;
            let resolver = Resolver::with_config(&store, &config.resolve);

            for column in &columns {
                let key = RuleKey::parse(column)
                    .wrap_err_with(|| format!("Invalid column {:?}", column))?;
                let (schema, table, field) =
                    (key.schema.as_str(), key.table.as_str(), key.field.as_str());

                match resolver.resolve_detailed(schema, table, field) {
                    Some(resolution) => writeln!(
                        out,
                        "{} -> {} ({} via {})",
                        key,
                        resolver.effective_function(&resolution),
                        resolution.level,
                        resolution.key
                    )?,
                    None => writeln!(out, "{} -> unmasked", key)?,
                }
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let stdout = std::io::stdout();
    run(cli, &mut stdout.lock())
}
