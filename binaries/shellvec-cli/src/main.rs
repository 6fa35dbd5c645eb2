//! shellvec CLI
//!
//! One-shot front end to the module engine. Each invocation loads the
//! stored arguments, runs one command and writes them back.
//!
//! ## Usage
//!
//! ```bash
//! shellvec list sql
//! shellvec help bruteforce.sql --compact
//! shellvec set bruteforce.sql host=10.0.0.5
//! shellvec run bruteforce.sql -c shell.php --replay replay.yaml -- mysql root words.txt
//! ```

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use shellvec_config::{Config, StateFile};
use shellvec_core::{Channel, DryRunChannel, ReplayChannel, Session};
use shellvec_engine::{Catalog, HelpOptions};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "shellvec")]
#[command(about = "Module engine for a planted remote interpreter")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/shellvec/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// State file holding stored module arguments
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List modules, optionally filtered
    List {
        /// Match against module name and description
        query: Option<String>,
    },

    /// Show a module's help and stored arguments
    Help {
        module: String,

        /// One-line description and usage only
        #[arg(long)]
        compact: bool,

        /// Leave out the stored arguments block
        #[arg(long)]
        no_stored: bool,

        #[arg(long, default_value_t = 0)]
        padding: usize,
    },

    /// Store module arguments as key=value (empty value clears)
    Set {
        module: String,

        #[arg(required = true)]
        pairs: Vec<String>,
    },

    /// Run a module once
    Run {
        module: String,

        /// Capability tag available on the target (repeatable)
        #[arg(short, long = "capability")]
        capabilities: Vec<String>,

        /// Answer deliveries from a scripted YAML file
        #[arg(long, conflicts_with = "dry_run")]
        replay: Option<PathBuf>,

        /// Log payloads instead of delivering them
        #[arg(long)]
        dry_run: bool,

        /// Print the structured result as JSON
        #[arg(long)]
        json: bool,

        /// Module arguments
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "shellvec=debug" } else { "shellvec=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_channel(replay: Option<&Path>, dry_run: bool) -> Result<Box<dyn Channel>> {
    match replay {
        Some(path) => Ok(Box::new(
            ReplayChannel::from_yaml_file(path)
                .with_context(|| format!("loading replay script {}", path.display()))?,
        )),
        None => {
            if !dry_run {
                tracing::warn!("no transport configured, payloads are only logged");
            }
            Ok(Box::new(DryRunChannel))
        }
    }
}

fn persist(catalog: &Catalog, state: &mut StateFile, path: &Path) -> Result<()> {
    catalog.save_state(state);
    state
        .save(path)
        .with_context(|| format!("saving state to {}", path.display()))
}

fn list(catalog: &Catalog, query: Option<&str>) -> Result<()> {
    let names = match query {
        Some(query) => catalog.search(query),
        None => catalog.names(),
    };
    for name in names {
        println!("{:<24} {}", name, catalog.get(name)?.base().description());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load(cli.config.as_deref())?;
    let state_path = cli.state.clone().unwrap_or_else(|| config.state_path());
    let mut state = StateFile::load(&state_path)?;

    let mut catalog = shellvec_modules::builtin(&config)?;
    catalog.load_state(&state);

    match cli.command {
        Commands::List { query } => list(&catalog, query.as_deref())?,

        Commands::Help {
            module,
            compact,
            no_stored,
            padding,
        } => {
            let opts = HelpOptions {
                full: !compact,
                stored_args: !no_stored,
                padding,
                ..HelpOptions::default()
            };
            print!("{}", catalog.help(&module, &opts)?);
        }

        Commands::Set { module, pairs } => {
            catalog.store(&module, &pairs)?;
            persist(&catalog, &mut state, &state_path)?;
        }

        Commands::Run {
            module,
            capabilities,
            replay,
            dry_run,
            json,
            args,
        } => {
            let channel = open_channel(replay.as_deref(), dry_run)?;
            let mut session = Session::new(channel).with_capabilities(
                config
                    .capabilities
                    .iter()
                    .chain(&capabilities)
                    .map(String::as_str),
            );
            for level in &config.verbosity {
                session.push_verbosity(*level);
            }
            tracing::debug!(session = %session.id(), module = %module, "running module");

            let outcome = catalog.run(&mut session, &module, &args);
            persist(&catalog, &mut state, &state_path)?;
            let execution = outcome?;

            if json {
                println!("{}", serde_json::to_string_pretty(&execution.result.to_json())?);
            } else if !execution.output.is_empty() {
                println!("{}", execution.output);
            }
        }
    }

    Ok(())
}
