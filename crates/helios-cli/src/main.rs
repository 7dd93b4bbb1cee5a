//! Helios CLI - Command-line interface for the transformer registry
//!
//! This binary lists the registered transformers, edits their settings, and
//! runs viewers and converters on files.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;

/// Helios - Inspect and convert Java and Android artifacts
#[derive(Parser)]
#[command(name = "helios")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the config file (default: <config dir>/helios/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered transformers
    List {
        /// Only show transformers of this type (decompiler, disassembler, ...)
        #[arg(long = "type")]
        ty: Option<String>,

        /// Only show transformers applicable to this file or class name
        #[arg(long)]
        applicable: Option<String>,

        /// Output machine-readable JSON (no colored output)
        #[arg(long)]
        json: bool,
    },

    /// Show details of one transformer
    Info {
        /// Transformer id or name
        transformer: String,

        /// Output machine-readable JSON (no colored output)
        #[arg(long)]
        json: bool,
    },

    /// Show or change a transformer's settings
    Settings {
        /// Transformer id or name
        transformer: String,

        /// Set a value and save it to the config (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Restore every setting to its default and save
        #[arg(long, conflicts_with = "set")]
        reset: bool,
    },

    /// Render a file with a viewer
    View {
        /// File to view
        file: PathBuf,

        /// Viewer id or name
        #[arg(long = "with", default_value = "hex")]
        with: String,
    },

    /// Convert a file with a converter
    Convert {
        /// Input artifact
        input: PathBuf,

        /// Output artifact
        output: PathBuf,

        /// Converter id or name (default: first applicable built-in converter)
        #[arg(long = "with")]
        with: Option<String>,

        /// Timeout for the external tool, in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Check external tools and configuration
    Doctor,
}

fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::List {
            ty,
            applicable,
            json,
        } => commands::list::run(config, ty.as_deref(), applicable.as_deref(), json),
        Commands::Info { transformer, json } => commands::info::run(config, &transformer, json),
        Commands::Settings {
            transformer,
            set,
            reset,
        } => commands::settings::run(config, &transformer, &set, reset),
        Commands::View { file, with } => commands::view::run(config, &file, &with),
        Commands::Convert {
            input,
            output,
            with,
            timeout,
        } => commands::convert::run(config, &input, &output, with.as_deref(), timeout),
        Commands::Doctor => commands::doctor::run(config),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", colored::Colorize::red("error"), e);
            ExitCode::from(1)
        }
    }
}
