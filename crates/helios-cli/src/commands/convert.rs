//! Convert command implementation

use anyhow::{bail, Result};
use colored::Colorize;
use helios_transformers::converter::{DEX2JAR, ENJARIFY, JAR2DEX};
use helios_transformers::registry::TransformerRegistry;
use helios_transformers::{ConversionStatus, InvokeOptions, Operation, Outcome, TransformerRef};
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use super::Session;

/// Run the convert command
///
/// # Arguments
/// * `config` - Optional config file path
/// * `input` - Artifact to convert
/// * `output` - Where the converted artifact goes
/// * `with` - Converter id or name; picked from the input name if absent
/// * `timeout_secs` - Deadline for the external tool
///
/// # Returns
/// Exit code: 0 if the conversion completed or had nothing to do, 1 otherwise
pub fn run(
    config: Option<&Path>,
    input: &Path,
    output: &Path,
    with: Option<&str>,
    timeout_secs: Option<u64>,
) -> Result<ExitCode> {
    let session = Session::open(config)?;
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let converter = match with {
        Some(id_or_name) => session.find(id_or_name)?,
        None => match pick_converter(session.registry, &name) {
            Some(t) => t,
            None => bail!("no converter accepts '{}'; choose one with --with", name),
        },
    };

    let mut options = InvokeOptions::default();
    if let Some(secs) = timeout_secs {
        options = options.with_timeout(Duration::from_secs(secs));
    }

    println!(
        "{} {} -> {} ({})",
        "Converting".cyan().bold(),
        input.display(),
        output.display(),
        converter.name()
    );

    let outcome = converter.transform(Operation::Convert {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        options,
    })?;
    let Outcome::Converted(status) = outcome else {
        bail!("{} is not a converter", converter.name());
    };

    match status {
        ConversionStatus::Completed { .. } | ConversionStatus::NoOp => {
            println!("{} {}", "ok".green(), status);
            Ok(ExitCode::SUCCESS)
        }
        ConversionStatus::Skipped { .. } => {
            println!("{} {}", "!!".yellow(), status);
            println!("   {}", "Run `helios doctor` to check tool locations.".dimmed());
            Ok(ExitCode::from(1))
        }
        ConversionStatus::Failed { .. } => {
            println!("{} {}", "!!".red(), status);
            Ok(ExitCode::from(1))
        }
    }
}

/// Converters tried when `--with` is absent. Suffix-gated converters come
/// before enjarify, which accepts every name.
const AUTO_ORDER: [&str; 3] = [DEX2JAR, JAR2DEX, ENJARIFY];

/// First converter in [`AUTO_ORDER`] that accepts `name`.
fn pick_converter(registry: &TransformerRegistry, name: &str) -> Option<TransformerRef> {
    AUTO_ORDER
        .iter()
        .filter_map(|id| registry.get_by_id(id))
        .find(|t| t.is_applicable(name))
}
