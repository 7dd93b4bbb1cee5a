//! Settings command implementation
//!
//! Shows a transformer's settings, or changes them and saves the result to
//! the config file.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::path::Path;
use std::process::ExitCode;

use super::Session;

/// Run the settings command
///
/// # Arguments
/// * `config` - Optional config file path
/// * `id_or_name` - Transformer to show or edit
/// * `assignments` - `key=value` pairs to apply
/// * `reset` - Restore all defaults
pub fn run(
    config: Option<&Path>,
    id_or_name: &str,
    assignments: &[String],
    reset: bool,
) -> Result<ExitCode> {
    let mut session = Session::open(config)?;
    let t = session.find(id_or_name)?;

    if !t.has_settings() {
        println!("{} has no settings.", t.name());
        return Ok(ExitCode::SUCCESS);
    }

    if !assignments.is_empty() || reset {
        if reset {
            for key in t.settings().keys() {
                t.settings().reset(key)?;
            }
        }
        for assignment in assignments {
            let (key, value) = parse_assignment(assignment)?;
            t.settings()
                .set_from_str(key, value)
                .with_context(|| format!("cannot set '{}' on {}", key, t.id()))?;
        }
        let path = session.save_settings()?;
        println!("{} saved to {}", "ok".green(), path.display());
    }

    for (key, value) in t.settings().snapshot() {
        println!("  {} = {}", key, value);
    }
    Ok(ExitCode::SUCCESS)
}

fn parse_assignment(assignment: &str) -> Result<(&str, &str)> {
    match assignment.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value.trim())),
        _ => bail!("expected KEY=VALUE, got '{}'", assignment),
    }
}
