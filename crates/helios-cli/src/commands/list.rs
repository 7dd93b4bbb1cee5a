//! List command implementation

use anyhow::{anyhow, Result};
use colored::Colorize;
use helios_transformers::{TransformerRef, TransformerType};
use std::path::Path;
use std::process::ExitCode;

use super::Session;

/// Run the list command
///
/// # Arguments
/// * `config` - Optional config file path
/// * `ty` - Only show this transformer type
/// * `applicable` - Only show transformers that accept this name
/// * `json` - Output JSON instead of a table
pub fn run(
    config: Option<&Path>,
    ty: Option<&str>,
    applicable: Option<&str>,
    json: bool,
) -> Result<ExitCode> {
    let session = Session::open(config)?;
    let ty = ty
        .map(|s| s.parse::<TransformerType>().map_err(|e| anyhow!(e)))
        .transpose()?;

    let transformers = session.registry.all_matching(|t| {
        ty.map_or(true, |ty| t.transformer_type() == ty)
            && applicable.map_or(true, |name| t.is_applicable(name))
    });

    if json {
        let entries: Vec<serde_json::Value> = transformers.iter().map(summary).collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(ExitCode::SUCCESS);
    }

    if transformers.is_empty() {
        println!("{}", "No matching transformers.".yellow());
        return Ok(ExitCode::SUCCESS);
    }

    println!("{}", "Transformers:".bold());
    for t in &transformers {
        let marker = if t.has_settings() {
            " (configurable)".dimmed()
        } else {
            "".dimmed()
        };
        println!(
            "  {} {:<12} {:<14} {}{}",
            "->".green(),
            t.id(),
            t.name(),
            t.transformer_type().to_string().dimmed(),
            marker
        );
    }
    Ok(ExitCode::SUCCESS)
}

pub(crate) fn summary(t: &TransformerRef) -> serde_json::Value {
    serde_json::json!({
        "id": t.id(),
        "name": t.name(),
        "type": t.transformer_type(),
        "has_settings": t.has_settings(),
    })
}
