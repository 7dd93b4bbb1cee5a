//! View command implementation

use anyhow::{bail, Context, Result};
use helios_transformers::Operation;
use std::path::Path;
use std::process::ExitCode;

use super::Session;

/// Run the view command
pub fn run(config: Option<&Path>, file: &Path, with: &str) -> Result<ExitCode> {
    let session = Session::open(config)?;
    let viewer = session.find(with)?;

    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !viewer.is_applicable(&name) {
        bail!("{} cannot view '{}'", viewer.name(), name);
    }

    let bytes =
        std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let outcome = viewer.transform(Operation::View { bytes })?;

    match outcome.as_text() {
        Some(text) => print!("{}", text),
        None => bail!("{} did not produce text", viewer.name()),
    }
    Ok(ExitCode::SUCCESS)
}
