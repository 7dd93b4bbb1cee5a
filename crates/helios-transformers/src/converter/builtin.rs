//! The built-in conversion strategies.

use std::path::Path;

use super::{Conversion, ConversionContext, ConversionStatus};
use crate::error::ConversionError;
use crate::process::{absolute_path, ProcessTemplate};

/// Creates the parent directory of `output` so tools that refuse to create
/// it still succeed.
fn prepare_output(output: &Path) -> Result<(), ConversionError> {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent)?;
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Converts dex files and APKs to a jar with enjarify, run as a Python module.
#[derive(Debug, Clone, Copy, Default)]
pub struct Enjarify;

impl Enjarify {
    /// Command line for converting `input` into `output` with `python3`.
    ///
    /// Paths are made absolute because the tool runs from the enjarify
    /// checkout.
    pub fn template(
        python3: &Path,
        enjarify_dir: Option<&Path>,
        input: &Path,
        output: &Path,
    ) -> ProcessTemplate {
        let template = ProcessTemplate::new(python3)
            .args(["-O", "-m", "enjarify.main"])
            .arg(absolute_path(input))
            .arg("-o")
            .arg(absolute_path(output))
            .arg("-f");
        match enjarify_dir {
            Some(dir) => template.working_dir(dir),
            None => template,
        }
    }
}

impl Conversion for Enjarify {
    fn convert(
        &self,
        input: &Path,
        output: &Path,
        ctx: &ConversionContext<'_>,
    ) -> Result<ConversionStatus, ConversionError> {
        let Some(python3) = ctx.env.config.resolve_python3() else {
            return Ok(ConversionStatus::Skipped {
                reason: "Python 3 is not configured".to_string(),
            });
        };
        prepare_output(output)?;
        let template = Self::template(
            &python3,
            ctx.env.config.enjarify_dir.as_deref(),
            input,
            output,
        );
        ctx.run(&template)
    }

    fn is_applicable(&self, _classifying_name: &str) -> bool {
        true
    }
}

/// Converts a dex file to a jar with the dex2jar launcher script.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dex2Jar;

impl Dex2Jar {
    /// Command line for converting `input` into `output` with `tool`.
    pub fn template(tool: &Path, input: &Path, output: &Path) -> ProcessTemplate {
        ProcessTemplate::new(tool)
            .arg("-o")
            .arg(absolute_path(output))
            .arg("--force")
            .arg(absolute_path(input))
    }
}

impl Conversion for Dex2Jar {
    fn convert(
        &self,
        input: &Path,
        output: &Path,
        ctx: &ConversionContext<'_>,
    ) -> Result<ConversionStatus, ConversionError> {
        let Some(tool) = ctx.env.config.resolve_dex2jar() else {
            return Ok(ConversionStatus::Skipped {
                reason: "dex2jar is not configured".to_string(),
            });
        };
        prepare_output(output)?;
        ctx.run(&Self::template(&tool, input, output))
    }

    fn is_applicable(&self, classifying_name: &str) -> bool {
        classifying_name.ends_with(".dex")
    }
}

/// Converts a jar back to dex. Not built yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct Jar2Dex;

impl Conversion for Jar2Dex {
    fn convert(
        &self,
        _input: &Path,
        _output: &Path,
        _ctx: &ConversionContext<'_>,
    ) -> Result<ConversionStatus, ConversionError> {
        Err(ConversionError::Unimplemented(
            "jar to dex conversion is not available".to_string(),
        ))
    }

    fn is_applicable(&self, classifying_name: &str) -> bool {
        classifying_name.ends_with(".jar")
    }
}

/// Placeholder converter selected when no conversion is wanted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConversion;

impl Conversion for NoConversion {
    fn convert(
        &self,
        _input: &Path,
        _output: &Path,
        _ctx: &ConversionContext<'_>,
    ) -> Result<ConversionStatus, ConversionError> {
        Ok(ConversionStatus::NoOp)
    }

    fn is_applicable(&self, _classifying_name: &str) -> bool {
        false
    }
}
