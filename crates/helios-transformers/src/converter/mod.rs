//! Converters: transformers that turn one artifact file into another by
//! driving an external tool.
//!
//! A [`Converter`] pairs a [`TransformerBase`] with a [`Conversion`] strategy
//! and the shared [`Environment`]. The strategy builds the command line and
//! decides what counts as a prerequisite; the converter owns the failure
//! policy: process failures are reported to the environment's
//! [`ExceptionReporter`](crate::collab::ExceptionReporter) and come back as
//! [`ConversionStatus::Failed`], never as an `Err`.

mod builtin;

#[cfg(test)]
mod tests;

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::collab::Environment;
use crate::error::{ConversionError, TransformerError, TransformerResult};
use crate::process::{InvokeOptions, ProcessTemplate};
use crate::registry::TransformerRegistry;
use crate::transformer::{Operation, Outcome, Transformer, TransformerBase};

pub use builtin::{Dex2Jar, Enjarify, Jar2Dex, NoConversion};

/// Id of the dex/apk to jar converter backed by enjarify.
pub const ENJARIFY: &str = "enjarify";
/// Id of the dex to jar converter backed by dex2jar.
pub const DEX2JAR: &str = "dex2jar";
/// Id of the jar to dex converter.
pub const JAR2DEX: &str = "jar2dex";
/// Id of the converter that does nothing.
pub const NONE: &str = "none";

/// Built-in converter ids, in registration order.
pub const BUILTIN_IDS: [&str; 4] = [ENJARIFY, DEX2JAR, JAR2DEX, NONE];

/// What a conversion did.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionStatus {
    /// The tool ran and exited successfully.
    Completed { exit_code: i32, duration: Duration },
    /// A prerequisite was missing, so nothing was launched.
    Skipped { reason: String },
    /// The tool could not run to a successful exit. Already reported.
    Failed { message: String },
    /// The converter does nothing by definition.
    NoOp,
}

impl ConversionStatus {
    /// Returns true only when a tool ran to a successful exit.
    pub fn is_success(&self) -> bool {
        matches!(self, ConversionStatus::Completed { .. })
    }
}

impl fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionStatus::Completed { exit_code, duration } => write!(
                f,
                "completed (exit code {}, {:.2}s)",
                exit_code,
                duration.as_secs_f64()
            ),
            ConversionStatus::Skipped { reason } => write!(f, "skipped: {}", reason),
            ConversionStatus::Failed { message } => write!(f, "failed: {}", message),
            ConversionStatus::NoOp => write!(f, "nothing to do"),
        }
    }
}

/// Everything a conversion strategy may consult while running.
pub struct ConversionContext<'a> {
    /// Shared collaborators and prerequisite locations.
    pub env: &'a Environment,
    /// Caller limits for the external tool.
    pub options: &'a InvokeOptions,
    /// Id of the converter running the strategy, for logs.
    pub transformer_id: &'a str,
}

impl ConversionContext<'_> {
    /// Launches `template` and maps a successful exit to
    /// [`ConversionStatus::Completed`].
    pub fn run(&self, template: &ProcessTemplate) -> Result<ConversionStatus, ConversionError> {
        tracing::info!(
            converter = self.transformer_id,
            command = %template.command_line(),
            "launching converter"
        );
        let output = self.env.launcher.launch(template, self.options)?;
        tracing::info!(
            converter = self.transformer_id,
            exit_code = output.exit_code,
            duration_ms = output.duration.as_millis() as u64,
            "converter finished"
        );
        if !output.stderr.trim().is_empty() {
            tracing::debug!(converter = self.transformer_id, stderr = %output.stderr.trim());
        }
        Ok(ConversionStatus::Completed {
            exit_code: output.exit_code,
            duration: output.duration,
        })
    }
}

/// A conversion strategy.
pub trait Conversion: Send + Sync + 'static {
    /// Converts `input` into `output`.
    ///
    /// Returns [`ConversionStatus::Skipped`] without launching anything when
    /// a prerequisite is unmet.
    fn convert(
        &self,
        input: &Path,
        output: &Path,
        ctx: &ConversionContext<'_>,
    ) -> Result<ConversionStatus, ConversionError>;

    /// Decides whether this conversion accepts an artifact named
    /// `classifying_name`.
    fn is_applicable(&self, classifying_name: &str) -> bool;
}

/// A transformer backed by a [`Conversion`].
pub struct Converter<C> {
    base: TransformerBase,
    conversion: C,
    env: Arc<Environment>,
}

impl<C: Conversion> Converter<C> {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        conversion: C,
        env: Arc<Environment>,
    ) -> TransformerResult<Self> {
        Ok(Self {
            base: TransformerBase::new(id, name)?,
            conversion,
            env,
        })
    }

    pub fn conversion(&self) -> &C {
        &self.conversion
    }

    /// Converts `input` into `output`, blocking until the tool exits.
    ///
    /// Only [`TransformerError::UnimplementedOperation`] is returned as an
    /// error. Every other failure is reported and returned as
    /// [`ConversionStatus::Failed`].
    pub fn convert(
        &self,
        input: &Path,
        output: &Path,
        options: &InvokeOptions,
    ) -> TransformerResult<ConversionStatus> {
        let ctx = ConversionContext {
            env: &self.env,
            options,
            transformer_id: self.id(),
        };

        match self.conversion.convert(input, output, &ctx) {
            Ok(status) => {
                if let ConversionStatus::Skipped { ref reason } = status {
                    tracing::warn!(converter = self.id(), %reason, "conversion skipped");
                }
                Ok(status)
            }
            Err(ConversionError::Unimplemented(message)) => {
                Err(TransformerError::unimplemented(self.id(), message))
            }
            Err(err) => {
                let message = err.to_string();
                let failure = TransformerError::transformation_failed(self.id(), err);
                self.env.reporter.report(&failure);
                tracing::warn!(
                    converter = self.id(),
                    input = %input.display(),
                    output = %output.display(),
                    %message,
                    "conversion failed"
                );
                Ok(ConversionStatus::Failed { message })
            }
        }
    }
}

impl<C: Conversion> Transformer for Converter<C> {
    fn base(&self) -> &TransformerBase {
        &self.base
    }

    fn is_applicable(&self, classifying_name: &str) -> bool {
        self.conversion.is_applicable(classifying_name)
    }

    fn transform(&self, operation: Operation) -> TransformerResult<Outcome> {
        match operation {
            Operation::Convert {
                input,
                output,
                options,
            } => self
                .convert(&input, &output, &options)
                .map(Outcome::Converted),
            other => Err(self.unsupported(&other)),
        }
    }
}

impl<C> fmt::Debug for Converter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("id", &self.base.id())
            .field("name", &self.base.name())
            .finish_non_exhaustive()
    }
}

/// Registers the built-in converters: enjarify, dex2jar, jar2dex, none.
pub fn register_family(registry: &TransformerRegistry, env: &Arc<Environment>) -> TransformerResult<()> {
    Converter::new(ENJARIFY, "Enjarify", Enjarify, Arc::clone(env))?.register_in(registry)?;
    Converter::new(DEX2JAR, "Dex2Jar", Dex2Jar, Arc::clone(env))?.register_in(registry)?;
    Converter::new(JAR2DEX, "Jar2Dex", Jar2Dex, Arc::clone(env))?.register_in(registry)?;
    Converter::new(NONE, "None", NoConversion, Arc::clone(env))?.register_in(registry)?;
    Ok(())
}
