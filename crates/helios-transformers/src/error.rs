//! Error types for transformer construction, registration, and execution.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for transformer operations.
pub type TransformerResult<T> = Result<T, TransformerError>;

/// Boxed error carried as the cause of a failed transformation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while defining, registering, or running a transformer.
///
/// Construction and registration errors are programming errors in a
/// transformer definition and surface synchronously. Converter process
/// failures never appear here; they are reported and returned as a
/// [`ConversionStatus::Failed`](crate::converter::ConversionStatus::Failed).
#[derive(Debug, Error)]
pub enum TransformerError {
    /// Id or name failed the legality check.
    #[error("invalid identifier '{value}': {reason}")]
    InvalidIdentifier { value: String, reason: &'static str },

    /// Another transformer already owns this id.
    #[error("transformer id '{id}' already exists")]
    DuplicateIdentifier { id: String },

    /// Another transformer already owns this name.
    #[error("transformer name '{name}' already exists")]
    DuplicateName { name: String },

    /// A settings descriptor is not a valid closed option.
    #[error("unsupported setting '{key}': {message}")]
    UnsupportedConfiguration { key: String, message: String },

    /// An in-process transformation could not complete.
    #[error("transformer '{transformer}' failed: {source}")]
    TransformationFailed {
        transformer: String,
        #[source]
        source: BoxError,
    },

    /// The operation exists but has not been built.
    #[error("transformer '{transformer}' is not implemented: {message}")]
    UnimplementedOperation {
        transformer: String,
        message: String,
    },

    /// The transformer does not accept this kind of operation.
    #[error("transformer '{transformer}' does not support {operation} operations")]
    UnsupportedOperation {
        transformer: String,
        operation: &'static str,
    },

    /// The process-wide registry was initialized twice.
    #[error("the transformer registry is already initialized")]
    AlreadyInitialized,
}

impl TransformerError {
    /// Creates an invalid identifier error.
    pub fn invalid_identifier(value: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidIdentifier {
            value: value.into(),
            reason,
        }
    }

    /// Creates a transformation failed error wrapping `source`.
    pub fn transformation_failed(
        transformer: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::TransformationFailed {
            transformer: transformer.into(),
            source: source.into(),
        }
    }

    /// Creates an unimplemented operation error.
    pub fn unimplemented(transformer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnimplementedOperation {
            transformer: transformer.into(),
            message: message.into(),
        }
    }

    /// Creates an unsupported configuration error.
    pub fn unsupported_configuration(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnsupportedConfiguration {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            TransformerError::InvalidIdentifier { .. } => "HELIOS_001",
            TransformerError::DuplicateIdentifier { .. } => "HELIOS_002",
            TransformerError::DuplicateName { .. } => "HELIOS_003",
            TransformerError::UnsupportedConfiguration { .. } => "HELIOS_004",
            TransformerError::TransformationFailed { .. } => "HELIOS_005",
            TransformerError::UnimplementedOperation { .. } => "HELIOS_006",
            TransformerError::UnsupportedOperation { .. } => "HELIOS_007",
            TransformerError::AlreadyInitialized => "HELIOS_008",
        }
    }
}

/// Errors from reading or writing a transformer's settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    /// No setting registered under this key.
    #[error("unknown setting '{key}'")]
    UnknownKey { key: String },

    /// The value does not match the setting's declared kind.
    #[error("setting '{key}' expects {expected}, got {actual}")]
    KindMismatch {
        key: String,
        expected: String,
        actual: String,
    },
}

/// Errors from launching or waiting on an external tool.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The process could not be started.
    #[error("failed to spawn '{program}': {source}")]
    SpawnFailed {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the running process failed.
    #[error("failed to wait for process: {0}")]
    WaitFailed(#[source] std::io::Error),

    /// The process ran past its deadline and was killed.
    #[error("process timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The caller cancelled the invocation and the process was killed.
    #[error("process was cancelled")]
    Cancelled,

    /// The process exited unsuccessfully.
    #[error("process exited with status {exit_code}: {stderr}")]
    NonZeroExit { exit_code: i32, stderr: String },
}

impl ProcessError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            ProcessError::SpawnFailed { .. } => "PROCESS_001",
            ProcessError::WaitFailed(_) => "PROCESS_002",
            ProcessError::Timeout { .. } => "PROCESS_003",
            ProcessError::Cancelled => "PROCESS_004",
            ProcessError::NonZeroExit { .. } => "PROCESS_005",
        }
    }
}

/// Errors a conversion strategy hands back to its converter.
///
/// Everything except [`ConversionError::Unimplemented`] is reported and turned
/// into a failed status at the converter boundary.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The external tool failed.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// Preparing the input or output location failed.
    #[error("failed to prepare conversion: {0}")]
    Io(#[from] std::io::Error),

    /// This conversion has not been built.
    #[error("{0}")]
    Unimplemented(String),
}

/// Error returned by a bytecode normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to normalize bytecode: {message}")]
pub struct NormalizeError {
    pub message: String,
}

impl NormalizeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the config file.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Failed to write the config file.
    #[error("failed to write config to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
