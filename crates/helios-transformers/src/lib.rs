//! Helios Transformers
//!
//! This crate provides the transformer layer of Helios: uniquely identified
//! stages that inspect or convert binary artifacts (class files, dex files,
//! APKs, jars), plus the registry that indexes them.
//!
//! # Overview
//!
//! Built-in transformers, in registration order:
//!
//! | Id | Name | Kind |
//! |----|------|------|
//! | `hex` | Hex | In-process hex dump viewer |
//! | `text` | Text | In-process UTF-8 viewer |
//! | `enjarify` | Enjarify | dex/apk to jar, via `python3 -m enjarify.main` |
//! | `dex2jar` | Dex2Jar | dex to jar, via `d2j-dex2jar` |
//! | `jar2dex` | Jar2Dex | jar to dex (not available) |
//! | `none` | None | does nothing, never applicable |
//!
//! # Example
//!
//! ```no_run
//! use helios_transformers::{registry, Operation};
//!
//! let enjarify = registry::get_by_id("enjarify").expect("built in");
//! if enjarify.is_applicable("classes.dex") {
//!     let outcome = enjarify.transform(Operation::convert("classes.dex", "classes.jar"))?;
//!     println!("{}", outcome.conversion_status().unwrap());
//! }
//! # Ok::<(), helios_transformers::TransformerError>(())
//! ```
//!
//! # External tools
//!
//! Converters locate their tools in this order:
//!
//! 1. The location in the config file (`<config dir>/helios/config.json`)
//! 2. `HELIOS_PYTHON3` / `HELIOS_DEX2JAR` environment variables
//! 3. System PATH
//!
//! A converter whose tool cannot be found returns a skipped status without
//! launching anything.
//!
//! # Crate Structure
//!
//! - [`identity`] - Id and name legality checks
//! - [`settings`] - Per-transformer settings store
//! - [`transformer`] - The transformer trait and operation types
//! - [`registry`] - Process-wide transformer index
//! - [`converter`] - External-tool converters
//! - [`viewers`] - Hex and text viewers
//! - [`process`] - External process launching
//! - [`tasks`] - Running transforms on worker threads
//! - [`collab`] - Reporter, task submitter, and normalizer contracts
//! - [`config`] - Configuration file and tool discovery
//! - [`error`] - Error types

pub mod collab;
pub mod config;
pub mod converter;
pub mod error;
pub mod identity;
pub mod process;
pub mod registry;
pub mod settings;
pub mod tasks;
pub mod transformer;
pub mod viewers;

// Re-export main types at crate root
pub use collab::{Environment, ExceptionReporter, TaskSubmitter};
pub use config::HeliosConfig;
pub use converter::{ConversionStatus, Converter};
pub use error::{TransformerError, TransformerResult};
pub use process::{CancelFlag, InvokeOptions};
pub use registry::{RegistryBuilder, TransformerHandle, TransformerRef, TransformerRegistry};
pub use settings::{SettingDescriptor, SettingKind, SettingValue, TransformerSettings};
pub use tasks::TransformTask;
pub use transformer::{Operation, Outcome, Transformer, TransformerBase, TransformerType};
