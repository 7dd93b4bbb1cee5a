//! Configuration for external tool prerequisites and persisted settings.
//!
//! The config lives in `<config dir>/helios/config.json` unless a path is
//! given explicitly. Every field is optional; a missing file yields defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::process::{absolute_path, DEFAULT_TIMEOUT_SECS};

/// Environment variable overriding the Python 3 interpreter location.
pub const PYTHON3_ENV: &str = "HELIOS_PYTHON3";

/// Environment variable overriding the dex2jar tool location.
pub const DEX2JAR_ENV: &str = "HELIOS_DEX2JAR";

#[cfg(windows)]
const CLASSPATH_SEPARATOR: &str = ";";
#[cfg(not(windows))]
const CLASSPATH_SEPARATOR: &str = ":";

/// Persisted values per transformer id.
pub type PersistedSettings = BTreeMap<String, serde_json::Map<String, serde_json::Value>>;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeliosConfig {
    /// Python 3 interpreter used by script-based converters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python3_location: Option<PathBuf>,
    /// Checkout of enjarify, used as the working directory when launching it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enjarify_dir: Option<PathBuf>,
    /// dex2jar launcher script.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dex2jar_location: Option<PathBuf>,
    /// Java runtime library (rt.jar or jmods directory) for classpaths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rt_location: Option<PathBuf>,
    /// Extra classpath entries appended after the input archive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_classpath: Option<String>,
    /// Timeout applied to external tools when the caller gives none.
    pub process_timeout_secs: u64,
    /// Search `PATH` and environment overrides for tools that are not
    /// configured explicitly.
    pub discover_tools: bool,
    /// Transformer settings, keyed by transformer id.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub settings: PersistedSettings,
}

impl Default for HeliosConfig {
    fn default() -> Self {
        Self {
            python3_location: None,
            enjarify_dir: None,
            dex2jar_location: None,
            rt_location: None,
            extra_classpath: None,
            process_timeout_secs: DEFAULT_TIMEOUT_SECS,
            discover_tools: true,
            settings: PersistedSettings::new(),
        }
    }
}

impl HeliosConfig {
    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        Some(dirs::config_dir()?.join("helios").join("config.json"))
    }

    /// Loads a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `path`, or the default location when `path` is `None`. A file
    /// that does not exist yields the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    /// Writes the config as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(write_err)
    }

    /// Timeout applied to external tools when the caller gives none.
    pub fn process_timeout(&self) -> Duration {
        Duration::from_secs(self.process_timeout_secs)
    }

    /// Locates the Python 3 interpreter.
    ///
    /// Order: configured location, `HELIOS_PYTHON3`, then `PATH`. Only the
    /// configured location is consulted when discovery is disabled.
    pub fn resolve_python3(&self) -> Option<PathBuf> {
        let names: &[&str] = if cfg!(windows) {
            &["python3.exe", "python.exe"]
        } else {
            &["python3"]
        };
        self.resolve_tool(self.python3_location.as_deref(), PYTHON3_ENV, names)
    }

    /// Locates the dex2jar launcher.
    pub fn resolve_dex2jar(&self) -> Option<PathBuf> {
        let names: &[&str] = if cfg!(windows) {
            &["d2j-dex2jar.bat"]
        } else {
            &["d2j-dex2jar", "d2j-dex2jar.sh"]
        };
        self.resolve_tool(self.dex2jar_location.as_deref(), DEX2JAR_ENV, names)
    }

    fn resolve_tool(&self, configured: Option<&Path>, env_var: &str, names: &[&str]) -> Option<PathBuf> {
        if let Some(path) = configured {
            if path.exists() {
                return Some(path.to_path_buf());
            }
            tracing::warn!(path = %path.display(), "configured tool does not exist");
        }

        if !self.discover_tools {
            return None;
        }

        if let Ok(path) = std::env::var(env_var) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        names.iter().find_map(|name| which::which(name).ok())
    }

    /// Builds a classpath of the runtime library, `input_jar`, and the extra
    /// entries, joined with the platform separator.
    pub fn build_classpath(&self, input_jar: &Path) -> String {
        let mut entries = Vec::new();
        if let Some(ref rt) = self.rt_location {
            entries.push(rt.display().to_string());
        }
        entries.push(absolute_path(input_jar).display().to_string());
        if let Some(ref extra) = self.extra_classpath {
            if !extra.is_empty() {
                entries.push(extra.clone());
            }
        }
        entries.join(CLASSPATH_SEPARATOR)
    }
}
