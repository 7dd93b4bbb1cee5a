//! CLI command implementations

pub mod convert;
pub mod doctor;
pub mod info;
pub mod list;
pub mod settings;
pub mod view;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use helios_transformers::registry::{self, TransformerRegistry};
use helios_transformers::{Environment, HeliosConfig, TransformerRef};

/// Loaded configuration plus the registry built from it.
pub(crate) struct Session {
    pub config: HeliosConfig,
    pub config_path: Option<PathBuf>,
    pub registry: &'static TransformerRegistry,
}

impl Session {
    /// Loads the config and initializes the process-wide registry.
    pub fn open(config_path: Option<&Path>) -> Result<Self> {
        let config = HeliosConfig::load_or_default(config_path).context("failed to load config")?;
        let config_path = config_path
            .map(Path::to_path_buf)
            .or_else(HeliosConfig::default_path);
        tracing::debug!(config = ?config_path, "loaded config");

        let env = Arc::new(Environment::new(config.clone()));
        let registry = registry::init(env).context("failed to register transformers")?;

        Ok(Self {
            config,
            config_path,
            registry,
        })
    }

    /// Looks a transformer up by id, then by name.
    pub fn find(&self, id_or_name: &str) -> Result<TransformerRef> {
        find(self.registry, id_or_name)
    }

    /// Writes the registry's current settings back to the config file.
    pub fn save_settings(&mut self) -> Result<PathBuf> {
        let Some(path) = self.config_path.clone() else {
            bail!("no config location available; pass --config");
        };
        self.config.settings = self.registry.export_settings();
        self.config
            .save(&path)
            .with_context(|| format!("failed to save config to {}", path.display()))?;
        Ok(path)
    }
}

pub(crate) fn find(registry: &TransformerRegistry, id_or_name: &str) -> Result<TransformerRef> {
    match registry
        .get_by_id(id_or_name)
        .or_else(|| registry.get_by_name(id_or_name))
    {
        Some(t) => Ok(t),
        None => bail!(
            "unknown transformer '{}' (run `helios list` to see all)",
            id_or_name
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helios_transformers::RegistryBuilder;

    #[test]
    fn test_find_by_id_or_name() {
        let registry = RegistryBuilder::with_builtins()
            .build(&Arc::new(Environment::default()))
            .unwrap();
        assert_eq!(find(&registry, "dex2jar").unwrap().name(), "Dex2Jar");
        assert_eq!(find(&registry, "Dex2Jar").unwrap().id(), "dex2jar");

        let err = find(&registry, "cfr").unwrap_err();
        assert!(err.to_string().contains("unknown transformer 'cfr'"));
    }
}
