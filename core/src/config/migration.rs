use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use super::ConfigError;
use super::ConfigFile;
use super::ConfigOption;
use super::FileScopedOptions;
use super::paths::normalize_scope;
use crate::atomic_write::write_private;

pub const LEGACY_CONFIG_FILE_NAME: &str = ".doppler.json";

#[derive(Debug, Default, Deserialize)]
struct LegacyEntry {
    #[serde(default)]
    pipeline: String,
    #[serde(default)]
    environment: String,
    #[serde(default)]
    key: String,
}

/// Converts a legacy JSON config into the YAML file at `yaml_path`.
///
/// Runs only when the YAML file does not exist yet and the legacy file
/// does. Returns whether a migration happened. Safe to race: the YAML file
/// is written with an atomic rename and every racer writes the same
/// content.
pub fn migrate_legacy_config(legacy_path: &Path, yaml_path: &Path) -> Result<bool, ConfigError> {
    if yaml_path.exists() || !legacy_path.exists() {
        return Ok(false);
    }

    let text = std::fs::read_to_string(legacy_path).map_err(|source| ConfigError::Read {
        path: legacy_path.to_path_buf(),
        source,
    })?;
    let legacy: BTreeMap<String, LegacyEntry> =
        serde_json::from_str(&text).map_err(|source| ConfigError::ParseLegacy {
            path: legacy_path.to_path_buf(),
            source,
        })?;

    let mut file = ConfigFile::default();
    for (scope, entry) in legacy {
        let Ok(scope) = normalize_scope(&scope) else {
            tracing::warn!("skipping legacy config entry with invalid scope {scope}");
            continue;
        };
        let mut options = FileScopedOptions::default();
        options.set(ConfigOption::Project, entry.pipeline);
        options.set(ConfigOption::Config, entry.environment);
        options.set(ConfigOption::Token, entry.key);
        if !options.is_empty() {
            file.scoped.insert(scope, options);
        }
    }

    let yaml = file.to_yaml()?;
    write_private(yaml_path, yaml.as_bytes()).map_err(|source| ConfigError::Write {
        path: yaml_path.to_path_buf(),
        source,
    })?;
    tracing::info!(
        "migrated legacy config {} to {}",
        legacy_path.display(),
        yaml_path.display()
    );
    Ok(true)
}
