use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use doppler_keyring_store::KEYRING_SERVICE;
use doppler_keyring_store::KeyringStore;

use super::ConfigError;
use super::ConfigFile;
use super::ConfigOption;
use super::EffectiveConfig;
use super::FileScopedOptions;
use super::Flag;
use super::Flags;
use super::FlagOverrides;
use super::Source;
use super::VersionCheck;
use super::migration::LEGACY_CONFIG_FILE_NAME;
use super::migration::migrate_legacy_config;
use super::paths::normalize_scope;
use super::resolver::resolve;
use crate::atomic_write::write_private;

/// Tokens kept in the keyring are referenced as `<prefix>-<uuid>`.
pub const KEYRING_TOKEN_PREFIX: &str = "doppler-cli-token";

fn keyring_reference(value: &str) -> Option<&str> {
    let id = value
        .strip_prefix(KEYRING_TOKEN_PREFIX)?
        .strip_prefix('-')?;
    uuid::Uuid::parse_str(id).ok().map(|_| value)
}

/// The config file plus the in-memory copy this process works against.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    file: ConfigFile,
    keyring: Option<Arc<dyn KeyringStore>>,
}

impl ConfigStore {
    /// Reads `path`, migrating a sibling legacy JSON file first if needed.
    /// A missing file yields an empty configuration.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let legacy = path.with_file_name(LEGACY_CONFIG_FILE_NAME);
        migrate_legacy_config(&legacy, &path)?;
        let file = read_file(&path)?;
        Ok(Self {
            path,
            file,
            keyring: None,
        })
    }

    /// Stores tokens in `keyring` instead of inline.
    pub fn with_keyring(mut self, keyring: Arc<dyn KeyringStore>) -> Self {
        self.keyring = Some(keyring);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the config file; cache files live beneath it.
    pub fn dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn file(&self) -> &ConfigFile {
        &self.file
    }

    /// Drops the in-memory copy and reads the file again.
    pub fn reload(&mut self) -> Result<(), ConfigError> {
        self.file = read_file(&self.path)?;
        Ok(())
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let yaml = self.file.to_yaml()?;
        write_private(&self.path, yaml.as_bytes()).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })
    }

    pub fn scoped(&self, scope: &str) -> Result<Option<&FileScopedOptions>, ConfigError> {
        let scope = normalize_scope(scope)?;
        Ok(self.file.scoped.get(&scope))
    }

    /// Sets options on `scope` and persists the file. An empty value clears
    /// the option.
    pub fn set(&mut self, scope: &str, values: &[(ConfigOption, String)]) -> Result<(), ConfigError> {
        let scope = normalize_scope(scope)?;
        for (option, value) in values {
            if value.is_empty() {
                self.clear(&scope, *option);
                continue;
            }
            let stored = if *option == ConfigOption::Token {
                self.store_token(value)
            } else {
                value.clone()
            };
            let previous = self
                .file
                .scoped
                .get(&scope)
                .map(|options| options.get(*option).to_string());
            self.file
                .scoped
                .entry(scope.clone())
                .or_default()
                .set(*option, stored);
            if *option == ConfigOption::Token
                && let Some(previous) = previous
            {
                self.forget_token(&previous);
            }
        }
        self.file.scoped.retain(|_, options| !options.is_empty());
        self.save()
    }

    /// Clears options on `scope`, removing the entry once it is empty, and
    /// persists the file.
    pub fn unset(&mut self, scope: &str, options: &[ConfigOption]) -> Result<(), ConfigError> {
        let scope = normalize_scope(scope)?;
        for option in options {
            self.clear(&scope, *option);
        }
        self.save()
    }

    fn clear(&mut self, scope: &str, option: ConfigOption) {
        let Some(entry) = self.file.scoped.get_mut(scope) else {
            return;
        };
        let previous = entry.get(option).to_string();
        entry.set(option, String::new());
        if entry.is_empty() {
            self.file.scoped.remove(scope);
        }
        if option == ConfigOption::Token {
            self.forget_token(&previous);
        }
    }

    fn store_token(&self, token: &str) -> String {
        let Some(keyring) = &self.keyring else {
            return token.to_string();
        };
        let key = format!("{KEYRING_TOKEN_PREFIX}-{}", uuid::Uuid::new_v4());
        match keyring.save(KEYRING_SERVICE, &key, token) {
            Ok(()) => key,
            Err(err) => {
                tracing::warn!("unable to save token to the keyring, storing it in the config file: {err}");
                token.to_string()
            }
        }
    }

    fn forget_token(&self, stored: &str) {
        let (Some(keyring), Some(key)) = (&self.keyring, keyring_reference(stored)) else {
            return;
        };
        if let Err(err) = keyring.delete(KEYRING_SERVICE, key) {
            tracing::debug!("unable to delete keyring entry {key}: {err}");
        }
    }

    /// Dereferences a keyring reference; inline values pass through.
    pub fn token_value(&self, stored: &str) -> String {
        let Some(key) = keyring_reference(stored) else {
            return stored.to_string();
        };
        let Some(keyring) = &self.keyring else {
            tracing::warn!("token is stored in the keyring but no keyring is available");
            return String::new();
        };
        match keyring.load(KEYRING_SERVICE, key) {
            Ok(token) => token,
            Err(err) => {
                tracing::warn!("unable to read token from the keyring: {err}");
                String::new()
            }
        }
    }

    /// Resolves options for `current_scope`, dereferencing a keyring token.
    pub fn resolve(&self, current_scope: &str, flags: &FlagOverrides, read_env: bool) -> EffectiveConfig {
        let mut resolved = resolve(&self.file, current_scope, flags, read_env);
        if resolved.token.source == Source::ConfigFile {
            resolved.token.value = self.token_value(&resolved.token.value);
        }
        resolved
    }

    pub fn flags(&self) -> &Flags {
        &self.file.flags
    }

    pub fn flag(&self, flag: Flag) -> bool {
        self.file.flags.get(flag)
    }

    pub fn set_flag(&mut self, flag: Flag, value: bool) -> Result<(), ConfigError> {
        self.file.flags.set(flag, value);
        self.save()
    }

    pub fn reset_flag(&mut self, flag: Flag) -> Result<(), ConfigError> {
        self.file.flags.reset(flag);
        self.save()
    }

    pub fn version_check(&self) -> &VersionCheck {
        &self.file.version_check
    }

    pub fn set_version_check(&mut self, check: VersionCheck) -> Result<(), ConfigError> {
        self.file.version_check = check;
        self.save()
    }
}

fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ConfigFile::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    ConfigFile::from_yaml(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
