//! Layered, directory-scoped configuration.
//!
//! Options are persisted per scope (an absolute directory, or `*`) in a YAML
//! file and resolved for the current directory in three tiers:
//!
//! 1. The file: the longest persisted scope that is a path prefix of the
//!    current directory wins, per option.
//! 2. The `DOPPLER_*` environment variables.
//! 3. Command-line flags, which win when given explicitly and otherwise
//!    supply defaults for options that are still empty.

mod file;
mod flags;
mod migration;
mod paths;
mod resolver;
mod store;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use doppler_keyring_store::CredentialStoreError;

pub use file::ConfigFile;
pub use file::FileScopedOptions;
pub use file::Tui;
pub use file::VersionCheck;
pub use flags::Flag;
pub use flags::Flags;
pub use migration::LEGACY_CONFIG_FILE_NAME;
pub use migration::migrate_legacy_config;
pub use paths::CONFIG_FILE_NAME;
pub use paths::config_dir;
pub use paths::default_config_file;
pub use paths::expand_home;
pub use paths::normalize_scope;
pub use paths::scope_matches;
pub use resolver::DEFAULT_API_HOST;
pub use resolver::DEFAULT_DASHBOARD_HOST;
pub use resolver::EffectiveConfig;
pub use resolver::FlagOverrides;
pub use resolver::resolve;
pub use resolver::resolve_with_env;
pub use store::ConfigStore;
pub use store::KEYRING_TOKEN_PREFIX;

/// Scope that matches every directory.
pub const GLOBAL_SCOPE: &str = "*";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown option {0}")]
    UnknownOption(String),

    #[error("unknown flag {0}")]
    UnknownFlag(String),

    #[error("invalid scope {0}")]
    InvalidScope(String),

    #[error("invalid value for {option}: {value}")]
    InvalidValue { option: String, value: String },

    #[error("unable to determine the configuration directory")]
    NoConfigDir,

    #[error("unable to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unable to parse legacy config {}: {source}", path.display())]
    ParseLegacy {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unable to encode configuration: {0}")]
    Encode(#[from] serde_yaml::Error),

    #[error("keyring: {0}")]
    Keyring(#[from] CredentialStoreError),
}

/// The persisted options, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigOption {
    Token,
    Project,
    Config,
    ApiHost,
    DashboardHost,
    VerifyTls,
}

impl ConfigOption {
    pub const ALL: [ConfigOption; 6] = [
        ConfigOption::Token,
        ConfigOption::Project,
        ConfigOption::Config,
        ConfigOption::ApiHost,
        ConfigOption::DashboardHost,
        ConfigOption::VerifyTls,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigOption::Token => "token",
            ConfigOption::Project => "project",
            ConfigOption::Config => "config",
            ConfigOption::ApiHost => "api-host",
            ConfigOption::DashboardHost => "dashboard-host",
            ConfigOption::VerifyTls => "verify-tls",
        }
    }

    /// Environment variable consulted by the env tier.
    pub fn env_var(self) -> &'static str {
        match self {
            ConfigOption::Token => "DOPPLER_TOKEN",
            ConfigOption::Project => "DOPPLER_PROJECT",
            ConfigOption::Config => "DOPPLER_CONFIG",
            ConfigOption::ApiHost => "DOPPLER_API_HOST",
            ConfigOption::DashboardHost => "DOPPLER_DASHBOARD_HOST",
            ConfigOption::VerifyTls => "DOPPLER_VERIFY_TLS",
        }
    }

    /// Values that must not be printed in full.
    pub fn is_sensitive(self) -> bool {
        self == ConfigOption::Token
    }
}

impl fmt::Display for ConfigOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigOption {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigOption::ALL
            .into_iter()
            .find(|option| option.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownOption(s.to_string()))
    }
}

/// Which tier produced a resolved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Flag,
    Env,
    ConfigFile,
    Default,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Flag => "flag",
            Source::Env => "env",
            Source::ConfigFile => "config-file",
            Source::Default => "default",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One resolved option: its value, the scope it was found under and the
/// tier that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedValue {
    pub value: String,
    pub scope: String,
    pub source: Source,
}

impl ScopedValue {
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl Default for ScopedValue {
    fn default() -> Self {
        Self {
            value: String::new(),
            scope: GLOBAL_SCOPE.to_string(),
            source: Source::Default,
        }
    }
}

/// Shortened form of a token for display.
pub fn token_preview(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 10 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    let head: String = chars[..6].iter().collect();
    format!("{head}****{tail}")
}
