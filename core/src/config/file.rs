use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use super::ConfigOption;
use super::flags::Flags;

/// Names accepted on read for each option, canonical first. Later
/// synonyms predate earlier ones.
fn read_names(option: ConfigOption) -> &'static [&'static str] {
    match option {
        ConfigOption::Token => &["token", "key"],
        ConfigOption::Project => &["project", "enclave-project", "pipeline"],
        ConfigOption::Config => &["config", "enclave-config", "environment", "stage"],
        ConfigOption::ApiHost => &["api-host"],
        ConfigOption::DashboardHost => &["dashboard-host"],
        ConfigOption::VerifyTls => &["verify-tls"],
    }
}

/// Options persisted for one scope. Empty values are not written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", from = "RawScopedOptions")]
pub struct FileScopedOptions {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub token: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub project: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub config: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_host: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub dashboard_host: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub verify_tls: String,
}

/// Scope entry as found on disk, before legacy names are folded in.
#[derive(Deserialize)]
struct RawScopedOptions(Option<BTreeMap<String, serde_yaml::Value>>);

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl From<RawScopedOptions> for FileScopedOptions {
    fn from(raw: RawScopedOptions) -> Self {
        let mut options = FileScopedOptions::default();
        let Some(raw) = raw.0 else {
            return options;
        };
        for option in ConfigOption::ALL {
            let value = read_names(option)
                .iter()
                .filter_map(|name| raw.get(*name).and_then(scalar_to_string))
                .find(|value| !value.is_empty());
            if let Some(value) = value {
                options.set(option, value);
            }
        }
        options
    }
}

impl FileScopedOptions {
    pub fn get(&self, option: ConfigOption) -> &str {
        match option {
            ConfigOption::Token => &self.token,
            ConfigOption::Project => &self.project,
            ConfigOption::Config => &self.config,
            ConfigOption::ApiHost => &self.api_host,
            ConfigOption::DashboardHost => &self.dashboard_host,
            ConfigOption::VerifyTls => &self.verify_tls,
        }
    }

    pub fn set(&mut self, option: ConfigOption, value: String) {
        let slot = match option {
            ConfigOption::Token => &mut self.token,
            ConfigOption::Project => &mut self.project,
            ConfigOption::Config => &mut self.config,
            ConfigOption::ApiHost => &mut self.api_host,
            ConfigOption::DashboardHost => &mut self.dashboard_host,
            ConfigOption::VerifyTls => &mut self.verify_tls,
        };
        *slot = value;
    }

    pub fn is_empty(&self) -> bool {
        ConfigOption::ALL
            .into_iter()
            .all(|option| self.get(option).is_empty())
    }

    /// Non-empty options, in display order.
    pub fn iter(&self) -> impl Iterator<Item = (ConfigOption, &str)> {
        ConfigOption::ALL
            .into_iter()
            .map(|option| (option, self.get(option)))
            .filter(|(_, value)| !value.is_empty())
    }
}

/// Result of the last update check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VersionCheck {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub latest_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<DateTime<Utc>>,
}

impl VersionCheck {
    pub fn is_empty(&self) -> bool {
        self.latest_version.is_empty() && self.checked_at.is_none()
    }

    /// True when no check was recorded or the last one is at least 24 hours old.
    pub fn needs_check(&self, now: DateTime<Utc>) -> bool {
        match self.checked_at {
            None => true,
            Some(checked_at) => now - checked_at >= Duration::hours(24),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Tui {
    #[serde(default)]
    pub intro_version_seen: i64,
}

impl Tui {
    fn is_default(&self) -> bool {
        self == &Tui::default()
    }
}

/// The persisted configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigFile {
    #[serde(default)]
    pub scoped: BTreeMap<String, FileScopedOptions>,
    #[serde(default, skip_serializing_if = "VersionCheck::is_empty")]
    pub version_check: VersionCheck,
    #[serde(default, skip_serializing_if = "Flags::is_default")]
    pub flags: Flags,
    #[serde(default, skip_serializing_if = "Tui::is_default")]
    pub tui: Tui,
}

impl ConfigFile {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut file: ConfigFile = serde_yaml::from_str(text)?;
        file.scoped.retain(|_, options| !options.is_empty());
        Ok(file)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
