use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use super::ConfigError;

/// Feature gates persisted in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Analytics,
    EnvWarning,
    UpdateCheck,
}

impl Flag {
    pub const ALL: [Flag; 3] = [Flag::Analytics, Flag::EnvWarning, Flag::UpdateCheck];

    pub fn as_str(self) -> &'static str {
        match self {
            Flag::Analytics => "analytics",
            Flag::EnvWarning => "env-warning",
            Flag::UpdateCheck => "update-check",
        }
    }

    pub fn default_value(self) -> bool {
        true
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Flag {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Flag::ALL
            .into_iter()
            .find(|flag| flag.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownFlag(s.to_string()))
    }
}

/// Tri-state storage: `None` falls back to the compiled-in default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Flags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_warning: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_check: Option<bool>,
}

impl Flags {
    pub(crate) fn is_default(&self) -> bool {
        self == &Flags::default()
    }

    fn slot(&mut self, flag: Flag) -> &mut Option<bool> {
        match flag {
            Flag::Analytics => &mut self.analytics,
            Flag::EnvWarning => &mut self.env_warning,
            Flag::UpdateCheck => &mut self.update_check,
        }
    }

    pub fn stored(&self, flag: Flag) -> Option<bool> {
        match flag {
            Flag::Analytics => self.analytics,
            Flag::EnvWarning => self.env_warning,
            Flag::UpdateCheck => self.update_check,
        }
    }

    pub fn get(&self, flag: Flag) -> bool {
        self.stored(flag).unwrap_or_else(|| flag.default_value())
    }

    pub fn set(&mut self, flag: Flag, value: bool) {
        *self.slot(flag) = Some(value);
    }

    pub fn reset(&mut self, flag: Flag) {
        *self.slot(flag) = None;
    }
}
