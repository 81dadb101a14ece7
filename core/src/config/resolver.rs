use super::ConfigFile;
use super::ConfigOption;
use super::GLOBAL_SCOPE;
use super::ScopedValue;
use super::Source;
use super::paths::normalize_scope;
use super::paths::scope_matches;

pub const DEFAULT_API_HOST: &str = "https://api.doppler.com";
pub const DEFAULT_DASHBOARD_HOST: &str = "https://dashboard.doppler.com";

/// Values supplied on the command line. `None` means the flag was not
/// given explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagOverrides {
    pub token: Option<String>,
    pub project: Option<String>,
    pub config: Option<String>,
    pub api_host: Option<String>,
    pub dashboard_host: Option<String>,
    /// `--no-verify-tls`; `verify-tls` is its inverse.
    pub no_verify_tls: Option<bool>,
}

impl FlagOverrides {
    /// The flag value for `option` and whether it was given explicitly.
    fn value(&self, option: ConfigOption) -> (String, bool) {
        let explicit = match option {
            ConfigOption::Token => self.token.clone(),
            ConfigOption::Project => self.project.clone(),
            ConfigOption::Config => self.config.clone(),
            ConfigOption::ApiHost => self.api_host.clone(),
            ConfigOption::DashboardHost => self.dashboard_host.clone(),
            ConfigOption::VerifyTls => self.no_verify_tls.map(|no| (!no).to_string()),
        };
        match explicit {
            Some(value) => (value, true),
            None => (default_value(option).to_string(), false),
        }
    }
}

fn default_value(option: ConfigOption) -> &'static str {
    match option {
        ConfigOption::ApiHost => DEFAULT_API_HOST,
        ConfigOption::DashboardHost => DEFAULT_DASHBOARD_HOST,
        ConfigOption::VerifyTls => "true",
        ConfigOption::Token | ConfigOption::Project | ConfigOption::Config => "",
    }
}

/// The resolved option map for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub token: ScopedValue,
    pub project: ScopedValue,
    pub config: ScopedValue,
    pub api_host: ScopedValue,
    pub dashboard_host: ScopedValue,
    pub verify_tls: ScopedValue,
}

impl EffectiveConfig {
    pub fn get(&self, option: ConfigOption) -> &ScopedValue {
        match option {
            ConfigOption::Token => &self.token,
            ConfigOption::Project => &self.project,
            ConfigOption::Config => &self.config,
            ConfigOption::ApiHost => &self.api_host,
            ConfigOption::DashboardHost => &self.dashboard_host,
            ConfigOption::VerifyTls => &self.verify_tls,
        }
    }

    pub(crate) fn get_mut(&mut self, option: ConfigOption) -> &mut ScopedValue {
        match option {
            ConfigOption::Token => &mut self.token,
            ConfigOption::Project => &mut self.project,
            ConfigOption::Config => &mut self.config,
            ConfigOption::ApiHost => &mut self.api_host,
            ConfigOption::DashboardHost => &mut self.dashboard_host,
            ConfigOption::VerifyTls => &mut self.verify_tls,
        }
    }

    /// Anything but an explicit `false` keeps verification on.
    pub fn verify_tls(&self) -> bool {
        !self.verify_tls.value.trim().eq_ignore_ascii_case("false")
    }
}

/// Resolves against the process environment.
pub fn resolve(
    file: &ConfigFile,
    current_scope: &str,
    flags: &FlagOverrides,
    read_env: bool,
) -> EffectiveConfig {
    resolve_with_env(file, current_scope, flags, read_env, |name| {
        std::env::var(name).ok()
    })
}

/// Resolves with `lookup` standing in for the environment.
pub fn resolve_with_env<F>(
    file: &ConfigFile,
    current_scope: &str,
    flags: &FlagOverrides,
    read_env: bool,
    lookup: F,
) -> EffectiveConfig
where
    F: Fn(&str) -> Option<String>,
{
    let current = normalize_scope(current_scope).unwrap_or_else(|_| current_scope.to_string());
    let mut resolved = EffectiveConfig::default();

    // File tier: per option, the longest matching scope wins.
    let mut matching: Vec<(&String, _)> = file
        .scoped
        .iter()
        .filter(|(scope, _)| scope_matches(scope, &current))
        .collect();
    matching.sort_by_key(|(scope, _)| scope_rank(scope));
    for (scope, options) in matching {
        for (option, value) in options.iter() {
            *resolved.get_mut(option) = ScopedValue {
                value: value.to_string(),
                scope: scope.clone(),
                source: Source::ConfigFile,
            };
        }
    }

    if read_env {
        for option in ConfigOption::ALL {
            if let Some(value) = lookup(option.env_var()).filter(|v| !v.is_empty()) {
                tracing::debug!("using {} from the environment", option.env_var());
                *resolved.get_mut(option) = ScopedValue {
                    value,
                    scope: GLOBAL_SCOPE.to_string(),
                    source: Source::Env,
                };
            }
        }
    }

    for option in ConfigOption::ALL {
        let (value, explicit) = flags.value(option);
        let slot = resolved.get_mut(option);
        if explicit || slot.is_empty() {
            *slot = ScopedValue {
                value,
                scope: current.clone(),
                source: if explicit { Source::Flag } else { Source::Default },
            };
        }
    }

    resolved
}

/// Ordering key that applies shorter scopes first, so longer ones overwrite.
fn scope_rank(scope: &str) -> usize {
    if scope == GLOBAL_SCOPE {
        0
    } else {
        normalize_scope(scope).map(|s| s.len() + 1).unwrap_or(0)
    }
}
