use std::path::MAIN_SEPARATOR;
use std::path::Path;
use std::path::PathBuf;

use path_absolutize::Absolutize;

use super::ConfigError;
use super::GLOBAL_SCOPE;

pub const CONFIG_FILE_NAME: &str = ".doppler.yaml";

/// `<os-config-dir>/doppler`, or `~/.doppler` when the OS has no config
/// directory.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = dirs::config_dir().filter(|dir| dir.is_dir()) {
        return Ok(dir.join("doppler"));
    }
    dirs::home_dir()
        .map(|home| home.join(".doppler"))
        .ok_or(ConfigError::NoConfigDir)
}

pub fn default_config_file() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Expands a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = if path == "~" {
        Some("")
    } else {
        path.strip_prefix("~/")
    };
    match (rest, dirs::home_dir()) {
        (Some(rest), Some(home)) if rest.is_empty() => home,
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Canonical form of a scope: `*`, or an absolute path without a trailing
/// separator. Symlinks are not resolved and the path need not exist.
pub fn normalize_scope(scope: &str) -> Result<String, ConfigError> {
    let scope = scope.trim();
    if scope == GLOBAL_SCOPE {
        return Ok(GLOBAL_SCOPE.to_string());
    }
    if scope.is_empty() {
        return Err(ConfigError::InvalidScope(scope.to_string()));
    }
    let expanded = expand_home(scope);
    let absolute = expanded
        .absolutize()
        .map_err(|_| ConfigError::InvalidScope(scope.to_string()))?;
    Ok(strip_trailing_separator(&absolute))
}

fn strip_trailing_separator(path: &Path) -> String {
    let text = path.to_string_lossy();
    let trimmed = text.trim_end_matches(MAIN_SEPARATOR);
    if trimmed.is_empty() {
        MAIN_SEPARATOR.to_string()
    } else {
        trimmed.to_string()
    }
}

fn with_separator(path: &str) -> String {
    if path.ends_with(MAIN_SEPARATOR) {
        path.to_string()
    } else {
        format!("{path}{MAIN_SEPARATOR}")
    }
}

/// Whether options persisted under `persisted` apply in `current`.
///
/// Separators are enforced at both ends, so `/a` matches `/a` and `/a/b`
/// but not `/abc`.
pub fn scope_matches(persisted: &str, current: &str) -> bool {
    if persisted == GLOBAL_SCOPE {
        return true;
    }
    let (Ok(persisted), Ok(current)) = (normalize_scope(persisted), normalize_scope(current))
    else {
        return false;
    };
    if current == GLOBAL_SCOPE {
        return false;
    }
    with_separator(&current).starts_with(&with_separator(&persisted))
}
