//! Environment handed to child processes.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::ffi::OsString;

/// Never overwritten by an injected secret.
pub const PROTECTED_NAMES: [&str; 3] = ["PATH", "PS1", "HOME"];

/// Names that change how a shell, dynamic loader or interpreter behaves.
/// Injecting them is allowed but warned about.
pub const DANGEROUS_NAMES: &[&str] = &[
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "LD_AUDIT",
    "DYLD_INSERT_LIBRARIES",
    "DYLD_LIBRARY_PATH",
    "DYLD_FRAMEWORK_PATH",
    "DYLD_FALLBACK_LIBRARY_PATH",
    "WINDIR",
    "PROMPT_COMMAND",
    "BASH_ENV",
    "ENV",
    "IFS",
    "SHELLOPTS",
    "PS4",
    "PERL5OPT",
    "PYTHONPATH",
    "PYTHONSTARTUP",
    "NODE_OPTIONS",
    "RUBYOPT",
];

pub fn is_protected(name: &str) -> bool {
    PROTECTED_NAMES.contains(&name)
}

pub fn is_dangerous(name: &str) -> bool {
    DANGEROUS_NAMES.contains(&name)
}

/// The dangerous names present in `names`, sorted.
pub fn dangerous_names<'a>(names: impl IntoIterator<Item = &'a String>) -> Vec<&'a str> {
    let mut found: Vec<&str> = names
        .into_iter()
        .map(String::as_str)
        .filter(|name| is_dangerous(name))
        .collect();
    found.sort_unstable();
    found
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('=') && !name.contains('\0')
}

/// Overlays `secrets` on `parent`.
///
/// Parent variables are carried as `OsString` so values that are not valid
/// UTF-8 reach the child unchanged. Protected names always keep the parent's
/// value (or stay unset). With `preserve_env`, any name the parent already
/// defines keeps its value.
pub fn build_child_env<I>(
    parent: I,
    secrets: &BTreeMap<String, String>,
    preserve_env: bool,
) -> BTreeMap<OsString, OsString>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let mut env: BTreeMap<OsString, OsString> = parent.into_iter().collect();
    for (name, value) in secrets {
        if is_protected(name) {
            tracing::debug!("not overriding protected variable {name}");
            continue;
        }
        if !is_valid_name(name) || value.contains('\0') {
            tracing::warn!("skipping secret {name}: not representable as an environment variable");
            continue;
        }
        if preserve_env && env.contains_key(OsStr::new(name)) {
            tracing::debug!("preserving existing value of {name}");
            continue;
        }
        env.insert(OsString::from(name), OsString::from(value));
    }
    env
}
