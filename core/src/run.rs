//! Fetch secrets, keep the encrypted fallback copy current, and run a child
//! process with the secrets in its environment.
//!
//! A run moves through `resolve -> fetched | recovered | failed -> exec`:
//! the network fetch either succeeds (and refreshes the fallback file), or
//! fails with a transport error and the fallback file is read instead.
//! Cache writes finish before the child starts.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitStatus;

use crate::api::ApiClient;
use crate::api::DownloadOptions;
use crate::api::parse_download_json;
use crate::error::ApiError;
use crate::exec_env::build_child_env;
use crate::exec_env::dangerous_names;
use crate::fallback::FallbackError;
use crate::fallback::FallbackIdentity;
use crate::fallback::FallbackStore;

/// Format the run pipeline downloads and caches.
pub const RUN_FORMAT: &str = "json";

pub const DEFAULT_SHELL: &str = "/bin/sh";

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Fallback(#[from] FallbackError),

    #[error("unable to fetch secrets ({cause}) and no fallback file exists at {}", path.display())]
    FallbackMissing { path: PathBuf, cause: String },

    #[error("unable to write fallback file: {0}")]
    FallbackWrite(#[source] FallbackError),

    #[error("{0}")]
    UserInput(String),

    #[error("unable to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to wait for child process: {0}")]
    Wait(#[source] std::io::Error),

    /// The child exited unsuccessfully; the CLI exits with the same code.
    #[error("command exited with code {0}")]
    ChildExit(i32),
}

/// Where the encrypted copy lives and how it may be used.
#[derive(Debug, Clone)]
pub struct FallbackSettings {
    pub path: PathBuf,
    pub metadata_dir: PathBuf,
    pub passphrase: Option<String>,
    /// Read the cache on failure but never write it.
    pub readonly: bool,
    /// Skip the network entirely.
    pub only: bool,
    /// Treat a failed cache write as fatal.
    pub exit_on_write_failure: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub project: String,
    pub config: String,
    pub name_transformer: Option<String>,
    pub only_secrets: Vec<String>,
    pub fallback: Option<FallbackSettings>,
    /// Send the cached ETag so an unchanged config answers 304.
    pub use_cache: bool,
}

impl FetchOptions {
    pub fn identity(&self, token: &str) -> FallbackIdentity {
        FallbackIdentity {
            token: token.to_string(),
            project: self.project.clone(),
            config: self.config.clone(),
            format: RUN_FORMAT.to_string(),
            name_transformer: self.name_transformer.clone(),
            secret_names: self.only_secrets.clone(),
        }
    }
}

/// Where the secrets handed to the child came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretsSource {
    /// Fresh download.
    Api,
    /// The server answered 304 and the cache was current.
    NotModified,
    /// The network failed, or was skipped, and the cache was used.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedSecrets {
    pub secrets: BTreeMap<String, String>,
    pub source: SecretsSource,
}

fn fallback_store<'a>(
    api: &ApiClient,
    options: &'a FetchOptions,
) -> Option<(FallbackStore, &'a FallbackSettings)> {
    let settings = options.fallback.as_ref()?;
    let store = FallbackStore::new(
        &options.identity(api.token()),
        settings.path.clone(),
        settings.metadata_dir.clone(),
        settings.passphrase.clone(),
    );
    Some((store, settings))
}

fn recover(store: &FallbackStore, cause: String) -> Result<FetchedSecrets, RunError> {
    match store.read()? {
        Some(secrets) => Ok(FetchedSecrets {
            secrets,
            source: SecretsSource::Fallback,
        }),
        None => Err(RunError::FallbackMissing {
            path: store.path().to_path_buf(),
            cause,
        }),
    }
}

/// Reads the fallback file when `err` is a transport failure; any other
/// error is returned as is.
fn recover_from(
    fallback: Option<&(FallbackStore, &FallbackSettings)>,
    err: ApiError,
) -> Result<FetchedSecrets, RunError> {
    match fallback {
        Some((store, _)) if err.is_transport() => {
            tracing::warn!("Unable to fetch secrets from the API, reading from the fallback file");
            tracing::debug!("fetch error: {err}");
            recover(store, err.to_string())
        }
        _ => Err(err.into()),
    }
}

/// Fetches the secrets for a run, using and maintaining the fallback file.
pub async fn fetch_secrets(api: &ApiClient, options: &FetchOptions) -> Result<FetchedSecrets, RunError> {
    let fallback = fallback_store(api, options);

    if let Some((store, settings)) = &fallback
        && settings.only
    {
        tracing::debug!("reading secrets from fallback file {}", store.path().display());
        return recover(store, "network skipped".to_string());
    }

    let etag = match &fallback {
        Some((store, _)) if options.use_cache => store.cached_etag(),
        _ => None,
    };
    let mut download_options = DownloadOptions {
        format: RUN_FORMAT.to_string(),
        name_transformer: options.name_transformer.clone(),
        secrets: options.only_secrets.clone(),
        etag,
    };

    let mut download = match api
        .download_secrets(&options.project, &options.config, &download_options)
        .await
    {
        Ok(download) => download,
        Err(err) => return recover_from(fallback.as_ref(), err),
    };

    if download.not_modified {
        if let Some((store, _)) = &fallback
            && let Ok(Some(secrets)) = store.read()
        {
            tracing::debug!("secrets unchanged, using cached copy");
            return Ok(FetchedSecrets {
                secrets,
                source: SecretsSource::NotModified,
            });
        }
        tracing::debug!("cached copy unusable after 304, downloading again");
        download_options.etag = None;
        download = match api
            .download_secrets(&options.project, &options.config, &download_options)
            .await
        {
            Ok(download) => download,
            Err(err) => return recover_from(fallback.as_ref(), err),
        };
    }

    let secrets = parse_download_json(&download.body)?;

    if let Some((store, settings)) = &fallback
        && !settings.readonly
    {
        if let Err(err) = store.write(&download.body, download.etag.as_deref()) {
            if settings.exit_on_write_failure {
                return Err(RunError::FallbackWrite(err));
            }
            tracing::warn!("Unable to write fallback file: {err}");
        }
    }

    Ok(FetchedSecrets {
        secrets,
        source: SecretsSource::Api,
    })
}

/// What to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildCommand {
    /// Program and arguments, executed directly.
    Argv(Vec<String>),
    /// A command line handed to `$SHELL -c`.
    Shell(String),
}

impl ChildCommand {
    fn program_and_args(&self) -> Result<(String, Vec<String>), RunError> {
        match self {
            ChildCommand::Argv(argv) => {
                let (program, args) = argv
                    .split_first()
                    .ok_or_else(|| RunError::UserInput("no command specified".to_string()))?;
                Ok((program.clone(), args.to_vec()))
            }
            ChildCommand::Shell(line) => {
                let shell = std::env::var("SHELL")
                    .ok()
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| DEFAULT_SHELL.to_string());
                Ok((shell, vec!["-c".to_string(), line.clone()]))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecOptions {
    pub command: ChildCommand,
    pub preserve_env: bool,
    pub warn_dangerous: bool,
}

/// The child's exit code, or `128 + signal` when it was killed by one.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// Spawns the child with `env` as its complete environment and waits.
///
/// Interrupts reach the child through the terminal's process group; the
/// parent keeps waiting so it can report the child's exit code.
pub async fn exec_child(
    command: &ChildCommand,
    env: &BTreeMap<OsString, OsString>,
) -> Result<i32, RunError> {
    let (program, args) = command.program_and_args()?;
    tracing::debug!("executing {program}");
    let mut child = tokio::process::Command::new(&program)
        .args(&args)
        .env_clear()
        .envs(env)
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| RunError::Spawn {
            command: program.clone(),
            source,
        })?;

    let status = loop {
        tokio::select! {
            status = child.wait() => break status.map_err(RunError::Wait)?,
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("interrupt received, waiting for {program} to exit");
            }
        }
    };
    Ok(exit_code(status))
}

/// Builds the child environment from the current process and `secrets`,
/// warning about dangerous names.
pub fn child_env(
    secrets: &BTreeMap<String, String>,
    options: &ExecOptions,
) -> BTreeMap<OsString, OsString> {
    if options.warn_dangerous {
        for name in dangerous_names(secrets.keys()) {
            tracing::warn!("Secret {name} can alter how the child process or its shell behaves");
        }
    }
    build_child_env(std::env::vars_os(), secrets, options.preserve_env)
}

/// The whole `run` pipeline. Returns the child's exit code.
pub async fn run(api: &ApiClient, fetch: &FetchOptions, exec: &ExecOptions) -> Result<i32, RunError> {
    let fetched = fetch_secrets(api, fetch).await?;
    if fetched.source == SecretsSource::Fallback {
        tracing::info!("using {} secrets from the fallback file", fetched.secrets.len());
    }
    let env = child_env(&fetched.secrets, exec);
    exec_child(&exec.command, &env).await
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::sync::Mutex;
    use tracing_subscriber::fmt::MakeWriter;

    #[tokio::test]
    async fn exit_codes_pass_through() {
        let env = BTreeMap::from([(OsString::from("PATH"), OsString::from("/usr/bin:/bin"))]);
        let code = exec_child(&ChildCommand::Shell("exit 7".to_string()), &env)
            .await
            .unwrap();
        assert_eq!(code, 7);
        let code = exec_child(
            &ChildCommand::Argv(vec!["/bin/sh".to_string(), "-c".to_string(), "true".to_string()]),
            &env,
        )
        .await
        .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn signal_exit_is_offset_by_128() {
        let env = BTreeMap::from([(OsString::from("PATH"), OsString::from("/usr/bin:/bin"))]);
        let code = exec_child(&ChildCommand::Shell("kill -TERM $$".to_string()), &env)
            .await
            .unwrap();
        assert_eq!(code, 128 + 15);
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let err = exec_child(
            &ChildCommand::Argv(vec!["/definitely/not/here".to_string()]),
            &BTreeMap::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RunError::Spawn { .. }), "{err}");

        let err = exec_child(&ChildCommand::Argv(Vec::new()), &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::UserInput(_)));
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn child_env_logging(
        secrets: &BTreeMap<String, String>,
        warn_dangerous: bool,
    ) -> (BTreeMap<OsString, OsString>, String) {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();
        let options = ExecOptions {
            command: ChildCommand::Shell("true".to_string()),
            preserve_env: false,
            warn_dangerous,
        };
        let env = tracing::subscriber::with_default(subscriber, || child_env(secrets, &options));
        (env, logs.text())
    }

    #[test]
    fn dangerous_secrets_warn_unless_disabled() {
        let secrets = BTreeMap::from([
            ("LD_PRELOAD".to_string(), "x.so".to_string()),
            ("API_KEY".to_string(), "k".to_string()),
        ]);

        let (env, logs) = child_env_logging(&secrets, true);
        assert!(logs.contains("Secret LD_PRELOAD can alter"), "{logs}");
        assert!(!logs.contains("API_KEY"), "{logs}");
        assert_eq!(env[&OsString::from("LD_PRELOAD")], "x.so");

        let (env, logs) = child_env_logging(&secrets, false);
        assert!(!logs.contains("LD_PRELOAD"), "{logs}");
        assert_eq!(env[&OsString::from("LD_PRELOAD")], "x.so");
    }

    #[test]
    fn secret_ps1_never_replaces_the_parent_prompt() {
        let secrets = BTreeMap::from([("PS1".to_string(), "pwned> ".to_string())]);
        let (env, _) = child_env_logging(&secrets, true);
        assert_eq!(env.get(&OsString::from("PS1")), std::env::var_os("PS1").as_ref());
    }

    #[test]
    fn fingerprint_identity_uses_json_format() {
        let options = FetchOptions {
            project: "p".to_string(),
            config: "c".to_string(),
            only_secrets: vec!["B".to_string(), "A".to_string()],
            ..FetchOptions::default()
        };
        let identity = options.identity("tok");
        assert_eq!(identity.format, RUN_FORMAT);
        assert_eq!(identity.secret_names, vec!["B".to_string(), "A".to_string()]);
    }
}
