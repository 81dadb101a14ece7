//! Command-line surface of the `doppler` binary.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap_complete::Shell;
use doppler_core::config::FlagOverrides;

#[derive(Debug, Parser)]
#[command(
    name = "doppler",
    version,
    about = "Fetch and manage secrets, and run processes with them injected"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags accepted by every command.
#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Token used to authenticate with the API.
    #[arg(long, global = true, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Project slug.
    #[arg(short = 'p', long, global = true)]
    pub project: Option<String>,

    /// Config name.
    #[arg(short = 'c', long, global = true)]
    pub config: Option<String>,

    #[arg(long, global = true, value_name = "URL")]
    pub api_host: Option<String>,

    #[arg(long, global = true, value_name = "URL")]
    pub dashboard_host: Option<String>,

    /// Skip TLS certificate verification.
    #[arg(long, global = true)]
    pub no_verify_tls: bool,

    /// Disable the per-request timeout.
    #[arg(long, global = true)]
    pub no_timeout: bool,

    /// Per-request timeout, e.g. `10s`, `500ms`, `2m`.
    #[arg(long, global = true, value_parser = parse_duration, default_value = "10s")]
    pub timeout: Duration,

    /// Attempts per request, including the first.
    #[arg(long, global = true, default_value_t = 5)]
    pub attempts: usize,

    /// Directory the configuration is resolved for.
    #[arg(long, global = true, value_name = "DIR")]
    pub scope: Option<String>,

    /// Configuration file to use instead of the default.
    #[arg(long, global = true, value_name = "FILE")]
    pub configuration: Option<PathBuf>,

    /// Print output and errors as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose logging and full error chains.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Ignore DOPPLER_* environment variables.
    #[arg(long, global = true)]
    pub no_read_env: bool,
}

impl GlobalArgs {
    /// The explicitly given option flags, for the resolver's flag tier.
    pub fn overrides(&self) -> FlagOverrides {
        FlagOverrides {
            token: self.token.clone(),
            project: self.project.clone(),
            config: self.config.clone(),
            api_host: self.api_host.clone(),
            dashboard_host: self.dashboard_host.clone(),
            no_verify_tls: self.no_verify_tls.then_some(true),
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (!self.no_timeout).then_some(self.timeout)
    }
}

/// Parses `500ms`, `10s`, `2m`, or a bare number of seconds.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let (number, unit) = match value.find(|c: char| !c.is_ascii_digit()) {
        Some(index) => value.split_at(index),
        None => (value, "s"),
    };
    let number: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration {value:?}"))?;
    match unit {
        "ms" => Ok(Duration::from_millis(number)),
        "s" => Ok(Duration::from_secs(number)),
        "m" => Ok(Duration::from_secs(number * 60)),
        _ => Err(format!("invalid duration unit in {value:?}; use ms, s or m")),
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Authorize this device through the dashboard.
    Login(LoginArgs),
    /// Revoke the current token and remove it from the configuration.
    Logout(LogoutArgs),
    /// Show the identity behind the current token.
    Me,
    /// Pick the project and config for the current directory.
    Setup(SetupArgs),
    /// View and change the persisted configuration.
    Configure(ConfigureArgs),
    Projects(ProjectsArgs),
    Environments(EnvironmentsArgs),
    Configs(ConfigsArgs),
    Secrets(SecretsArgs),
    /// Run a command with secrets injected into its environment.
    Run(RunArgs),
    /// Workplace activity logs.
    Activity(ActivityArgs),
    /// Create projects from a template file.
    Import(ImportArgs),
    /// Authenticate with an identity provider token.
    Oidc(OidcArgs),
    /// Anonymous usage analytics.
    Analytics(AnalyticsArgs),
    /// Print a shell completion script.
    Completion(CompletionArgs),
}

impl Command {
    /// Command path reported to analytics.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Login(_) => "login",
            Command::Logout(_) => "logout",
            Command::Me => "me",
            Command::Setup(_) => "setup",
            Command::Configure(_) => "configure",
            Command::Projects(_) => "projects",
            Command::Environments(_) => "environments",
            Command::Configs(_) => "configs",
            Command::Secrets(_) => "secrets",
            Command::Run(_) => "run",
            Command::Activity(_) => "activity",
            Command::Import(_) => "import",
            Command::Oidc(_) => "oidc",
            Command::Analytics(_) => "analytics",
            Command::Completion(_) => "completion",
        }
    }

    /// Whether the command talks to the API.
    pub fn is_remote(&self) -> bool {
        !matches!(
            self,
            Command::Configure(_) | Command::Analytics(_) | Command::Completion(_)
        )
    }
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    #[command(subcommand)]
    pub command: Option<LoginCommand>,
}

#[derive(Debug, Subcommand)]
pub enum LoginCommand {
    /// Replace the current token with a new one.
    Roll,
    /// Revoke the current token.
    Revoke,
}

#[derive(Debug, Args)]
pub struct LogoutArgs {
    /// Remove the token locally without revoking it.
    #[arg(long)]
    pub no_revoke: bool,
}

#[derive(Debug, Args)]
pub struct SetupArgs {
    /// Fail instead of prompting when the project or config is missing.
    #[arg(long)]
    pub no_interactive: bool,
}

#[derive(Debug, Args)]
pub struct ConfigureArgs {
    #[command(subcommand)]
    pub command: Option<ConfigureCommand>,

    /// Show every scope, not just the one in effect.
    #[arg(long)]
    pub all: bool,
}

#[derive(Debug, Subcommand)]
pub enum ConfigureCommand {
    /// Print option values for the scope.
    Get {
        #[arg(required = true)]
        options: Vec<String>,
        /// Print only the values.
        #[arg(long)]
        plain: bool,
    },
    /// Set options on the scope: `name=value ...` or `name value`.
    Set {
        #[arg(required = true)]
        values: Vec<String>,
    },
    /// Remove options from the scope.
    Unset {
        #[arg(required = true)]
        options: Vec<String>,
    },
    /// List the available options.
    Options,
    /// Show how every option was resolved.
    Debug,
    /// Feature flags.
    Flags {
        #[command(subcommand)]
        command: Option<FlagsCommand>,
    },
}

#[derive(Debug, Subcommand)]
pub enum FlagsCommand {
    Get { flag: String },
    Enable { flag: String },
    Disable { flag: String },
    /// Restore the default value.
    Reset { flag: String },
}

#[derive(Debug, Args)]
pub struct PageArgs {
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    #[arg(long, default_value_t = doppler_core::api::DEFAULT_PER_PAGE)]
    pub per_page: u32,
}

#[derive(Debug, Args)]
pub struct ProjectsArgs {
    #[command(subcommand)]
    pub command: Option<ProjectsCommand>,

    #[command(flatten)]
    pub page: PageArgs,
}

#[derive(Debug, Subcommand)]
pub enum ProjectsCommand {
    Get {
        project: Option<String>,
    },
    Create {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    Update {
        project: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    Delete {
        project: Option<String>,
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Debug, Args)]
pub struct EnvironmentsArgs {
    #[command(subcommand)]
    pub command: Option<EnvironmentsCommand>,
}

#[derive(Debug, Subcommand)]
pub enum EnvironmentsCommand {
    Get {
        environment: String,
    },
    Create {
        name: String,
        slug: String,
    },
    Delete {
        environment: String,
        #[arg(long, short = 'y')]
        yes: bool,
    },
    Rename {
        environment: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        slug: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct ConfigsArgs {
    #[command(subcommand)]
    pub command: Option<ConfigsCommand>,

    /// Only list configs in this environment.
    #[arg(long, short = 'e')]
    pub environment: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum ConfigsCommand {
    Get {
        name: Option<String>,
    },
    Create {
        name: String,
        #[arg(long, short = 'e')]
        environment: Option<String>,
    },
    /// Rename a config.
    Update {
        name: Option<String>,
        #[arg(long = "name", id = "new_name")]
        new_name: String,
    },
    Delete {
        name: Option<String>,
        #[arg(long, short = 'y')]
        yes: bool,
    },
    Lock {
        name: Option<String>,
    },
    Unlock {
        name: Option<String>,
    },
    Clone {
        name: Option<String>,
        #[arg(long = "name", id = "clone_name")]
        new_name: String,
    },
    /// Change history of a config.
    Logs(ConfigLogsArgs),
    /// Service tokens of a config.
    Tokens(TokensArgs),
}

#[derive(Debug, Args)]
pub struct ConfigLogsArgs {
    #[command(subcommand)]
    pub command: Option<ConfigLogsCommand>,

    #[command(flatten)]
    pub page: PageArgs,
}

#[derive(Debug, Subcommand)]
pub enum ConfigLogsCommand {
    Get { log: String },
    Rollback { log: String },
}

#[derive(Debug, Args)]
pub struct TokensArgs {
    #[command(subcommand)]
    pub command: Option<TokensCommand>,
}

#[derive(Debug, Subcommand)]
pub enum TokensCommand {
    Create {
        name: String,
        /// Expiry as an RFC 3339 timestamp.
        #[arg(long)]
        expire_at: Option<String>,
        #[arg(long, default_value = "read", value_parser = ["read", "read/write"])]
        access: String,
        /// Print only the token value.
        #[arg(long)]
        plain: bool,
    },
    Revoke {
        /// Token slug, or the token itself with `--value`.
        token: String,
        #[arg(long)]
        value: bool,
    },
}

#[derive(Debug, Args)]
pub struct SecretsArgs {
    #[command(subcommand)]
    pub command: Option<SecretsCommand>,

    /// Show raw values instead of computed ones.
    #[arg(long, global = true)]
    pub raw: bool,

    /// Only list names.
    #[arg(long)]
    pub only_names: bool,
}

#[derive(Debug, Subcommand)]
pub enum SecretsCommand {
    Get {
        #[arg(required = true)]
        names: Vec<String>,
        /// Print only the values, one per line.
        #[arg(long)]
        plain: bool,
    },
    /// `NAME=VALUE ...`, or a single `NAME` with the value read from stdin.
    Set {
        #[arg(required = true)]
        values: Vec<String>,
    },
    Delete {
        #[arg(required = true)]
        names: Vec<String>,
        #[arg(long, short = 'y')]
        yes: bool,
    },
    Download(DownloadArgs),
    /// Upload a secrets file (env, json or yaml).
    Upload {
        file: PathBuf,
    },
    Notes {
        #[command(subcommand)]
        command: NotesCommand,
    },
    /// Edit secrets in $EDITOR.
    Edit,
}

#[derive(Debug, Subcommand)]
pub enum NotesCommand {
    Set { secret: String, note: String },
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Destination file. Defaults to `doppler.<format>` in the current directory.
    pub file: Option<PathBuf>,

    #[arg(long, default_value = "json")]
    pub format: String,

    #[arg(long)]
    pub name_transformer: Option<String>,

    /// Print to stdout instead of writing a file.
    #[arg(long)]
    pub no_file: bool,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Command line run through `$SHELL -c`.
    #[arg(long, conflicts_with = "args")]
    pub command: Option<String>,

    /// Encrypted fallback file.
    #[arg(long, value_name = "PATH")]
    pub fallback: Option<PathBuf>,

    /// Disable the fallback file entirely.
    #[arg(long)]
    pub no_fallback: bool,

    /// Read the fallback file but never update it.
    #[arg(long)]
    pub fallback_readonly: bool,

    /// Skip the API and read only the fallback file.
    #[arg(long)]
    pub fallback_only: bool,

    /// Continue when the fallback file cannot be written.
    #[arg(long)]
    pub no_exit_on_write_failure: bool,

    /// Passphrase for the fallback file.
    #[arg(long)]
    pub passphrase: Option<String>,

    /// Do not send the cached ETag.
    #[arg(long)]
    pub no_cache: bool,

    /// Existing environment variables take precedence over secrets.
    #[arg(long)]
    pub preserve_env: bool,

    /// Only fetch these secrets.
    #[arg(long, value_delimiter = ',')]
    pub only_secrets: Vec<String>,

    #[arg(long)]
    pub name_transformer: Option<String>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    pub args: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ActivityArgs {
    #[command(subcommand)]
    pub command: Option<ActivityCommand>,

    #[command(flatten)]
    pub page: PageArgs,
}

#[derive(Debug, Subcommand)]
pub enum ActivityCommand {
    Get { log: String },
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    #[arg(default_value = "doppler-template.yaml")]
    pub template: PathBuf,
}

#[derive(Debug, Args)]
pub struct OidcArgs {
    #[command(subcommand)]
    pub command: OidcCommand,
}

#[derive(Debug, Subcommand)]
pub enum OidcCommand {
    Login {
        /// Service account identity id.
        #[arg(long)]
        identity: String,
        /// Token issued by the identity provider.
        #[arg(long = "oidc-token")]
        oidc_token: String,
    },
    Logout,
}

#[derive(Debug, Args)]
pub struct AnalyticsArgs {
    #[command(subcommand)]
    pub command: AnalyticsCommand,
}

#[derive(Debug, Subcommand)]
pub enum AnalyticsCommand {
    Status,
    Enable,
    Disable,
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    #[arg(value_enum)]
    pub shell: Shell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn durations_accept_units_and_bare_seconds() {
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration("10s"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("7"), Ok(Duration::from_secs(7)));
        assert!(parse_duration("1h").is_err());
        assert!(parse_duration("fast").is_err());
    }

    #[test]
    fn run_collects_trailing_command() {
        let cli = Cli::parse_from(["doppler", "run", "--preserve-env", "--", "env", "-0"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.preserve_env);
        assert_eq!(args.args, vec!["env", "-0"]);
    }

    #[test]
    fn global_flags_become_overrides() {
        let cli = Cli::parse_from([
            "doppler",
            "secrets",
            "--project",
            "backend",
            "--no-verify-tls",
        ]);
        let overrides = cli.global.overrides();
        assert_eq!(overrides.project.as_deref(), Some("backend"));
        assert_eq!(overrides.config, None);
        assert_eq!(overrides.no_verify_tls, Some(true));
    }
}
