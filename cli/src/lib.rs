pub mod cli;
mod commands;
pub mod context;
pub mod output;

use doppler_core::analytics;
use doppler_core::analytics::CommandEvent;
use doppler_core::config::Flag;
use doppler_core::run::RunError;
use tokio_util::sync::CancellationToken;

pub use cli::Cli;
use cli::Command;
use context::CommandContext;

/// Generic failure.
pub const EXIT_FAILURE: i32 = 1;
/// Reserved for installer permission failures.
pub const EXIT_PERMISSION: i32 = 2;
/// Reserved for missing crypto tooling in the installer.
pub const EXIT_MISSING_CRYPTO: i32 = 3;
/// Reserved for keyring directory ownership problems.
pub const EXIT_KEYRING_OWNERSHIP: i32 = 4;

/// Scope used when `--scope` is absent.
fn default_scope(command: &Command) -> &'static str {
    match command {
        Command::Login(_) | Command::Logout(_) | Command::Oidc(_) => "/",
        _ => ".",
    }
}

/// Runs one parsed invocation.
pub async fn run(cli: Cli, cancel: CancellationToken) -> anyhow::Result<()> {
    let Cli { global, command } = cli;
    if let Command::Completion(args) = &command {
        return commands::completion::run(args);
    }

    let mut ctx = CommandContext::load(global, cancel, default_scope(&command))?;
    let analytics = spawn_analytics(&ctx, &command);

    let result = commands::dispatch(&mut ctx, command).await;

    if let Some(handle) = analytics
        && result.is_ok()
    {
        let _ = handle.await;
    }
    result
}

fn spawn_analytics(ctx: &CommandContext, command: &Command) -> Option<tokio::task::JoinHandle<()>> {
    if !command.is_remote() || !ctx.store.flag(Flag::Analytics) {
        return None;
    }
    let api_host = ctx.config.api_host.value.clone();
    let verify_tls = ctx.config.verify_tls();
    let event = CommandEvent::new(command.name());
    Some(tokio::spawn(async move {
        analytics::send_event(&api_host, verify_tls, event).await;
    }))
}

/// Exit status for a failed invocation. A child's exit code passes
/// through unchanged.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<RunError>() {
        Some(RunError::ChildExit(code)) => *code,
        _ => EXIT_FAILURE,
    }
}

/// Whether the failure should be reported, as opposed to a child exit
/// that already spoke for itself.
pub fn should_report(err: &anyhow::Error) -> bool {
    !matches!(err.downcast_ref::<RunError>(), Some(RunError::ChildExit(_)))
}
