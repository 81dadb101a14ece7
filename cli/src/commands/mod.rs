//! One module per top-level command.

pub(crate) mod activity;
pub(crate) mod analytics;
pub(crate) mod completion;
pub(crate) mod configs;
pub(crate) mod configure;
pub(crate) mod environments;
pub(crate) mod import;
pub(crate) mod login;
pub(crate) mod me;
pub(crate) mod oidc;
pub(crate) mod projects;
pub(crate) mod run;
pub(crate) mod secrets;
pub(crate) mod setup;

use crate::cli::Command;
use crate::context::CommandContext;

pub(crate) async fn dispatch(ctx: &mut CommandContext, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Login(args) => login::run(ctx, args).await,
        Command::Logout(args) => login::logout(ctx, args).await,
        Command::Me => me::run(ctx).await,
        Command::Setup(args) => setup::run(ctx, args).await,
        Command::Configure(args) => configure::run(ctx, args),
        Command::Projects(args) => projects::run(ctx, args).await,
        Command::Environments(args) => environments::run(ctx, args).await,
        Command::Configs(args) => configs::run(ctx, args).await,
        Command::Secrets(args) => secrets::run(ctx, args).await,
        Command::Run(args) => run::run(ctx, args).await,
        Command::Activity(args) => activity::run(ctx, args).await,
        Command::Import(args) => import::run(ctx, args).await,
        Command::Oidc(args) => oidc::run(ctx, args).await,
        Command::Analytics(args) => analytics::run(ctx, args),
        Command::Completion(args) => completion::run(&args),
    }
}

/// Renders an optional timestamp for tables.
pub(crate) fn or_dash(value: Option<&str>) -> String {
    value.filter(|v| !v.is_empty()).unwrap_or("-").to_string()
}
