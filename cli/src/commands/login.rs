//! `login`, `login roll`, `login revoke` and `logout`.

use anyhow::Context;
use doppler_core::api::AUTH_POLL_INTERVAL;
use doppler_core::api::AUTH_POLL_TIMEOUT;
use doppler_core::api::models::AuthToken;
use doppler_core::api::models::HostInfo;
use doppler_core::config::ConfigOption;
use doppler_core::config::Source;
use serde_json::json;

use crate::cli::LoginArgs;
use crate::cli::LoginCommand;
use crate::cli::LogoutArgs;
use crate::context::CommandContext;

pub(crate) async fn run(ctx: &mut CommandContext, args: LoginArgs) -> anyhow::Result<()> {
    match args.command {
        None => login(ctx).await,
        Some(LoginCommand::Roll) => roll(ctx).await,
        Some(LoginCommand::Revoke) => {
            revoke(ctx).await?;
            ctx.printer.success("Auth token has been revoked");
            Ok(())
        }
    }
}

async fn login(ctx: &mut CommandContext) -> anyhow::Result<()> {
    let api = ctx.anonymous_api()?;
    let code = api
        .generate_auth_code(&HostInfo::current())
        .await
        .context("unable to start login")?;

    eprintln!("Complete authorization at {}", code.auth_url);
    eprintln!("Your auth code is: {}", code.code);
    eprintln!("Waiting...");

    let AuthToken {
        token,
        name,
        dashboard_url,
    } = api
        .poll_auth_token(&code.polling_code, AUTH_POLL_INTERVAL, AUTH_POLL_TIMEOUT)
        .await?;

    let dashboard_host = dashboard_url
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| ctx.config.dashboard_host.value.clone());
    let values = vec![
        (ConfigOption::Token, token),
        (ConfigOption::ApiHost, ctx.config.api_host.value.clone()),
        (ConfigOption::DashboardHost, dashboard_host),
    ];
    ctx.store.set(&ctx.scope, &values)?;
    ctx.refresh();

    if ctx.printer.is_json() {
        ctx.printer.json(&json!({ "name": name, "scope": ctx.scope }))
    } else if name.is_empty() {
        ctx.printer.success("You are logged in");
        Ok(())
    } else {
        ctx.printer.success(&format!("Welcome, {name}"));
        Ok(())
    }
}

async fn roll(ctx: &mut CommandContext) -> anyhow::Result<()> {
    let token_scope = persisted_token_scope(ctx);
    let new_token = ctx.api()?.roll_auth_token().await?;
    ctx.store
        .set(&token_scope, &[(ConfigOption::Token, new_token)])?;
    ctx.refresh();
    ctx.printer.success("Auth token has been rolled");
    Ok(())
}

/// Revokes the current token and removes it from the scope it was found
/// under.
async fn revoke(ctx: &mut CommandContext) -> anyhow::Result<()> {
    let token_scope = persisted_token_scope(ctx);
    ctx.api()?.revoke_auth_token().await?;
    ctx.store.unset(&token_scope, &[ConfigOption::Token])?;
    ctx.refresh();
    Ok(())
}

pub(crate) async fn logout(ctx: &mut CommandContext, args: LogoutArgs) -> anyhow::Result<()> {
    if args.no_revoke {
        let token_scope = persisted_token_scope(ctx);
        ctx.store.unset(&token_scope, &[ConfigOption::Token])?;
        ctx.refresh();
    } else {
        revoke(ctx).await?;
    }
    ctx.printer.success("You have been logged out");
    Ok(())
}

/// The scope holding the persisted token, or the command's scope when the
/// token came from a flag or the environment.
fn persisted_token_scope(ctx: &CommandContext) -> String {
    match ctx.config.token.source {
        Source::ConfigFile => ctx.config.token.scope.clone(),
        _ => ctx.scope.clone(),
    }
}
