//! `configs`, `configs logs` and `configs tokens`.

use anyhow::bail;
use doppler_core::api::ApiClient;
use doppler_core::api::TokenRef;
use doppler_core::api::models::Config;
use doppler_core::api::models::ConfigLog;
use doppler_core::api::models::ServiceToken;

use crate::cli::ConfigLogsArgs;
use crate::cli::ConfigLogsCommand;
use crate::cli::ConfigsArgs;
use crate::cli::ConfigsCommand;
use crate::cli::TokensArgs;
use crate::cli::TokensCommand;
use crate::commands::or_dash;
use crate::context::CommandContext;
use crate::output::confirm;

const HEADERS: [&str; 5] = ["name", "environment", "root", "locked", "created at"];

fn rows(configs: &[Config]) -> Vec<Vec<String>> {
    configs
        .iter()
        .map(|c| {
            vec![
                c.name.clone(),
                c.environment.clone(),
                c.root.to_string(),
                c.locked.to_string(),
                or_dash(c.created_at.as_deref()),
            ]
        })
        .collect()
}

fn print_config(ctx: &CommandContext, config: &Config) -> anyhow::Result<()> {
    ctx.printer
        .print(config, &HEADERS, rows(std::slice::from_ref(config)))
}

pub(crate) async fn run(ctx: &mut CommandContext, args: ConfigsArgs) -> anyhow::Result<()> {
    let api = ctx.api()?;
    let project = ctx.project()?;
    match args.command {
        None => {
            let configs = api
                .list_configs(&project, args.environment.as_deref())
                .await?;
            ctx.printer.print(&configs, &HEADERS, rows(&configs))
        }
        Some(ConfigsCommand::Get { name }) => {
            let config = api
                .get_config(&project, &ctx.config_or(name.as_deref())?)
                .await?;
            print_config(ctx, &config)
        }
        Some(ConfigsCommand::Create { name, environment }) => {
            let environment = match environment.or(args.environment) {
                Some(environment) => environment,
                None => environment_prefix(&name)?,
            };
            let config = api.create_config(&project, &environment, &name).await?;
            print_config(ctx, &config)
        }
        Some(ConfigsCommand::Update { name, new_name }) => {
            let config = api
                .update_config(&project, &ctx.config_or(name.as_deref())?, &new_name)
                .await?;
            print_config(ctx, &config)
        }
        Some(ConfigsCommand::Delete { name, yes }) => {
            let name = ctx.config_or(name.as_deref())?;
            if !yes && !confirm(&format!("Delete config {name}?"))? {
                return Ok(());
            }
            api.delete_config(&project, &name).await?;
            ctx.printer.success(&format!("Deleted config {name}"));
            Ok(())
        }
        Some(ConfigsCommand::Lock { name }) => {
            let config = api
                .lock_config(&project, &ctx.config_or(name.as_deref())?)
                .await?;
            print_config(ctx, &config)
        }
        Some(ConfigsCommand::Unlock { name }) => {
            let config = api
                .unlock_config(&project, &ctx.config_or(name.as_deref())?)
                .await?;
            print_config(ctx, &config)
        }
        Some(ConfigsCommand::Clone { name, new_name }) => {
            let config = api
                .clone_config(&project, &ctx.config_or(name.as_deref())?, &new_name)
                .await?;
            print_config(ctx, &config)
        }
        Some(ConfigsCommand::Logs(logs)) => run_logs(ctx, &api, &project, logs).await,
        Some(ConfigsCommand::Tokens(tokens)) => run_tokens(ctx, &api, &project, tokens).await,
    }
}

/// Branch configs are named `<environment>_<branch>`.
fn environment_prefix(name: &str) -> anyhow::Result<String> {
    match name.split_once('_') {
        Some((environment, branch)) if !environment.is_empty() && !branch.is_empty() => {
            Ok(environment.to_string())
        }
        _ => bail!("pass --environment, or name the config <environment>_<branch>"),
    }
}

const LOG_HEADERS: [&str; 4] = ["id", "text", "user", "created at"];

fn log_rows(logs: &[ConfigLog]) -> Vec<Vec<String>> {
    logs.iter()
        .map(|log| {
            vec![
                log.id.clone(),
                log.text.clone(),
                log.user.email.clone(),
                or_dash(log.created_at.as_deref()),
            ]
        })
        .collect()
}

async fn run_logs(
    ctx: &CommandContext,
    api: &ApiClient,
    project: &str,
    args: ConfigLogsArgs,
) -> anyhow::Result<()> {
    let config = ctx.config_name()?;
    match args.command {
        None => {
            let logs = api
                .list_config_logs(project, &config, args.page.page, args.page.per_page)
                .await?;
            ctx.printer.print(&logs, &LOG_HEADERS, log_rows(&logs))
        }
        Some(ConfigLogsCommand::Get { log }) => {
            let log = api.get_config_log(project, &config, &log).await?;
            let table = log_rows(std::slice::from_ref(&log));
            ctx.printer.print(&log, &LOG_HEADERS, table)
        }
        Some(ConfigLogsCommand::Rollback { log }) => {
            let log = api.rollback_config_log(project, &config, &log).await?;
            let table = log_rows(std::slice::from_ref(&log));
            ctx.printer.print(&log, &LOG_HEADERS, table)
        }
    }
}

const TOKEN_HEADERS: [&str; 5] = ["name", "slug", "access", "created at", "expires at"];

fn token_rows(tokens: &[ServiceToken]) -> Vec<Vec<String>> {
    tokens
        .iter()
        .map(|t| {
            vec![
                t.name.clone(),
                t.slug.clone(),
                or_dash(t.access.as_deref()),
                or_dash(t.created_at.as_deref()),
                or_dash(t.expires_at.as_deref()),
            ]
        })
        .collect()
}

async fn run_tokens(
    ctx: &CommandContext,
    api: &ApiClient,
    project: &str,
    args: TokensArgs,
) -> anyhow::Result<()> {
    let config = ctx.config_name()?;
    match args.command {
        None => {
            let tokens = api.list_service_tokens(project, &config).await?;
            ctx.printer.print(&tokens, &TOKEN_HEADERS, token_rows(&tokens))
        }
        Some(TokensCommand::Create {
            name,
            expire_at,
            access,
            plain,
        }) => {
            let token = api
                .create_service_token(project, &config, &name, expire_at.as_deref(), &access)
                .await?;
            if plain {
                ctx.printer.plain(token.key.as_deref().unwrap_or_default());
                return Ok(());
            }
            let mut table = token_rows(std::slice::from_ref(&token));
            let mut headers = TOKEN_HEADERS.to_vec();
            headers.push("token");
            if let Some(row) = table.first_mut() {
                row.push(token.key.clone().unwrap_or_default());
            }
            ctx.printer.print(&token, &headers, table)
        }
        Some(TokensCommand::Revoke { token, value }) => {
            let reference = if value {
                TokenRef::Value(token)
            } else {
                TokenRef::Slug(token)
            };
            api.revoke_service_token(project, &config, &reference).await?;
            ctx.printer.success("Service token has been revoked");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn branch_config_names_carry_their_environment() {
        assert_eq!(environment_prefix("dev_feature").unwrap(), "dev");
        assert!(environment_prefix("dev").is_err());
        assert!(environment_prefix("_x").is_err());
    }
}
