//! `secrets` and its subcommands.

use std::collections::BTreeMap;
use std::io::Read;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::bail;
use doppler_core::api::ApiClient;
use doppler_core::api::DownloadOptions;
use doppler_core::api::models::ChangeRequest;
use doppler_core::api::models::ComputedSecret;
use doppler_core::api::models::SecretsMap;
use doppler_core::api::models::SecretsUpdate;
use doppler_core::atomic_write::write_private;
use doppler_core::editor;

use crate::cli::DownloadArgs;
use crate::cli::NotesCommand;
use crate::cli::SecretsArgs;
use crate::cli::SecretsCommand;
use crate::context::CommandContext;
use crate::output::confirm;

const RESTRICTED: &str = "[RESTRICTED]";

fn shown_value(secret: &ComputedSecret, raw: bool) -> String {
    let value = if raw { &secret.raw } else { &secret.computed };
    value.clone().unwrap_or_else(|| RESTRICTED.to_string())
}

fn print_secrets(ctx: &CommandContext, secrets: &SecretsMap, raw: bool) -> anyhow::Result<()> {
    let rows = secrets
        .values()
        .map(|secret| vec![secret.name.clone(), shown_value(secret, raw)])
        .collect();
    ctx.printer.print(secrets, &["name", "value"], rows)
}

pub(crate) async fn run(ctx: &mut CommandContext, args: SecretsArgs) -> anyhow::Result<()> {
    let api = ctx.api()?;
    let project = ctx.project()?;
    let config = ctx.config_name()?;
    let raw = args.raw;

    match args.command {
        None if args.only_names => {
            let names = api.get_secret_names(&project, &config).await?;
            let rows = names.iter().map(|name| vec![name.clone()]).collect();
            ctx.printer.print(&names, &["name"], rows)
        }
        None => {
            let secrets = api.get_secrets(&project, &config, &[]).await?;
            print_secrets(ctx, &secrets, raw)
        }
        Some(SecretsCommand::Get { names, plain }) => {
            let secrets = api.get_secrets(&project, &config, &names).await?;
            if let Some(missing) = names.iter().find(|name| !secrets.contains_key(*name)) {
                bail!("could not find requested secret: {missing}");
            }
            if plain {
                for name in &names {
                    if let Some(secret) = secrets.get(name) {
                        ctx.printer.plain(&shown_value(secret, raw));
                    }
                }
                return Ok(());
            }
            print_secrets(ctx, &secrets, raw)
        }
        Some(SecretsCommand::Set { values }) => {
            let values = parse_values(&values, read_stdin)?;
            let secrets = api
                .set_secrets(&project, &config, &SecretsUpdate::Values(values))
                .await?;
            print_secrets(ctx, &secrets, raw)
        }
        Some(SecretsCommand::Delete { names, yes }) => {
            if !yes && !confirm(&format!("Delete secrets {}?", names.join(", ")))? {
                return Ok(());
            }
            let changes = names.into_iter().map(ChangeRequest::delete).collect();
            let secrets = api
                .set_secrets(&project, &config, &SecretsUpdate::ChangeRequests(changes))
                .await?;
            print_secrets(ctx, &secrets, raw)
        }
        Some(SecretsCommand::Download(download)) => {
            run_download(ctx, &api, &project, &config, download).await
        }
        Some(SecretsCommand::Upload { file }) => {
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("unable to read {}", file.display()))?;
            let secrets = api.upload_secrets(&project, &config, &contents).await?;
            print_secrets(ctx, &secrets, raw)
        }
        Some(SecretsCommand::Notes {
            command: NotesCommand::Set { secret, note },
        }) => {
            let note = api
                .set_secret_note(&project, &config, &secret, &note)
                .await?;
            ctx.printer
                .print(&note, &["secret", "note"], vec![vec![note.secret.clone(), note.note.clone()]])
        }
        Some(SecretsCommand::Edit) => run_edit(ctx, &api, &project, &config).await,
    }
}

/// `NAME=VALUE ...`, or a single `NAME` whose value comes from `stdin`.
fn parse_values(
    values: &[String],
    stdin: impl FnOnce() -> anyhow::Result<String>,
) -> anyhow::Result<BTreeMap<String, String>> {
    if let [name] = values
        && !name.contains('=')
    {
        let value = stdin()?;
        return Ok(BTreeMap::from([(name.clone(), value)]));
    }
    values
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
            _ => bail!("expected NAME=VALUE, got {pair:?}"),
        })
        .collect()
}

fn read_stdin() -> anyhow::Result<String> {
    let mut value = String::new();
    std::io::stdin()
        .read_to_string(&mut value)
        .context("unable to read the secret value from stdin")?;
    if value.ends_with('\n') {
        value.pop();
        if value.ends_with('\r') {
            value.pop();
        }
    }
    Ok(value)
}

async fn run_download(
    ctx: &CommandContext,
    api: &ApiClient,
    project: &str,
    config: &str,
    args: DownloadArgs,
) -> anyhow::Result<()> {
    let options = DownloadOptions {
        format: args.format.clone(),
        name_transformer: args.name_transformer,
        ..DownloadOptions::default()
    };
    let download = api.download_secrets(project, config, &options).await?;

    if args.no_file {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&download.body)?;
        stdout.flush()?;
        return Ok(());
    }

    let path = args
        .file
        .unwrap_or_else(|| PathBuf::from(format!("doppler.{}", args.format)));
    write_private(&path, &download.body)
        .with_context(|| format!("unable to write {}", path.display()))?;
    tracing::debug!("wrote secrets to {}", path.display());
    ctx.printer
        .success(&format!("Downloaded secrets to {}", path.display()));
    Ok(())
}

/// Raw values the editor may change. Restricted secrets are left out.
fn editable(secrets: &SecretsMap) -> BTreeMap<String, String> {
    secrets
        .values()
        .filter_map(|secret| Some((secret.name.clone(), secret.raw.clone()?)))
        .collect()
}

async fn run_edit(
    ctx: &CommandContext,
    api: &ApiClient,
    project: &str,
    config: &str,
) -> anyhow::Result<()> {
    let secrets = api.get_secrets(project, config, &[]).await?;
    let original = editable(&secrets);
    let editor_env = std::env::var("EDITOR").ok();
    let changes = editor::edit_secrets(&original, editor_env.as_deref()).await?;
    if changes.is_empty() {
        ctx.printer.success("No changes");
        return Ok(());
    }
    tracing::debug!("submitting {} change requests", changes.len());
    let secrets = api
        .set_secrets(project, config, &SecretsUpdate::ChangeRequests(changes))
        .await?;
    print_secrets(ctx, &secrets, true)
}
