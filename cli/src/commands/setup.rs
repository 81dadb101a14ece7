use anyhow::bail;
use doppler_core::config::ConfigOption;
use serde_json::json;

use crate::cli::SetupArgs;
use crate::context::CommandContext;
use crate::output::prompt;

pub(crate) async fn run(ctx: &mut CommandContext, args: SetupArgs) -> anyhow::Result<()> {
    let api = ctx.api()?;

    let project = match ctx.project() {
        Ok(project) => project,
        Err(_) if !args.no_interactive => {
            let projects = api.list_projects(1, 100).await?;
            let slugs: Vec<String> = projects
                .into_iter()
                .map(|p| if p.slug.is_empty() { p.id } else { p.slug })
                .collect();
            choose("project", &slugs)?
        }
        Err(err) => return Err(err),
    };

    let config = match ctx.config_name() {
        Ok(config) => config,
        Err(_) if !args.no_interactive => {
            let configs = api.list_configs(&project, None).await?;
            let names: Vec<String> = configs.into_iter().map(|c| c.name).collect();
            choose("config", &names)?
        }
        Err(err) => return Err(err),
    };

    ctx.store.set(
        &ctx.scope,
        &[
            (ConfigOption::Project, project.clone()),
            (ConfigOption::Config, config.clone()),
        ],
    )?;
    ctx.refresh();

    if ctx.printer.is_json() {
        return ctx
            .printer
            .json(&json!({ "project": project, "config": config, "scope": ctx.scope }));
    }
    ctx.printer.success(&format!(
        "Configured {project}/{config} for {}",
        ctx.scope
    ));
    Ok(())
}

/// Lists `options` on stderr and reads a choice by number or name.
fn choose(what: &str, options: &[String]) -> anyhow::Result<String> {
    if options.is_empty() {
        bail!("no {what}s are available");
    }
    for (index, option) in options.iter().enumerate() {
        eprintln!("  {}. {option}", index + 1);
    }
    let answer = prompt(&format!("Select a {what}"))?;
    if let Ok(number) = answer.parse::<usize>()
        && let Some(option) = number.checked_sub(1).and_then(|i| options.get(i))
    {
        return Ok(option.clone());
    }
    match options.iter().find(|option| **option == answer) {
        Some(option) => Ok(option.clone()),
        None => bail!("invalid {what} {answer:?}"),
    }
}
