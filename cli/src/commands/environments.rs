use doppler_core::api::models::Environment;

use crate::cli::EnvironmentsArgs;
use crate::cli::EnvironmentsCommand;
use crate::commands::or_dash;
use crate::context::CommandContext;
use crate::output::confirm;

const HEADERS: [&str; 5] = ["id", "name", "slug", "project", "created at"];

fn rows(environments: &[Environment]) -> Vec<Vec<String>> {
    environments
        .iter()
        .map(|e| {
            vec![
                e.id.clone(),
                e.name.clone(),
                e.slug.clone(),
                e.project.clone(),
                or_dash(e.created_at.as_deref()),
            ]
        })
        .collect()
}

pub(crate) async fn run(ctx: &mut CommandContext, args: EnvironmentsArgs) -> anyhow::Result<()> {
    let api = ctx.api()?;
    let project = ctx.project()?;
    match args.command {
        None => {
            let environments = api.list_environments(&project).await?;
            ctx.printer.print(&environments, &HEADERS, rows(&environments))
        }
        Some(EnvironmentsCommand::Get { environment }) => {
            let environment = api.get_environment(&project, &environment).await?;
            let table = rows(std::slice::from_ref(&environment));
            ctx.printer.print(&environment, &HEADERS, table)
        }
        Some(EnvironmentsCommand::Create { name, slug }) => {
            let environment = api.create_environment(&project, &name, &slug).await?;
            let table = rows(std::slice::from_ref(&environment));
            ctx.printer.print(&environment, &HEADERS, table)
        }
        Some(EnvironmentsCommand::Delete { environment, yes }) => {
            if !yes && !confirm(&format!("Delete environment {environment}?"))? {
                return Ok(());
            }
            api.delete_environment(&project, &environment).await?;
            ctx.printer
                .success(&format!("Deleted environment {environment}"));
            Ok(())
        }
        Some(EnvironmentsCommand::Rename {
            environment,
            name,
            slug,
        }) => {
            let environment = api
                .rename_environment(&project, &environment, name.as_deref(), slug.as_deref())
                .await?;
            let table = rows(std::slice::from_ref(&environment));
            ctx.printer.print(&environment, &HEADERS, table)
        }
    }
}
