use anyhow::bail;
use doppler_core::api::models::Project;

use crate::cli::ProjectsArgs;
use crate::cli::ProjectsCommand;
use crate::commands::or_dash;
use crate::context::CommandContext;
use crate::output::confirm;

const HEADERS: [&str; 4] = ["id", "name", "description", "created at"];

fn rows(projects: &[Project]) -> Vec<Vec<String>> {
    projects
        .iter()
        .map(|p| {
            vec![
                p.id.clone(),
                p.name.clone(),
                p.description.clone(),
                or_dash(p.created_at.as_deref()),
            ]
        })
        .collect()
}

pub(crate) async fn run(ctx: &mut CommandContext, args: ProjectsArgs) -> anyhow::Result<()> {
    let api = ctx.api()?;
    match args.command {
        None => {
            let projects = api
                .list_projects(args.page.page, args.page.per_page)
                .await?;
            ctx.printer.print(&projects, &HEADERS, rows(&projects))
        }
        Some(ProjectsCommand::Get { project }) => {
            let project = api.get_project(&ctx.project_or(project.as_deref())?).await?;
            let table = rows(std::slice::from_ref(&project));
            ctx.printer.print(&project, &HEADERS, table)
        }
        Some(ProjectsCommand::Create { name, description }) => {
            let project = api.create_project(&name, &description).await?;
            let table = rows(std::slice::from_ref(&project));
            ctx.printer.print(&project, &HEADERS, table)
        }
        Some(ProjectsCommand::Update {
            project,
            name,
            description,
        }) => {
            if name.is_none() && description.is_none() {
                bail!("pass --name or --description to update a project");
            }
            let slug = ctx.project_or(project.as_deref())?;
            let project = api
                .update_project(&slug, name.as_deref(), description.as_deref())
                .await?;
            let table = rows(std::slice::from_ref(&project));
            ctx.printer.print(&project, &HEADERS, table)
        }
        Some(ProjectsCommand::Delete { project, yes }) => {
            let slug = ctx.project_or(project.as_deref())?;
            if !yes && !confirm(&format!("Delete project {slug}?"))? {
                return Ok(());
            }
            api.delete_project(&slug).await?;
            ctx.printer.success(&format!("Deleted project {slug}"));
            Ok(())
        }
    }
}
