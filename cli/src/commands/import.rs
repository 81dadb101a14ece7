use anyhow::Context;

use crate::cli::ImportArgs;
use crate::context::CommandContext;

pub(crate) async fn run(ctx: &mut CommandContext, args: ImportArgs) -> anyhow::Result<()> {
    let template = std::fs::read_to_string(&args.template)
        .with_context(|| format!("unable to read template {}", args.template.display()))?;
    let projects = ctx.api()?.import_template(&template).await?;
    let rows = projects
        .iter()
        .map(|p| vec![p.id.clone(), p.name.clone(), p.description.clone()])
        .collect();
    ctx.printer.print(&projects, &["id", "name", "description"], rows)
}
