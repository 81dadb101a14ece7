use crate::commands::or_dash;
use crate::context::CommandContext;

pub(crate) async fn run(ctx: &mut CommandContext) -> anyhow::Result<()> {
    let info = ctx.api()?.me().await?;
    let rows = vec![vec![
        info.name.clone(),
        info.token_type.clone(),
        info.token_preview.clone(),
        info.workplace.name.clone(),
        or_dash(info.last_seen_at.as_deref()),
    ]];
    ctx.printer.print(
        &info,
        &["name", "type", "token", "workplace", "last seen"],
        rows,
    )
}
