use doppler_core::api::models::ActivityLog;

use crate::cli::ActivityArgs;
use crate::cli::ActivityCommand;
use crate::commands::or_dash;
use crate::context::CommandContext;

const HEADERS: [&str; 4] = ["id", "text", "user", "created at"];

fn rows(logs: &[ActivityLog]) -> Vec<Vec<String>> {
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

pub(crate) async fn run(ctx: &mut CommandContext, args: ActivityArgs) -> anyhow::Result<()> {
    let api = ctx.api()?;
    match args.command {
        None => {
            let logs = api
                .list_activity_logs(args.page.page, args.page.per_page)
                .await?;
            ctx.printer.print(&logs, &HEADERS, rows(&logs))
        }
        Some(ActivityCommand::Get { log }) => {
            let log = api.get_activity_log(&log).await?;
            let table = rows(std::slice::from_ref(&log));
            ctx.printer.print(&log, &HEADERS, table)
        }
    }
}
