use doppler_core::config::Flag;
use serde_json::json;

use crate::cli::AnalyticsArgs;
use crate::cli::AnalyticsCommand;
use crate::context::CommandContext;

pub(crate) fn run(ctx: &mut CommandContext, args: AnalyticsArgs) -> anyhow::Result<()> {
    match args.command {
        AnalyticsCommand::Status => {
            let enabled = ctx.store.flag(Flag::Analytics);
            if ctx.printer.is_json() {
                ctx.printer.json(&json!({ "enabled": enabled }))
            } else {
                let state = if enabled { "enabled" } else { "disabled" };
                ctx.printer.plain(&format!("Analytics are {state}"));
                Ok(())
            }
        }
        AnalyticsCommand::Enable => {
            ctx.store.set_flag(Flag::Analytics, true)?;
            ctx.printer.success("Analytics have been enabled");
            Ok(())
        }
        AnalyticsCommand::Disable => {
            ctx.store.set_flag(Flag::Analytics, false)?;
            ctx.printer.success("Analytics have been disabled");
            Ok(())
        }
    }
}
