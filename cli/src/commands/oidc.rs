use doppler_core::config::ConfigOption;
use serde_json::json;

use crate::cli::OidcArgs;
use crate::cli::OidcCommand;
use crate::context::CommandContext;

pub(crate) async fn run(ctx: &mut CommandContext, args: OidcArgs) -> anyhow::Result<()> {
    match args.command {
        OidcCommand::Login {
            identity,
            oidc_token,
        } => {
            let issued = ctx
                .anonymous_api()?
                .oidc_login(&identity, &oidc_token)
                .await?;
            ctx.store.set(
                &ctx.scope,
                &[
                    (ConfigOption::Token, issued.token),
                    (ConfigOption::ApiHost, ctx.config.api_host.value.clone()),
                ],
            )?;
            ctx.refresh();
            if ctx.printer.is_json() {
                return ctx
                    .printer
                    .json(&json!({ "scope": ctx.scope, "expires_at": issued.expires_at }));
            }
            ctx.printer.success("Authenticated with the identity provider token");
            Ok(())
        }
        OidcCommand::Logout => {
            ctx.api()?.oidc_revoke().await?;
            ctx.store.unset(&ctx.scope, &[ConfigOption::Token])?;
            ctx.refresh();
            ctx.printer.success("Token has been revoked");
            Ok(())
        }
    }
}
