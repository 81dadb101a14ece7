use doppler_core::config::Flag;
use doppler_core::fallback::default_fallback_path;
use doppler_core::fallback::default_metadata_dir;
use doppler_core::run::ChildCommand;
use doppler_core::run::ExecOptions;
use doppler_core::run::FallbackSettings;
use doppler_core::run::FetchOptions;
use doppler_core::run::RunError;

use crate::cli::RunArgs;
use crate::context::CommandContext;

pub(crate) async fn run(ctx: &mut CommandContext, args: RunArgs) -> anyhow::Result<()> {
    let command = child_command(&args)?;
    let api = ctx.api()?;
    let fetch = fetch_options(ctx, &args, api.token())?;
    let exec = ExecOptions {
        command,
        preserve_env: args.preserve_env,
        warn_dangerous: ctx.store.flag(Flag::EnvWarning),
    };

    let code = doppler_core::run::run(&api, &fetch, &exec).await?;
    if code != 0 {
        return Err(RunError::ChildExit(code).into());
    }
    Ok(())
}

fn child_command(args: &RunArgs) -> Result<ChildCommand, RunError> {
    match (&args.command, args.args.is_empty()) {
        (Some(line), _) => Ok(ChildCommand::Shell(line.clone())),
        (None, false) => Ok(ChildCommand::Argv(args.args.clone())),
        (None, true) => Err(RunError::UserInput(
            "no command specified; use `doppler run -- <command>` or --command".to_string(),
        )),
    }
}

fn fetch_options(ctx: &CommandContext, args: &RunArgs, token: &str) -> Result<FetchOptions, RunError> {
    if args.no_fallback && args.fallback_only {
        return Err(RunError::UserInput(
            "--no-fallback and --fallback-only cannot be combined".to_string(),
        ));
    }
    let mut fetch = FetchOptions {
        project: ctx.project().map_err(|err| RunError::UserInput(err.to_string()))?,
        config: ctx
            .config_name()
            .map_err(|err| RunError::UserInput(err.to_string()))?,
        name_transformer: args.name_transformer.clone(),
        only_secrets: args.only_secrets.clone(),
        fallback: None,
        use_cache: !args.no_cache,
    };
    if args.no_fallback {
        return Ok(fetch);
    }

    let config_dir = ctx.store.dir();
    let path = match &args.fallback {
        Some(path) => path.clone(),
        None => default_fallback_path(&config_dir, &fetch.identity(token).fingerprint()),
    };
    fetch.fallback = Some(FallbackSettings {
        path,
        metadata_dir: default_metadata_dir(&config_dir),
        passphrase: args.passphrase.clone(),
        readonly: args.fallback_readonly,
        only: args.fallback_only,
        exit_on_write_failure: !args.no_exit_on_write_failure,
    });
    Ok(fetch)
}
