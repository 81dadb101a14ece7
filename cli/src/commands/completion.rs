use clap::CommandFactory;

use crate::cli::Cli;
use crate::cli::CompletionArgs;

pub(crate) fn run(args: &CompletionArgs) -> anyhow::Result<()> {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    clap_complete::generate(args.shell, &mut command, name, &mut std::io::stdout());
    Ok(())
}
