use clap::Parser;
use doppler_cli::Cli;
use doppler_cli::output::report_error;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    let json = cli.global.json;
    let debug = cli.global.debug;
    init_logging(debug);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            report_error(&anyhow::Error::from(err), json, debug);
            std::process::exit(doppler_cli::EXIT_FAILURE);
        }
    };

    let result = runtime.block_on(async move {
        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::debug!("interrupt received, cancelling");
                on_interrupt.cancel();
            }
        });
        doppler_cli::run(cli, cancel).await
    });

    if let Err(err) = result {
        if doppler_cli::should_report(&err) {
            report_error(&err, json, debug);
        }
        std::process::exit(doppler_cli::exit_code(&err));
    }
}
