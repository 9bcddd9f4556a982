//! chesscal CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use chesscal_client::cli::Cli;
use chesscal_client::commands::run::{self, RunOptions};
use chesscal_client::config::ClientConfig;
use chesscal_client::error::ClientResult;
use chesscal_core::{TracingConfig, init_tracing};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match try_main(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            if let Some(hint) = e.hint() {
                eprintln!("hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn try_main(cli: Cli) -> ClientResult<()> {
    let config = ClientConfig::for_cli(&cli)?;

    let tracing_config = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::cli()
    };
    if let Err(e) = init_tracing(tracing_config.with_format(config.logging.format)) {
        eprintln!("warning: {}", e);
    }

    let options = RunOptions::new(&cli, &config)?;
    run::run(&options).await
}
