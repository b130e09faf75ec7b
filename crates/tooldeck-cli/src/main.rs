// tooldeck CLI entry point

use std::process::ExitCode;

use clap::Parser;
use tooldeck_cli::{args::Cli, logging, run};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level);

    match run::execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.user_message());
            ExitCode::from(e.exit_code())
        }
    }
}
