mod app;
mod cli_args;
mod config;
mod error;
mod git;
mod llm;
mod logging;
mod secrets;
mod setup;

use std::io;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use log::debug;

pub use cli_args::Cli;
use config::Config;
use error::AppError;
use git::GitCli;
use secrets::{KeyringStore, SecretsResolver};

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logger(cli.debug);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            debug!("stage: Failed");
            eprintln!("{} {}", format!("{}:", err.kind()).red().bold(), err);
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(cli: &Cli) -> Result<(), AppError> {
    let cfg = Config::from_sources(cli)?;
    debug!("Resolved config: {cfg:?}");

    let model = setup::build_model_client(&cfg)?;
    let store = KeyringStore::new();
    let secrets = SecretsResolver::new(&store, setup::build_prompter(&cfg));
    let vcs = GitCli::new();

    let outcome = app::Pipeline::new(&vcs, &secrets, &model)
        .with_progress(setup::show_progress(cli.debug > 0))
        .run(&cfg, &mut io::stdout().lock())?;

    match outcome {
        app::Outcome::Printed { message } => {
            debug!("stage: Done (printed {} chars)", message.len())
        }
        app::Outcome::Committed { message, summary } => {
            let title = message.lines().next().unwrap_or_default();
            debug!("stage: Done (committed {title:?}: {summary})")
        }
    }
    Ok(())
}
