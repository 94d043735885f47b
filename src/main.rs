mod cli;
mod commands;
mod libs;
mod logger;
mod schemas;

use clap::{CommandFactory, Parser};
use cli::args::Cli;
use cli::type_enums::Mode;
use colored::Colorize;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init(cli.debug);

    let Some(mode) = cli.mode else {
        if let Err(e) = Cli::command().print_help() {
            log_error!("Could not print help: {}", e);
        }
        return ExitCode::SUCCESS;
    };

    log_debug!("Running in {} mode", mode.to_string().cyan());
    let result = match mode {
        Mode::Setup => commands::setup::run(cli.base_dir.as_deref(), cli.config.as_deref()),
        Mode::Clear => commands::clear::run(cli.base_dir.as_deref(), cli.config.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log_error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
