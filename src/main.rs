use anyhow::{Context, Result};
use clap::crate_version;
use env_logger::{Builder, Env};

use tableau_solver::solver_framework::solver_command::SOLVER_COMMANDS;

pub fn main() -> Result<()> {
    //log warnings by default, RUST_LOG overrides
    Builder::from_env(Env::default().default_filter_or("warn")).init();

    let command = SOLVER_COMMANDS.build_cli();
    let command = command.version(crate_version!());
    let cli_matches = command.get_matches();

    log::info!("tableau_solver starting");

    SOLVER_COMMANDS
        .execute(&cli_matches)
        .context("Executing tableau_solver")
}
