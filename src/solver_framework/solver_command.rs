use std::{
    fmt::{Debug, Display},
    fs,
    io::{self, Read},
    path::PathBuf,
};

use anyhow::{Context, Result, anyhow};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};

use crate::{
    optimisation_algorithms::model::Model,
    solver_commands::{solver_command_info, solver_command_solve},
};

use super::solver_output::{SolverOutput, SolverOutputType};

pub const SOLVER_COMMANDS: SolverCommand = SolverCommand::Group {
    name_short: "tableau_solver",
    name_long: None,
    explanation_short: "A simplex and branch-and-cut solver for linear and mixed-integer programs.",
    explanation_long: None,
    children: &[
        &solver_command_info::SOLVER_INFO,
        &solver_command_solve::SOLVER_SOLVE,
    ],
};

pub const ARG_SHORT_OUTPUT: char = 'o';
pub const ARG_ID_OUTPUT: &str = "output";

pub enum SolverCommand {
    Group {
        name_short: &'static str,
        name_long: Option<&'static str>,
        explanation_short: &'static str,
        explanation_long: Option<&'static str>,
        children: &'static [&'static SolverCommand],
    },
    Command {
        name_short: &'static str,
        name_long: Option<&'static str>,
        explanation_short: &'static str,
        explanation_long: Option<&'static str>,
        //extra arguments; an output -o argument is always added
        cli_command: Option<fn(command: Command) -> Command>,

        input_names: &'static [&'static str], //one problem description per fixed-position input
        input_helps: &'static [&'static str],

        execute: fn(inputs: Vec<Model>, cli_matches: &ArgMatches) -> Result<SolverOutput>,
        output_type: &'static SolverOutputType,
    },
}

impl SolverCommand {
    pub fn build_cli(&self) -> Command {
        let mut command;
        match self {
            SolverCommand::Group {
                name_short,
                name_long,
                explanation_short,
                explanation_long,
                children,
            } => {
                command = Command::new(name_long.unwrap_or(*name_short))
                    .about(explanation_short)
                    .subcommand_required(true)
                    .allow_external_subcommands(false);

                if name_long.is_some() {
                    command = command.alias(name_short);
                }

                if let Some(l) = explanation_long {
                    command = command.long_about(l);
                }

                for child in children.iter() {
                    command = command.subcommand(child.build_cli());
                }
            }
            SolverCommand::Command {
                name_short,
                name_long,
                explanation_short,
                explanation_long,
                cli_command,
                input_names,
                input_helps,
                ..
            } => {
                command = Command::new(name_long.unwrap_or(*name_short)).about(explanation_short);

                if name_long.is_some() {
                    command = command.alias(name_short);
                }

                if let Some(l) = explanation_long {
                    command = command.long_about(l);
                }

                for (i, (input_name, input_help)) in
                    input_names.iter().zip(input_helps.iter()).enumerate()
                {
                    command = command.arg(
                        Arg::new(format!("{}x{}", input_name, i))
                            .action(ArgAction::Set)
                            .value_name(input_name)
                            .help(input_help)
                            .long_help(format!("{} Use `-` to read from STDIN.", input_help))
                            .required(true)
                            .value_parser(value_parser!(String)),
                    );
                }

                if let Some(f) = cli_command {
                    command = (f)(command);
                }

                command = command.arg(
                    Arg::new(ARG_ID_OUTPUT)
                        .short(ARG_SHORT_OUTPUT)
                        .long(ARG_ID_OUTPUT)
                        .action(ArgAction::Set)
                        .value_name("FILE")
                        .help("Saves the result to a file.")
                        .required(false)
                        .value_parser(value_parser!(PathBuf)),
                );
            }
        };
        command
    }

    pub fn short_name(&self) -> &str {
        match self {
            SolverCommand::Group { name_short, .. } => name_short,
            SolverCommand::Command { name_short, .. } => name_short,
        }
    }

    pub fn long_name(&self) -> &str {
        match self {
            SolverCommand::Group {
                name_short,
                name_long,
                ..
            }
            | SolverCommand::Command {
                name_short,
                name_long,
                ..
            } => name_long.unwrap_or(*name_short),
        }
    }

    /// Runs the selected command and writes its result to the output file or to STDOUT.
    pub fn execute(&self, cli_matches: &ArgMatches) -> Result<()> {
        let (command, sub_matches, result) = self.run(cli_matches)?;

        if let Some(to_file) = sub_matches.get_one::<PathBuf>(ARG_ID_OUTPUT) {
            log::info!("Writing result of {} to {:?}", command, to_file);
            result.export_to_file(to_file)
        } else {
            log::info!("Writing result of {} as {}", command, result.get_type());
            println!("{}", result.export_to_string()?);
            Ok(())
        }
    }

    /// Descends to the selected command, reads its inputs and computes its result.
    pub fn run<'a>(
        &'a self,
        cli_matches: &'a ArgMatches,
    ) -> Result<(&'a SolverCommand, &'a ArgMatches, SolverOutput)> {
        match self {
            SolverCommand::Group { children, .. } => {
                for child in children.iter() {
                    if let Some(sub_matches) = cli_matches.subcommand_matches(child.long_name()) {
                        return child.run(sub_matches);
                    }
                }
                Err(anyhow!("command not recognised"))
            }
            SolverCommand::Command {
                input_names,
                execute,
                output_type,
                ..
            } => {
                let mut inputs = vec![];
                for (i, input_name) in input_names.iter().enumerate() {
                    let cli_id = format!("{}x{}", input_name, i);
                    log::info!("Reading {}", input_name);
                    let model = Self::read_model(cli_matches, &cli_id)
                        .with_context(|| format!("Reading parameter {}.", input_name))?;
                    inputs.push(model);
                }

                log::info!("Starting {}", self.long_name());
                let result = (execute)(inputs, cli_matches)?;

                if &result.get_type() != *output_type {
                    return Err(anyhow!(
                        "Output type {} does not match the declared output of {}.",
                        result.get_type(),
                        output_type
                    ));
                }
                Ok((self, cli_matches, result))
            }
        }
    }

    /// Reads a problem description from the file named by the argument, or from STDIN for `-`.
    pub fn read_model(cli_matches: &ArgMatches, cli_id: &str) -> Result<Model> {
        let source = cli_matches
            .get_one::<String>(cli_id)
            .ok_or_else(|| anyhow!("argument was not given"))?;
        let text = if source == "-" {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("reading from STDIN")?;
            text
        } else {
            fs::read_to_string(source).with_context(|| format!("could not read file `{}`", source))?
        };
        text.parse::<Model>()
    }
}

impl Display for SolverCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.long_name())
    }
}

impl Debug for SolverCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Group {
                name_short,
                name_long,
                ..
            } => f
                .debug_struct("Group")
                .field("name_short", name_short)
                .field("name_long", name_long)
                .finish(),
            Self::Command {
                name_short,
                name_long,
                ..
            } => f
                .debug_struct("Command")
                .field("name_short", name_short)
                .field("name_long", name_long)
                .finish(),
        }
    }
}
