use std::io::Write;

use anyhow::anyhow;

use crate::solver_framework::{
    infoable::Infoable,
    solver_command::SolverCommand,
    solver_output::{SolverOutput, SolverOutputType},
};

pub const SOLVER_INFO: SolverCommand = SolverCommand::Command {
    name_short: "info",
    name_long: Some("information"),
    explanation_short: "Show information about a problem description.",
    explanation_long: None,
    cli_command: None,
    input_names: &["FILE"],
    input_helps: &["A problem description in JSON."],
    execute: |mut inputs, _| {
        let model = inputs.pop().ok_or_else(|| anyhow!("no problem description given"))?;
        let mut f = vec![];
        writeln!(f, "Problem description of {} variable(s).", model.number_of_variables())?;
        model.info(&mut f)?;
        Ok(SolverOutput::String(String::from_utf8(f)?))
    },
    output_type: &SolverOutputType::String,
};
