use anyhow::{Context, Result, anyhow};
use clap::{Arg, ArgAction, ArgMatches, Command, builder::PossibleValuesParser, value_parser};
use strum::VariantNames;

use crate::{
    optimisation_algorithms::options::{BranchingStrategy, NodeSelection, SolverOptions},
    solver_framework::{
        solver_command::SolverCommand,
        solver_output::{SolverOutput, SolverOutputType},
    },
};

pub const SOLVER_SOLVE: SolverCommand = SolverCommand::Command {
    name_short: "solve",
    name_long: None,
    explanation_short: "Solve a linear or mixed-integer program.",
    explanation_long: Some(
        "Solve a linear or mixed-integer program given as a JSON problem description. \
        The options of the description can be overridden with the flags below. \
        The result lists feasibility, boundedness, the objective value \
        and every non-zero variable.",
    ),
    cli_command: Some(cli),
    input_names: &["FILE"],
    input_helps: &["A problem description in JSON."],
    execute: |mut inputs, cli_matches| {
        let mut model = inputs.pop().ok_or_else(|| anyhow!("no problem description given"))?;
        let options = override_options(model.options().clone(), cli_matches)?;
        model.set_options(options);

        let solution = model.solve().context("solving the problem")?;
        if cli_matches.get_flag("full") {
            Ok(SolverOutput::Json(solution.to_full_json()))
        } else {
            Ok(SolverOutput::Json(solution.to_compact_json()))
        }
    },
    output_type: &SolverOutputType::Json,
};

fn cli(command: Command) -> Command {
    command
        .arg(
            Arg::new("full")
                .long("full")
                .action(ArgAction::SetTrue)
                .help("Output the full solution, including kept solutions and search statistics."),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .action(ArgAction::Set)
                .value_name("MILLISECONDS")
                .help("Stop branch-and-cut after this time and report the best solution found.")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("tolerance")
                .long("tolerance")
                .action(ArgAction::Set)
                .value_name("GAP")
                .help("Stop branch-and-cut once the relative gap to the root bound is this small.")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("mir-cuts")
                .long("mir-cuts")
                .action(ArgAction::SetTrue)
                .help("Add mixed-integer rounding cuts before branching."),
        )
        .arg(
            Arg::new("keep-solutions")
                .long("keep-solutions")
                .action(ArgAction::SetTrue)
                .help("Keep every improving integer solution found during the search."),
        )
        .arg(
            Arg::new("allow-cycles")
                .long("allow-cycles")
                .action(ArgAction::SetTrue)
                .help("Do not stop the simplex method when it detects a cycle of pivots."),
        )
        .arg(
            Arg::new("node-selection")
                .long("node-selection")
                .action(ArgAction::Set)
                .value_name("STRATEGY")
                .help("Order in which branch-and-cut explores open branches.")
                .value_parser(PossibleValuesParser::new(NodeSelection::VARIANTS)),
        )
        .arg(
            Arg::new("branching")
                .long("branching")
                .action(ArgAction::Set)
                .value_name("STRATEGY")
                .help("Rule to choose the variable to branch on.")
                .value_parser(PossibleValuesParser::new(BranchingStrategy::VARIANTS)),
        )
}

/// Applies the flags given on the command line on top of the options of the problem description.
fn override_options(mut options: SolverOptions, cli_matches: &ArgMatches) -> Result<SolverOptions> {
    if let Some(timeout) = cli_matches.get_one::<u64>("timeout") {
        options.timeout = Some(*timeout);
    }
    if let Some(tolerance) = cli_matches.get_one::<f64>("tolerance") {
        options.tolerance = *tolerance;
    }
    if cli_matches.get_flag("mir-cuts") {
        options.use_mir_cuts = true;
    }
    if cli_matches.get_flag("keep-solutions") {
        options.keep_solutions = true;
    }
    if cli_matches.get_flag("allow-cycles") {
        options.exit_on_cycles = false;
    }
    if let Some(strategy) = cli_matches.get_one::<String>("node-selection") {
        options.node_selection = strategy.parse()?;
    }
    if let Some(strategy) = cli_matches.get_one::<String>("branching") {
        options.branching = strategy.parse()?;
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use ntest::timeout;

    use super::override_options;
    use crate::{
        optimisation_algorithms::options::{BranchingStrategy, NodeSelection, SolverOptions},
        solver_framework::{solver_command::SOLVER_COMMANDS, solver_output::SolverOutput},
    };

    #[test]
    fn flags_override_options() {
        let matches = SOLVER_COMMANDS
            .build_cli()
            .try_get_matches_from([
                "tableau_solver",
                "solve",
                "testfiles/knapsack.json",
                "--timeout",
                "500",
                "--mir-cuts",
                "--node-selection",
                "best-bound",
                "--branching",
                "lowest-cost-fractional",
            ])
            .unwrap();
        let (_, sub_matches) = matches.subcommand().unwrap();
        let options = override_options(SolverOptions::default(), sub_matches).unwrap();
        assert_eq!(options.timeout, Some(500));
        assert!(options.use_mir_cuts);
        assert!(!options.keep_solutions);
        assert_eq!(options.node_selection, NodeSelection::BestBound);
        assert_eq!(options.branching, BranchingStrategy::LowestCostFractional);
    }

    #[test]
    fn rejects_unknown_strategy() {
        let result = SOLVER_COMMANDS.build_cli().try_get_matches_from([
            "tableau_solver",
            "solve",
            "testfiles/knapsack.json",
            "--branching",
            "random",
        ]);
        assert!(result.is_err());
    }

    #[test]
    #[timeout(10000)]
    fn full_output() {
        let matches = SOLVER_COMMANDS
            .build_cli()
            .try_get_matches_from(["tableau_solver", "solve", "testfiles/knapsack.json", "--full"])
            .unwrap();
        let (_, _, result) = SOLVER_COMMANDS.run(&matches).unwrap();
        let SolverOutput::Json(json) = result else {
            panic!("expected JSON");
        };
        assert_eq!(json["evaluation"], 28.0);
        assert!(json["keptSolutions"].as_array().is_some_and(|kept| !kept.is_empty()));
    }
}
