pub mod json;
pub mod optimisation_algorithms {
    pub mod expressions;
    pub mod options;
    pub mod tableau;
    pub mod simplex;
    pub mod cycle_detection;
    pub mod dynamic_modification;
    pub mod branching_strategies;
    pub mod cutting_strategies;
    pub mod branch_and_cut;
    pub mod solution;
    pub mod model;
    pub mod json_model;
}
pub mod solver_framework {
    pub mod infoable;
    pub mod solver_command;
    pub mod solver_output;
}
pub mod solver_commands {
    pub mod solver_command_info;
    pub mod solver_command_solve;
}
