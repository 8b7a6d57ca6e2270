use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, VariantNames};

pub const DEFAULT_PRECISION: f64 = 1e-9;

/// Rule used by branch-and-cut to choose the variable to branch on.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    VariantNames,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum BranchingStrategy {
    /// The integer variable furthest from its nearest integer.
    #[default]
    MostFractional,
    /// The fractional integer variable with the smallest objective coefficient.
    LowestCostFractional,
}

/// Order in which branch-and-cut explores the open branches.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    VariantNames,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum NodeSelection {
    /// Keep the open branches sorted so the best relaxed bound is explored next.
    #[default]
    BestBound,
    /// Explore the most recently created branch first.
    DepthFirst,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Wall-clock budget of branch-and-cut, in milliseconds.
    pub timeout: Option<u64>,
    /// Relative gap between incumbent and root bound at which the search stops.
    pub tolerance: f64,
    #[serde(rename = "useMIRCuts")]
    pub use_mir_cuts: bool,
    #[serde(rename = "exitOnCycles")]
    pub exit_on_cycles: bool,
    pub keep_solutions: bool,
    #[serde(rename = "nodeSelection")]
    pub node_selection: NodeSelection,
    pub branching: BranchingStrategy,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            tolerance: 0.0,
            use_mir_cuts: false,
            exit_on_cycles: true,
            keep_solutions: false,
            node_selection: NodeSelection::default(),
            branching: BranchingStrategy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_from_json() {
        let options: SolverOptions = serde_json::from_str(
            r#"{
                "timeout": 250,
                "useMIRCuts": true,
                "branching": "lowest-cost-fractional",
                "nodeSelection": "depth-first"
            }"#,
        )
        .unwrap();
        assert_eq!(options.timeout, Some(250));
        assert!(options.use_mir_cuts);
        assert!(options.exit_on_cycles);
        assert_eq!(options.branching, BranchingStrategy::LowestCostFractional);
        assert_eq!(options.node_selection, NodeSelection::DepthFirst);
        assert_eq!(options.tolerance, 0.0);
    }

    #[test]
    fn strategy_names() {
        assert_eq!(
            "most-fractional".parse::<BranchingStrategy>().unwrap(),
            BranchingStrategy::MostFractional
        );
        assert_eq!(NodeSelection::BestBound.to_string(), "best-bound");
    }
}
