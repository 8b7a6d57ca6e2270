use std::{
    fmt::Display,
    time::{Duration, Instant},
};

use anyhow::{Result, anyhow};
use log::{debug, info};

use crate::optimisation_algorithms::{
    options::{NodeSelection, SolverOptions},
    solution::KeptSolution,
    tableau::Tableau,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CutKind {
    /// `variable >= value`
    Min,
    /// `variable <= value`
    Max,
}

/// A bound on a single variable, added as an extra row while exploring a branch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cut {
    pub kind: CutKind,
    pub variable: usize,
    pub value: f64,
}

impl Cut {
    pub fn min(variable: usize, value: f64) -> Self {
        Self {
            kind: CutKind::Min,
            variable,
            value,
        }
    }

    pub fn max(variable: usize, value: f64) -> Self {
        Self {
            kind: CutKind::Max,
            variable,
            value,
        }
    }
}

impl Display for Cut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            CutKind::Min => write!(f, "x{} >= {}", self.variable, self.value),
            CutKind::Max => write!(f, "x{} <= {}", self.variable, self.value),
        }
    }
}

/// A node of the search tree: the relaxed evaluation of its parent and the cuts that
/// define it.
#[derive(Clone, Debug)]
pub struct Branch {
    pub relaxed_evaluation: f64,
    pub cuts: Vec<Cut>,
}

impl Branch {
    pub fn new(relaxed_evaluation: f64, cuts: Vec<Cut>) -> Self {
        Self {
            relaxed_evaluation,
            cuts,
        }
    }
}

/// What the search needs to know about the model besides the tableau.
pub(crate) struct SearchSpace<'a> {
    pub(crate) variables: &'a [usize],
    pub(crate) integer_variables: &'a [usize],
    pub(crate) is_minimization: bool,
    pub(crate) options: &'a SolverOptions,
}

impl SearchSpace<'_> {
    /// Turns a minimisation-oriented evaluation into the model's direction. Zero is
    /// always reported as `+0`.
    pub(crate) fn reported(&self, evaluation: f64) -> f64 {
        if evaluation == 0.0 {
            0.0
        } else if self.is_minimization {
            evaluation
        } else {
            -evaluation
        }
    }
}

/// The best integral solution so far.
struct Incumbent {
    evaluation: f64,
    optional_evaluations: Vec<f64>,
    branch: Option<Branch>,
}

impl Incumbent {
    fn none(optional_objectives: usize) -> Self {
        Self {
            evaluation: f64::INFINITY,
            optional_evaluations: vec![f64::INFINITY; optional_objectives],
            branch: None,
        }
    }

    /// An equal primary evaluation is only an improvement if the optional objectives
    /// are lexicographically better.
    fn is_beaten_by(&self, evaluation: f64, optional_evaluations: &[f64]) -> bool {
        if evaluation != self.evaluation {
            return evaluation < self.evaluation;
        }
        for (current, best) in optional_evaluations.iter().zip(&self.optional_evaluations) {
            if current > best {
                return false;
            } else if current < best {
                return true;
            }
        }
        false
    }
}

impl Tableau {
    fn optional_evaluations(&self) -> Vec<f64> {
        self.optional_objectives
            .iter()
            .map(|objective| objective.reduced_costs[0])
            .collect()
    }

    /// Rolls back to the saved root relaxation, adds the cuts of a branch and solves.
    pub(crate) fn apply_cuts(&mut self, cuts: &[Cut], space: &SearchSpace) -> Result<()> {
        self.restore();
        self.add_cut_constraints(cuts)?;
        self.simplex()?;

        if space.options.use_mir_cuts {
            while self.feasible && self.bounded {
                let volume_before = self.fractional_volume(space.integer_variables);
                if self.apply_mir_cuts(space.integer_variables)? == 0 {
                    break;
                }
                self.simplex()?;
                let volume_after = self.fractional_volume(space.integer_variables);
                if volume_after >= 0.9 * volume_before {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Solves a model with integer variables by branching on fractional variables and
    /// bounding them with cuts. Returns the improving solutions if these are kept.
    pub(crate) fn branch_and_cut(&mut self, space: &SearchSpace) -> Result<Vec<KeptSolution>> {
        let deadline = space
            .options
            .timeout
            .map(|timeout| Instant::now() + Duration::from_millis(timeout));
        let tolerance = space.options.tolerance;

        let mut kept_solutions = vec![];
        let mut incumbent = Incumbent::none(self.optional_objectives.len());
        let mut branches = vec![Branch::new(f64::NEG_INFINITY, vec![])];
        let mut iterations = 0;

        while let Some(branch) = branches.pop() {
            //the root relaxation is always solved
            if iterations > 0 && deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                info!("branch and cut: timeout after {} iteration(s)", iterations);
                break;
            }
            if incumbent.branch.is_some()
                && tolerance > 0.0
                && incumbent.evaluation - self.best_possible_evaluation
                    <= tolerance * self.best_possible_evaluation.abs()
            {
                info!("branch and cut: incumbent within tolerance of the relaxation bound");
                break;
            }

            if branch.relaxed_evaluation > incumbent.evaluation {
                continue;
            }

            self.apply_cuts(&branch.cuts, space)?;
            iterations += 1;
            debug!(
                "branch and cut iteration {}: {} cut(s), evaluation {}, feasible {}",
                iterations,
                branch.cuts.len(),
                self.evaluation,
                self.feasible
            );

            if !self.feasible {
                continue;
            }
            if !self.bounded {
                //the relaxation is unbounded, so no integral solution bounds the search
                info!("branch and cut: relaxation is unbounded");
                self.branch_and_cut_iterations = iterations;
                return Ok(kept_solutions);
            }

            let evaluation = self.evaluation;
            let optional_evaluations = self.optional_evaluations();
            if evaluation > incumbent.evaluation
                || (incumbent.branch.is_some()
                    && !incumbent.is_beaten_by(evaluation, &optional_evaluations))
            {
                continue;
            }

            if self.is_integral_solution(space.integer_variables) {
                self.is_integral = true;
                if space.options.keep_solutions {
                    kept_solutions.push(KeptSolution {
                        result: space.reported(evaluation),
                        variables: self.solution_set(),
                    });
                }
                if iterations == 1 {
                    self.branch_and_cut_iterations = iterations;
                    info!("branch and cut: root relaxation is integral");
                    return Ok(kept_solutions);
                }
                debug!("branch and cut: new incumbent {}", evaluation);
                incumbent = Incumbent {
                    evaluation,
                    optional_evaluations,
                    branch: Some(branch),
                };
            } else {
                if iterations == 1 {
                    self.save();
                }
                let variable = self
                    .branching_variable(space.options.branching, space.integer_variables)
                    .ok_or_else(|| anyhow!("no fractional variable to branch on"))?;

                let mut cuts_high = vec![];
                let mut cuts_low = vec![];
                for cut in branch.cuts {
                    if cut.variable == variable.index {
                        //the new bound supersedes the old one of the same kind
                        match cut.kind {
                            CutKind::Min => cuts_low.push(cut),
                            CutKind::Max => cuts_high.push(cut),
                        }
                    } else {
                        cuts_high.push(cut);
                        cuts_low.push(cut);
                    }
                }
                cuts_high.push(Cut::min(variable.index, variable.value.ceil()));
                cuts_low.push(Cut::max(variable.index, variable.value.floor()));

                branches.push(Branch::new(evaluation, cuts_high));
                branches.push(Branch::new(evaluation, cuts_low));
                if space.options.node_selection == NodeSelection::BestBound {
                    branches.sort_by(|a, b| b.relaxed_evaluation.total_cmp(&a.relaxed_evaluation));
                }
            }
        }

        match incumbent.branch {
            Some(best) => {
                self.apply_cuts(&best.cuts, space)?;
                self.is_integral = true;
            }
            None => {
                self.restore();
                self.feasible = false;
                self.is_integral = false;
            }
        }
        self.branch_and_cut_iterations = iterations;
        info!(
            "branch and cut: {} iteration(s), feasible {}, evaluation {}",
            iterations, self.feasible, self.evaluation
        );
        Ok(kept_solutions)
    }
}

#[cfg(test)]
mod tests {
    use ntest::timeout;

    use super::{Cut, CutKind, Incumbent};
    use crate::optimisation_algorithms::{
        expressions::Priority, model::Model, options::SolverOptions, solution::Solution,
    };

    fn bounded_integer(bound: f64, timeout: Option<u64>) -> Solution {
        let options = SolverOptions {
            timeout,
            ..Default::default()
        };
        let mut model = Model::new(1e-9, options);
        model.maximize();
        let x = model.add_variable(1.0, Some("x"), true, false, Priority::REQUIRED).unwrap();
        model.smaller_than(bound).unwrap().add_term(1.0, x).unwrap();
        model.solve().unwrap()
    }

    #[test]
    fn incumbent_tie_break() {
        let mut incumbent = Incumbent::none(2);
        assert!(incumbent.is_beaten_by(10.0, &[0.0, 0.0]));
        incumbent.evaluation = 10.0;
        incumbent.optional_evaluations = vec![3.0, 5.0];

        assert!(incumbent.is_beaten_by(9.0, &[8.0, 8.0]));
        assert!(!incumbent.is_beaten_by(11.0, &[0.0, 0.0]));
        assert!(incumbent.is_beaten_by(10.0, &[3.0, 4.0]));
        assert!(!incumbent.is_beaten_by(10.0, &[4.0, 0.0]));
        assert!(!incumbent.is_beaten_by(10.0, &[3.0, 5.0]));
    }

    #[test]
    fn cut_display() {
        let cut = Cut::min(3, 2.0);
        assert_eq!(cut.kind, CutKind::Min);
        assert_eq!(cut.to_string(), "x3 >= 2");
        assert_eq!(Cut::max(1, 0.0).to_string(), "x1 <= 0");
    }

    #[test]
    #[timeout(5000)]
    fn elapsed_deadline_still_solves_the_root() {
        let solution = bounded_integer(5.0, Some(0));
        assert!(solution.feasible);
        assert_eq!(solution.evaluation, 5.0);
        assert_eq!(solution.iterations, Some(1));
        assert_eq!(solution.is_integral, Some(true));
    }

    #[test]
    #[timeout(5000)]
    fn elapsed_deadline_stops_after_the_root() {
        let solution = bounded_integer(5.5, Some(0));
        assert_eq!(solution.iterations, Some(1));
        assert!(!solution.feasible);
        assert!(solution.evaluation.is_sign_positive());

        let solution = bounded_integer(5.5, Some(60_000));
        assert!(solution.feasible);
        assert_eq!(solution.evaluation, 5.0);
        assert!(solution.iterations.is_some_and(|iterations| iterations > 1));
    }

    #[test]
    #[timeout(5000)]
    fn zero_evaluation_is_positive() {
        let solution = bounded_integer(0.0, Some(0));
        assert!(solution.feasible);
        assert_eq!(solution.evaluation, 0.0);
        assert!(solution.evaluation.is_sign_positive());
        assert_eq!(solution.to_compact_json()["result"].to_string(), "0.0");
    }
}
