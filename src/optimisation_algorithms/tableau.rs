use anyhow::{Result, anyhow};
use log::debug;

use crate::optimisation_algorithms::{
    branch_and_cut::SearchSpace,
    expressions::{Constraint, Priority, VariableData},
    solution::Solution,
};

/// Marks the rhs column in `var_index_by_col` and the objective row in `var_index_by_row`.
pub(crate) const NO_VARIABLE: usize = usize::MAX;

pub(crate) const COST_ROW: usize = 0;
pub(crate) const RHS_COLUMN: usize = 0;

/// Hands out dense variable indices, recycling the ones of removed variables.
#[derive(Clone, Debug, Default)]
pub(crate) struct IndexAllocator {
    pub(crate) available: Vec<usize>,
    pub(crate) next: usize,
}

impl IndexAllocator {
    pub(crate) fn allocate(&mut self) -> usize {
        if let Some(index) = self.available.pop() {
            return index;
        }
        let index = self.next;
        self.next += 1;
        index
    }

    pub(crate) fn release(&mut self, index: usize) {
        self.available.push(index);
    }
}

/// An objective of positive priority. Its row shadows the objective row: it takes part
/// in every pivot but never in the choice of the leaving row.
#[derive(Clone, Debug)]
pub(crate) struct OptionalObjective {
    pub(crate) priority: Priority,
    pub(crate) reduced_costs: Vec<f64>,
}

impl OptionalObjective {
    fn new(priority: Priority, columns: usize) -> Self {
        Self {
            priority,
            reduced_costs: vec![0.0; columns],
        }
    }
}

/// Deep copy of the numeric state of a tableau.
#[derive(Clone, Debug)]
struct SavedState {
    matrix: Vec<Vec<f64>>,
    width: usize,
    height: usize,
    var_index_by_row: Vec<usize>,
    var_index_by_col: Vec<usize>,
    row_by_var_index: Vec<Option<usize>>,
    col_by_var_index: Vec<Option<usize>>,
    optional_objectives: Vec<OptionalObjective>,
    allocator: IndexAllocator,
    arena_len: usize,
}

/// The canonical-form dense tableau.
///
/// Row 0 is the objective row, column 0 the right-hand side. A basic variable `x_B` of
/// row `r` satisfies `x_B = matrix[r][0] - sum_c matrix[r][c] * x_c` over the non-basic
/// columns `c`. The objective row stores the reduced costs of a maximisation, and
/// `matrix[0][0]` holds the objective value in minimisation orientation.
#[derive(Clone)]
pub struct Tableau {
    pub(crate) precision: f64,
    pub(crate) matrix: Vec<Vec<f64>>,
    pub(crate) width: usize,
    pub(crate) height: usize,

    /// For each row the index of its basic variable.
    pub(crate) var_index_by_row: Vec<usize>,
    /// For each column the index of its non-basic variable.
    pub(crate) var_index_by_col: Vec<usize>,
    pub(crate) row_by_var_index: Vec<Option<usize>>,
    pub(crate) col_by_var_index: Vec<Option<usize>>,

    /// Sorted by ascending priority.
    pub(crate) optional_objectives: Vec<OptionalObjective>,

    pub(crate) variables_per_index: Vec<Option<VariableData>>,
    pub(crate) allocator: IndexAllocator,

    pub(crate) feasible: bool,
    pub(crate) bounded: bool,
    pub(crate) evaluation: f64,
    pub(crate) unbounded_var_index: Option<usize>,
    pub(crate) simplex_iterations: usize,
    pub(crate) best_possible_evaluation: f64,
    pub(crate) branch_and_cut_iterations: usize,
    pub(crate) is_integral: bool,
    pub(crate) check_for_cycles: bool,

    /// Scratch buffer of the pivot: non-zero columns of the normalised pivot row.
    pub(crate) non_zero_columns: Vec<usize>,
    saved_state: Option<Box<SavedState>>,
}

impl std::fmt::Debug for Tableau {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Tableau")?;
        writeln!(
            f,
            "width: {}, height: {}, feasible: {}, bounded: {}, evaluation: {}",
            self.width, self.height, self.feasible, self.bounded, self.evaluation
        )?;
        writeln!(f, "var_index_by_row:\n{:?}", self.var_index_by_row)?;
        writeln!(f, "var_index_by_col:\n{:?}", self.var_index_by_col)?;
        writeln!(f, "matrix:")?;
        for row in &self.matrix {
            writeln!(f, "{:?}", row)?;
        }
        for objective in &self.optional_objectives {
            writeln!(
                f,
                "optional objective {}:\n{:?}",
                objective.priority, objective.reduced_costs
            )?;
        }
        Ok(())
    }
}

impl Tableau {
    pub fn new(precision: f64) -> Self {
        Self {
            precision,
            matrix: vec![vec![0.0]],
            width: 1,
            height: 1,
            var_index_by_row: vec![NO_VARIABLE],
            var_index_by_col: vec![NO_VARIABLE],
            row_by_var_index: vec![],
            col_by_var_index: vec![],
            optional_objectives: vec![],
            variables_per_index: vec![],
            allocator: IndexAllocator::default(),
            feasible: true,
            bounded: true,
            evaluation: 0.0,
            unbounded_var_index: None,
            simplex_iterations: 0,
            best_possible_evaluation: 0.0,
            branch_and_cut_iterations: 0,
            is_integral: false,
            check_for_cycles: true,
            non_zero_columns: vec![],
            saved_state: None,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn precision(&self) -> f64 {
        self.precision
    }

    pub fn is_feasible(&self) -> bool {
        self.feasible
    }

    pub fn is_bounded(&self) -> bool {
        self.bounded
    }

    /// The rounded objective value, in minimisation orientation.
    pub fn evaluation(&self) -> f64 {
        self.evaluation
    }

    pub fn matrix(&self) -> &[Vec<f64>] {
        &self.matrix
    }

    pub fn row_of(&self, var_index: usize) -> Option<usize> {
        self.row_by_var_index.get(var_index).copied().flatten()
    }

    pub fn column_of(&self, var_index: usize) -> Option<usize> {
        self.col_by_var_index.get(var_index).copied().flatten()
    }

    pub fn variable(&self, var_index: usize) -> Option<&VariableData> {
        self.variables_per_index.get(var_index).and_then(Option::as_ref)
    }

    pub(crate) fn variable_mut(&mut self, var_index: usize) -> Option<&mut VariableData> {
        self.variables_per_index
            .get_mut(var_index)
            .and_then(Option::as_mut)
    }

    pub(crate) fn is_unrestricted(&self, var_index: usize) -> bool {
        self.variable(var_index).is_some_and(|v| v.unrestricted)
    }

    pub(crate) fn is_integer_index(&self, var_index: usize) -> bool {
        self.variable(var_index).is_some_and(VariableData::is_integer)
    }

    /// Returns a fresh dense index and grows the inverse maps to cover it.
    pub(crate) fn new_element_index(&mut self) -> usize {
        let index = self.allocator.allocate();
        if self.row_by_var_index.len() <= index {
            self.row_by_var_index.resize(index + 1, None);
            self.col_by_var_index.resize(index + 1, None);
        }
        if self.variables_per_index.len() <= index {
            self.variables_per_index.resize(index + 1, None);
        }
        index
    }

    pub(crate) fn register_variable(&mut self, variable: VariableData) {
        let index = variable.index;
        if self.variables_per_index.len() <= index {
            self.variables_per_index.resize(index + 1, None);
        }
        self.variables_per_index[index] = Some(variable);
    }

    /// Forgets a variable and makes its index available again.
    pub(crate) fn release_index(&mut self, var_index: usize) {
        if let Some(slot) = self.variables_per_index.get_mut(var_index) {
            *slot = None;
        }
        if let Some(row) = self.row_by_var_index.get_mut(var_index) {
            *row = None;
        }
        if let Some(col) = self.col_by_var_index.get_mut(var_index) {
            *col = None;
        }
        self.allocator.release(var_index);
    }

    pub(crate) fn optional_objective_mut(&mut self, priority: Priority) -> &mut OptionalObjective {
        let position = match self
            .optional_objectives
            .binary_search_by(|objective| objective.priority.cmp(&priority))
        {
            Ok(position) => position,
            Err(position) => {
                self.optional_objectives
                    .insert(position, OptionalObjective::new(priority, self.width));
                position
            }
        };
        &mut self.optional_objectives[position]
    }

    pub(crate) fn set_optional_objective(&mut self, priority: Priority, column: usize, cost: f64) {
        let objective = self.optional_objective_mut(priority);
        if objective.reduced_costs.len() <= column {
            objective.reduced_costs.resize(column + 1, 0.0);
        }
        objective.reduced_costs[column] = cost;
    }

    /// Builds the tableau of a model from scratch: every decision variable non-basic,
    /// every constraint slack basic in its own row.
    pub(crate) fn set_model(
        &mut self,
        variables: &[usize],
        constraints: &[&Constraint],
        is_minimization: bool,
    ) -> Result<()> {
        self.discard_search_state();
        self.width = variables.len() + 1;
        self.height = constraints.len() + 1;
        self.matrix = vec![vec![0.0; self.width]; self.height];
        self.var_index_by_row = vec![NO_VARIABLE; self.height];
        self.var_index_by_col = vec![NO_VARIABLE; self.width];
        self.row_by_var_index = vec![None; self.allocator.next];
        self.col_by_var_index = vec![None; self.allocator.next];
        self.optional_objectives.clear();
        self.feasible = true;
        self.bounded = true;
        self.evaluation = 0.0;
        self.unbounded_var_index = None;
        self.simplex_iterations = 0;
        self.branch_and_cut_iterations = 0;
        self.is_integral = false;

        let coefficient = if is_minimization { -1.0 } else { 1.0 };
        for (v, &var_index) in variables.iter().enumerate() {
            let column = v + 1;
            let variable = self
                .variable(var_index)
                .ok_or_else(|| anyhow!("variable {} is not part of the model", var_index))?;
            let (priority, cost) = (variable.priority, coefficient * variable.cost);
            if priority.is_required() {
                self.matrix[COST_ROW][column] = cost;
            } else {
                self.set_optional_objective(priority, column, cost);
            }
            self.row_by_var_index[var_index] = None;
            self.col_by_var_index[var_index] = Some(column);
            self.var_index_by_col[column] = var_index;
        }

        for (c, constraint) in constraints.iter().enumerate() {
            let row_index = c + 1;
            let slack = constraint.slack;
            self.row_by_var_index[slack] = Some(row_index);
            self.col_by_var_index[slack] = None;
            self.var_index_by_row[row_index] = slack;

            let sign = constraint.sign();
            for term in &constraint.terms {
                let column = self.column_of(term.variable).ok_or_else(|| {
                    anyhow!(
                        "constraint {} refers to variable {} which is not part of the model",
                        slack,
                        term.variable
                    )
                })?;
                self.matrix[row_index][column] = sign * term.coefficient;
            }
            self.matrix[row_index][RHS_COLUMN] = sign * constraint.rhs;
        }

        debug!(
            "built tableau of {} rows and {} columns, {} optional objective(s)",
            self.height,
            self.width,
            self.optional_objectives.len()
        );
        Ok(())
    }

    pub fn save(&mut self) {
        self.saved_state = Some(Box::new(SavedState {
            matrix: self.matrix.clone(),
            width: self.width,
            height: self.height,
            var_index_by_row: self.var_index_by_row.clone(),
            var_index_by_col: self.var_index_by_col.clone(),
            row_by_var_index: self.row_by_var_index.clone(),
            col_by_var_index: self.col_by_var_index.clone(),
            optional_objectives: self.optional_objectives.clone(),
            allocator: self.allocator.clone(),
            arena_len: self.variables_per_index.len(),
        }));
    }

    pub fn has_saved_state(&self) -> bool {
        self.saved_state.is_some()
    }

    /// Rolls back to the last saved state. The saved state is kept, so restoring is
    /// repeatable. Does nothing if nothing was saved.
    pub fn restore(&mut self) {
        let Some(saved) = self.saved_state.as_ref() else {
            return;
        };
        self.matrix.clone_from(&saved.matrix);
        self.width = saved.width;
        self.height = saved.height;
        self.var_index_by_row.clone_from(&saved.var_index_by_row);
        self.var_index_by_col.clone_from(&saved.var_index_by_col);
        self.row_by_var_index.clone_from(&saved.row_by_var_index);
        self.col_by_var_index.clone_from(&saved.col_by_var_index);
        self.optional_objectives.clone_from(&saved.optional_objectives);
        self.allocator.clone_from(&saved.allocator);

        //cut slacks created since the save are forgotten
        self.variables_per_index.truncate(saved.arena_len);
        for &index in &saved.allocator.available {
            if let Some(slot) = self.variables_per_index.get_mut(index) {
                *slot = None;
            }
        }
    }

    /// Leaves a branch-and-cut search: returns to the saved root relaxation (dropping any
    /// cut rows) and forgets the snapshot, so the tableau again describes the model alone.
    pub(crate) fn discard_search_state(&mut self) {
        if self.has_saved_state() {
            self.restore();
            self.saved_state = None;
        }
    }

    pub(crate) fn round(&self, value: f64) -> f64 {
        let rounding = (1.0 / self.precision).round();
        ((value + f64::EPSILON) * rounding).round() / rounding
    }

    /// Value of a variable in the current basis: its rhs if basic, zero otherwise.
    pub fn value_of(&self, var_index: usize) -> f64 {
        match self.row_of(var_index) {
            Some(row) => self.matrix[row][RHS_COLUMN],
            None => 0.0,
        }
    }

    pub(crate) fn update_variable_values(&mut self, variables: &[usize]) {
        for &var_index in variables {
            let value = self.round(self.value_of(var_index));
            if let Some(variable) = self.variable_mut(var_index) {
                variable.value = value;
            }
        }
    }

    /// Checks that every live variable is either basic or non-basic and that the four
    /// index maps agree.
    pub fn validate_basis(&self) -> Result<()> {
        if self.matrix.len() != self.height
            || self.var_index_by_row.len() != self.height
            || self.var_index_by_col.len() != self.width
        {
            return Err(anyhow!("tableau dimensions are inconsistent"));
        }
        for (r, row) in self.matrix.iter().enumerate() {
            if row.len() != self.width {
                return Err(anyhow!(
                    "row {} has {} columns instead of {}",
                    r,
                    row.len(),
                    self.width
                ));
            }
        }
        for r in 1..self.height {
            let var_index = self.var_index_by_row[r];
            if self.row_of(var_index) != Some(r) || self.column_of(var_index).is_some() {
                return Err(anyhow!("basic variable {} of row {} is not mapped back", var_index, r));
            }
        }
        for c in 1..self.width {
            let var_index = self.var_index_by_col[c];
            if self.column_of(var_index) != Some(c) || self.row_of(var_index).is_some() {
                return Err(anyhow!(
                    "non-basic variable {} of column {} is not mapped back",
                    var_index,
                    c
                ));
            }
        }
        for (var_index, variable) in self.variables_per_index.iter().enumerate() {
            if variable.is_some()
                && self.row_of(var_index).is_none()
                && self.column_of(var_index).is_none()
            {
                return Err(anyhow!("variable {} is neither basic nor non-basic", var_index));
            }
        }
        Ok(())
    }

    /// Solves the loaded model: plain simplex for continuous models, branch-and-cut as
    /// soon as there are integer variables.
    pub(crate) fn solve(&mut self, space: &SearchSpace) -> Result<Solution> {
        self.discard_search_state();
        self.check_for_cycles = space.options.exit_on_cycles;
        self.is_integral = false;
        //the next evaluation is the bound of the root relaxation
        self.simplex_iterations = 0;
        self.branch_and_cut_iterations = 0;

        let kept_solutions = if space.integer_variables.is_empty() {
            self.simplex()?;
            vec![]
        } else {
            self.branch_and_cut(space)?
        };

        self.update_variable_values(space.variables);
        Ok(self.get_solution(space, kept_solutions))
    }

    pub(crate) fn get_solution(
        &self,
        space: &SearchSpace,
        kept_solutions: Vec<crate::optimisation_algorithms::solution::KeptSolution>,
    ) -> Solution {
        let evaluation = space.reported(self.evaluation);
        let unbounded_variable = self
            .unbounded_var_index
            .filter(|_| !self.bounded)
            .and_then(|index| self.variable(index))
            .map(|variable| variable.id.clone());

        let mut solution = Solution::new(
            evaluation,
            self.feasible,
            self.bounded,
            self.solution_set(),
        );
        solution.unbounded_variable = unbounded_variable;
        if !space.integer_variables.is_empty() {
            solution.is_integral = Some(self.is_integral);
            solution.iterations = Some(self.branch_and_cut_iterations);
            solution.kept_solutions = kept_solutions;
        }
        solution
    }

    /// Rounded values of all basic non-slack variables, in row order.
    pub(crate) fn solution_set(&self) -> indexmap::IndexMap<String, f64> {
        let mut set = indexmap::IndexMap::new();
        for r in 1..self.height {
            let Some(variable) = self.variable(self.var_index_by_row[r]) else {
                continue;
            };
            if variable.is_slack() {
                continue;
            }
            set.insert(variable.id.clone(), self.round(self.matrix[r][RHS_COLUMN]));
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimisation_algorithms::expressions::{Term, VariableKind};

    fn continuous(id: &str, cost: f64, index: usize) -> VariableData {
        VariableData::new(id.into(), cost, index, Priority(0), VariableKind::Continuous, false)
    }

    fn term(variable: usize, coefficient: f64) -> Term {
        Term {
            variable,
            coefficient,
        }
    }

    fn two_variable_tableau() -> Tableau {
        let mut tableau = Tableau::new(1e-9);
        let y = tableau.new_element_index();
        tableau.register_variable(continuous("y", 3.5, y));
        let x = tableau.new_element_index();
        tableau.register_variable(continuous("x", 4.0, x));
        let s1 = tableau.new_element_index();
        tableau.register_variable(VariableData::slack(s1));
        let s2 = tableau.new_element_index();
        tableau.register_variable(VariableData::slack(s2));

        let mut c1 = Constraint::new(s1, 200.0, true);
        c1.terms = vec![term(y, 0.5), term(x, 0.25)];
        let mut c2 = Constraint::new(s2, 330.0, false);
        c2.terms = vec![term(y, 0.5), term(x, 0.75)];
        tableau.set_model(&[y, x], &[&c1, &c2], false).unwrap();
        tableau
    }

    #[test]
    fn set_model_layout() {
        let tableau = two_variable_tableau();
        assert_eq!(tableau.width(), 3);
        assert_eq!(tableau.height(), 3);
        assert_eq!(tableau.matrix[0], vec![0.0, 3.5, 4.0]);
        assert_eq!(tableau.matrix[1], vec![200.0, 0.5, 0.25]);
        //lower-bound rows are flipped into <= form
        assert_eq!(tableau.matrix[2], vec![-330.0, -0.5, -0.75]);
        assert_eq!(tableau.row_of(2), Some(1));
        assert_eq!(tableau.column_of(0), Some(1));
        tableau.validate_basis().unwrap();
    }

    #[test]
    fn save_restore() {
        let mut tableau = two_variable_tableau();
        tableau.save();
        tableau.pivot(1, 1);
        tableau.new_element_index();
        assert_ne!(tableau.matrix[1][0], 200.0);

        tableau.restore();
        assert_eq!(tableau.matrix[1], vec![200.0, 0.5, 0.25]);
        assert_eq!(tableau.row_of(2), Some(1));
        assert_eq!(tableau.allocator.next, 4);
        tableau.validate_basis().unwrap();

        //restoring twice is harmless
        tableau.restore();
        assert_eq!(tableau.matrix[0], vec![0.0, 3.5, 4.0]);
    }

    #[test]
    fn allocator_recycles() {
        let mut allocator = IndexAllocator::default();
        assert_eq!(allocator.allocate(), 0);
        assert_eq!(allocator.allocate(), 1);
        allocator.release(0);
        assert_eq!(allocator.allocate(), 0);
        assert_eq!(allocator.allocate(), 2);
    }

    #[test]
    fn optional_objectives_sorted() {
        let mut tableau = Tableau::new(1e-9);
        tableau.width = 3;
        tableau.set_optional_objective(Priority(3), 1, 1.0);
        tableau.set_optional_objective(Priority(1), 2, 2.0);
        let priorities: Vec<_> = tableau.optional_objectives.iter().map(|o| o.priority.0).collect();
        assert_eq!(priorities, vec![1, 3]);
        assert_eq!(tableau.optional_objectives[0].reduced_costs, vec![0.0, 0.0, 2.0]);
    }
}
