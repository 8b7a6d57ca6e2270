use anyhow::{Result, anyhow};
use log::{debug, trace};

use crate::optimisation_algorithms::{
    cycle_detection::PivotHistory,
    tableau::{COST_ROW, RHS_COLUMN, Tableau},
};

/// Entries of the pivot row within this bound are treated as exact zeros.
const PIVOT_ZERO: f64 = 1e-16;

impl Tableau {
    /// Runs phase 1 and, if a feasible basis was found, phase 2.
    pub fn simplex(&mut self) -> Result<()> {
        self.bounded = true;
        self.unbounded_var_index = None;
        self.phase1()?;
        if self.feasible {
            self.phase2()?;
        }
        Ok(())
    }

    /// Restores primal feasibility with a dual ratio test on the most negative row.
    /// Returns the number of pivots.
    pub(crate) fn phase1(&mut self) -> Result<usize> {
        let mut history = PivotHistory::new();
        let mut iterations = 0;
        loop {
            let mut leaving_row = None;
            let mut rhs_value = -self.precision;
            for r in 1..self.height {
                let value = self.matrix[r][RHS_COLUMN];
                if value < rhs_value && !self.is_unrestricted(self.var_index_by_row[r]) {
                    rhs_value = value;
                    leaving_row = Some(r);
                }
            }
            let Some(leaving_row) = leaving_row else {
                self.feasible = true;
                debug!("phase 1 reached a feasible basis after {} pivot(s)", iterations);
                return Ok(iterations);
            };

            let mut entering_column = None;
            let mut max_quotient = f64::NEG_INFINITY;
            {
                let cost_row = &self.matrix[COST_ROW];
                let row = &self.matrix[leaving_row];
                for c in 1..self.width {
                    let coefficient = row[c];
                    if coefficient.abs() <= self.precision {
                        continue;
                    }
                    if coefficient < 0.0 || self.is_unrestricted(self.var_index_by_col[c]) {
                        let quotient = -cost_row[c] / coefficient;
                        if max_quotient < quotient {
                            max_quotient = quotient;
                            entering_column = Some(c);
                        }
                    }
                }
            }
            let Some(entering_column) = entering_column else {
                self.feasible = false;
                debug!(
                    "phase 1: row {} cannot be made non-negative, the problem is infeasible",
                    leaving_row
                );
                return Ok(iterations);
            };

            self.record_pivot(&mut history, leaving_row, entering_column, "phase 1")?;
            self.pivot(leaving_row, entering_column);
            iterations += 1;
        }
    }

    /// Restores optimality from a feasible basis. Returns the number of pivots.
    pub(crate) fn phase2(&mut self) -> Result<usize> {
        let mut history = PivotHistory::new();
        let mut iterations = 0;
        loop {
            let Some((entering_column, is_reduced_cost_negative)) = self.entering_column() else {
                self.set_evaluation();
                self.simplex_iterations += 1;
                debug!(
                    "phase 2 reached an optimum of {} after {} pivot(s)",
                    self.evaluation, iterations
                );
                return Ok(iterations);
            };

            let Some(leaving_row) = self.leaving_row(entering_column, is_reduced_cost_negative)
            else {
                self.evaluation = f64::NEG_INFINITY;
                self.bounded = false;
                self.unbounded_var_index = Some(self.var_index_by_col[entering_column]);
                debug!(
                    "phase 2: variable {} can improve the objective without bound",
                    self.var_index_by_col[entering_column]
                );
                return Ok(iterations);
            };

            self.record_pivot(&mut history, leaving_row, entering_column, "phase 2")?;
            self.pivot(leaving_row, entering_column);
            iterations += 1;
        }
    }

    /// Chooses the column with the largest improving reduced cost. Columns whose primary
    /// reduced cost is zero are left to the optional objectives, in priority order.
    fn entering_column(&self) -> Option<(usize, bool)> {
        let has_optional_objectives = !self.optional_objectives.is_empty();
        let mut tied_columns = vec![];

        let cost_row = &self.matrix[COST_ROW];
        let mut best = self.best_improving_column(
            (1..self.width).filter(|&c| {
                if has_optional_objectives && cost_row[c].abs() < self.precision {
                    tied_columns.push(c);
                    false
                } else {
                    true
                }
            }),
            cost_row,
        );

        for objective in &self.optional_objectives {
            if best.is_some() || tied_columns.is_empty() {
                break;
            }
            let reduced_costs = &objective.reduced_costs;
            let mut still_tied = vec![];
            best = self.best_improving_column(
                tied_columns.iter().copied().filter(|&c| {
                    if reduced_costs[c].abs() < self.precision {
                        still_tied.push(c);
                        false
                    } else {
                        true
                    }
                }),
                reduced_costs,
            );
            tied_columns = still_tied;
        }
        best
    }

    fn best_improving_column(
        &self,
        columns: impl Iterator<Item = usize>,
        reduced_costs: &[f64],
    ) -> Option<(usize, bool)> {
        let mut best = None;
        let mut entering_value = self.precision;
        for c in columns {
            let reduced_cost = reduced_costs[c];
            if self.is_unrestricted(self.var_index_by_col[c]) && reduced_cost < 0.0 {
                if -reduced_cost > entering_value {
                    entering_value = -reduced_cost;
                    best = Some((c, true));
                }
            } else if reduced_cost > entering_value {
                entering_value = reduced_cost;
                best = Some((c, false));
            }
        }
        best
    }

    /// Minimum-ratio test on the entering column. A row that is already degenerate in
    /// the direction of movement is taken immediately.
    fn leaving_row(&self, entering_column: usize, is_reduced_cost_negative: bool) -> Option<usize> {
        let direction = if is_reduced_cost_negative { -1.0 } else { 1.0 };
        let mut leaving_row = None;
        let mut min_quotient = f64::INFINITY;
        for r in 1..self.height {
            if self.is_unrestricted(self.var_index_by_row[r]) {
                continue;
            }
            let rhs_value = self.matrix[r][RHS_COLUMN];
            let column_value = self.matrix[r][entering_column];
            if column_value.abs() < self.precision {
                continue;
            }
            if direction * column_value > 0.0 && rhs_value.abs() < self.precision {
                return Some(r);
            }
            let quotient = direction * rhs_value / column_value;
            if quotient > self.precision && min_quotient > quotient {
                min_quotient = quotient;
                leaving_row = Some(r);
            }
        }
        leaving_row
    }

    fn record_pivot(
        &self,
        history: &mut PivotHistory,
        leaving_row: usize,
        entering_column: usize,
        phase: &str,
    ) -> Result<()> {
        if !self.check_for_cycles {
            return Ok(());
        }
        let leaving = self.var_index_by_row[leaving_row];
        let entering = self.var_index_by_col[entering_column];
        match history.record(leaving, entering) {
            Some(cycle) => Err(anyhow!("cycle in {}: {}", phase, cycle)),
            None => Ok(()),
        }
    }

    /// Records the rounded objective value. The first evaluation after a model is loaded
    /// is the bound of the root relaxation.
    pub(crate) fn set_evaluation(&mut self) {
        self.evaluation = self.round(self.matrix[COST_ROW][RHS_COLUMN]);
        if self.simplex_iterations == 0 {
            self.best_possible_evaluation = self.evaluation;
        }
    }

    /// Exchanges the basic variable of `pivot_row` with the non-basic variable of
    /// `pivot_column`. All basis changes go through here.
    pub(crate) fn pivot(&mut self, pivot_row: usize, pivot_column: usize) {
        let quotient = self.matrix[pivot_row][pivot_column];
        trace!(
            "pivot on ({}, {}) = {}, variable {} leaves, variable {} enters",
            pivot_row,
            pivot_column,
            quotient,
            self.var_index_by_row[pivot_row],
            self.var_index_by_col[pivot_column]
        );

        let leaving = self.var_index_by_row[pivot_row];
        let entering = self.var_index_by_col[pivot_column];
        self.var_index_by_row[pivot_row] = entering;
        self.var_index_by_col[pivot_column] = leaving;
        self.row_by_var_index[entering] = Some(pivot_row);
        self.row_by_var_index[leaving] = None;
        self.col_by_var_index[entering] = None;
        self.col_by_var_index[leaving] = Some(pivot_column);

        let mut row = std::mem::take(&mut self.matrix[pivot_row]);
        let mut non_zero_columns = std::mem::take(&mut self.non_zero_columns);
        non_zero_columns.clear();
        for (c, value) in row.iter_mut().enumerate() {
            if value.abs() > PIVOT_ZERO {
                *value /= quotient;
                non_zero_columns.push(c);
            } else {
                *value = 0.0;
            }
        }
        row[pivot_column] = 1.0 / quotient;

        for (r, other) in self.matrix.iter_mut().enumerate() {
            if r == pivot_row {
                continue;
            }
            eliminate(other, &row, &non_zero_columns, pivot_column, quotient);
        }
        for objective in self.optional_objectives.iter_mut() {
            eliminate(
                &mut objective.reduced_costs,
                &row,
                &non_zero_columns,
                pivot_column,
                quotient,
            );
        }

        self.matrix[pivot_row] = row;
        self.non_zero_columns = non_zero_columns;
    }
}

fn eliminate(
    target: &mut [f64],
    pivot_row: &[f64],
    non_zero_columns: &[usize],
    pivot_column: usize,
    quotient: f64,
) {
    let coefficient = target[pivot_column];
    if coefficient.abs() <= PIVOT_ZERO {
        target[pivot_column] = 0.0;
        return;
    }
    for &c in non_zero_columns {
        target[c] -= coefficient * pivot_row[c];
    }
    target[pivot_column] = -coefficient / quotient;
}

#[cfg(test)]
mod tests {
    use crate::optimisation_algorithms::{
        cycle_detection::PivotHistory,
        expressions::{Constraint, Priority, Term, VariableData, VariableKind},
        tableau::Tableau,
    };

    /// Loads `max/min sum costs[j] x_j` subject to `sum rows[i][j] x_j (<= or >=) rhs[i]`.
    fn load(
        costs: &[f64],
        rows: &[(&[f64], f64, bool)],
        minimise: bool,
        unrestricted: &[bool],
    ) -> (Tableau, Vec<usize>) {
        let mut tableau = Tableau::new(1e-9);
        let mut variables = vec![];
        for (j, cost) in costs.iter().enumerate() {
            let index = tableau.new_element_index();
            tableau.register_variable(VariableData::new(
                format!("x{}", j),
                *cost,
                index,
                Priority(0),
                VariableKind::Continuous,
                unrestricted.get(j).copied().unwrap_or(false),
            ));
            variables.push(index);
        }
        let mut constraints = vec![];
        for (coefficients, rhs, upper) in rows {
            let slack = tableau.new_element_index();
            tableau.register_variable(VariableData::slack(slack));
            let mut constraint = Constraint::new(slack, *rhs, *upper);
            constraint.terms = coefficients
                .iter()
                .zip(variables.iter())
                .map(|(coefficient, variable)| Term {
                    variable: *variable,
                    coefficient: *coefficient,
                })
                .collect();
            constraints.push(constraint);
        }
        let refs: Vec<&Constraint> = constraints.iter().collect();
        tableau.set_model(&variables, &refs, minimise).unwrap();
        (tableau, variables)
    }

    #[test]
    fn simplex_maximise() {
        let (mut tableau, variables) = load(
            &[3.5, 4.0],
            &[(&[0.5, 0.25], 200.0, true), (&[0.5, 0.75], 330.0, true)],
            false,
            &[],
        );
        tableau.simplex().unwrap();
        assert!(tableau.is_feasible());
        assert!(tableau.is_bounded());
        assert_eq!(tableau.evaluation(), -1985.0);
        assert_eq!(tableau.round(tableau.value_of(variables[0])), 270.0);
        assert_eq!(tableau.round(tableau.value_of(variables[1])), 260.0);
        tableau.validate_basis().unwrap();
    }

    #[test]
    fn simplex_minimise_needs_phase1() {
        //min x + y s.t. x + 2y >= 4, 3x + y >= 6
        let (mut tableau, variables) = load(
            &[1.0, 1.0],
            &[(&[1.0, 2.0], 4.0, false), (&[3.0, 1.0], 6.0, false)],
            true,
            &[],
        );
        tableau.simplex().unwrap();
        assert!(tableau.is_feasible());
        assert_eq!(tableau.evaluation(), 2.8);
        assert_eq!(tableau.round(tableau.value_of(variables[0])), 1.6);
        assert_eq!(tableau.round(tableau.value_of(variables[1])), 1.2);
    }

    #[test]
    fn simplex_infeasible() {
        let (mut tableau, _) = load(
            &[1.0],
            &[(&[1.0], 100.0, false), (&[1.0], 50.0, true)],
            false,
            &[],
        );
        tableau.simplex().unwrap();
        assert!(!tableau.is_feasible());
    }

    #[test]
    fn simplex_unbounded() {
        let (mut tableau, variables) = load(&[1.0, 1.0], &[(&[0.0, 1.0], 5.0, true)], false, &[]);
        tableau.simplex().unwrap();
        assert!(!tableau.is_bounded());
        assert_eq!(tableau.evaluation(), f64::NEG_INFINITY);
        assert_eq!(tableau.unbounded_var_index, Some(variables[0]));
    }

    #[test]
    fn simplex_unrestricted() {
        //min x s.t. x >= -5, x unrestricted
        let (mut tableau, variables) = load(&[1.0], &[(&[1.0], -5.0, false)], true, &[true]);
        tableau.simplex().unwrap();
        assert!(tableau.is_feasible());
        assert!(tableau.is_bounded());
        assert_eq!(tableau.evaluation(), -5.0);
        assert_eq!(tableau.round(tableau.value_of(variables[0])), -5.0);
    }

    #[test]
    fn pivot_keeps_basis_consistent() {
        let (mut tableau, variables) = load(
            &[1.0, 2.0],
            &[(&[1.0, 1.0], 4.0, true), (&[1.0, 3.0], 6.0, true)],
            false,
            &[],
        );
        tableau.pivot(1, 1);
        assert_eq!(tableau.row_of(variables[0]), Some(1));
        assert_eq!(tableau.column_of(variables[0]), None);
        assert_eq!(tableau.matrix[1], vec![4.0, 1.0, 1.0]);
        assert_eq!(tableau.matrix[2], vec![2.0, -1.0, 2.0]);
        tableau.validate_basis().unwrap();

        //pivoting back restores the initial tableau
        tableau.pivot(1, 1);
        assert_eq!(tableau.matrix[1], vec![4.0, 1.0, 1.0]);
        assert_eq!(tableau.matrix[2], vec![6.0, 1.0, 3.0]);
        assert_eq!(tableau.matrix[0], vec![0.0, 1.0, 2.0]);
    }

    /// Pivots back and forth on the same element: (slack, x), (x, slack), ...
    fn alternate_pivots(tableau: &mut Tableau, history: &mut PivotHistory, pivots: usize) {
        for _ in 0..pivots {
            tableau.record_pivot(history, 1, 1, "phase 2").unwrap();
            tableau.pivot(1, 1);
        }
    }

    #[test]
    fn repeating_pivots_are_an_error() {
        let (mut tableau, _) = load(&[1.0, 2.0], &[(&[1.0, 1.0], 4.0, true)], false, &[]);
        tableau.check_for_cycles = true;
        let mut history = PivotHistory::new();
        alternate_pivots(&mut tableau, &mut history, 3);

        let error = tableau.record_pivot(&mut history, 1, 1, "phase 2").unwrap_err();
        assert!(error.to_string().contains("cycle in phase 2"));
        assert_eq!(history.len(), 4);
    }

    #[test]
    fn repeating_pivots_are_ignored_without_cycle_checks() {
        let (mut tableau, _) = load(&[1.0, 2.0], &[(&[1.0, 1.0], 4.0, true)], false, &[]);
        tableau.check_for_cycles = false;
        let mut history = PivotHistory::new();
        alternate_pivots(&mut tableau, &mut history, 6);
        assert!(history.is_empty());
        tableau.validate_basis().unwrap();
    }
}
