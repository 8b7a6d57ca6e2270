use anyhow::{Result, anyhow};
use itertools::Either;
use log::debug;

use crate::optimisation_algorithms::{
    expressions::{Priority, Term},
    tableau::{COST_ROW, RHS_COLUMN, Tableau},
};

/// In-place edits of a solved tableau. Every edit keeps the basis consistent, so that a
/// following solve starts from the previous basis instead of from scratch.
///
/// Differences are given in the orientation of the model: the sign flip of lower-bound
/// rows and of maximisation is applied here. Edits first drop a pending branch-and-cut
/// state; callers that allocate an index for an addition must drop it before allocating.
impl Tableau {
    /// Changes the right-hand side of the constraint owning `slack` by `difference`.
    pub fn update_right_hand_side(
        &mut self,
        slack: usize,
        is_upper_bound: bool,
        difference: f64,
    ) -> Result<()> {
        self.discard_search_state();
        let difference = if is_upper_bound { difference } else { -difference };

        if let Some(row) = self.row_of(slack) {
            self.matrix[row][RHS_COLUMN] += difference;
            return Ok(());
        }

        let column = self
            .column_of(slack)
            .ok_or_else(|| anyhow!("constraint {} is not part of the tableau", slack))?;
        for row in self.matrix.iter_mut() {
            row[RHS_COLUMN] += difference * row[column];
        }
        for objective in self.optional_objectives.iter_mut() {
            objective.reduced_costs[RHS_COLUMN] += difference * objective.reduced_costs[column];
        }
        Ok(())
    }

    /// Changes the coefficient of `variable` in the constraint owning `slack` by
    /// `difference`.
    pub fn update_constraint_coefficient(
        &mut self,
        slack: usize,
        is_upper_bound: bool,
        variable: usize,
        difference: f64,
    ) -> Result<()> {
        if slack == variable {
            return Err(anyhow!(
                "cannot change the coefficient of a constraint against its own slack {}",
                slack
            ));
        }
        self.discard_search_state();
        let difference = if is_upper_bound { difference } else { -difference };

        let row = self.put_in_base(slack)?;
        if let Some(column) = self.column_of(variable) {
            self.matrix[row][column] += difference;
        } else if let Some(variable_row) = self.row_of(variable) {
            let variable_row = self.matrix[variable_row].clone();
            for (value, v) in self.matrix[row].iter_mut().zip(variable_row) {
                *value -= difference * v;
            }
        } else {
            return Err(anyhow!("variable {} is not part of the tableau", variable));
        }
        Ok(())
    }

    /// Changes the cost of `variable` by `difference`, in the objective row of its
    /// priority.
    pub fn update_cost(
        &mut self,
        variable: usize,
        priority: Priority,
        is_minimization: bool,
        difference: f64,
    ) -> Result<()> {
        self.discard_search_state();
        let difference = if is_minimization { -difference } else { difference };

        let position = match (self.column_of(variable), self.row_of(variable)) {
            (Some(column), _) => Either::Left(column),
            (None, Some(row)) => Either::Right(self.matrix[row].clone()),
            (None, None) => return Err(anyhow!("variable {} is not part of the tableau", variable)),
        };
        let objective_row = if priority.is_required() {
            &mut self.matrix[COST_ROW]
        } else {
            &mut self.optional_objective_mut(priority).reduced_costs
        };

        match position {
            Either::Left(column) => objective_row[column] += difference,
            Either::Right(variable_row) => {
                for (value, v) in objective_row.iter_mut().zip(variable_row) {
                    *value -= difference * v;
                }
            }
        }
        Ok(())
    }

    /// Adds a row for a new constraint whose slack has already been allocated and
    /// registered. The slack becomes basic.
    pub fn add_constraint(
        &mut self,
        slack: usize,
        is_upper_bound: bool,
        rhs: f64,
        terms: &[Term],
    ) -> Result<()> {
        let sign = if is_upper_bound { 1.0 } else { -1.0 };

        let mut row = vec![0.0; self.width];
        row[RHS_COLUMN] = sign * rhs;
        for term in terms {
            let coefficient = sign * term.coefficient;
            if let Some(column) = self.column_of(term.variable) {
                row[column] += coefficient;
            } else if let Some(variable_row) = self.row_of(term.variable) {
                for (value, v) in row.iter_mut().zip(&self.matrix[variable_row]) {
                    *value -= coefficient * v;
                }
            } else {
                return Err(anyhow!("variable {} is not part of the tableau", term.variable));
            }
        }

        self.push_basic_row(slack, row);
        debug!("added constraint {} as row {}", slack, self.height - 1);
        Ok(())
    }

    pub(crate) fn push_basic_row(&mut self, slack: usize, row: Vec<f64>) {
        let row_index = self.height;
        self.matrix.push(row);
        self.var_index_by_row.push(slack);
        if self.row_by_var_index.len() <= slack {
            self.row_by_var_index.resize(slack + 1, None);
            self.col_by_var_index.resize(slack + 1, None);
        }
        self.row_by_var_index[slack] = Some(row_index);
        self.col_by_var_index[slack] = None;
        self.height += 1;
    }

    /// Drops the row of the constraint owning `slack` and recycles the slack's index.
    pub fn remove_constraint(&mut self, slack: usize) -> Result<()> {
        self.discard_search_state();
        let row = self.put_in_base(slack)?;

        self.matrix.swap_remove(row);
        self.var_index_by_row.swap_remove(row);
        self.height -= 1;
        if row < self.height {
            let moved = self.var_index_by_row[row];
            self.row_by_var_index[moved] = Some(row);
        }
        self.release_index(slack);
        debug!("removed constraint {}", slack);
        Ok(())
    }

    /// Adds a zero column for a new variable that has already been allocated and
    /// registered. The variable starts non-basic.
    pub fn add_variable(&mut self, variable: usize, is_minimization: bool) -> Result<()> {
        let (cost, priority) = self
            .variable(variable)
            .map(|v| (v.cost, v.priority))
            .ok_or_else(|| anyhow!("variable {} is not registered", variable))?;
        let cost = if is_minimization { -cost } else { cost };

        let column = self.width;
        for row in self.matrix.iter_mut() {
            row.push(0.0);
        }
        for objective in self.optional_objectives.iter_mut() {
            objective.reduced_costs.push(0.0);
        }
        self.var_index_by_col.push(variable);
        self.width += 1;
        if self.col_by_var_index.len() <= variable {
            self.row_by_var_index.resize(variable + 1, None);
            self.col_by_var_index.resize(variable + 1, None);
        }
        self.col_by_var_index[variable] = Some(column);
        self.row_by_var_index[variable] = None;

        if priority.is_required() {
            self.matrix[COST_ROW][column] = cost;
        } else {
            self.set_optional_objective(priority, column, cost);
        }
        Ok(())
    }

    /// Drops the column of `variable` and recycles its index. The last column takes its
    /// place.
    pub fn remove_variable(&mut self, variable: usize) -> Result<()> {
        self.discard_search_state();
        let column = self.take_out_of_base(variable)?;

        for row in self.matrix.iter_mut() {
            row.swap_remove(column);
        }
        for objective in self.optional_objectives.iter_mut() {
            objective.reduced_costs.swap_remove(column);
        }
        self.var_index_by_col.swap_remove(column);
        self.width -= 1;
        if column < self.width {
            let moved = self.var_index_by_col[column];
            self.col_by_var_index[moved] = Some(column);
        }
        self.release_index(variable);
        debug!("removed variable {}", variable);
        Ok(())
    }

    /// Makes `variable` basic if it is not, pivoting on the first row with a usable
    /// coefficient in its column. Returns its row.
    pub(crate) fn put_in_base(&mut self, variable: usize) -> Result<usize> {
        if let Some(row) = self.row_of(variable) {
            return Ok(row);
        }
        let column = self
            .column_of(variable)
            .ok_or_else(|| anyhow!("variable {} is not part of the tableau", variable))?;
        let row = (1..self.height)
            .find(|&r| self.matrix[r][column].abs() > self.precision)
            .ok_or_else(|| anyhow!("variable {} cannot be brought into the basis", variable))?;
        self.pivot(row, column);
        Ok(row)
    }

    /// Makes `variable` non-basic if it is not, pivoting on the first usable column of
    /// its row. Returns its column.
    pub(crate) fn take_out_of_base(&mut self, variable: usize) -> Result<usize> {
        if let Some(column) = self.column_of(variable) {
            return Ok(column);
        }
        let row = self
            .row_of(variable)
            .ok_or_else(|| anyhow!("variable {} is not part of the tableau", variable))?;
        let column = (1..self.width)
            .find(|&c| self.matrix[row][c].abs() > self.precision)
            .ok_or_else(|| anyhow!("variable {} cannot be taken out of the basis", variable))?;
        self.pivot(row, column);
        Ok(column)
    }
}
