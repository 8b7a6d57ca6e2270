use anyhow::Result;
use log::trace;

use crate::optimisation_algorithms::{
    branch_and_cut::{Cut, CutKind},
    expressions::{Term, VariableData},
    tableau::{RHS_COLUMN, Tableau},
};

impl Tableau {
    fn new_slack(&mut self) -> usize {
        let slack = self.new_element_index();
        self.register_variable(VariableData::slack(slack));
        slack
    }

    /// Adds one row per cut, each with a fresh basic slack.
    pub fn add_cut_constraints(&mut self, cuts: &[Cut]) -> Result<()> {
        for cut in cuts {
            let slack = self.new_slack();
            self.add_constraint(
                slack,
                cut.kind == CutKind::Max,
                cut.value,
                &[Term {
                    variable: cut.variable,
                    coefficient: 1.0,
                }],
            )?;
        }
        Ok(())
    }

    /// Adds mixed-integer rounding cuts derived from every row with a fractional integer
    /// basic variable. Returns the number of cuts added.
    pub fn apply_mir_cuts(&mut self, integer_variables: &[usize]) -> Result<usize> {
        let rows = (1..self.height)
            .filter(|&r| {
                integer_variables.contains(&self.var_index_by_row[r])
                    && self.fractional_part(self.matrix[r][RHS_COLUMN]).is_some()
            })
            .collect::<Vec<_>>();
        let mut added = 0;
        for row in rows {
            if self.add_lower_bound_mir_cut(row) {
                added += 1;
            }
            if self.add_upper_bound_mir_cut(row) {
                added += 1;
            }
        }
        trace!("added {} rounding cut(s)", added);
        Ok(added)
    }

    /// The fractional part of `value`, if it is not within precision of an integer.
    fn fractional_part(&self, value: f64) -> Option<f64> {
        let fraction = value - value.floor();
        if fraction < self.precision || 1.0 - self.precision < fraction {
            None
        } else {
            Some(fraction)
        }
    }

    /// Rounding cuts assume every non-basic variable is non-negative.
    fn has_unrestricted_column(&self, row: usize) -> bool {
        (1..self.width).any(|c| {
            self.matrix[row][c].abs() > self.precision
                && self.is_unrestricted(self.var_index_by_col[c])
        })
    }

    fn is_cut_source(&self, row: usize) -> Option<f64> {
        if row == 0 || !self.is_integer_index(self.var_index_by_row[row]) {
            return None;
        }
        if self.has_unrestricted_column(row) {
            return None;
        }
        self.fractional_part(self.matrix[row][RHS_COLUMN])
    }

    /// Mixed-integer rounding of the row `x_B + sum a_j x_j = d` into
    /// `x_B + sum g_j x_j <= floor(d)`, stored through its new slack.
    pub(crate) fn add_lower_bound_mir_cut(&mut self, row: usize) -> bool {
        let Some(f) = self.is_cut_source(row) else {
            return false;
        };
        let source = self.matrix[row].clone();

        let mut cut = vec![0.0; self.width];
        cut[RHS_COLUMN] = source[RHS_COLUMN].floor();
        for c in 1..self.width {
            let a = source[c];
            cut[c] = if self.is_integer_index(self.var_index_by_col[c]) {
                a.floor() + (a - a.floor() - f).max(0.0) / (1.0 - f)
            } else {
                (a / (1.0 - f)).min(0.0)
            };
        }
        for (value, s) in cut.iter_mut().zip(&source) {
            *value -= s;
        }

        let slack = self.new_slack();
        self.push_basic_row(slack, cut);
        true
    }

    /// Gomory mixed-integer cut of the row `x_B + sum a_j x_j = b`, scaled by the
    /// fractional part `f` of `b`: `sum h_j x_j >= f`.
    pub(crate) fn add_upper_bound_mir_cut(&mut self, row: usize) -> bool {
        let Some(f) = self.is_cut_source(row) else {
            return false;
        };
        let source = self.matrix[row].clone();

        let mut cut = vec![0.0; self.width];
        cut[RHS_COLUMN] = -f;
        for c in 1..self.width {
            let a = source[c];
            cut[c] = if self.is_integer_index(self.var_index_by_col[c]) {
                let fj = a - a.floor();
                if fj <= f {
                    -fj
                } else {
                    -(1.0 - fj) * f / (1.0 - f)
                }
            } else if a >= 0.0 {
                -a
            } else {
                a * f / (1.0 - f)
            };
        }

        let slack = self.new_slack();
        self.push_basic_row(slack, cut);
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::optimisation_algorithms::{
        branch_and_cut::Cut,
        expressions::{Constraint, Priority, Term, VariableData, VariableKind},
        tableau::Tableau,
    };

    /// max x + y s.t. 2x + 2y <= 3, x and y integer.
    fn fractional_tableau() -> (Tableau, Vec<usize>) {
        let mut tableau = Tableau::new(1e-9);
        let mut variables = vec![];
        for id in ["x", "y"] {
            let index = tableau.new_element_index();
            tableau.register_variable(VariableData::new(
                id.into(),
                1.0,
                index,
                Priority(0),
                VariableKind::Integer,
                false,
            ));
            variables.push(index);
        }
        let slack = tableau.new_element_index();
        tableau.register_variable(VariableData::slack(slack));
        let mut constraint = Constraint::new(slack, 3.0, true);
        constraint.terms = variables
            .iter()
            .map(|&variable| Term {
                variable,
                coefficient: 2.0,
            })
            .collect();
        tableau.set_model(&variables, &[&constraint], false).unwrap();
        tableau.simplex().unwrap();
        (tableau, variables)
    }

    #[test]
    fn bound_cuts() {
        let (mut tableau, variables) = fractional_tableau();
        assert_eq!(tableau.evaluation(), -1.5);
        //x is basic at 1.5
        assert_eq!(tableau.value_of(variables[0]), 1.5);

        tableau.add_cut_constraints(&[Cut::max(variables[0], 1.0)]).unwrap();
        assert_eq!(tableau.height(), 3);
        tableau.validate_basis().unwrap();
        tableau.simplex().unwrap();
        assert_eq!(tableau.evaluation(), -1.5);
        assert_eq!(tableau.round(tableau.value_of(variables[0])), 1.0);
        assert_eq!(tableau.round(tableau.value_of(variables[1])), 0.5);

        tableau.add_cut_constraints(&[Cut::min(variables[1], 1.0)]).unwrap();
        tableau.simplex().unwrap();
        assert!(!tableau.is_feasible() || tableau.evaluation() >= -1.5);
    }

    #[test]
    fn rounding_cuts_close_the_gap() {
        let (mut tableau, variables) = fractional_tableau();
        let added = tableau.apply_mir_cuts(&variables).unwrap();
        assert_eq!(added, 2);
        tableau.validate_basis().unwrap();
        tableau.simplex().unwrap();
        assert!(tableau.is_feasible());
        //x + y <= 1 is the integer hull
        assert_eq!(tableau.evaluation(), -1.0);
    }
}
