use anyhow::{Context, Result, anyhow};
use indexmap::IndexMap;
use itertools::Itertools;
use log::{debug, info};

use crate::optimisation_algorithms::{
    branch_and_cut::SearchSpace,
    expressions::{
        Constraint, ConstraintRef, Priority, Term, Variable, VariableData, VariableKind,
    },
    options::{DEFAULT_PRECISION, SolverOptions},
    solution::Solution,
    tableau::Tableau,
};

/// A linear program, possibly with integer variables and prioritised soft constraints.
///
/// The model owns its tableau. Once solved, every edit is applied to the tableau in place,
/// so the next solve continues from the previous basis.
///
/// ```
/// # use tableau_solver::optimisation_algorithms::{expressions::Priority, model::Model};
/// let mut model = Model::default();
/// model.maximize();
/// let y = model.add_variable(3.5, Some("y"), false, false, Priority::REQUIRED).unwrap();
/// let x = model.add_variable(4.0, Some("x"), false, false, Priority::REQUIRED).unwrap();
/// model.smaller_than(200.0).unwrap().add_term(0.5, y).unwrap().add_term(0.25, x).unwrap();
/// model.smaller_than(330.0).unwrap().add_term(0.5, y).unwrap().add_term(0.75, x).unwrap();
///
/// let solution = model.solve().unwrap();
/// assert_eq!(solution.evaluation, 1985.0);
/// assert_eq!(solution.value("y"), 270.0);
/// ```
#[derive(Clone, Debug)]
pub struct Model {
    tableau: Tableau,
    /// Decision variables in order of creation, relaxation variables included.
    variables: Vec<usize>,
    integer_variables: Vec<usize>,
    /// Keyed by the index of the constraint's slack.
    constraints: IndexMap<usize, Constraint>,
    is_minimization: bool,
    options: SolverOptions,
    tableau_initialized: bool,
    relaxation_index: usize,
}

impl Default for Model {
    fn default() -> Self {
        Self::new(DEFAULT_PRECISION, SolverOptions::default())
    }
}

impl Model {
    pub fn new(precision: f64, options: SolverOptions) -> Self {
        Self {
            tableau: Tableau::new(precision),
            variables: vec![],
            integer_variables: vec![],
            constraints: IndexMap::new(),
            is_minimization: true,
            options,
            tableau_initialized: false,
            relaxation_index: 1,
        }
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: SolverOptions) {
        self.options = options;
    }

    pub fn is_minimization(&self) -> bool {
        self.is_minimization
    }

    /// The tableau as left by the last solve or edit.
    pub fn tableau(&self) -> &Tableau {
        &self.tableau
    }

    pub fn number_of_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn number_of_integer_variables(&self) -> usize {
        self.integer_variables.len()
    }

    pub fn number_of_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn variables(&self) -> impl Iterator<Item = &VariableData> {
        self.variables
            .iter()
            .filter_map(|&index| self.tableau.variable(index))
    }

    pub fn constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.values()
    }

    pub fn variable(&self, variable: Variable) -> Option<&VariableData> {
        if self.variables.contains(&variable.0) {
            self.tableau.variable(variable.0)
        } else {
            None
        }
    }

    /// The value of a variable after the last solve.
    pub fn value(&self, variable: Variable) -> Option<f64> {
        self.variable(variable).map(|data| data.value)
    }

    pub fn constraint(&self, slack: usize) -> Option<&Constraint> {
        self.constraints.get(&slack)
    }

    /// Switches to minimisation. The tableau is rebuilt on the next solve.
    pub fn minimize(&mut self) -> &mut Self {
        if !self.is_minimization {
            self.tableau.discard_search_state();
            self.is_minimization = true;
            self.tableau_initialized = false;
            self.negate_relaxation_costs();
        }
        self
    }

    /// Switches to maximisation. The tableau is rebuilt on the next solve.
    pub fn maximize(&mut self) -> &mut Self {
        if self.is_minimization {
            self.tableau.discard_search_state();
            self.is_minimization = false;
            self.tableau_initialized = false;
            self.negate_relaxation_costs();
        }
        self
    }

    /// A relaxation cost always penalises the violation, so it follows the direction.
    fn negate_relaxation_costs(&mut self) {
        let relaxations = self
            .constraints
            .values()
            .filter_map(|constraint| constraint.relaxation)
            .unique()
            .collect::<Vec<_>>();
        for relaxation in relaxations {
            if let Some(data) = self.tableau.variable_mut(relaxation) {
                data.cost = -data.cost;
            }
        }
    }

    /// Adds a decision variable with the given objective coefficient.
    ///
    /// Without an `id`, the variable is called `v` followed by its index. A positive
    /// `priority` places the cost in a secondary objective.
    pub fn add_variable(
        &mut self,
        cost: f64,
        id: Option<&str>,
        is_integer: bool,
        is_unrestricted: bool,
        priority: Priority,
    ) -> Result<Variable> {
        self.tableau.discard_search_state();
        let index = self.tableau.new_element_index();
        let id = id.map_or_else(|| format!("v{}", index), str::to_string);
        let kind = if is_integer {
            VariableKind::Integer
        } else {
            VariableKind::Continuous
        };
        self.tableau.register_variable(VariableData::new(
            id,
            cost,
            index,
            priority,
            kind,
            is_unrestricted,
        ));
        self.variables.push(index);
        if is_integer {
            self.integer_variables.push(index);
        }

        if self.tableau_initialized {
            self.tableau.add_variable(index, self.is_minimization)?;
        }
        Ok(Variable(index))
    }

    fn add_inequality(&mut self, rhs: f64, is_upper_bound: bool) -> Result<usize> {
        self.tableau.discard_search_state();
        let slack = self.tableau.new_element_index();
        self.tableau.register_variable(VariableData::slack(slack));
        self.constraints
            .insert(slack, Constraint::new(slack, rhs, is_upper_bound));

        if self.tableau_initialized {
            self.tableau.add_constraint(slack, is_upper_bound, rhs, &[])?;
        }
        Ok(slack)
    }

    /// Starts a constraint `terms <= rhs`.
    pub fn smaller_than(&mut self, rhs: f64) -> Result<ConstraintBuilder<'_>> {
        let slack = self.add_inequality(rhs, true)?;
        Ok(ConstraintBuilder::new(self, ConstraintRef::Inequality(slack)))
    }

    /// Starts a constraint `terms >= rhs`.
    pub fn greater_than(&mut self, rhs: f64) -> Result<ConstraintBuilder<'_>> {
        let slack = self.add_inequality(rhs, false)?;
        Ok(ConstraintBuilder::new(self, ConstraintRef::Inequality(slack)))
    }

    /// Starts a constraint `terms = rhs`, kept as a pair of opposite inequalities.
    pub fn equal(&mut self, rhs: f64) -> Result<ConstraintBuilder<'_>> {
        let upper = self.add_inequality(rhs, true)?;
        let lower = self.add_inequality(rhs, false)?;
        Ok(ConstraintBuilder::new(
            self,
            ConstraintRef::Equality { upper, lower },
        ))
    }

    fn inequality(&self, slack: usize) -> Result<&Constraint> {
        self.constraints
            .get(&slack)
            .ok_or_else(|| anyhow!("constraint {} is not part of the model", slack))
    }

    fn check_variable(&self, variable: Variable) -> Result<()> {
        if self.variables.contains(&variable.0) {
            Ok(())
        } else {
            Err(anyhow!("variable {} is not part of the model", variable.0))
        }
    }

    /// Adds `coefficient * variable` to a constraint. A variable that already appears in
    /// the constraint has its coefficient increased.
    pub fn add_term(
        &mut self,
        constraint: ConstraintRef,
        coefficient: f64,
        variable: Variable,
    ) -> Result<()> {
        self.check_variable(variable)?;
        for slack in constraint.slacks() {
            let current = self.inequality(slack)?.coefficient_of(variable.0).unwrap_or(0.0);
            self.set_inequality_coefficient(slack, current + coefficient, variable.0)?;
        }
        Ok(())
    }

    /// Sets the coefficient of a variable in a constraint, adding the term if needed.
    pub fn set_variable_coefficient(
        &mut self,
        constraint: ConstraintRef,
        coefficient: f64,
        variable: Variable,
    ) -> Result<()> {
        self.check_variable(variable)?;
        for slack in constraint.slacks() {
            self.set_inequality_coefficient(slack, coefficient, variable.0)?;
        }
        Ok(())
    }

    fn set_inequality_coefficient(
        &mut self,
        slack: usize,
        coefficient: f64,
        variable: usize,
    ) -> Result<()> {
        self.tableau.discard_search_state();
        let tableau_initialized = self.tableau_initialized;
        let constraint = self
            .constraints
            .get_mut(&slack)
            .ok_or_else(|| anyhow!("constraint {} is not part of the model", slack))?;
        let difference = match constraint.term_mut(variable) {
            Some(term) => {
                let difference = coefficient - term.coefficient;
                term.coefficient = coefficient;
                difference
            }
            None => {
                constraint.terms.push(Term {
                    variable,
                    coefficient,
                });
                coefficient
            }
        };
        let is_upper_bound = constraint.is_upper_bound;

        if tableau_initialized && difference != 0.0 {
            self.tableau
                .update_constraint_coefficient(slack, is_upper_bound, variable, difference)?;
        }
        Ok(())
    }

    pub fn set_right_hand_side(&mut self, constraint: ConstraintRef, rhs: f64) -> Result<()> {
        for slack in constraint.slacks() {
            self.tableau.discard_search_state();
            let tableau_initialized = self.tableau_initialized;
            let constraint = self
                .constraints
                .get_mut(&slack)
                .ok_or_else(|| anyhow!("constraint {} is not part of the model", slack))?;
            let difference = rhs - constraint.rhs;
            constraint.rhs = rhs;
            let is_upper_bound = constraint.is_upper_bound;

            if tableau_initialized && difference != 0.0 {
                self.tableau
                    .update_right_hand_side(slack, is_upper_bound, difference)?;
            }
        }
        Ok(())
    }

    /// Makes a constraint soft: a relaxation variable with cost `weight` at `priority`
    /// absorbs its violation. A required priority leaves the constraint hard. Returns
    /// the relaxation variable.
    pub fn relax(
        &mut self,
        constraint: ConstraintRef,
        weight: f64,
        priority: Priority,
    ) -> Result<Option<Variable>> {
        if priority.is_required() {
            return Ok(None);
        }
        let weight = if self.is_minimization { weight } else { -weight };
        let id = format!("r{}", self.relaxation_index);
        self.relaxation_index += 1;
        let relaxation = self.add_variable(weight, Some(id.as_str()), false, false, priority)?;

        for slack in constraint.slacks() {
            let is_upper_bound = self.inequality(slack)?.is_upper_bound;
            let coefficient = if is_upper_bound { -1.0 } else { 1.0 };
            self.set_inequality_coefficient(slack, coefficient, relaxation.0)?;
            if let Some(constraint) = self.constraints.get_mut(&slack) {
                constraint.relaxation = Some(relaxation.0);
            }
        }
        debug!("relaxed constraint {:?} with variable {}", constraint, id);
        Ok(Some(relaxation))
    }

    /// Removes a constraint together with its relaxation variable.
    pub fn remove_constraint(&mut self, constraint: ConstraintRef) -> Result<()> {
        for slack in constraint.slacks() {
            self.tableau.discard_search_state();
            let removed = self
                .constraints
                .shift_remove(&slack)
                .ok_or_else(|| anyhow!("constraint {} is not part of the model", slack))?;
            if self.tableau_initialized {
                self.tableau.remove_constraint(slack)?;
            } else {
                self.tableau.release_index(slack);
            }

            if let Some(relaxation) = removed.relaxation {
                if self.variables.contains(&relaxation) {
                    self.remove_variable(Variable(relaxation))?;
                }
            }
        }
        Ok(())
    }

    /// Removes a variable from the model and from every constraint it appears in.
    pub fn remove_variable(&mut self, variable: Variable) -> Result<()> {
        self.tableau.discard_search_state();
        let position = self
            .variables
            .iter()
            .position(|&index| index == variable.0)
            .ok_or_else(|| anyhow!("variable {} is not part of the model", variable.0))?;
        self.variables.remove(position);
        self.integer_variables.retain(|&index| index != variable.0);
        for constraint in self.constraints.values_mut() {
            constraint.terms.retain(|term| term.variable != variable.0);
            if constraint.relaxation == Some(variable.0) {
                constraint.relaxation = None;
            }
        }

        if self.tableau_initialized {
            self.tableau.remove_variable(variable.0)?;
        } else {
            self.tableau.release_index(variable.0);
        }
        Ok(())
    }

    /// Changes the objective coefficient of a variable.
    pub fn set_cost(&mut self, cost: f64, variable: Variable) -> Result<()> {
        self.check_variable(variable)?;
        self.tableau.discard_search_state();
        let data = self
            .tableau
            .variable_mut(variable.0)
            .ok_or_else(|| anyhow!("variable {} is not part of the model", variable.0))?;
        let difference = cost - data.cost;
        data.cost = cost;
        let priority = data.priority;

        if self.tableau_initialized && difference != 0.0 {
            self.tableau
                .update_cost(variable.0, priority, self.is_minimization, difference)?;
        }
        Ok(())
    }

    /// Builds the tableau from scratch.
    fn initialize_tableau(&mut self) -> Result<()> {
        let constraints = self.constraints.values().collect::<Vec<_>>();
        self.tableau
            .set_model(&self.variables, &constraints, self.is_minimization)?;
        self.tableau_initialized = true;
        Ok(())
    }

    /// Solves the model, continuing from the previous basis if the tableau exists.
    pub fn solve(&mut self) -> Result<Solution> {
        if !self.tableau_initialized {
            self.initialize_tableau()
                .context("building the tableau of the model")?;
        }
        let space = SearchSpace {
            variables: &self.variables,
            integer_variables: &self.integer_variables,
            is_minimization: self.is_minimization,
            options: &self.options,
        };
        let solution = self.tableau.solve(&space)?;
        info!(
            "solved {} variable(s), {} constraint(s): feasible {}, bounded {}, result {}",
            self.variables.len(),
            self.constraints.len(),
            solution.feasible,
            solution.bounded,
            solution.evaluation
        );
        Ok(solution)
    }

    /// Checks that the tableau describes this model and that its basis is consistent.
    pub fn validate(&self) -> Result<()> {
        if !self.tableau_initialized {
            return Ok(());
        }
        self.tableau.validate_basis()?;
        for &variable in &self.variables {
            if self.tableau.row_of(variable).is_none()
                && self.tableau.column_of(variable).is_none()
            {
                return Err(anyhow!("variable {} is missing from the tableau", variable));
            }
        }
        for &slack in self.constraints.keys() {
            if self.tableau.row_of(slack).is_none() && self.tableau.column_of(slack).is_none() {
                return Err(anyhow!("constraint {} is missing from the tableau", slack));
            }
        }
        Ok(())
    }
}

/// Adds terms to a freshly created constraint.
pub struct ConstraintBuilder<'a> {
    model: &'a mut Model,
    constraint: ConstraintRef,
}

impl<'a> ConstraintBuilder<'a> {
    fn new(model: &'a mut Model, constraint: ConstraintRef) -> Self {
        Self { model, constraint }
    }

    pub fn add_term(self, coefficient: f64, variable: Variable) -> Result<Self> {
        self.model.add_term(self.constraint, coefficient, variable)?;
        Ok(self)
    }

    pub fn relax(self, weight: f64, priority: Priority) -> Result<Self> {
        self.model.relax(self.constraint, weight, priority)?;
        Ok(self)
    }

    pub fn id(&self) -> ConstraintRef {
        self.constraint
    }
}
