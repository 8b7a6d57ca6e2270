use crate::optimisation_algorithms::{
    options::BranchingStrategy,
    tableau::{RHS_COLUMN, Tableau},
};

/// An integer variable with a fractional value in the current basis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BranchingVariable {
    pub index: usize,
    pub value: f64,
}

fn distance_to_integer(value: f64) -> f64 {
    (value - value.round()).abs()
}

impl Tableau {
    /// Basic integer variables with their current value. Non-basic variables are zero
    /// and hence integral.
    fn basic_integer_values<'a>(
        &'a self,
        integer_variables: &'a [usize],
    ) -> impl Iterator<Item = (usize, f64)> + 'a {
        integer_variables.iter().filter_map(|&index| {
            self.row_of(index)
                .map(|row| (index, self.matrix[row][RHS_COLUMN]))
        })
    }

    pub fn is_integral_solution(&self, integer_variables: &[usize]) -> bool {
        self.basic_integer_values(integer_variables)
            .all(|(_, value)| distance_to_integer(value) <= self.precision)
    }

    /// Product of the distances to the nearest integer of all fractional integer
    /// variables, or zero if there are none.
    pub fn fractional_volume(&self, integer_variables: &[usize]) -> f64 {
        let mut volume = None;
        for (_, value) in self.basic_integer_values(integer_variables) {
            let distance = distance_to_integer(value);
            if distance <= self.precision {
                continue;
            }
            volume = Some(volume.unwrap_or(1.0) * distance);
        }
        volume.unwrap_or(0.0)
    }

    pub fn branching_variable(
        &self,
        strategy: BranchingStrategy,
        integer_variables: &[usize],
    ) -> Option<BranchingVariable> {
        match strategy {
            BranchingStrategy::MostFractional => self.most_fractional_variable(integer_variables),
            BranchingStrategy::LowestCostFractional => {
                self.lowest_cost_fractional_variable(integer_variables)
            }
        }
    }

    pub fn most_fractional_variable(
        &self,
        integer_variables: &[usize],
    ) -> Option<BranchingVariable> {
        let mut biggest_fraction = self.precision;
        let mut result = None;
        for (index, value) in self.basic_integer_values(integer_variables) {
            let fraction = distance_to_integer(value);
            if biggest_fraction < fraction {
                biggest_fraction = fraction;
                result = Some(BranchingVariable { index, value });
            }
        }
        result
    }

    pub fn lowest_cost_fractional_variable(
        &self,
        integer_variables: &[usize],
    ) -> Option<BranchingVariable> {
        let mut lowest_cost = f64::INFINITY;
        let mut result = None;
        for (index, value) in self.basic_integer_values(integer_variables) {
            if distance_to_integer(value) <= self.precision {
                continue;
            }
            let cost = self.variable(index).map_or(0.0, |variable| variable.cost);
            if result.is_none() || cost < lowest_cost {
                lowest_cost = cost;
                result = Some(BranchingVariable { index, value });
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use crate::optimisation_algorithms::{
        expressions::{Priority, VariableData, VariableKind},
        options::BranchingStrategy,
        tableau::Tableau,
    };

    /// Three basic integer variables with the given values and costs.
    fn tableau_with_values(values: &[(f64, f64)]) -> (Tableau, Vec<usize>) {
        let mut tableau = Tableau::new(1e-9);
        let mut integers = vec![];
        for (i, (value, cost)) in values.iter().enumerate() {
            let index = tableau.new_element_index();
            tableau.register_variable(VariableData::new(
                format!("x{}", i),
                *cost,
                index,
                Priority(0),
                VariableKind::Integer,
                false,
            ));
            tableau.push_basic_row(index, vec![*value]);
            integers.push(index);
        }
        (tableau, integers)
    }

    #[test]
    fn most_fractional() {
        let (tableau, integers) = tableau_with_values(&[(1.2, 1.0), (2.45, 5.0), (3.0, -1.0)]);
        let variable = tableau.most_fractional_variable(&integers).unwrap();
        assert_eq!(variable.index, integers[1]);
        assert_eq!(variable.value, 2.45);
        assert!(!tableau.is_integral_solution(&integers));
    }

    #[test]
    fn lowest_cost_fractional() {
        let (tableau, integers) = tableau_with_values(&[(1.2, 1.0), (2.45, 5.0), (3.0, -1.0)]);
        //the integral variable with the lowest cost is not a candidate
        let variable = tableau
            .branching_variable(BranchingStrategy::LowestCostFractional, &integers)
            .unwrap();
        assert_eq!(variable.index, integers[0]);
    }

    #[test]
    fn volume() {
        let (tableau, integers) = tableau_with_values(&[(1.5, 1.0), (2.25, 5.0), (3.0, -1.0)]);
        assert!((tableau.fractional_volume(&integers) - 0.125).abs() < 1e-12);

        let (tableau, integers) = tableau_with_values(&[(1.0, 1.0), (4.0, 5.0)]);
        assert_eq!(tableau.fractional_volume(&integers), 0.0);
        assert!(tableau.is_integral_solution(&integers));
        assert_eq!(tableau.most_fractional_variable(&integers), None);
    }
}
