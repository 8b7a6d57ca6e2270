use std::{fmt::Display, str::FromStr};

use anyhow::{Error, anyhow};
use serde::Serialize;
use strum_macros::EnumString;

/// A reference to a variable of a model.
///
/// Variables are referenced by their dense index in the tableau. Indices of removed
/// variables are recycled, so a reference must not be used after its variable was removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Variable(pub(crate) usize);

impl Variable {
    /// Dense index of the variable.
    pub fn idx(&self) -> usize {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VariableKind {
    Continuous,
    Integer,
    /// Auxiliary variable introduced per constraint row. Never referenced by the user.
    Slack,
}

#[derive(Clone, Debug)]
pub struct VariableData {
    pub id: String,
    pub cost: f64,
    pub index: usize,
    pub value: f64,
    pub priority: Priority,
    pub kind: VariableKind,
    pub unrestricted: bool,
}

impl VariableData {
    pub fn new(
        id: String,
        cost: f64,
        index: usize,
        priority: Priority,
        kind: VariableKind,
        unrestricted: bool,
    ) -> Self {
        Self {
            id,
            cost,
            index,
            value: 0.0,
            priority,
            kind,
            unrestricted,
        }
    }

    pub fn slack(index: usize) -> Self {
        Self::new(
            format!("s{}", index),
            0.0,
            index,
            Priority::REQUIRED,
            VariableKind::Slack,
            false,
        )
    }

    pub fn is_integer(&self) -> bool {
        self.kind == VariableKind::Integer
    }

    pub fn is_slack(&self) -> bool {
        self.kind == VariableKind::Slack
    }
}

/// Priority of an objective term. Zero is the primary objective; every positive
/// priority is a lexicographically secondary objective, lower numbers first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Priority(pub usize);

impl Priority {
    pub const REQUIRED: Priority = Priority(0);

    pub fn is_required(&self) -> bool {
        self.0 == 0
    }
}

impl Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum PriorityLevel {
    Required,
    Strong,
    Medium,
    Weak,
}

impl From<PriorityLevel> for Priority {
    fn from(value: PriorityLevel) -> Self {
        match value {
            PriorityLevel::Required => Priority(0),
            PriorityLevel::Strong => Priority(1),
            PriorityLevel::Medium => Priority(2),
            PriorityLevel::Weak => Priority(3),
        }
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(level) = s.trim().parse::<usize>() {
            return Ok(Priority(level));
        }
        s.trim()
            .to_lowercase()
            .parse::<PriorityLevel>()
            .map(Priority::from)
            .map_err(|_| anyhow!("`{}` is not a priority", s))
    }
}

/// A `coefficient * variable` pair of a constraint.
#[derive(Clone, Debug, PartialEq)]
pub struct Term {
    pub variable: usize,
    pub coefficient: f64,
}

/// A single inequality. Lower-bound constraints are stored as-is and flipped into
/// `<=` normal form only inside the tableau.
#[derive(Clone, Debug)]
pub struct Constraint {
    pub(crate) slack: usize,
    pub(crate) rhs: f64,
    pub(crate) is_upper_bound: bool,
    pub(crate) terms: Vec<Term>,
    pub(crate) relaxation: Option<usize>,
}

impl Constraint {
    pub(crate) fn new(slack: usize, rhs: f64, is_upper_bound: bool) -> Self {
        Self {
            slack,
            rhs,
            is_upper_bound,
            terms: vec![],
            relaxation: None,
        }
    }

    /// +1 for `<=` rows, -1 for `>=` rows.
    pub fn sign(&self) -> f64 {
        if self.is_upper_bound { 1.0 } else { -1.0 }
    }

    pub fn rhs(&self) -> f64 {
        self.rhs
    }

    pub fn is_upper_bound(&self) -> bool {
        self.is_upper_bound
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn relaxation(&self) -> Option<Variable> {
        self.relaxation.map(Variable)
    }

    pub(crate) fn term_mut(&mut self, variable: usize) -> Option<&mut Term> {
        self.terms.iter_mut().find(|term| term.variable == variable)
    }

    pub(crate) fn coefficient_of(&self, variable: usize) -> Option<f64> {
        self.terms
            .iter()
            .find(|term| term.variable == variable)
            .map(|term| term.coefficient)
    }
}

/// A reference to a constraint of a model. An equality is a pair of an upper-bound
/// and a lower-bound constraint over the same terms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConstraintRef {
    Inequality(usize),
    Equality { upper: usize, lower: usize },
}

impl ConstraintRef {
    /// The slack indices of the underlying inequalities.
    pub fn slacks(&self) -> Vec<usize> {
        match self {
            ConstraintRef::Inequality(slack) => vec![*slack],
            ConstraintRef::Equality { upper, lower } => vec![*upper, *lower],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_parse() {
        assert_eq!("weak".parse::<Priority>().unwrap(), Priority(3));
        assert_eq!("Strong".parse::<Priority>().unwrap(), Priority(1));
        assert_eq!("7".parse::<Priority>().unwrap(), Priority(7));
        assert!("sometimes".parse::<Priority>().is_err());
        assert!(Priority::from(PriorityLevel::Required).is_required());
    }

    #[test]
    fn constraint_sign() {
        let upper = Constraint::new(0, 4.0, true);
        let lower = Constraint::new(1, 4.0, false);
        assert_eq!(upper.sign(), 1.0);
        assert_eq!(lower.sign(), -1.0);
        assert_eq!(ConstraintRef::Equality { upper: 3, lower: 4 }.slacks(), vec![3, 4]);
    }
}
