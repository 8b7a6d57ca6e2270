use std::fmt::Display;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Number, Value};

/// An incumbent found during branch-and-cut, kept when `keep_solutions` is set.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KeptSolution {
    pub result: f64,
    pub variables: IndexMap<String, f64>,
}

/// The outcome of a solve, in the orientation of the model's objective.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Solution {
    pub evaluation: f64,
    pub feasible: bool,
    pub bounded: bool,
    /// Only set for models with integer variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_integral: Option<bool>,
    /// Branch-and-cut iterations, only set for models with integer variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unbounded_variable: Option<String>,
    pub solution_set: IndexMap<String, f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub kept_solutions: Vec<KeptSolution>,
}

fn number(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

impl Solution {
    pub fn new(
        evaluation: f64,
        feasible: bool,
        bounded: bool,
        solution_set: IndexMap<String, f64>,
    ) -> Self {
        Self {
            evaluation,
            feasible,
            bounded,
            is_integral: None,
            iterations: None,
            unbounded_variable: None,
            solution_set,
            kept_solutions: vec![],
        }
    }

    /// Value of a variable in the solution. Variables that are not basic are zero.
    pub fn value(&self, id: &str) -> f64 {
        self.solution_set.get(id).copied().unwrap_or(0.0)
    }

    pub fn is_integral(&self) -> bool {
        self.is_integral == Some(true)
    }

    /// The compact result map: `feasible`, `result`, `bounded`, `isIntegral` when the
    /// solution is integral, and every non-zero variable.
    pub fn to_compact_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("feasible".to_string(), Value::Bool(self.feasible));
        map.insert("result".to_string(), number(self.evaluation));
        map.insert("bounded".to_string(), Value::Bool(self.bounded));
        if self.is_integral() {
            map.insert("isIntegral".to_string(), Value::Bool(true));
        }
        for (id, value) in &self.solution_set {
            if *value != 0.0 {
                map.insert(id.clone(), number(*value));
            }
        }
        Value::Object(map)
    }

    pub fn to_full_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Display for Solution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string_pretty(&self.to_compact_json()) {
            Ok(json) => write!(f, "{}", json),
            Err(_) => Err(std::fmt::Error),
        }
    }
}
