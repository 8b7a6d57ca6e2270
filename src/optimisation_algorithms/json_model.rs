use std::{collections::HashMap, str::FromStr};

use anyhow::{Context, Error, Result, anyhow};
use log::debug;
use serde_json::Value;

use crate::{
    json::{
        read_field_flags, read_field_object, read_field_string, read_f64,
        read_optional_field_f64,
    },
    optimisation_algorithms::{
        expressions::{ConstraintRef, Priority},
        model::Model,
        options::{DEFAULT_PRECISION, SolverOptions},
    },
};

/// Reads the priority of a soft constraint: a number or one of the level names.
fn read_priority(json: &Value) -> Result<Priority> {
    match json {
        Value::Null => Ok(Priority(1)),
        Value::Number(n) => n
            .as_u64()
            .map(|n| Priority(n as usize))
            .ok_or_else(|| anyhow!("priority `{}` is not a non-negative integer", n)),
        Value::String(s) => s.parse::<Priority>(),
        _ => Err(anyhow!("priority should be a number or a level name")),
    }
}

fn read_options(json: &Value) -> Result<SolverOptions> {
    let mut options = match &json["options"] {
        Value::Null => SolverOptions::default(),
        value => serde_json::from_value::<SolverOptions>(value.clone())
            .context("reading the options")?,
    };
    if let Some(tolerance) = read_optional_field_f64(json, "tolerance")? {
        options.tolerance = tolerance;
    }
    if let Some(timeout) = read_optional_field_f64(json, "timeout")? {
        options.timeout = Some(timeout.max(0.0) as u64);
    }
    Ok(options)
}

impl Model {
    /// Builds a model from its declarative description: an objective attribute
    /// (`optimize`, `opType`), named `constraints` with `min`, `max` or `equal` bounds
    /// that become soft with a `weight` or `priority`, `variables` mapping each
    /// attribute to a coefficient, and the `ints`, `binaries` and `unrestricted` flags.
    pub fn from_json(json: &Value) -> Result<Self> {
        let objective = match &json["optimize"] {
            Value::String(s) => s.clone(),
            Value::Object(_) => {
                return Err(anyhow!(
                    "optimising several attributes at once is not supported"
                ));
            }
            Value::Null => return Err(anyhow!("field `optimize` not found")),
            _ => return Err(anyhow!("field `optimize` should name an attribute")),
        };

        let mut model = Model::new(DEFAULT_PRECISION, read_options(json)?);
        match read_field_string(json, "opType").ok().as_deref() {
            Some("max") => {
                model.maximize();
            }
            Some("min") | None => {
                model.minimize();
            }
            Some(other) => return Err(anyhow!("opType `{}` is neither max nor min", other)),
        }

        //constraints, by name
        let mut lower_bounds: HashMap<&str, ConstraintRef> = HashMap::new();
        let mut upper_bounds: HashMap<&str, ConstraintRef> = HashMap::new();
        let constraints = read_field_object(json, "constraints").context("reading constraints")?;
        for (name, constraint) in constraints {
            let relaxed = !constraint["weight"].is_null() || !constraint["priority"].is_null();
            let weight = match &constraint["weight"] {
                Value::Null => 1.0,
                value => read_f64(value).with_context(|| format!("weight of `{}`", name))?,
            };
            let priority = read_priority(&constraint["priority"])
                .with_context(|| format!("priority of `{}`", name))?;

            if let Some(equal) = read_optional_field_f64(constraint, "equal")? {
                let equality = model.equal(equal)?.id();
                if let ConstraintRef::Equality { upper, lower } = equality {
                    lower_bounds.insert(name.as_str(), ConstraintRef::Inequality(lower));
                    upper_bounds.insert(name.as_str(), ConstraintRef::Inequality(upper));
                }
                if relaxed {
                    model.relax(equality, weight, priority)?;
                }
                continue;
            }
            if let Some(min) = read_optional_field_f64(constraint, "min")? {
                let lower = model.greater_than(min)?.id();
                lower_bounds.insert(name.as_str(), lower);
                if relaxed {
                    model.relax(lower, weight, priority)?;
                }
            }
            if let Some(max) = read_optional_field_f64(constraint, "max")? {
                let upper = model.smaller_than(max)?.id();
                upper_bounds.insert(name.as_str(), upper);
                if relaxed {
                    model.relax(upper, weight, priority)?;
                }
            }
        }

        //variables
        let integers = read_field_flags(json, "ints")?;
        let binaries = read_field_flags(json, "binaries")?;
        let unrestricted = read_field_flags(json, "unrestricted")?;
        let variables = read_field_object(json, "variables").context("reading variables")?;
        for (name, attributes) in variables {
            let cost = match &attributes[objective.as_str()] {
                Value::Null => 0.0,
                value => read_f64(value).with_context(|| format!("cost of `{}`", name))?,
            };
            let is_binary = binaries.contains(name);
            let is_integer = is_binary || integers.contains(name);
            let is_unrestricted = unrestricted.contains(name);
            let variable = model.add_variable(
                cost,
                Some(name.as_str()),
                is_integer,
                is_unrestricted,
                Priority::REQUIRED,
            )?;
            if is_binary {
                model.smaller_than(1.0)?.add_term(1.0, variable)?;
            }

            let attributes = attributes
                .as_object()
                .ok_or_else(|| {
                    anyhow!("variable `{}` should map attributes to coefficients", name)
                })?;
            for (attribute, coefficient) in attributes {
                if attribute == &objective {
                    continue;
                }
                let coefficient = read_f64(coefficient)
                    .with_context(|| format!("coefficient of `{}` in `{}`", name, attribute))?;
                if let Some(lower) = lower_bounds.get(attribute.as_str()) {
                    model.add_term(*lower, coefficient, variable)?;
                }
                if let Some(upper) = upper_bounds.get(attribute.as_str()) {
                    model.add_term(*upper, coefficient, variable)?;
                }
            }
        }

        debug!(
            "loaded model with {} variable(s), {} integer, and {} constraint(s)",
            model.number_of_variables(),
            model.number_of_integer_variables(),
            model.number_of_constraints()
        );
        Ok(model)
    }
}

impl FromStr for Model {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let json: Value = serde_json::from_str(s).context("parsing the model as JSON")?;
        Self::from_json(&json)
    }
}
