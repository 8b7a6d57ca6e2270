use anyhow::{Result, anyhow};
use serde_json::{Map, Value};

pub fn read_field_f64(json: &Value, field: &str) -> Result<f64> {
    match &json[field] {
        Value::Null => return Err(anyhow!("field `{}` not found", field)),
        value => read_f64(value).map_err(|e| anyhow!("field `{}`: {}", field, e)),
    }
}

/// Like `read_field_f64`, but an absent field is not an error.
pub fn read_optional_field_f64(json: &Value, field: &str) -> Result<Option<f64>> {
    match &json[field] {
        Value::Null => Ok(None),
        value => Ok(Some(
            read_f64(value).map_err(|e| anyhow!("field `{}`: {}", field, e))?,
        )),
    }
}

pub fn read_field_object<'a>(json: &'a Value, field: &str) -> Result<&'a Map<String, Value>> {
    match &json[field] {
        Value::Null => return Err(anyhow!("field `{}` not found", field)),
        Value::Bool(_) => return Err(anyhow!("field is a boolean, where object expected")),
        Value::Number(_) => return Err(anyhow!("field is a number, where object expected")),
        Value::String(_) => return Err(anyhow!("field is a literal, where object expected")),
        Value::Array(_) => return Err(anyhow!("field is an array, where object expected")),
        Value::Object(obj) => Ok(&obj),
    }
}

pub fn read_field_string(json: &Value, field: &str) -> Result<String> {
    match &json[field] {
        Value::Null => return Err(anyhow!("field `{}` not found", field)),
        Value::Bool(_) => return Err(anyhow!("field is a boolean, where literal expected")),
        Value::Number(n) => return Ok(n.to_string()),
        Value::String(s) => return Ok(s.to_string()),
        Value::Array(_) => return Err(anyhow!("field is a list, where literal expected")),
        Value::Object(_) => return Err(anyhow!("field is an object, where literal expected")),
    }
}

pub fn read_f64(json: &Value) -> Result<f64> {
    match &json {
        Value::Null => return Err(anyhow!("field not found")),
        Value::Bool(_) => return Err(anyhow!("field is a boolean, where number expected")),
        Value::Number(n) => {
            return n
                .as_f64()
                .ok_or_else(|| anyhow!("number `{}` is out of range", n));
        }
        Value::String(s) => return Ok(s.trim().parse::<f64>()?),
        Value::Array(_) => return Err(anyhow!("field is a list, where number expected")),
        Value::Object(_) => return Err(anyhow!("field is an object, where number expected")),
    }
}

/// Whether a value counts as set: true, a non-zero number or a non-empty literal.
pub fn is_truthy(json: &Value) -> bool {
    match json {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// The names flagged in a field that is either an object of name to truthy value, or a
/// list of names. An absent field flags nothing.
pub fn read_field_flags(json: &Value, field: &str) -> Result<Vec<String>> {
    match &json[field] {
        Value::Null => Ok(vec![]),
        Value::Object(obj) => Ok(obj
            .iter()
            .filter(|(_, value)| is_truthy(value))
            .map(|(name, _)| name.clone())
            .collect()),
        Value::Array(arr) => arr
            .iter()
            .map(|value| match value {
                Value::String(s) => Ok(s.clone()),
                _ => Err(anyhow!("field `{}` should list names", field)),
            })
            .collect(),
        _ => Err(anyhow!("field `{}` is not an object or a list", field)),
    }
}
