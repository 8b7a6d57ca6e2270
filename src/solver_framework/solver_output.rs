use std::{
    fmt::{self, Display},
    fs::File,
    io::Write,
    path::Path,
};

use anyhow::{Context, Result};
use serde_json::Value;

pub enum SolverOutput {
    Json(Value),
    String(String),
}

impl SolverOutput {
    pub fn get_type(&self) -> SolverOutputType {
        match self {
            SolverOutput::Json(_) => SolverOutputType::Json,
            SolverOutput::String(_) => SolverOutputType::String,
        }
    }

    pub fn export_to_string(&self) -> Result<String> {
        match self {
            SolverOutput::Json(json) => {
                serde_json::to_string_pretty(json).context("serialising the result")
            }
            SolverOutput::String(s) => Ok(s.clone()),
        }
    }

    pub fn export_to_file(&self, to_file: &Path) -> Result<()> {
        let mut file = File::create(to_file)
            .with_context(|| format!("could not create file {:?}", to_file))?;
        writeln!(file, "{}", self.export_to_string()?)
            .with_context(|| format!("could not write to file {:?}", to_file))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverOutputType {
    Json,
    String,
}

impl Display for SolverOutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverOutputType::Json => write!(f, "JSON object"),
            SolverOutputType::String => write!(f, "text"),
        }
    }
}
