use anyhow::Result;

use crate::optimisation_algorithms::{model::Model, options::SolverOptions};

pub trait Infoable {
    fn info(&self, f: &mut impl std::io::Write) -> Result<()>;
}

impl Infoable for Model {
    fn info(&self, f: &mut impl std::io::Write) -> Result<()> {
        writeln!(
            f,
            "Direction\t{}",
            if self.is_minimization() { "minimise" } else { "maximise" }
        )?;
        writeln!(f, "Variables\t{}", self.number_of_variables())?;
        writeln!(f, "Integer variables\t{}", self.number_of_integer_variables())?;
        writeln!(
            f,
            "Unrestricted variables\t{}",
            self.variables().filter(|variable| variable.unrestricted).count()
        )?;
        writeln!(
            f,
            "Soft constraints\t{}",
            self.constraints()
                .filter(|constraint| constraint.relaxation().is_some())
                .count()
        )?;
        writeln!(f, "Constraints\t{}", self.number_of_constraints())?;
        self.options().info(f)
    }
}

impl Infoable for SolverOptions {
    fn info(&self, f: &mut impl std::io::Write) -> Result<()> {
        match self.timeout {
            Some(timeout) => writeln!(f, "Timeout\t{}ms", timeout)?,
            None => writeln!(f, "Timeout\tnone")?,
        }
        writeln!(f, "Tolerance\t{}", self.tolerance)?;
        writeln!(f, "Rounding cuts\t{}", self.use_mir_cuts)?;
        writeln!(f, "Node selection\t{}", self.node_selection)?;
        Ok(writeln!(f, "Branching\t{}", self.branching)?)
    }
}

#[cfg(test)]
mod tests {
    use super::Infoable;
    use crate::optimisation_algorithms::model::Model;

    #[test]
    fn model_info() {
        let model = std::fs::read_to_string("testfiles/furniture.json")
            .unwrap()
            .parse::<Model>()
            .unwrap();
        let mut f = vec![];
        model.info(&mut f).unwrap();
        let text = String::from_utf8(f).unwrap();
        assert!(text.contains("Direction\tmaximise"));
        assert!(text.contains("Variables\t2"));
        assert!(text.contains("Constraints\t2"));
        assert!(text.contains("Node selection\tbest-bound"));
    }
}
