use thiserror::Error;

pub mod calendar;
pub mod identity;
pub mod todo;
pub mod user;

#[cfg(test)]
pub mod test_util;

/// A single field-level problem with submitted data. These are reported back to the caller
/// so they can be shown next to the offending input, they never abort anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldProblem {
    pub field: &'static str,
    pub code: &'static str,
    pub message: &'static str,
}

/// The complete set of problems found while validating a piece of input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("input was invalid: {}", describe_problems(.0))]
pub struct ValidationProblems(pub Vec<FieldProblem>);

impl ValidationProblems {
    /// Returns true if a problem with the given code was reported
    pub fn has(&self, code: &str) -> bool {
        self.0.iter().any(|problem| problem.code == code)
    }

    /// Turns a (possibly empty) list of problems into a result
    pub(crate) fn into_result(problems: Vec<FieldProblem>) -> Result<(), ValidationProblems> {
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ValidationProblems(problems))
        }
    }
}

fn describe_problems(problems: &[FieldProblem]) -> String {
    problems
        .iter()
        .map(|problem| format!("{}: {}", problem.field, problem.message))
        .collect::<Vec<_>>()
        .join(", ")
}
