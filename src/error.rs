//! Terminal states of a run and the faults that end one early.

use std::fmt;

use crate::parsing::ErrorKind as Structural;
use crate::script::ParseError;

/// Why a run ended in the faulted state.
#[derive(Clone, Debug, PartialEq)]
pub enum Fault {
    /// The script contains something the engine cannot run, found either while
    /// parsing or while executing a statement.
    Program {
        /// Short message meant for the child who wrote the script.
        message: String,

        /// One-based line of the offending statement, if known.
        line: Option<usize>,
    },

    /// The run executed more statements without sleeping than the budget allows.
    BudgetExceeded {
        budget: usize,
        line: Option<usize>,
    },
}

impl Fault {
    pub fn program<S: Into<String>>(message: S, line: Option<usize>) -> Fault {
        Fault::Program {
            message: message.into(),
            line,
        }
    }

    /// Turns a parse error of `source` into a fault with a child-appropriate message.
    pub fn from_parse_error(err: &ParseError, source: &str) -> Fault {
        let line = Some(err.location(source).line);

        let message = match err.kind {
            Structural::Other { ref kind, .. } => kind.to_string(),
            Structural::UnexpectedToken { .. } => match err.outer_context() {
                Some(ctx) => format!("something is not quite right in this {}", ctx),
                None => "something is not quite right here".to_string(),
            },
            Structural::EndOfStream => "the program ends before it is finished".to_string(),
        };

        Fault::Program { message, line }
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            Fault::Program { line, .. } | Fault::BudgetExceeded { line, .. } => *line,
        }
    }

    /// True for faults caused by running out of statement budget.
    pub fn is_budget(&self) -> bool {
        match self {
            Fault::BudgetExceeded { .. } => true,
            _ => false,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Fault::Program { message, line: Some(line) } => write!(f, "Line {}: {}", line, message),
            Fault::Program { message, line: None } => write!(f, "{}", message),
            Fault::BudgetExceeded { line: Some(line), .. } => write!(
                f,
                "Line {}: your program kept running without a break. Does a loop ever end, or need a sleep?",
                line,
            ),
            Fault::BudgetExceeded { line: None, .. } => write!(
                f,
                "your program kept running without a break. Does a loop ever end, or need a sleep?"
            ),
        }
    }
}

/// How a run ended.
#[derive(Clone, Debug, PartialEq)]
pub enum RunOutcome {
    /// Every statement ran.
    Completed,

    /// The run was stopped by the host.
    Cancelled,

    Faulted(Fault),
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        *self == RunOutcome::Completed
    }

    pub fn fault(&self) -> Option<&Fault> {
        match self {
            RunOutcome::Faulted(fault) => Some(fault),
            _ => None,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RunOutcome::Completed => write!(f, "completed"),
            RunOutcome::Cancelled => write!(f, "stopped"),
            RunOutcome::Faulted(fault) => write!(f, "faulted: {}", fault),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Program;

    #[test]
    fn test_fault_from_parse_error() {
        let source = "fillScreen(0)\nfilScreen(0)\n";
        let err = Program::parse(source).unwrap_err();
        let fault = Fault::from_parse_error(&err, source);

        assert_eq!(fault.line(), Some(2));
        assert_eq!(fault.to_string(), "Line 2: I don't know `filScreen`. Did you mean `fillScreen`?");
        assert!(!fault.is_budget());
    }
}
