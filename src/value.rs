//! Dynamically typed values held by script variables.

use std::fmt;

/// A value of a script variable or expression.
///
/// Variables are not typed; a name may hold a number and later a string.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Result of reading a variable that was never assigned. Reads as `""`, `0` and false.
    Empty,
}

impl Value {
    /// Truthiness: zero, the empty string, `False` and [Value::Empty] are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(s) => !s.is_empty(),
            Value::Boolean(b) => *b,
            Value::Empty => false,
        }
    }

    /// Numeric view of the value, or `None` for text that does not look like a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Boolean(true) => Some(1.0),
            Value::Boolean(false) => Some(0.0),
            Value::Empty => Some(0.0),
            Value::Text(s) => s.trim().parse().ok(),
        }
    }

    /// The `str(x)` coercion.
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    pub fn is_text(&self) -> bool {
        match self {
            Value::Text(_) => true,
            _ => false,
        }
    }
}

/// Formats a number the way the script language prints it: integral values without a
/// fractional part, everything else in the shortest form that reads back the same.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        // the cast also turns -0 into 0
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Text(s) => write!(f, "{}", s),
            Value::Boolean(true) => write!(f, "True"),
            Value::Boolean(false) => write!(f, "False"),
            Value::Empty => Ok(()),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Value {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Value {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Boolean(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Text(s)
    }
}

impl<'a> From<&'a str> for Value {
    fn from(s: &'a str) -> Value {
        Value::Text(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_to_text() {
        assert_eq!(Value::Number(5.0).to_text(), "5");
        assert_eq!(Value::Number(-0.0).to_text(), "0");
        assert_eq!(Value::Number(2.5).to_text(), "2.5");
        assert_eq!(Value::Number(0.1 + 0.2).to_text(), "0.30000000000000004");
        assert_eq!(Value::Number(f64::INFINITY).to_text(), "Infinity");
        assert_eq!(Value::Boolean(true).to_text(), "True");
        assert_eq!(Value::Empty.to_text(), "");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Text(String::new()).is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(!Value::Empty.is_truthy());
        assert!(Value::Number(-1.0).is_truthy());
        assert!(Value::Text("0".into()).is_truthy());
    }

    #[test]
    fn test_as_number() {
        assert_eq!(Value::Text(" 42 ".into()).as_number(), Some(42.0));
        assert_eq!(Value::Text("abc".into()).as_number(), None);
        assert_eq!(Value::Empty.as_number(), Some(0.0));
    }
}
