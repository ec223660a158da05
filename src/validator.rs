//! Grading of a run's [OutputTrace] against a lesson's expected output.

use itertools::Itertools;
use logos::Logos;

use crate::error::RunOutcome;
use crate::scheduler::RunReport;
use crate::script::token::Token;
use crate::trace::OutputTrace;

/// Feedback shown at most this many missing strings at once.
pub const MAX_MISSING_SHOWN: usize = 2;

/// Expected output of a lesson, extracted once from its reference solution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LessonExpectation {
    pub texts: Vec<String>,
    pub expects_buzzer: bool,
}

impl LessonExpectation {
    pub fn new<I, S>(texts: I, expects_buzzer: bool) -> LessonExpectation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LessonExpectation {
            texts: texts.into_iter().map(Into::into).collect(),
            expects_buzzer,
        }
    }

    /// Scans a reference solution for the output it is guaranteed to produce.
    ///
    /// Every `drawString` call whose text argument is a plain string literal
    /// contributes that string; any `tone` call means the buzzer is expected. Computed
    /// or formatted text is dynamic and contributes nothing. Only tokens are looked
    /// at, so a reference that does not parse still yields an expectation.
    pub fn from_reference(source: &str) -> LessonExpectation {
        let tokens: Vec<Token> = Token::lexer(source)
            .filter(|token| match token {
                Token::Newline(_) | Token::Error => false,
                _ => true,
            })
            .collect();

        let mut expectation = LessonExpectation::default();

        for (i, window) in tokens.windows(2).enumerate() {
            match (&window[0], &window[1]) {
                (Token::Identifier("tone"), Token::ParenOpen) => expectation.expects_buzzer = true,
                (Token::Identifier("drawString"), Token::ParenOpen) => {
                    match (tokens.get(i + 2), tokens.get(i + 3)) {
                        (Some(Token::Str(text)), Some(Token::Comma))
                            | (Some(Token::Str(text)), Some(Token::ParenClose)) => {
                            if !expectation.texts.contains(text) {
                                expectation.texts.push(text.clone());
                            }
                        },
                        _ => (),
                    }
                },
                _ => (),
            }
        }

        expectation
    }

    /// True if the lesson's output is not statically known, in which case any
    /// completed run passes.
    pub fn is_dynamic(&self) -> bool {
        self.texts.is_empty() && !self.expects_buzzer
    }
}

/// Normal form used when comparing displayed strings.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Outcome of grading one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub passed: bool,

    /// Up to [MAX_MISSING_SHOWN] expected strings that never appeared.
    pub missing_texts: Vec<String>,

    /// True if a tone was expected but none was played.
    pub missing_buzzer: bool,

    /// One short message for the child.
    pub feedback: String,
}

impl Verdict {
    fn failed(feedback: String) -> Verdict {
        Verdict {
            passed: false,
            missing_texts: Vec::new(),
            missing_buzzer: false,
            feedback,
        }
    }
}

/// Grades a finished run. A run that faulted or was stopped fails with feedback
/// about why it ended, whatever it managed to show before that.
pub fn validate_run(report: &RunReport, expectation: &LessonExpectation) -> Verdict {
    match report.outcome {
        RunOutcome::Completed => validate(&report.trace, expectation),
        RunOutcome::Cancelled => Verdict::failed(
            "Your code was stopped before it finished. Run it again to check it.".to_string(),
        ),
        RunOutcome::Faulted(ref fault) => Verdict::failed(
            format!("Oops! Your code has a problem. {}", fault),
        ),
    }
}

/// Grades the trace alone, as if it came from a run that completed. Use
/// [validate_run] to also take the outcome of the run into account.
pub fn validate(trace: &OutputTrace, expectation: &LessonExpectation) -> Verdict {
    if expectation.is_dynamic() {
        return Verdict {
            passed: true,
            missing_texts: Vec::new(),
            missing_buzzer: false,
            feedback: "Great job! Your code ran successfully!".to_string(),
        };
    }

    let shown: Vec<String> = trace.texts.iter().map(|t| normalize(t)).collect();

    let missing_texts: Vec<String> = expectation.texts.iter()
        .filter(|expected| !shown.contains(&normalize(expected)))
        .take(MAX_MISSING_SHOWN)
        .cloned()
        .collect();

    let missing_buzzer = expectation.expects_buzzer && !trace.has_buzzer;

    let feedback = if !missing_texts.is_empty() {
        format!(
            "Almost there! Your screen should also show: {}",
            missing_texts.iter().map(|t| format!("\"{}\"", t)).join(", "),
        )
    } else if missing_buzzer {
        "Almost there! Don't forget to play a sound with the buzzer.".to_string()
    } else {
        "Perfect! Your code matches the goal!".to_string()
    };

    Verdict {
        passed: missing_texts.is_empty() && !missing_buzzer,
        missing_texts,
        missing_buzzer,
        feedback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace(texts: &[&str], has_buzzer: bool) -> OutputTrace {
        OutputTrace {
            texts: texts.iter().map(|t| t.to_string()).collect(),
            has_buzzer,
        }
    }

    #[test]
    fn test_from_reference() {
        let expectation = LessonExpectation::from_reference(r#"
            import display
            tft.fillScreen(BLACK)
            tft.drawString("Hello", 10, 10, WHITE)
            tft.drawString(f"Score {score}", 10, 30, WHITE)
            drawString("Sc" + "ore", 0, 0, RED)
            drawString('World', 10, 20, WHITE)
            drawString("Hello", 0, 50, RED)
            if x:
              tone(440, 200)
        "#);

        assert_eq!(expectation, LessonExpectation::new(vec!["Hello", "World"], true));
    }

    #[test]
    fn test_from_reference_that_does_not_parse() {
        let expectation = LessonExpectation::from_reference("drawString(\"Hi\", 0, 0, WHITE\n   )) ??? $");

        assert_eq!(expectation.texts, vec!["Hi"]);
        assert!(!expectation.expects_buzzer);
    }

    #[test]
    fn test_missing_texts_are_limited() {
        let expectation = LessonExpectation::new(vec!["A", "B", "C"], false);
        let verdict = validate(&trace(&[], false), &expectation);

        assert!(!verdict.passed);
        assert_eq!(verdict.missing_texts, vec!["A", "B"]);
        assert_eq!(verdict.feedback, "Almost there! Your screen should also show: \"A\", \"B\"");
    }

    #[test]
    fn test_texts_reported_before_buzzer() {
        let expectation = LessonExpectation::new(vec!["Hi"], true);
        let verdict = validate(&trace(&["Bye"], false), &expectation);

        assert!(!verdict.passed);
        assert!(verdict.missing_buzzer);
        assert_eq!(verdict.feedback, "Almost there! Your screen should also show: \"Hi\"");
    }

    #[test]
    fn test_whitespace_is_ignored() {
        let expectation = LessonExpectation::new(vec![" Hello "], false);
        assert!(validate(&trace(&["HELLO"], false), &expectation).passed);
    }
}
