use kidsim::{
    config::Config,
    scheduler::{ManualClock, Session},
    trace::OutputTrace,
    validator::{validate, validate_run, LessonExpectation},
};

fn trace(texts: &[&str], has_buzzer: bool) -> OutputTrace {
    OutputTrace {
        texts: texts.iter().map(|t| t.to_string()).collect(),
        has_buzzer,
    }
}

#[test]
fn test_all_texts_shown() {
    let expectation = LessonExpectation::new(vec!["Hello", "World"], false);
    let verdict = validate(&trace(&["Hello", "World"], false), &expectation);

    assert!(verdict.passed);
    assert_eq!(verdict.feedback, "Perfect! Your code matches the goal!");
}

#[test]
fn test_missing_text_is_named() {
    let expectation = LessonExpectation::new(vec!["Hello", "World"], false);
    let verdict = validate(&trace(&["Hello"], false), &expectation);

    assert!(!verdict.passed);
    assert_eq!(verdict.missing_texts, vec!["World"]);
    assert!(verdict.feedback.contains("\"World\""));
}

#[test]
fn test_missing_buzzer() {
    let expectation = LessonExpectation::new(Vec::<String>::new(), true);
    let verdict = validate(&trace(&["anything"], false), &expectation);

    assert!(!verdict.passed);
    assert!(verdict.missing_buzzer);
    assert!(verdict.feedback.contains("buzzer"));
}

#[test]
fn test_dynamic_lesson_passes_any_run() {
    let expectation = LessonExpectation::from_reference(r#"
name = "Ada"
drawString(f"Hi {name}", 0, 0, WHITE)
drawString("Score: " + str(10), 0, 20, WHITE)
"#);

    assert!(expectation.is_dynamic());

    for texts in &[&[][..], &["whatever"][..]] {
        let verdict = validate(&trace(texts, false), &expectation);

        assert!(verdict.passed);
        assert_eq!(verdict.feedback, "Great job! Your code ran successfully!");
    }
}

#[test]
fn test_comparison_ignores_case() {
    let expectation = LessonExpectation::new(vec!["Hello"], false);
    let verdict = validate(&trace(&["hello"], false), &expectation);

    assert!(verdict.passed);
}

#[test]
fn test_grade_a_run_against_reference() {
    let reference = r#"
fillScreen(BLACK)
drawString("Hello", 10, 10, WHITE)
drawString("World", 10, 30, WHITE)
tone(440, 200)
"#;

    let expectation = LessonExpectation::from_reference(reference);
    let mut session = Session::new(Config::default());

    let attempt = session.run(r#"
fillScreen(BLUE)
drawString("HELLO", 0, 0, YELLOW)
"#, &mut ManualClock::new());

    let verdict = validate(&attempt.trace, &expectation);
    assert!(!verdict.passed);
    assert_eq!(verdict.feedback, "Almost there! Your screen should also show: \"World\"");

    let attempt = session.run(r#"
drawString("hello", 0, 0, YELLOW)
for i in range(2):
    drawString("world", 0, 20 + i * 10, YELLOW)
"#, &mut ManualClock::new());

    let verdict = validate(&attempt.trace, &expectation);
    assert!(!verdict.passed);
    assert_eq!(verdict.feedback, "Almost there! Don't forget to play a sound with the buzzer.");

    let reference_run = session.run(reference, &mut ManualClock::new());
    assert!(validate(&reference_run.trace, &expectation).passed);
}

#[test]
fn test_faulted_run_fails() {
    let expectation = LessonExpectation::from_reference("x = 5\ndrawString(str(x), 0, 0, WHITE)\n");
    assert!(expectation.is_dynamic());

    let report = Session::new(Config::default())
        .run("drawString(\"hi\", 0, 0, WHITE)\nx = 1 % 0\n", &mut ManualClock::new());

    assert!(validate(&report.trace, &expectation).passed);

    let verdict = validate_run(&report, &expectation);
    assert!(!verdict.passed);
    assert_eq!(verdict.feedback, "Oops! Your code has a problem. Line 2: you can't divide by zero");

    let report = Session::new(Config::default()).run("filScreen(RED)\n", &mut ManualClock::new());
    assert!(!validate_run(&report, &expectation).passed);
}

#[test]
fn test_stopped_run_fails() {
    let expectation = LessonExpectation::new(vec!["go"], false);
    let mut session = Session::new(Config::default());
    let handle = session.stop_handle();

    session.add_listener(move |_: &kidsim::event::Event| handle.stop());

    let report = session.run("drawString(\"go\", 0, 0, WHITE)\nsleep(1)\n", &mut ManualClock::new());

    assert!(validate(&report.trace, &expectation).passed);
    assert!(!validate_run(&report, &expectation).passed);
}

#[test]
fn test_completed_run_is_graded_on_its_trace() {
    let expectation = LessonExpectation::new(vec!["Hello"], true);
    let report = Session::new(Config::default())
        .run("drawString(\"Hello\", 0, 0, WHITE)\ntone(440, 100)\n", &mut ManualClock::new());

    let verdict = validate_run(&report, &expectation);
    assert!(verdict.passed);
    assert_eq!(verdict.feedback, "Perfect! Your code matches the goal!");
}
