use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use kidsim::{
    audio::SquareWave,
    config::Config,
    emulator::{Button, Tilt},
    error::{Fault, RunOutcome},
    event::Event,
    scheduler::{ManualClock, Poll, Session},
    script::Program,
};

const GREETING: &str = r#"
fillScreen(BLACK)
drawString("Hello", 10, 10, WHITE)
drawString("World", 10, 30, YELLOW)
drawString("Hello", 60, 100, RED, 2)
fillScreen(0x001F)
drawString("bye", 0, 0, WHITE)
"#;

fn run(source: &str) -> kidsim::RunReport {
    Session::new(Config::default()).run(source, &mut ManualClock::new())
}

#[test]
fn test_trace_holds_distinct_literals() {
    let report = run(GREETING);

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.trace.texts, vec!["Hello", "World", "bye"]);
    assert!(!report.trace.has_buzzer);
}

#[test]
fn test_buzzer_only_when_tone_executes() {
    let report = run("if buttonA():\n    tone(440, 100)\n");
    assert!(!report.trace.has_buzzer);

    let report = run("for i in range(2):\n    tone(440 + i * 100, 50)\n");
    assert!(report.trace.has_buzzer);
}

#[test]
fn test_parsing_is_idempotent() {
    let first = Program::parse(GREETING).expect("could not parse");
    let second = Program::parse(GREETING).expect("could not parse");

    assert_eq!(first, second);
}

#[test]
fn test_runs_are_repeatable() {
    let mut session = Session::new(Config::default());

    let first = session.run(GREETING, &mut ManualClock::new());
    let second = session.run(GREETING, &mut ManualClock::new());

    assert_eq!(first.trace, second.trace);
    assert_eq!(first.statements, second.statements);
    assert!(second.token > first.token);
}

#[test]
fn test_stop_during_sleep() {
    let mut session = Session::new(Config::default());

    session.start(r#"
drawString("before", 0, 0, WHITE)
sleep(1)
drawString("after", 0, 20, WHITE)
tone(880, 100)
"#).expect("could not start");

    assert_eq!(session.poll(Duration::from_millis(0)), Poll::Sleeping { resume_at: Duration::from_secs(1) });
    assert!(session.is_running());

    session.stop();
    assert!(!session.is_running());

    match session.poll(Duration::from_millis(400)) {
        Poll::Finished(report) => {
            assert_eq!(report.outcome, RunOutcome::Cancelled);
            assert_eq!(report.trace.texts, vec!["before"]);
            assert!(!report.trace.has_buzzer);
        },
        other => panic!("expected the run to finish, got {:?}", other),
    }

    assert_eq!(session.poll(Duration::from_secs(2)), Poll::Idle);
    assert!(session.emulator().buzzer().until.is_none());
}

#[test]
fn test_stop_handle_from_listener() {
    let mut session = Session::new(Config::default());
    let handle = session.stop_handle();

    session.add_listener(move |event: &Event| {
        if let Event::TextDrawn { text, .. } = event {
            if text == "stop" {
                handle.stop();
            }
        }
    });

    let report = session.run(r#"
drawString("go", 0, 0, WHITE)
drawString("stop", 0, 10, WHITE)
drawString("never", 0, 20, WHITE)
"#, &mut ManualClock::new());

    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert_eq!(report.trace.texts, vec!["go", "stop"]);
}

#[test]
fn test_endless_loop_hits_budget() {
    let mut session = Session::new(Config::default().statement_budget(500));
    let report = session.run("x = 0\nwhile True:\n    x += 1\n", &mut ManualClock::new());

    match report.outcome {
        RunOutcome::Faulted(ref fault) => {
            assert!(fault.is_budget());
            assert_eq!(fault.line(), Some(3));
        },
        ref other => panic!("expected a budget fault, got {:?}", other),
    }

    assert!(report.statements <= 501);
}

#[test]
fn test_endless_loop_with_sleep_runs_on() {
    let mut session = Session::new(Config::default().statement_budget(50));

    session.start("while True:\n    drawString(\"tick\", 0, 0, WHITE)\n    sleep_ms(100)\n")
        .expect("could not start");

    let mut now = Duration::from_millis(0);

    for _ in 0..200 {
        match session.poll(now) {
            Poll::Sleeping { resume_at } => now = resume_at,
            other => panic!("expected the run to keep sleeping, got {:?}", other),
        }
    }

    assert_eq!(now, Duration::from_secs(20));
    assert!(session.is_running());
}

#[test]
fn test_rejected_program() {
    let report = run("fillScreen(BLACK)\nfilScreen(RED)\n");

    assert_eq!(report.token, 0);
    assert_eq!(report.statements, 0);
    assert_eq!(
        report.outcome.fault().map(|fault| fault.to_string()),
        Some("Line 2: I don't know `filScreen`. Did you mean `fillScreen`?".to_string()),
    );
}

#[test]
fn test_runtime_fault_keeps_trace() {
    let report = run("drawString(\"a\", 0, 0, WHITE)\nx = 1 % 0\n");

    assert_eq!(report.trace.texts, vec!["a"]);
    assert_eq!(
        report.outcome,
        RunOutcome::Faulted(Fault::program("you can't divide by zero", Some(2))),
    );
}

#[test]
fn test_device_state_outlives_runs() {
    let mut session = Session::new(Config::default());

    session.run("fillScreen(RED)\n", &mut ManualClock::new());
    let report = session.run("drawPixel(5, 5, BLUE)\n", &mut ManualClock::new());

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(session.emulator().framebuffer().pixel(0, 0), Some(0xF800));
    assert_eq!(session.emulator().framebuffer().pixel(5, 5), Some(0x001F));
}

#[test]
fn test_new_run_invalidates_old() {
    let mut session = Session::new(Config::default());

    let first = session.start("sleep(1)\nfillScreen(RED)\n").expect("could not start");
    let second = session.start("fillScreen(GREEN)\n").expect("could not start");

    assert!(!first.is_current());
    assert!(second.is_current());

    match session.poll(Duration::from_secs(5)) {
        Poll::Finished(report) => assert_eq!(report.token, second.id()),
        other => panic!("expected the run to finish, got {:?}", other),
    }

    assert_eq!(session.emulator().framebuffer().pixel(0, 0), Some(0x07E0));
}

#[test]
fn test_listener_hears_tones() {
    let heard = Rc::new(RefCell::new(Vec::new()));
    let mut session = Session::new(Config::default());

    {
        let heard = Rc::clone(&heard);

        session.add_listener(move |event: &Event| {
            if let Event::ToneStarted { frequency, duration } = event {
                heard.borrow_mut().push((*frequency, *duration));
            }
        });
    }

    session.run("tone(440, 250)\nsleep_ms(50)\ntone(660, 100)\n", &mut ManualClock::new());

    assert_eq!(*heard.borrow(), vec![
        (440.0, Duration::from_millis(250)),
        (660.0, Duration::from_millis(100)),
    ]);
}

#[test]
fn test_tone_expires_on_device_clock() {
    let mut session = Session::new(Config::default());

    session.start("tone(440, 200)\nsleep(1)\n").expect("could not start");
    session.poll(Duration::from_millis(0));
    assert!(session.emulator().buzzer().active);

    session.poll(Duration::from_millis(300));
    assert!(!session.emulator().buzzer().active);
}

#[test]
fn test_inputs_drive_the_script() {
    let mut session = Session::new(Config::default());

    session.set_button(Button::A, true);
    session.set_tilt(Tilt { x: -3.0, y: 0.0, z: 9.8 });

    assert!(session.button(Button::A));
    assert!(!session.button(Button::B));

    let report = session.run(r#"
if buttonA() and not buttonB():
    drawString("A", 0, 0, WHITE)
if readTiltX() < 0:
    drawString("left", 0, 10, WHITE)
else:
    drawString("right", 0, 10, WHITE)
"#, &mut ManualClock::new());

    assert_eq!(report.trace.texts, vec!["A", "left"]);
}

#[test]
fn test_deeply_nested_script_faults() {
    let source = format!("drawString(str({}1{}), 0, 0, WHITE)\n", "(".repeat(5_000), ")".repeat(5_000));
    let report = run(&source);

    match report.outcome {
        RunOutcome::Faulted(ref fault) => assert_eq!(fault.line(), Some(1)),
        ref other => panic!("expected a fault, got {:?}", other),
    }

    let terms = vec!["1"; 100_000].join(" + ");
    assert!(run(&format!("x = {}\n", terms)).outcome.fault().is_some());
}

#[test]
fn test_huge_sleep_saturates() {
    let mut session = Session::new(Config::default().max_sleep(Duration::MAX));

    session.start("sleep(1e300)\ndrawString(\"late\", 0, 0, WHITE)\n").expect("could not start");

    assert_eq!(session.poll(Duration::from_secs(1)), Poll::Sleeping { resume_at: Duration::MAX });

    session.stop();

    match session.poll(Duration::from_secs(2)) {
        Poll::Finished(report) => assert_eq!(report.outcome, RunOutcome::Cancelled),
        other => panic!("expected the run to finish, got {:?}", other),
    }
}

#[test]
fn test_console_is_bounded() {
    let mut session = Session::new(Config::default().console_lines(5));

    let report = session.run("i = 0\nwhile i < 50:\n    print(\"line\", i)\n    i += 1\n    sleep_ms(1)\n", &mut ManualClock::new());

    assert_eq!(report.outcome, RunOutcome::Completed);

    let console: Vec<&String> = session.emulator().console().iter().collect();
    assert_eq!(console, vec!["line 45", "line 46", "line 47", "line 48", "line 49"]);
}

#[test]
fn test_audio_sink_uses_sample_rate() {
    let lengths = Rc::new(RefCell::new(Vec::new()));
    let mut session = Session::new(Config::default().sample_rate(8_000));

    {
        let lengths = Rc::clone(&lengths);

        session.add_audio_sink(move |wave: SquareWave| {
            assert_eq!(wave.sample_rate(), 8_000);
            lengths.borrow_mut().push(wave.count());
        });
    }

    session.run("tone(440, 250)\ntone(880, 0)\nnoTone()\n", &mut ManualClock::new());

    assert_eq!(*lengths.borrow(), vec![2_000, 8_000]);
}
