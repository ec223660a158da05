//! An execution engine for the short Python-like scripts children build in a block
//! editor for a small handheld device.
//!
//! Currently this crate provides the functionality to:
//! - Parse scripts into a [Program](script::Program), reporting mistakes with a short,
//!   child-friendly message and a line number.
//! - Emulate the device: a 135×240 colour display, a piezo buzzer, two buttons and a
//!   tilt sensor.
//! - Run scripts cooperatively: every `sleep` hands control back to the host, and a
//!   run can be stopped at any time.
//! - Trace what a run displayed and whether it beeped, and grade that trace against
//!   the output of a lesson's reference solution.
//!
//! # Example
//! ```
//! use kidsim::{
//!     config::Config,
//!     error::RunOutcome,
//!     scheduler::{ManualClock, Session},
//!     validator::{validate, LessonExpectation},
//! };
//!
//! // The lesson's reference solution.
//! let reference = r#"
//!     fillScreen(BLACK)
//!     drawString("Hello", 10, 10, WHITE)
//!     tone(440, 200)
//! "#;
//!
//! // What the child built.
//! let script = r#"
//!     fillScreen(BLUE)
//!     for i in range(3):
//!         drawString("hello", 10, 10 + i * 20, YELLOW)
//!         sleep(0.5)
//!     tone(523, 100)
//! "#;
//!
//! let mut session = Session::new(Config::default());
//!
//! // Virtual time, so the sleeps finish instantly.
//! let report = session.run(script, &mut ManualClock::new());
//! assert_eq!(report.outcome, RunOutcome::Completed);
//!
//! let expectation = LessonExpectation::from_reference(reference);
//! let verdict = validate(&report.trace, &expectation);
//!
//! assert!(verdict.passed);
//! assert_eq!(verdict.feedback, "Perfect! Your code matches the goal!");
//! ```
//!
//! # Executables
//!
//! ## `kidsim-run`
//!
//! Runs a script against the emulator in real time and prints its trace. With
//! `--expect` the trace is graded against a reference solution, and `--screenshot`
//! saves the final screen as a PPM image.
//!
//! ```text
//! $ kidsim-run hello.py --expect lesson1.py --button-a
//! screen: "Hello"
//! buzzer: no
//! completed after 4 statements
//! Almost there! Don't forget to play a sound with the buzzer.
//! ```
pub mod parsing;
pub mod script;
pub mod value;
pub mod emulator;
pub mod audio;
pub mod event;
pub mod interpreter;
pub mod scheduler;
pub mod trace;
pub mod validator;
pub mod config;
pub mod error;

pub use config::Config;
pub use error::{Fault, RunOutcome};
pub use scheduler::{Session, RunReport};
pub use trace::{OutputTrace, SimulatorOutput};
