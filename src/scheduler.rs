//! Cooperative scheduling of runs against a session's device.
//!
//! A [Session] owns the [Emulator] for its whole lifetime and at most one active
//! run. Hosts with their own event loop call [Session::start] and then
//! [Session::poll] whenever their timer fires; [Session::run] drives a whole run with
//! a [Clock] instead. Neither ever spins while a script sleeps.
//!
//! Every run gets a fresh [RunToken]. Starting a run or calling [Session::stop]
//! invalidates the previous token, after which the device refuses all work of that
//! run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use slog::{debug, o, warn, Discard, Logger};

use crate::audio::{SquareWave, OPEN_ENDED};
use crate::config::Config;
use crate::emulator::{Button, Emulator, Tilt};
use crate::error::{Fault, RunOutcome};
use crate::event::{Event, EventListener};
use crate::interpreter::{Execution, Step};
use crate::script::Program;
use crate::trace::OutputTrace;

/// Identifies one run. Valid until the next run starts or the run is stopped.
#[derive(Debug, Clone)]
pub struct RunToken {
    id: u64,
    current: Arc<AtomicU64>,
}

impl RunToken {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.id
    }
}

impl PartialEq for RunToken {
    fn eq(&self, other: &RunToken) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.current, &other.current)
    }
}

/// Issues monotonically increasing run tokens. Identifiers start at 1.
#[derive(Debug, Default)]
pub struct TokenSource {
    current: Arc<AtomicU64>,
}

impl TokenSource {
    pub fn new() -> TokenSource {
        TokenSource::default()
    }

    /// Invalidates the current token and returns a new one.
    pub fn issue(&self) -> RunToken {
        let id = self.current.fetch_add(1, Ordering::SeqCst) + 1;

        RunToken {
            id,
            current: Arc::clone(&self.current),
        }
    }

    /// Invalidates the current token without issuing a new one.
    pub fn invalidate(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            current: Arc::clone(&self.current),
        }
    }
}

/// Stops the active run of a session. Can be sent to other threads.
#[derive(Debug, Clone)]
pub struct StopHandle {
    current: Arc<AtomicU64>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
    }
}

/// Source of session time for [Session::run].
///
/// All times handed to a session are offsets on one timeline, so a host should keep
/// using the same clock for the lifetime of the session.
pub trait Clock {
    fn now(&self) -> Duration;

    /// Waits until `deadline` or until `token` is invalidated, whichever comes first.
    fn sleep_until(&mut self, deadline: Duration, token: &RunToken);
}

/// Wall-clock time. Sleeps in short slices so that a stop is noticed quickly.
#[derive(Debug, Clone)]
pub struct SystemClock {
    epoch: Instant,
    slice: Duration,
}

impl Default for SystemClock {
    fn default() -> SystemClock {
        SystemClock::new()
    }
}

impl SystemClock {
    pub fn new() -> SystemClock {
        SystemClock::with_slice(Duration::from_millis(10))
    }

    pub fn with_slice(slice: Duration) -> SystemClock {
        SystemClock {
            epoch: Instant::now(),
            slice,
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn sleep_until(&mut self, deadline: Duration, token: &RunToken) {
        while token.is_current() {
            let now = self.now();

            if now >= deadline {
                break;
            }

            thread::sleep(std::cmp::min(deadline - now, self.slice));
        }
    }
}

/// Virtual time that jumps straight to every deadline.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Duration,
}

impl ManualClock {
    pub fn new() -> ManualClock {
        ManualClock::default()
    }

    pub fn advance(&mut self, by: Duration) {
        self.now = self.now.checked_add(by).unwrap_or(Duration::MAX);
    }

    pub fn set(&mut self, now: Duration) {
        self.now = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now
    }

    fn sleep_until(&mut self, deadline: Duration, _token: &RunToken) {
        if deadline > self.now {
            self.now = deadline;
        }
    }
}

/// Result of polling a session.
#[derive(Debug, Clone, PartialEq)]
pub enum Poll {
    /// No run is active.
    Idle,

    /// The active run is paused and wants to be polled again at `resume_at`.
    Sleeping { resume_at: Duration },

    /// The active run ended.
    Finished(RunReport),
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Identifier of the run's token, `0` for a program that was rejected before
    /// it could start.
    pub token: u64,
    pub outcome: RunOutcome,
    pub trace: OutputTrace,

    /// Statements executed over the whole run.
    pub statements: usize,
}

impl RunReport {
    fn rejected(fault: Fault) -> RunReport {
        RunReport {
            token: 0,
            outcome: RunOutcome::Faulted(fault),
            trace: OutputTrace::new(),
            statements: 0,
        }
    }
}

struct ActiveRun {
    execution: Execution,
    resume_at: Duration,
}

pub struct Session {
    emulator: Emulator,
    tokens: TokenSource,
    active: Option<ActiveRun>,
    config: Config,
    logger: Logger,
}

impl Session {
    pub fn new(config: Config) -> Session {
        Session::with_logger(config, None)
    }

    pub fn with_logger<L>(config: Config, logger: L) -> Session
    where
        L: Into<Option<Logger>>,
    {
        let logger = logger
            .into()
            .unwrap_or_else(|| Logger::root(Discard, o!()))
            .new(o!("component" => "session"));

        Session {
            emulator: Emulator::with_console_lines(config.console_lines),
            tokens: TokenSource::new(),
            active: None,
            config,
            logger,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn emulator(&self) -> &Emulator {
        &self.emulator
    }

    pub fn emulator_mut(&mut self) -> &mut Emulator {
        &mut self.emulator
    }

    /// Registers a host hook, such as an audio layer waiting for
    /// [Event::ToneStarted](crate::event::Event::ToneStarted).
    pub fn add_listener<L: EventListener + 'static>(&mut self, listener: L) {
        self.emulator.add_listener(listener);
    }

    /// Hands a [SquareWave] at the configured sample rate to `sink` for every tone
    /// the device starts.
    pub fn add_audio_sink<F: FnMut(SquareWave) + 'static>(&mut self, mut sink: F) {
        let sample_rate = self.config.sample_rate;

        self.emulator.add_listener(move |event: &Event| {
            if let Some(wave) = SquareWave::for_event(event, sample_rate, OPEN_ENDED) {
                sink(wave);
            }
        });
    }

    pub fn set_button(&mut self, button: Button, pressed: bool) {
        self.emulator.set_button(button, pressed);
    }

    pub fn button(&self, button: Button) -> bool {
        self.emulator.button(button)
    }

    pub fn set_tilt(&mut self, tilt: Tilt) {
        self.emulator.set_tilt(tilt);
    }

    pub fn tilt(&self) -> Tilt {
        self.emulator.tilt()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.tokens.stop_handle()
    }

    /// True while a run is active and its token is valid.
    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .map(|active| active.execution.token().is_current())
            .unwrap_or(false)
    }

    /// Parses `source` and makes it the active run, invalidating any previous one.
    ///
    /// The run does not execute anything until it is polled.
    pub fn start(&mut self, source: &str) -> Result<RunToken, Fault> {
        self.tokens.invalidate();
        self.active = None;

        let program = match Program::parse(source) {
            Ok(program) => program,
            Err(err) => {
                let fault = Fault::from_parse_error(&err, source);
                warn!(self.logger, "program rejected"; "fault" => %fault);
                return Err(fault);
            },
        };

        let token = self.tokens.issue();

        debug!(self.logger, "starting run"; "run" => token.id(), "blocks" => program.blocks.len());

        let execution = Execution::with_logger(
            Arc::new(program),
            Arc::from(source),
            token.clone(),
            self.config.clone(),
            self.logger.clone(),
        );

        self.active = Some(ActiveRun {
            execution,
            resume_at: Duration::from_secs(0),
        });

        Ok(token)
    }

    /// Advances the session to `now`.
    ///
    /// Runs the active run until it sleeps or finishes. Polling a sleeping run before
    /// its resume time does nothing, unless the run has been stopped, in which case
    /// it finishes as cancelled without touching the device.
    pub fn poll(&mut self, now: Duration) -> Poll {
        self.emulator.advance(now);

        let active = match self.active.as_mut() {
            Some(active) => active,
            None => return Poll::Idle,
        };

        if now < active.resume_at && active.execution.token().is_current() {
            return Poll::Sleeping { resume_at: active.resume_at };
        }

        match active.execution.resume(&mut self.emulator) {
            Step::Sleep(pause) => {
                active.resume_at = now.checked_add(pause).unwrap_or(Duration::MAX);
                Poll::Sleeping { resume_at: active.resume_at }
            },
            Step::Continue => Poll::Sleeping { resume_at: now },
            Step::Finished(outcome) => Poll::Finished(self.finish(outcome)),
        }
    }

    fn finish(&mut self, outcome: RunOutcome) -> RunReport {
        let (token, statements, trace) = match self.active.take() {
            Some(active) => (
                active.execution.token().id(),
                active.execution.statements_executed(),
                active.execution.into_trace(),
            ),
            None => (0, 0, OutputTrace::new()),
        };

        RunReport {
            token,
            outcome,
            trace,
            statements,
        }
    }

    /// Stops the active run. Takes effect at the next poll; a tone that is already
    /// playing keeps playing.
    pub fn stop(&mut self) {
        if self.active.is_some() {
            debug!(self.logger, "stop requested");
        }

        self.tokens.invalidate();
    }

    /// Runs `source` to the end, waiting on `clock` whenever the script sleeps.
    ///
    /// Every terminal state is returned in the report, including programs that could
    /// not be parsed.
    pub fn run<C: Clock>(&mut self, source: &str, clock: &mut C) -> RunReport {
        let token = match self.start(source) {
            Ok(token) => token,
            Err(fault) => return RunReport::rejected(fault),
        };

        loop {
            match self.poll(clock.now()) {
                Poll::Finished(report) => return report,
                Poll::Sleeping { resume_at } => clock.sleep_until(resume_at, &token),
                Poll::Idle => return RunReport {
                    token: token.id(),
                    outcome: RunOutcome::Cancelled,
                    trace: OutputTrace::new(),
                    statements: 0,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens() {
        let tokens = TokenSource::new();

        let first = tokens.issue();
        assert_eq!(first.id(), 1);
        assert!(first.is_current());

        let second = tokens.issue();
        assert!(!first.is_current());
        assert!(second.is_current());

        tokens.stop_handle().stop();
        assert!(!second.is_current());
        assert!(tokens.issue().id() > second.id());
    }

    #[test]
    fn test_stop_handle_across_threads() {
        let tokens = TokenSource::new();
        let token = tokens.issue();
        let handle = tokens.stop_handle();

        thread::spawn(move || handle.stop())
            .join()
            .unwrap();

        assert!(!token.is_current());
    }

    #[test]
    fn test_system_clock_returns_on_stop() {
        let tokens = TokenSource::new();
        let token = tokens.issue();
        let mut clock = SystemClock::with_slice(Duration::from_millis(1));

        tokens.invalidate();

        let before = Instant::now();
        clock.sleep_until(Duration::from_secs(60), &token);
        assert!(before.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_manual_clock() {
        let tokens = TokenSource::new();
        let token = tokens.issue();
        let mut clock = ManualClock::new();

        clock.sleep_until(Duration::from_millis(300), &token);
        assert_eq!(clock.now(), Duration::from_millis(300));

        clock.sleep_until(Duration::from_millis(100), &token);
        assert_eq!(clock.now(), Duration::from_millis(300));
    }
}
