//! Resumable execution of a parsed [Program].
//!
//! An [Execution] walks the program one statement per [step](Execution::step). The
//! position inside nested blocks and loops lives in an explicit stack of frames in
//! the [Context], so a run can return to its caller at every `sleep` and be resumed
//! later with nothing but the saved context.
//!
//! ```text
//! Ready -> Running -> Sleeping -> Running -> ... -> Completed | Cancelled | Faulted
//! ```

pub mod eval;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use slog::{debug, o, trace, warn, Discard, Logger};

use crate::config::Config;
use crate::emulator::Emulator;
use crate::error::{Fault, RunOutcome};
use crate::event::EventListener;
use crate::parsing::{LineLocation, Span};
use crate::scheduler::RunToken;
use crate::script::ast::{BlockId, Expr, Program, RepeatKind, SleepUnit, Statement, StatementEntry};
use crate::trace::{OutputTrace, Tracer};
use crate::value::Value;

use self::eval::RuntimeError;

/// Per-run execution state.
#[derive(Debug)]
pub struct Context {
    /// Flat variable environment of the run.
    pub variables: HashMap<String, Value>,

    /// Cursors into the blocks being executed, innermost last.
    frames: Vec<Frame>,

    /// The run token every device operation is checked against.
    pub token: RunToken,

    /// Set once the run has observed that its token was invalidated.
    pub cancelled: bool,

    /// Statements executed since the last sleep.
    executed: usize,

    /// Statements executed over the whole run.
    total: usize,
}

impl Context {
    fn new(root: BlockId, token: RunToken) -> Context {
        Context {
            variables: HashMap::new(),
            frames: vec![Frame {
                block: root,
                index: 0,
                repeat: None,
                span: 0..0,
            }],
            token,
            cancelled: false,
            executed: 0,
            total: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct Frame {
    block: BlockId,

    /// Index of the next statement of `block`.
    index: usize,

    /// Set for the body of a loop. Reaching the end of the block re-checks the loop.
    repeat: Option<Loop>,

    /// Span of the statement that opened this block.
    span: Span,
}

#[derive(Debug, Clone)]
enum Loop {
    Count {
        variable: Option<String>,
        current: f64,
        stop: f64,
    },
    While(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Ready,
    Running,
    Sleeping,
    Completed,
    Cancelled,
    Faulted,
}

/// Result of executing one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// More statements are ready to run.
    Continue,

    /// The run asks to be resumed after the given pause.
    Sleep(Duration),

    Finished(RunOutcome),
}

/// Ways a statement can interrupt the normal flow of the run.
enum Interrupt {
    Runtime(RuntimeError),
    Fault(Fault),
    Cancelled,
}

impl From<RuntimeError> for Interrupt {
    fn from(err: RuntimeError) -> Interrupt {
        Interrupt::Runtime(err)
    }
}

/// One run of a program.
pub struct Execution {
    program: Arc<Program>,
    source: Arc<str>,
    context: Context,
    tracer: Tracer,
    config: Config,
    state: State,
    outcome: Option<RunOutcome>,
    logger: Logger,
}

impl Execution {
    pub fn new(program: Arc<Program>, source: Arc<str>, token: RunToken, config: Config) -> Execution {
        Execution::with_logger(program, source, token, config, None)
    }

    pub fn with_logger<L>(program: Arc<Program>, source: Arc<str>, token: RunToken, config: Config, logger: L) -> Execution
    where
        L: Into<Option<Logger>>,
    {
        let logger = logger
            .into()
            .unwrap_or_else(|| Logger::root(Discard, o!()))
            .new(o!("run" => token.id()));

        Execution {
            context: Context::new(program.root, token),
            program,
            source,
            tracer: Tracer::new(),
            config,
            state: State::Ready,
            outcome: None,
            logger,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn outcome(&self) -> Option<&RunOutcome> {
        self.outcome.as_ref()
    }

    pub fn token(&self) -> &RunToken {
        &self.context.token
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Trace of the device calls made so far.
    pub fn trace(&self) -> &OutputTrace {
        self.tracer.trace()
    }

    pub fn statements_executed(&self) -> usize {
        self.context.total
    }

    pub fn into_trace(self) -> OutputTrace {
        self.tracer.into_trace()
    }

    /// Runs statements until the run sleeps or finishes.
    pub fn resume(&mut self, device: &mut Emulator) -> Step {
        loop {
            match self.step(device) {
                Step::Continue => continue,
                step => return step,
            }
        }
    }

    /// Executes a single statement.
    ///
    /// The run token is checked first, so a run that was stopped never touches the
    /// device again.
    pub fn step(&mut self, device: &mut Emulator) -> Step {
        if let Some(ref outcome) = self.outcome {
            return Step::Finished(outcome.clone());
        }

        if !self.context.token.is_current() {
            self.context.cancelled = true;
            return self.finish(RunOutcome::Cancelled);
        }

        if self.state == State::Ready {
            debug!(self.logger, "run started");
        }

        self.state = State::Running;

        match self.advance(device) {
            Ok(Some(pause)) => {
                self.context.executed = 0;
                self.state = State::Sleeping;
                Step::Sleep(pause)
            },
            Ok(None) if self.context.frames.is_empty() => self.finish(RunOutcome::Completed),
            Ok(None) => Step::Continue,
            Err(Interrupt::Cancelled) => {
                self.context.cancelled = true;
                self.finish(RunOutcome::Cancelled)
            },
            Err(Interrupt::Fault(fault)) => self.finish(RunOutcome::Faulted(fault)),
            Err(Interrupt::Runtime(err)) => self.finish(RunOutcome::Faulted(Fault::program(err.to_string(), None))),
        }
    }

    fn finish(&mut self, outcome: RunOutcome) -> Step {
        self.state = match outcome {
            RunOutcome::Completed => State::Completed,
            RunOutcome::Cancelled => State::Cancelled,
            RunOutcome::Faulted(_) => State::Faulted,
        };

        match outcome {
            RunOutcome::Completed => debug!(self.logger, "run completed"; "statements" => self.context.total),
            RunOutcome::Cancelled => debug!(self.logger, "run cancelled"; "statements" => self.context.total),
            RunOutcome::Faulted(ref fault) if fault.is_budget() => warn!(
                self.logger, "statement budget exceeded";
                "budget" => self.config.statement_budget,
                "line" => ?fault.line()
            ),
            RunOutcome::Faulted(ref fault) => warn!(self.logger, "program fault"; "fault" => %fault),
        }

        self.outcome = Some(outcome.clone());

        Step::Finished(outcome)
    }

    fn line(&self, span: &Span) -> usize {
        LineLocation::of(span.start, &self.source).line
    }

    /// Attaches the line of `span` to a runtime error.
    fn at(&self, span: &Span, interrupt: Interrupt) -> Interrupt {
        match interrupt {
            Interrupt::Runtime(err) => Interrupt::Fault(Fault::program(err.to_string(), Some(self.line(span)))),
            other => other,
        }
    }

    /// Counts one executed statement against the budget.
    fn charge(&mut self, span: &Span) -> Result<(), Interrupt> {
        self.context.executed += 1;
        self.context.total += 1;

        if self.context.executed > self.config.statement_budget {
            return Err(Interrupt::Fault(Fault::BudgetExceeded {
                budget: self.config.statement_budget,
                line: Some(self.line(span)),
            }));
        }

        Ok(())
    }

    /// Executes the next statement or closes the current block. Returns the pause
    /// requested by a `sleep`.
    fn advance(&mut self, device: &mut Emulator) -> Result<Option<Duration>, Interrupt> {
        let program = Arc::clone(&self.program);

        let (block, index) = match self.context.frames.last() {
            Some(frame) => (frame.block, frame.index),
            None => return Ok(None),
        };

        let entry = match program.statement(block, index) {
            Some(entry) => entry,
            None => return self.end_of_block(device).map(|_| None),
        };

        if let Some(frame) = self.context.frames.last_mut() {
            frame.index += 1;
        }

        self.charge(&entry.span)?;

        self.execute(entry, device)
            .map_err(|interrupt| self.at(&entry.span, interrupt))
    }

    fn evaluate(&self, expr: &Expr, device: &Emulator) -> Result<Value, RuntimeError> {
        eval::evaluate(expr, &self.context, device)
    }

    fn execute(&mut self, entry: &StatementEntry, device: &mut Emulator) -> Result<Option<Duration>, Interrupt> {
        match entry.statement {
            Statement::DeviceCall { method, ref args } => {
                let values = {
                    let device: &Emulator = device;

                    args.iter()
                        .map(|arg| self.evaluate(arg, device))
                        .collect::<Result<Vec<_>, _>>()?
                };

                let op = eval::device_op(method, &values)?;

                trace!(self.logger, "device call"; "method" => method.name());

                match device.apply(&self.context.token, op) {
                    Some(event) => {
                        self.tracer.event(&event);
                        Ok(None)
                    },
                    None => Err(Interrupt::Cancelled),
                }
            },
            Statement::Sleep { ref duration, unit } => {
                let amount = eval::number(&self.evaluate(duration, device)?, "sleep")?;

                let millis = match unit {
                    SleepUnit::Seconds => amount * 1000.0,
                    SleepUnit::Milliseconds => amount,
                };

                let pause = self.config.clamp_sleep(millis);
                trace!(self.logger, "sleep"; "millis" => pause.as_millis() as u64);

                Ok(Some(pause))
            },
            Statement::Assign { ref name, op, ref value } => {
                let value = self.evaluate(value, device)?;

                let value = match op {
                    None => value,
                    Some(op) => eval::binary(op, eval::lookup(&self.context, name), value)?,
                };

                self.context.variables.insert(name.clone(), value);
                Ok(None)
            },
            Statement::If { ref condition, then_block, else_block } => {
                let block = if self.evaluate(condition, device)?.is_truthy() {
                    Some(then_block)
                } else {
                    else_block
                };

                if let Some(block) = block {
                    self.enter(block, None, &entry.span);
                }

                Ok(None)
            },
            Statement::Repeat { kind: RepeatKind::Count { ref variable, ref start, ref stop }, body } => {
                let start = eval::number(&self.evaluate(start, device)?, "range")?;
                let stop = eval::number(&self.evaluate(stop, device)?, "range")?;

                if start < stop {
                    if let Some(name) = variable {
                        self.context.variables.insert(name.clone(), Value::Number(start));
                    }

                    let repeat = Loop::Count {
                        variable: variable.clone(),
                        current: start,
                        stop,
                    };

                    self.enter(body, Some(repeat), &entry.span);
                }

                Ok(None)
            },
            Statement::Repeat { kind: RepeatKind::While(ref condition), body } => {
                if self.evaluate(condition, device)?.is_truthy() {
                    self.enter(body, Some(Loop::While(condition.clone())), &entry.span);
                }

                Ok(None)
            },
            Statement::Break => {
                if !self.in_loop() {
                    return Err(RuntimeError::BreakOutsideLoop.into());
                }

                while let Some(frame) = self.context.frames.pop() {
                    if frame.repeat.is_some() {
                        break;
                    }
                }

                Ok(None)
            },
            Statement::Continue => {
                if !self.in_loop() {
                    return Err(RuntimeError::ContinueOutsideLoop.into());
                }

                while self.context.frames.last().map(|f| f.repeat.is_none()).unwrap_or(false) {
                    self.context.frames.pop();
                }

                // jump to the end of the loop body, where the loop is re-checked
                if let Some(frame) = self.context.frames.last_mut() {
                    frame.index = usize::MAX;
                }

                Ok(None)
            },
            Statement::Pass => Ok(None),
            Statement::Expression(ref expr) => {
                self.evaluate(expr, device)?;
                Ok(None)
            },
        }
    }

    fn enter(&mut self, block: BlockId, repeat: Option<Loop>, span: &Span) {
        self.context.frames.push(Frame {
            block,
            index: 0,
            repeat,
            span: span.clone(),
        });
    }

    fn in_loop(&self) -> bool {
        self.context.frames.iter().any(|frame| frame.repeat.is_some())
    }

    /// Leaves the innermost block, or starts its next iteration if it is the body of a
    /// loop whose condition still holds. A loop re-check counts as a statement.
    fn end_of_block(&mut self, device: &Emulator) -> Result<(), Interrupt> {
        let mut frame = match self.context.frames.pop() {
            Some(frame) => frame,
            None => return Ok(()),
        };

        if frame.repeat.is_none() {
            return Ok(());
        }

        self.charge(&frame.span)?;

        let again = match frame.repeat {
            Some(Loop::Count { ref variable, ref mut current, stop }) => {
                *current += 1.0;

                if *current < stop {
                    if let Some(name) = variable {
                        self.context.variables.insert(name.clone(), Value::Number(*current));
                    }
                    true
                } else {
                    false
                }
            },
            Some(Loop::While(ref condition)) => {
                eval::evaluate(condition, &self.context, device)
                    .map_err(|err| self.at(&frame.span, err.into()))?
                    .is_truthy()
            },
            None => false,
        };

        if again {
            frame.index = 0;
            self.context.frames.push(frame);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::TokenSource;

    fn execution(source: &str, config: Config) -> (Execution, TokenSource) {
        let tokens = TokenSource::new();
        let program = Program::parse(source).expect("could not parse");
        let execution = Execution::new(Arc::new(program), Arc::from(source), tokens.issue(), config);

        (execution, tokens)
    }

    #[test]
    fn test_variables_and_loops() {
        let (mut execution, _tokens) = execution(r#"
            total = 0
            for i in range(1, 5):
                if i == 3:
                    continue
                total += i
            n = 0
            while True:
                n = n + 1
                if n >= 4:
                    break
            label = "n=" + str(n)
            label = 7
        "#, Config::default());

        let mut device = Emulator::new();

        assert_eq!(execution.resume(&mut device), Step::Finished(RunOutcome::Completed));
        assert_eq!(execution.state(), State::Completed);

        let vars = &execution.context().variables;
        assert_eq!(vars.get("total"), Some(&Value::Number(7.0)));
        assert_eq!(vars.get("i"), Some(&Value::Number(4.0)));
        assert_eq!(vars.get("n"), Some(&Value::Number(4.0)));
        assert_eq!(vars.get("label"), Some(&Value::Number(7.0)));
    }

    #[test]
    fn test_sleep_suspends() {
        let (mut execution, _tokens) = execution(
            "drawString(\"a\", 0, 0, WHITE)\nsleep(0.25)\ndrawString(\"b\", 0, 10, WHITE)\n",
            Config::default(),
        );

        let mut device = Emulator::new();

        assert_eq!(execution.resume(&mut device), Step::Sleep(Duration::from_millis(250)));
        assert_eq!(execution.state(), State::Sleeping);
        assert_eq!(execution.trace().texts, vec!["a".to_string()]);

        assert_eq!(execution.resume(&mut device), Step::Finished(RunOutcome::Completed));
        assert_eq!(execution.trace().texts, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_budget_counts_loop_checks() {
        let (mut execution, _tokens) = execution("while True:\n    pass\n", Config::default().statement_budget(100));
        let mut device = Emulator::new();

        match execution.resume(&mut device) {
            Step::Finished(RunOutcome::Faulted(Fault::BudgetExceeded { budget, line })) => {
                assert_eq!(budget, 100);
                assert_eq!(line, Some(1));
            },
            other => panic!("expected a budget fault, got {:?}", other),
        }

        assert_eq!(execution.statements_executed(), 101);
    }

    #[test]
    fn test_sleep_resets_budget() {
        let (mut execution, _tokens) = execution(
            "for i in range(20):\n    x = i\n    sleep_ms(1)\n",
            Config::default().statement_budget(10),
        );

        let mut device = Emulator::new();
        let mut sleeps = 0;

        loop {
            match execution.resume(&mut device) {
                Step::Sleep(_) => sleeps += 1,
                Step::Finished(outcome) => {
                    assert_eq!(outcome, RunOutcome::Completed);
                    break;
                },
                Step::Continue => unreachable!(),
            }
        }

        assert_eq!(sleeps, 20);
    }

    #[test]
    fn test_runtime_fault_has_line() {
        let (mut execution, _tokens) = execution("x = 1\ny = x / 0\n", Config::default());
        let mut device = Emulator::new();

        assert_eq!(
            execution.resume(&mut device),
            Step::Finished(RunOutcome::Faulted(Fault::program("you can't divide by zero", Some(2)))),
        );
    }

    #[test]
    fn test_invalidated_token_cancels() {
        let (mut execution, tokens) = execution("fillScreen(RED)\nsleep(1)\nfillScreen(BLUE)\n", Config::default());
        let mut device = Emulator::new();

        assert!(matches!(execution.resume(&mut device), Step::Sleep(_)));

        tokens.invalidate();

        assert_eq!(execution.resume(&mut device), Step::Finished(RunOutcome::Cancelled));
        assert!(execution.context().cancelled);
        assert_eq!(device.framebuffer().pixel(0, 0), Some(0xF800));
    }

    #[test]
    fn test_unknown_variable_is_empty() {
        let (mut execution, _tokens) = execution("drawString(\"x\" + missing, 0, 0, WHITE)\n", Config::default());
        let mut device = Emulator::new();

        assert_eq!(execution.resume(&mut device), Step::Finished(RunOutcome::Completed));
        assert_eq!(execution.trace().texts, vec!["x".to_string()]);
    }
}
