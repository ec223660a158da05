use std::cell::RefCell;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::rc::Rc;
use std::time::Duration;

use clap::{App, Arg, ArgMatches};
use slog::{info, o, Discard, Drain, Logger};
use slog_term::{FullFormat, TermDecorator};

use kidsim::{
    config::Config,
    emulator::{Button, Tilt},
    error::RunOutcome,
    event::Event,
    scheduler::{Session, SystemClock},
    validator::{validate_run, LessonExpectation},
};

/// Longest pause accepted for `--max-sleep`, in seconds.
const MAX_SLEEP_LIMIT: f64 = 3600.0;

enum Error {
    Argument(String),
    IO(std::io::Error),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::IO(e)
    }
}

fn parse_arguments() -> ArgMatches<'static> {
    App::new("kidsim-run")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Mitja Karhusaari <mitja@karhusaari.me>")
        .about("Runs a block editor script on the emulated device and grades its output")
        .arg(Arg::with_name("script")
             .help("File containing the script")
             .value_name("SCRIPT")
             .required(true)
             .index(1))
        .arg(Arg::with_name("expect")
             .help("Reference solution to grade the run against")
             .long("expect")
             .short("e")
             .value_name("REFERENCE"))
        .arg(Arg::with_name("screenshot")
             .help("Writes the final screen to a PPM image")
             .long("screenshot")
             .value_name("FILE"))
        .arg(Arg::with_name("budget")
             .help("Statements a script may execute between two sleeps")
             .long("budget")
             .value_name("STATEMENTS"))
        .arg(Arg::with_name("max-sleep")
             .help("Longest single pause in seconds")
             .long("max-sleep")
             .value_name("SECONDS"))
        .arg(Arg::with_name("audio")
             .help("Writes the buzzer's tones to a file as raw signed 16-bit mono samples")
             .long("audio")
             .value_name("FILE"))
        .arg(Arg::with_name("sample-rate")
             .help("Sample rate of the --audio output in hertz")
             .long("sample-rate")
             .value_name("HZ"))
        .arg(Arg::with_name("button-a")
             .help("Holds button A down for the whole run")
             .long("button-a"))
        .arg(Arg::with_name("button-b")
             .help("Holds button B down for the whole run")
             .long("button-b"))
        .arg(Arg::with_name("tilt")
             .help("Tilt sensor reading as X,Y,Z")
             .long("tilt")
             .value_name("X,Y,Z")
             .allow_hyphen_values(true))
        .arg(Arg::with_name("verbose")
             .help("Enables verbose logging")
             .long("verbose")
             .short("v"))
        .get_matches()
}

fn main() {
    let args = parse_arguments();

    match run(&args) {
        Ok(true) => (),
        Ok(false) => std::process::exit(1),
        Err(Error::IO(io)) => {
            eprintln!("IO error: {}", io);
            std::process::exit(2);
        },
        Err(Error::Argument(msg)) => {
            eprintln!("Invalid argument: {}", msg);
            std::process::exit(2);
        },
    }
}

fn logger(verbose: bool) -> Logger {
    if !verbose {
        return Logger::root(Discard, o!());
    }

    let decorator = TermDecorator::new().build();
    let drain = FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    Logger::root(drain, o!())
}

fn config(args: &ArgMatches) -> Result<Config, Error> {
    let mut config = Config::default();

    if let Some(budget) = args.value_of("budget") {
        let budget = budget.parse()
            .map_err(|_| Error::Argument(format!("budget must be a whole number, got '{}'", budget)))?;

        config = config.statement_budget(budget);
    }

    if let Some(seconds) = args.value_of("max-sleep") {
        let seconds: f64 = seconds.parse()
            .ok()
            .filter(|s: &f64| s.is_finite() && *s >= 0.0 && *s <= MAX_SLEEP_LIMIT)
            .ok_or_else(|| Error::Argument(format!(
                "max-sleep must be between 0 and {} seconds, got '{}'",
                MAX_SLEEP_LIMIT,
                seconds,
            )))?;

        config = config.max_sleep(Duration::from_secs_f64(seconds));
    }

    if let Some(rate) = args.value_of("sample-rate") {
        let rate = rate.parse()
            .ok()
            .filter(|rate: &u32| *rate > 0)
            .ok_or_else(|| Error::Argument(format!("sample-rate must be a positive whole number, got '{}'", rate)))?;

        config = config.sample_rate(rate);
    }

    Ok(config)
}

fn tilt(value: &str) -> Result<Tilt, Error> {
    let axes = value.split(',')
        .map(|axis| axis.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| Error::Argument(format!("tilt must be three numbers, got '{}'", value)))?;

    match axes[..] {
        [x, y, z] => Ok(Tilt { x, y, z }),
        _ => Err(Error::Argument(format!("tilt must be three numbers, got '{}'", value))),
    }
}

/// Returns whether the run completed and, if graded, passed.
fn run(args: &ArgMatches) -> Result<bool, Error> {
    let path = args.value_of("script").unwrap_or_default();
    let source = std::fs::read_to_string(path)?;

    let logger = logger(args.is_present("verbose"));
    let mut session = Session::with_logger(config(args)?, logger.clone());

    let tone_logger = logger.new(o!("device" => "buzzer"));

    session.add_listener(move |event: &Event| {
        if let Event::ToneStarted { frequency, duration } = event {
            info!(tone_logger, "tone"; "frequency" => *frequency, "millis" => duration.as_millis() as u64);
        }
    });

    let samples = Rc::new(RefCell::new(Vec::new()));

    if args.is_present("audio") {
        let samples = Rc::clone(&samples);
        session.add_audio_sink(move |wave| samples.borrow_mut().extend(wave));
    }

    session.set_button(Button::A, args.is_present("button-a"));
    session.set_button(Button::B, args.is_present("button-b"));

    if let Some(value) = args.value_of("tilt") {
        session.set_tilt(tilt(value)?);
    }

    let report = session.run(&source, &mut SystemClock::new());

    for line in session.emulator().console() {
        println!("> {}", line);
    }

    for text in &report.trace.texts {
        println!("screen: {:?}", text);
    }

    println!("buzzer: {}", if report.trace.has_buzzer { "yes" } else { "no" });

    let mut ok = match report.outcome {
        RunOutcome::Completed => {
            println!("completed after {} statements", report.statements);
            true
        },
        ref outcome => {
            println!("{}", outcome);
            false
        },
    };

    if let Some(path) = args.value_of("screenshot") {
        let file = BufWriter::new(File::create(path)?);
        session.emulator().framebuffer().write_ppm(file)?;
    }

    if let Some(path) = args.value_of("audio") {
        let mut file = BufWriter::new(File::create(path)?);

        for sample in samples.borrow().iter() {
            file.write_all(&sample.to_le_bytes())?;
        }

        file.flush()?;
    }

    if let Some(reference) = args.value_of("expect") {
        let expectation = LessonExpectation::from_reference(&std::fs::read_to_string(reference)?);

        let verdict = validate_run(&report, &expectation);
        println!("{}", verdict.feedback);
        ok &= verdict.passed;
    }

    Ok(ok)
}
