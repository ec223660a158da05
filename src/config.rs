//! Tunables of a [Session](crate::scheduler::Session).

use std::time::Duration;

use crate::emulator::DEFAULT_CONSOLE_LINES;

/// Limits and rates applied to every run of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Statements a run may execute between two sleeps before it is stopped as a
    /// runaway loop.
    pub statement_budget: usize,

    /// Longest single pause a script can request. Longer sleeps are shortened.
    pub max_sleep: Duration,

    /// Sample rate of the square waves produced for tones.
    pub sample_rate: u32,

    /// Lines of `print` output the serial console keeps.
    pub console_lines: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            statement_budget: 10_000,
            max_sleep: Duration::from_secs(60),
            sample_rate: 44_100,
            console_lines: DEFAULT_CONSOLE_LINES,
        }
    }
}

impl Config {
    pub fn new() -> Config {
        Config::default()
    }

    pub fn statement_budget(mut self, budget: usize) -> Config {
        self.statement_budget = budget;
        self
    }

    pub fn max_sleep(mut self, max_sleep: Duration) -> Config {
        self.max_sleep = max_sleep;
        self
    }

    pub fn sample_rate(mut self, sample_rate: u32) -> Config {
        self.sample_rate = sample_rate;
        self
    }

    pub fn console_lines(mut self, lines: usize) -> Config {
        self.console_lines = lines;
        self
    }

    /// Clamps a requested pause in milliseconds to `[0, max_sleep]`.
    pub fn clamp_sleep(&self, millis: f64) -> Duration {
        if !(millis > 0.0) {
            return Duration::from_secs(0);
        }

        let secs = millis / 1000.0;

        if secs >= self.max_sleep.as_secs_f64() {
            self.max_sleep
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

#[test]
fn test_clamp_sleep() {
    let config = Config::new().max_sleep(Duration::from_secs(2));

    assert_eq!(config.clamp_sleep(-5.0), Duration::from_secs(0));
    assert_eq!(config.clamp_sleep(std::f64::NAN), Duration::from_secs(0));
    assert_eq!(config.clamp_sleep(500.0), Duration::from_millis(500));
    assert_eq!(config.clamp_sleep(1e12), Duration::from_secs(2));
    assert_eq!(config.clamp_sleep(std::f64::INFINITY), Duration::from_secs(2));

    let unlimited = Config::new().max_sleep(Duration::MAX);
    assert_eq!(unlimited.clamp_sleep(1e300), Duration::MAX);
    assert_eq!(unlimited.clamp_sleep(1500.0), Duration::from_millis(1500));
}
