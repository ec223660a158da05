//! The output trace of a run, used for grading.

use crate::event::{Event, EventListener};

/// What a run visibly did: the distinct strings it drew, in the order they first
/// appeared, and whether it ever played a tone.
///
/// This is the whole contract handed to lesson grading. It holds no state besides
/// these two fields and can always be rebuilt from the events of the run with
/// [OutputTrace::from_events].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputTrace {
    pub texts: Vec<String>,
    pub has_buzzer: bool,
}

/// The name lesson grading uses for an [OutputTrace].
pub type SimulatorOutput = OutputTrace;

impl OutputTrace {
    pub fn new() -> OutputTrace {
        OutputTrace::default()
    }

    pub fn from_events<'a, I>(events: I) -> OutputTrace
    where
        I: IntoIterator<Item = &'a Event>,
    {
        let mut trace = OutputTrace::new();

        for event in events {
            trace.record(event);
        }

        trace
    }

    /// Adds the effect of `event`. Texts are de-duplicated case-sensitively.
    pub fn record(&mut self, event: &Event) {
        match event {
            Event::TextDrawn { text, .. } => {
                if !self.texts.iter().any(|t| t == text) {
                    self.texts.push(text.clone());
                }
            },
            Event::ToneStarted { .. } => self.has_buzzer = true,
            _ => (),
        }
    }
}

/// Records the events of exactly one run.
#[derive(Debug, Default)]
pub struct Tracer {
    trace: OutputTrace,
    events: Vec<Event>,
}

impl Tracer {
    pub fn new() -> Tracer {
        Tracer::default()
    }

    pub fn trace(&self) -> &OutputTrace {
        &self.trace
    }

    /// Every event of the run in program order.
    pub fn events(&self) -> &[Event] {
        &self.events[..]
    }

    pub fn into_trace(self) -> OutputTrace {
        self.trace
    }
}

impl EventListener for Tracer {
    fn event(&mut self, event: &Event) {
        self.trace.record(event);
        self.events.push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn text(s: &str) -> Event {
        Event::TextDrawn {
            text: s.to_string(),
            x: 0,
            y: 0,
            color: 0xFFFF,
        }
    }

    #[test]
    fn test_texts_are_distinct_in_first_seen_order() {
        let mut tracer = Tracer::new();

        for event in &[text("World"), text("Hello"), text("World"), text("world")] {
            tracer.event(event);
        }

        assert_eq!(tracer.trace().texts, vec!["World", "Hello", "world"]);
        assert!(!tracer.trace().has_buzzer);
    }

    #[test]
    fn test_rebuild_from_events() {
        let mut tracer = Tracer::new();

        tracer.event(&Event::ScreenFilled { color: 0 });
        tracer.event(&text("Hi"));
        tracer.event(&Event::ToneStarted { frequency: 440.0, duration: Duration::from_millis(100) });
        tracer.event(&Event::ToneStopped);

        let rebuilt = OutputTrace::from_events(tracer.events());

        assert_eq!(&rebuilt, tracer.trace());
        assert!(rebuilt.has_buzzer);
    }
}
