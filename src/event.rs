//! Event handling.
//!
//! The device emulator reports every state change a script causes as an [Event].
//! Hosts observe them by registering [EventListeners](EventListener) on the
//! [Session](crate::scheduler::Session) with
//! [add_listener](crate::scheduler::Session::add_listener); this is how a host audio
//! layer learns that a tone started. The per-run [Tracer](crate::trace::Tracer) is an
//! [EventListener] too.
//!
//! A blanket implementation of [EventListener] for all `FnMut(&Event)` is provided.

use std::time::Duration;

/// Kind of geometry drawn by a shape primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    FilledRect,
    Rect,
    FilledCircle,
    Circle,
    Line,
    Pixel,
}

/// Represents an observable side effect of a script.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The whole screen was filled with a colour.
    ScreenFilled {
        color: u16,
    },

    /// A string was drawn on the screen.
    TextDrawn {
        text: String,
        x: i64,
        y: i64,
        color: u16,
    },

    /// A geometry primitive was drawn.
    ShapeDrawn {
        shape: Shape,
        color: u16,
    },

    /// The buzzer started playing.
    ToneStarted {
        /// Frequency in hertz.
        frequency: f64,

        /// How long the tone plays. Zero plays until `noTone()`.
        duration: Duration,
    },

    /// The buzzer went quiet, either by `noTone()` or because the tone ran out.
    ToneStopped,

    /// A line was printed on the serial console.
    Printed {
        text: String,
    },
}

/// Trait for consuming events.
pub trait EventListener {
    /// Called whenever a new event has been created.
    fn event(&mut self, event: &Event);
}

impl<F> EventListener for F where F: FnMut(&Event) {
    fn event(&mut self, event: &Event) {
        self(event)
    }
}

pub(crate) struct EventDispatcher {
    listeners: Vec<Box<dyn EventListener>>,
}

impl EventDispatcher {
    pub fn new() -> EventDispatcher {
        EventDispatcher {
            listeners: Vec::new(),
        }
    }

    pub fn add_listener<L: EventListener + 'static>(&mut self, listener: L) {
        self.listeners.push(Box::new(listener) as Box<dyn EventListener>)
    }

    pub fn dispatch(&mut self, event: &Event) {
        for listener in &mut self.listeners {
            listener.event(event);
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "EventDispatcher({} listeners)", self.listeners.len())
    }
}
