//! The simulated device: display, buzzer, two buttons, a tilt sensor and a serial
//! console.
//!
//! The [Emulator] owns the device state for a whole session and survives across runs.
//! Scripts change it only through [Emulator::apply], which refuses to touch anything
//! on behalf of a run whose [RunToken] is no longer current. Input state (buttons and
//! tilt) is written by the host at any time and read by scripts as-is.

pub mod color;
pub mod font;
pub mod framebuffer;

use std::collections::VecDeque;
use std::time::Duration;

use crate::event::{Event, EventDispatcher, EventListener, Shape};
use crate::scheduler::RunToken;

pub use framebuffer::{Framebuffer, Surface, HEIGHT, WIDTH};

/// Lines the serial console keeps unless configured otherwise.
pub const DEFAULT_CONSOLE_LINES: usize = 200;

/// One of the two push buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    A,
    B,
}

/// Reading of the 3-axis tilt sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Tilt {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// State of the piezo buzzer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Buzzer {
    pub active: bool,
    pub frequency: f64,

    /// Session time at which the current tone ends, `None` for a tone that plays
    /// until `noTone()`.
    pub until: Option<Duration>,
}

/// A fully evaluated device operation requested by a script.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceOp {
    FillScreen { color: u16 },
    DrawString { text: String, x: i64, y: i64, color: u16, size: u8 },
    FillRect { x: i64, y: i64, w: i64, h: i64, color: u16 },
    DrawRect { x: i64, y: i64, w: i64, h: i64, color: u16 },
    FillCircle { x: i64, y: i64, r: i64, color: u16 },
    DrawCircle { x: i64, y: i64, r: i64, color: u16 },
    DrawLine { x1: i64, y1: i64, x2: i64, y2: i64, color: u16 },
    DrawPixel { x: i64, y: i64, color: u16 },
    Tone { frequency: f64, duration: Duration },
    NoTone,
    Print { text: String },
}

#[derive(Debug)]
pub struct Emulator {
    framebuffer: Framebuffer,
    buzzer: Buzzer,
    buttons: [bool; 2],
    tilt: Tilt,
    console: VecDeque<String>,
    console_lines: usize,
    now: Duration,
    events: EventDispatcher,
}

impl Default for Emulator {
    fn default() -> Emulator {
        Emulator::new()
    }
}

impl Emulator {
    /// Creates a device with a black screen, a silent buzzer and no input.
    pub fn new() -> Emulator {
        Emulator::with_console_lines(DEFAULT_CONSOLE_LINES)
    }

    /// Creates a device whose console keeps only the last `lines` printed lines.
    pub fn with_console_lines(lines: usize) -> Emulator {
        Emulator {
            framebuffer: Framebuffer::new(),
            buzzer: Buzzer::default(),
            buttons: [false; 2],
            tilt: Tilt::default(),
            console: VecDeque::new(),
            console_lines: lines,
            now: Duration::from_secs(0),
            events: EventDispatcher::new(),
        }
    }

    /// Registers a host hook that sees every event of every run.
    pub fn add_listener<L: EventListener + 'static>(&mut self, listener: L) {
        self.events.add_listener(listener);
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    pub fn buzzer(&self) -> &Buzzer {
        &self.buzzer
    }

    /// The most recent lines printed on the serial console, oldest first.
    pub fn console(&self) -> &VecDeque<String> {
        &self.console
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn button(&self, button: Button) -> bool {
        self.buttons[button as usize]
    }

    pub fn set_button(&mut self, button: Button, pressed: bool) {
        self.buttons[button as usize] = pressed;
    }

    pub fn tilt(&self) -> Tilt {
        self.tilt
    }

    pub fn set_tilt(&mut self, tilt: Tilt) {
        self.tilt = tilt;
    }

    /// Advances the device clock, silencing the buzzer once its tone has run out.
    ///
    /// The buzzer keeps its own time: neither the statement budget nor cancellation
    /// of the run that started a tone cut it short.
    pub fn advance(&mut self, now: Duration) {
        if now > self.now {
            self.now = now;
        }

        match self.buzzer.until {
            Some(until) if self.buzzer.active && until <= self.now => {
                self.buzzer.active = false;
                self.buzzer.until = None;
                self.events.dispatch(&Event::ToneStopped);
            },
            _ => (),
        }
    }

    /// Performs `op` on behalf of the run holding `token`.
    ///
    /// Returns the resulting event, or `None` without changing anything if the token
    /// has been invalidated.
    pub fn apply(&mut self, token: &RunToken, op: DeviceOp) -> Option<Event> {
        if !token.is_current() {
            return None;
        }

        let event = match op {
            DeviceOp::FillScreen { color } => {
                self.framebuffer.fill(color);
                Event::ScreenFilled { color }
            },
            DeviceOp::DrawString { text, x, y, color, size } => {
                self.framebuffer.draw_text(&text, x, y, color, size);
                Event::TextDrawn { text, x, y, color }
            },
            DeviceOp::FillRect { x, y, w, h, color } => {
                self.framebuffer.fill_rect(x, y, w, h, color);
                Event::ShapeDrawn { shape: Shape::FilledRect, color }
            },
            DeviceOp::DrawRect { x, y, w, h, color } => {
                self.framebuffer.draw_rect(x, y, w, h, color);
                Event::ShapeDrawn { shape: Shape::Rect, color }
            },
            DeviceOp::FillCircle { x, y, r, color } => {
                self.framebuffer.fill_circle(x, y, r, color);
                Event::ShapeDrawn { shape: Shape::FilledCircle, color }
            },
            DeviceOp::DrawCircle { x, y, r, color } => {
                self.framebuffer.draw_circle(x, y, r, color);
                Event::ShapeDrawn { shape: Shape::Circle, color }
            },
            DeviceOp::DrawLine { x1, y1, x2, y2, color } => {
                self.framebuffer.draw_line(x1, y1, x2, y2, color);
                Event::ShapeDrawn { shape: Shape::Line, color }
            },
            DeviceOp::DrawPixel { x, y, color } => {
                self.framebuffer.set_pixel(x, y, color);
                Event::ShapeDrawn { shape: Shape::Pixel, color }
            },
            DeviceOp::Tone { frequency, duration } => {
                self.buzzer = Buzzer {
                    active: frequency > 0.0,
                    frequency,
                    until: if duration > Duration::from_secs(0) {
                        Some(self.now.checked_add(duration).unwrap_or(Duration::MAX))
                    } else {
                        None
                    },
                };

                Event::ToneStarted { frequency, duration }
            },
            DeviceOp::NoTone => {
                self.buzzer.active = false;
                self.buzzer.until = None;
                Event::ToneStopped
            },
            DeviceOp::Print { text } => {
                if self.console_lines > 0 {
                    if self.console.len() == self.console_lines {
                        self.console.pop_front();
                    }

                    self.console.push_back(text.clone());
                }
                Event::Printed { text }
            },
        };

        self.events.dispatch(&event);

        Some(event)
    }
}
