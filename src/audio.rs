//! Square-wave synthesis for the buzzer.
//!
//! The engine does not own audio hardware. A host audio layer listens for
//! [Event::ToneStarted](crate::event::Event::ToneStarted) and plays the samples of a
//! [SquareWave] on its own clock.

use std::time::Duration;

use crate::event::Event;

/// Peak amplitude of generated samples.
pub const AMPLITUDE: i16 = i16::MAX / 4;

/// Length rendered for a tone that plays until `noTone()`.
pub const OPEN_ENDED: Duration = Duration::from_secs(1);

/// Signed 16-bit mono samples of a square wave.
#[derive(Debug, Clone)]
pub struct SquareWave {
    frequency: f64,
    sample_rate: u32,
    position: u64,
    length: u64,
}

impl SquareWave {
    /// A tone of `frequency` hertz lasting `duration`. A frequency of zero or less
    /// is silence of the same length.
    pub fn new(frequency: f64, duration: Duration, sample_rate: u32) -> SquareWave {
        let length = (duration.as_secs_f64() * sample_rate as f64).round() as u64;

        SquareWave {
            frequency,
            sample_rate,
            position: 0,
            length,
        }
    }

    /// The wave for a [Event::ToneStarted]. Tones without a duration are rendered for
    /// `open_ended`, after which the host may request another wave.
    pub fn for_event(event: &Event, sample_rate: u32, open_ended: Duration) -> Option<SquareWave> {
        match event {
            Event::ToneStarted { frequency, duration } => {
                let duration = if *duration > Duration::from_secs(0) { *duration } else { open_ended };
                Some(SquareWave::new(*frequency, duration, sample_rate))
            },
            _ => None,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Iterator for SquareWave {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        if self.position >= self.length {
            return None;
        }

        let cycles = self.position as f64 * self.frequency / self.sample_rate as f64;
        self.position += 1;

        if !(self.frequency > 0.0) {
            return Some(0);
        }

        if cycles.fract() < 0.5 {
            Some(AMPLITUDE)
        } else {
            Some(-AMPLITUDE)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.length - self.position) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SquareWave {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_wave_shape() {
        let samples: Vec<i16> = SquareWave::new(1000.0, Duration::from_millis(2), 8000).collect();

        assert_eq!(samples.len(), 16);
        assert_eq!(&samples[..8], &[
            AMPLITUDE, AMPLITUDE, AMPLITUDE, AMPLITUDE,
            -AMPLITUDE, -AMPLITUDE, -AMPLITUDE, -AMPLITUDE,
        ]);
    }

    #[test]
    fn test_zero_frequency_is_silent() {
        let wave = SquareWave::new(0.0, Duration::from_millis(10), 44_100);

        assert_eq!(wave.len(), 441);
        assert!(wave.into_iter().all(|s| s == 0));
    }

    #[test]
    fn test_for_event() {
        let event = Event::ToneStarted { frequency: 440.0, duration: Duration::from_secs(0) };
        let wave = SquareWave::for_event(&event, 1000, Duration::from_millis(500)).unwrap();

        assert_eq!(wave.len(), 500);
        assert!(SquareWave::for_event(&Event::ToneStopped, 1000, Duration::from_secs(1)).is_none());
    }
}
