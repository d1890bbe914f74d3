//! LED Strip Backends
//!
//! - [`TerminalStrip`]: renders each frame as a row of truecolor blocks
//! - [`NullStrip`]: discards frames, for running without any output
//! - [`MemoryStrip`]: keeps the last frame where another thread can read it

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use specan_dsp::Rgb;

use crate::error::PlatformError;
use crate::traits::LedStrip;

fn check_len(expected: usize, colors: &[Rgb]) -> Result<(), PlatformError> {
    if colors.len() != expected {
        return Err(PlatformError::LedCountMismatch {
            expected,
            got: colors.len(),
        });
    }
    Ok(())
}

/// ANSI truecolor rendering on a single, continuously rewritten line
pub struct TerminalStrip<W: Write + Send = std::io::Stdout> {
    num_leds: usize,
    out: W,
    line: String,
    /// Frames closer together than this are dropped
    min_interval: Duration,
    last_draw: Option<Instant>,
}

impl TerminalStrip {
    /// Strip drawing to stdout at no more than 60 frames per second
    pub fn stdout(num_leds: usize) -> Self {
        Self::new(num_leds, std::io::stdout(), Duration::from_millis(16))
    }
}

impl<W: Write + Send> TerminalStrip<W> {
    pub fn new(num_leds: usize, out: W, min_interval: Duration) -> Self {
        Self {
            num_leds,
            out,
            line: String::with_capacity(num_leds * 24),
            min_interval,
            last_draw: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> LedStrip for TerminalStrip<W> {
    fn name(&self) -> &'static str {
        "terminal"
    }

    fn num_leds(&self) -> usize {
        self.num_leds
    }

    fn set(&mut self, colors: &[Rgb]) -> Result<(), PlatformError> {
        check_len(self.num_leds, colors)?;

        let now = Instant::now();
        if let Some(last) = self.last_draw {
            if now.duration_since(last) < self.min_interval {
                return Ok(());
            }
        }
        self.last_draw = Some(now);

        use std::fmt::Write as _;
        self.line.clear();
        self.line.push('\r');
        for color in colors {
            let _ = write!(self.line, "\x1b[38;2;{};{};{}m█", color.r, color.g, color.b);
        }
        self.line.push_str("\x1b[0m");

        self.out.write_all(self.line.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

/// Strip that accepts and drops every frame
#[derive(Debug)]
pub struct NullStrip {
    num_leds: usize,
}

impl NullStrip {
    pub fn new(num_leds: usize) -> Self {
        Self { num_leds }
    }
}

impl LedStrip for NullStrip {
    fn name(&self) -> &'static str {
        "null"
    }

    fn num_leds(&self) -> usize {
        self.num_leds
    }

    fn set(&mut self, colors: &[Rgb]) -> Result<(), PlatformError> {
        check_len(self.num_leds, colors)
    }
}

#[derive(Debug, Default)]
struct MemoryFrame {
    colors: Vec<Rgb>,
    frames_written: u64,
}

/// Strip whose last frame can be inspected through a [`MemoryStripView`]
pub struct MemoryStrip {
    num_leds: usize,
    frame: Arc<Mutex<MemoryFrame>>,
}

/// Read side of a [`MemoryStrip`], usable after the strip moved to another thread
#[derive(Clone)]
pub struct MemoryStripView {
    frame: Arc<Mutex<MemoryFrame>>,
}

impl MemoryStrip {
    pub fn new(num_leds: usize) -> Self {
        Self {
            num_leds,
            frame: Arc::new(Mutex::new(MemoryFrame {
                colors: vec![Rgb::BLACK; num_leds],
                frames_written: 0,
            })),
        }
    }

    pub fn view(&self) -> MemoryStripView {
        MemoryStripView {
            frame: Arc::clone(&self.frame),
        }
    }
}

impl MemoryStripView {
    pub fn colors(&self) -> Vec<Rgb> {
        self.frame.lock().colors.clone()
    }

    pub fn frames_written(&self) -> u64 {
        self.frame.lock().frames_written
    }
}

impl LedStrip for MemoryStrip {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn num_leds(&self) -> usize {
        self.num_leds
    }

    fn set(&mut self, colors: &[Rgb]) -> Result<(), PlatformError> {
        check_len(self.num_leds, colors)?;
        let mut frame = self.frame.lock();
        frame.colors.copy_from_slice(colors);
        frame.frames_written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_length_rejected() {
        let mut strip = NullStrip::new(8);
        assert!(strip.set(&[Rgb::BLACK; 8]).is_ok());
        assert!(matches!(
            strip.set(&[Rgb::BLACK; 7]),
            Err(PlatformError::LedCountMismatch {
                expected: 8,
                got: 7
            })
        ));
    }

    #[test]
    fn test_memory_strip_view() {
        let mut strip = MemoryStrip::new(3);
        let view = strip.view();
        let frame = [Rgb::new(1, 2, 3), Rgb::WHITE, Rgb::BLACK];
        strip.set(&frame).unwrap();
        assert_eq!(view.colors(), frame.to_vec());
        assert_eq!(view.frames_written(), 1);

        strip.clear().unwrap();
        assert_eq!(view.colors(), vec![Rgb::BLACK; 3]);
        assert_eq!(view.frames_written(), 2);
    }

    #[test]
    fn test_terminal_strip_escape_codes() {
        let mut strip = TerminalStrip::new(2, Vec::new(), Duration::ZERO);
        strip.set(&[Rgb::new(255, 0, 0), Rgb::new(0, 0, 255)]).unwrap();
        let text = String::from_utf8(strip.into_inner()).unwrap();
        assert!(text.starts_with('\r'));
        assert!(text.contains("\x1b[38;2;255;0;0m"));
        assert!(text.contains("\x1b[38;2;0;0;255m"));
        assert!(text.ends_with("\x1b[0m"));
    }

    #[test]
    fn test_terminal_strip_drops_fast_frames() {
        let mut strip = TerminalStrip::new(1, Vec::new(), Duration::from_secs(60));
        strip.set(&[Rgb::WHITE]).unwrap();
        strip.set(&[Rgb::BLACK]).unwrap();
        let text = String::from_utf8(strip.into_inner()).unwrap();
        assert_eq!(text.matches('\r').count(), 1);
    }
}
