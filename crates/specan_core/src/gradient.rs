//! Color Gradients
//!
//! A gradient is the user-facing description of a color mapping: a few HSV
//! points, each owning a band of the `[0, 1]` range (`position ± reach`)
//! with smooth blends in between. It is converted into a [`ColorScale`]
//! whenever a display needs a new mapping.

use serde::{Deserialize, Serialize};
use specan_dsp::{flat_brightness, ColorPoint, ColorScale, Rgb};

use crate::error::{EngineError, EngineResult};

/// One gradient point; every field is in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientPoint {
    pub hue: f32,
    pub saturation: f32,
    pub lightness: f32,
    pub position: f32,
    /// Half-width of the solid band around `position`
    pub reach: f32,
}

/// Ordered gradient points; the first sits at 0 and the last at 1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Gradient {
    points: Vec<GradientPoint>,
}

impl Gradient {
    pub fn new(points: Vec<GradientPoint>) -> EngineResult<Self> {
        if points.len() < 2 {
            return Err(EngineError::InvalidGradient(format!(
                "at least two points are required, got {}",
                points.len()
            )));
        }
        if points
            .windows(2)
            .any(|pair| pair[1].position < pair[0].position)
        {
            return Err(EngineError::InvalidGradient(
                "point positions must not decrease".to_string(),
            ));
        }
        Ok(Self { points })
    }

    /// Fully saturated hues spread evenly from red
    pub fn rainbow(num_points: usize) -> Self {
        let num_points = num_points.max(2);
        let num_zones = num_points * 2 - 1;
        let reach = 0.5 / num_zones as f32;
        let spacing = 1.0 / (num_points - 1) as f32;

        let points = (0..num_points)
            .map(|i| {
                let edge = i == 0 || i == num_points - 1;
                GradientPoint {
                    hue: i as f32 / num_points as f32,
                    saturation: 1.0,
                    lightness: 1.0,
                    position: spacing * i as f32,
                    reach: if edge { reach * 2.0 } else { reach },
                }
            })
            .collect();
        Self { points }
    }

    pub fn points(&self) -> &[GradientPoint] {
        &self.points
    }

    /// Mirror image: positions flipped and order reversed
    pub fn reversed(&self) -> Self {
        let points = self
            .points
            .iter()
            .rev()
            .map(|p| GradientPoint {
                position: 1.0 - p.position,
                ..*p
            })
            .collect();
        Self { points }
    }

    /// Two color breakpoints per gradient point bounding its solid band
    pub fn to_color_points(&self) -> Vec<ColorPoint> {
        let last = self.points.len() - 1;
        let mut out = Vec::with_capacity(self.points.len() * 2);
        for (i, point) in self.points.iter().enumerate() {
            let color = point_color(point);
            let (start, end) = if i == 0 {
                (0.0, point.reach)
            } else if i == last {
                (point.position - point.reach, 1.0)
            } else {
                (point.position - point.reach, point.position + point.reach)
            };
            out.push(ColorPoint {
                color,
                start: start.clamp(0.0, 1.0),
            });
            out.push(ColorPoint {
                color,
                start: end.clamp(0.0, 1.0),
            });
        }
        out
    }

    /// Build the color mapping, optionally reversed
    pub fn to_color_scale(&self, reverse: bool) -> EngineResult<ColorScale> {
        let color_points = if reverse {
            self.reversed().to_color_points()
        } else {
            self.to_color_points()
        };
        Ok(ColorScale::new(&color_points, &flat_brightness())?)
    }
}

impl Default for Gradient {
    fn default() -> Self {
        Self::rainbow(4)
    }
}

fn unit_to_byte(value: f32) -> u8 {
    ((value * 255.0) as i32 & 0xFF) as u8
}

fn point_color(point: &GradientPoint) -> Rgb {
    hsv_to_rgb(
        unit_to_byte(point.hue),
        unit_to_byte(point.saturation),
        unit_to_byte(point.lightness),
    )
}

/// 8-bit integer HSV to RGB, hue wraps at 256
pub fn hsv_to_rgb(h: u8, s: u8, v: u8) -> Rgb {
    if s == 0 {
        return Rgb::new(v, v, v);
    }

    let (h, s, v) = (h as u32, s as u32, v as u32);
    let region = h / 43;
    let remainder = (h - region * 43) * 6;

    let p = ((v * (255 - s)) >> 8) as u8;
    let q = ((v * (255 - ((s * remainder) >> 8))) >> 8) as u8;
    let t = ((v * (255 - ((s * (255 - remainder)) >> 8))) >> 8) as u8;
    let v = v as u8;

    match region {
        0 => Rgb::new(v, t, p),
        1 => Rgb::new(q, v, p),
        2 => Rgb::new(p, v, t),
        3 => Rgb::new(p, q, v),
        4 => Rgb::new(t, p, v),
        _ => Rgb::new(v, p, q),
    }
}
