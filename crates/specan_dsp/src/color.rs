//! Color Mapping
//!
//! A [`ColorScale`] is a piecewise-linear function from a 16-bit position
//! (`0..=0xFFFF`) plus a brightness multiplier to an RGB triple. It is built
//! once from color and brightness breakpoints and never mutated afterwards;
//! displays swap whole scales when the gradient changes.
//!
//! # Brightness
//!
//! The interpolated color is renormalized so that its vector length matches
//! the interpolated brightness curve times the caller's multiplier. Full
//! brightness is `255 * sqrt(3)`, the length of pure white, so saturated
//! colors clip to 255 in their dominant channel at full brightness.

use crate::error::DspError;

/// Positions are stored on a 0..65536 scale so the last segment includes 0xFFFF
const FULL_SCALE: f32 = 65536.0;

/// 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Packed `0x00RRGGBB`, the layout LED drivers take
    pub fn to_u32(self) -> u32 {
        (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    pub fn from_u32(packed: u32) -> Self {
        Self::new((packed >> 16) as u8, (packed >> 8) as u8, packed as u8)
    }

    pub fn is_black(self) -> bool {
        self == Self::BLACK
    }
}

/// Color breakpoint; `start` is the inclusive start position in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorPoint {
    pub color: Rgb,
    pub start: f32,
}

/// Brightness breakpoint; `brightness` is in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrightnessPoint {
    pub brightness: f32,
    pub start: f32,
}

/// Interpolation segment covering `[start, end)` on the 0..65536 scale
#[derive(Debug, Clone, Copy)]
struct Segment<T> {
    start: f32,
    end: f32,
    from: T,
    to: T,
}

impl<T: Copy> Segment<T> {
    fn fraction(&self, value: f32) -> f32 {
        let width = self.end - self.start;
        if width > 0.0 {
            (value - self.start) / width
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColorScale {
    colors: Vec<Segment<[f32; 3]>>,
    brightness: Vec<Segment<f32>>,
}

impl ColorScale {
    /// Build a scale from at least two color and two brightness breakpoints
    ///
    /// The first breakpoint of each list is anchored at 0 and the last
    /// segment always runs to the end of the range. Out-of-order starts are
    /// raised to the previous start, which leaves an empty segment.
    pub fn new(
        color_points: &[ColorPoint],
        brightness_points: &[BrightnessPoint],
    ) -> Result<Self, DspError> {
        if color_points.len() < 2 {
            return Err(DspError::TooFewBreakpoints(color_points.len()));
        }
        if brightness_points.len() < 2 {
            return Err(DspError::TooFewBreakpoints(brightness_points.len()));
        }

        let colors = segments(color_points, |p| (p.start, rgb_f32(p.color)));

        let max_brightness = 255.0 * 3.0_f32.sqrt();
        let brightness = segments(brightness_points, |p| {
            (p.start, p.brightness.clamp(0.0, 1.0) * max_brightness)
        });

        Ok(Self { colors, brightness })
    }

    /// Scale with a flat, full brightness curve
    pub fn from_colors(color_points: &[ColorPoint]) -> Result<Self, DspError> {
        Self::new(color_points, &flat_brightness())
    }

    /// Color at `position`, with the brightness curve scaled by `brightness`
    pub fn get_color(&self, position: u16, brightness: f32) -> Rgb {
        let value = position as f32;

        let segment = find_segment(&self.brightness, value);
        let fraction = segment.fraction(value);
        let desired = segment.from + (segment.to - segment.from) * fraction;

        let segment = find_segment(&self.colors, value);
        let fraction = segment.fraction(value);
        let mut rgb = [0.0_f32; 3];
        for (channel, (from, to)) in rgb
            .iter_mut()
            .zip(segment.from.iter().zip(segment.to.iter()))
        {
            *channel = from + (to - from) * fraction;
        }

        let length = (rgb[0] * rgb[0] + rgb[1] * rgb[1] + rgb[2] * rgb[2]).sqrt();
        if length <= 0.0 {
            return Rgb::BLACK;
        }
        let scalar = desired * brightness.max(0.0) / length;

        let channel = |c: f32| ((c * scalar).min(255.0) + 0.5) as u8;
        Rgb::new(channel(rgb[0]), channel(rgb[1]), channel(rgb[2]))
    }
}

/// Brightness curve that is 1.0 everywhere
pub fn flat_brightness() -> [BrightnessPoint; 2] {
    [
        BrightnessPoint {
            brightness: 1.0,
            start: 0.0,
        },
        BrightnessPoint {
            brightness: 1.0,
            start: 1.0,
        },
    ]
}

fn rgb_f32(color: Rgb) -> [f32; 3] {
    [color.r as f32, color.g as f32, color.b as f32]
}

fn segments<P, T: Copy>(points: &[P], extract: impl Fn(&P) -> (f32, T)) -> Vec<Segment<T>> {
    let last = points.len() - 2;
    let mut out: Vec<Segment<T>> = Vec::with_capacity(points.len() - 1);
    for (i, pair) in points.windows(2).enumerate() {
        let (_, from) = extract(&pair[0]);
        let (end, to) = extract(&pair[1]);

        // Each segment starts where the previous one ended
        let start = out.last().map_or(0.0, |s| s.end);
        let end = if i == last {
            FULL_SCALE
        } else {
            (end.clamp(0.0, 1.0) * FULL_SCALE).max(start)
        };
        out.push(Segment {
            start,
            end,
            from,
            to,
        });
    }
    out
}

fn find_segment<T: Copy>(segments: &[Segment<T>], value: f32) -> &Segment<T> {
    let index = segments.partition_point(|s| s.end <= value);
    &segments[index.min(segments.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red_to_blue() -> ColorScale {
        ColorScale::from_colors(&[
            ColorPoint {
                color: Rgb::new(255, 0, 0),
                start: 0.0,
            },
            ColorPoint {
                color: Rgb::new(0, 0, 255),
                start: 1.0,
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_rgb_packing() {
        let color = Rgb::new(0x12, 0x34, 0x56);
        assert_eq!(color.to_u32(), 0x123456);
        assert_eq!(Rgb::from_u32(0x123456), color);
        assert!(Rgb::BLACK.is_black());
    }

    #[test]
    fn test_rejects_single_point() {
        let points = [ColorPoint {
            color: Rgb::WHITE,
            start: 0.0,
        }];
        assert!(matches!(
            ColorScale::from_colors(&points),
            Err(DspError::TooFewBreakpoints(1))
        ));
    }

    #[test]
    fn test_endpoints() {
        let scale = red_to_blue();
        let start = scale.get_color(0, 1.0);
        assert_eq!(start, Rgb::new(255, 0, 0));
        let end = scale.get_color(0xFFFF, 1.0);
        assert_eq!(end.r, 0);
        assert_eq!(end.b, 255);
    }

    #[test]
    fn test_midpoint_is_blended() {
        let scale = red_to_blue();
        let mid = scale.get_color(0x8000, 1.0);
        assert!(mid.r > 100 && mid.b > 100, "got {mid:?}");
        assert_eq!(mid.g, 0);
        assert!((mid.r as i32 - mid.b as i32).abs() <= 2);
    }

    #[test]
    fn test_brightness_scales_luminance() {
        let scale = ColorScale::from_colors(&[
            ColorPoint {
                color: Rgb::WHITE,
                start: 0.0,
            },
            ColorPoint {
                color: Rgb::WHITE,
                start: 1.0,
            },
        ])
        .unwrap();
        assert_eq!(scale.get_color(1000, 1.0), Rgb::WHITE);
        assert_eq!(scale.get_color(1000, 0.5), Rgb::new(128, 128, 128));
        assert_eq!(scale.get_color(1000, 0.0), Rgb::BLACK);
    }

    #[test]
    fn test_black_stays_black() {
        let scale = ColorScale::from_colors(&[
            ColorPoint {
                color: Rgb::BLACK,
                start: 0.0,
            },
            ColorPoint {
                color: Rgb::BLACK,
                start: 1.0,
            },
        ])
        .unwrap();
        assert_eq!(scale.get_color(0x4000, 1.0), Rgb::BLACK);
    }

    #[test]
    fn test_brightness_curve() {
        let scale = ColorScale::new(
            &[
                ColorPoint {
                    color: Rgb::WHITE,
                    start: 0.0,
                },
                ColorPoint {
                    color: Rgb::WHITE,
                    start: 1.0,
                },
            ],
            &[
                BrightnessPoint {
                    brightness: 0.0,
                    start: 0.0,
                },
                BrightnessPoint {
                    brightness: 1.0,
                    start: 1.0,
                },
            ],
        )
        .unwrap();
        assert_eq!(scale.get_color(0, 1.0), Rgb::BLACK);
        let quarter = scale.get_color(0x4000, 1.0);
        assert!((quarter.r as i32 - 64).abs() <= 1, "got {quarter:?}");
    }

    #[test]
    fn test_hard_edge_from_duplicate_starts() {
        // Red up to the middle, then an instant switch to green
        let scale = ColorScale::from_colors(&[
            ColorPoint {
                color: Rgb::new(255, 0, 0),
                start: 0.0,
            },
            ColorPoint {
                color: Rgb::new(255, 0, 0),
                start: 0.5,
            },
            ColorPoint {
                color: Rgb::new(0, 255, 0),
                start: 0.5,
            },
            ColorPoint {
                color: Rgb::new(0, 255, 0),
                start: 1.0,
            },
        ])
        .unwrap();
        assert_eq!(scale.get_color(0x7FFF, 1.0), Rgb::new(255, 0, 0));
        assert_eq!(scale.get_color(0x8000, 1.0), Rgb::new(0, 255, 0));
    }
}
