//! Camera color classification
//!
//! Converts an RGBA8 camera frame into the fraction of sampled pixels whose
//! color matches a mission's target hue. Pixels are sampled on a downsampled
//! grid, converted to HSV and tested against a circular hue window plus
//! saturation and value floors that reject near-gray and near-black pixels.

use crate::config::ClassifierConfig;
use crate::error::MissionError;
use crate::types::MissionType;

/// Hue of "green" on the 0-1 hue wheel
pub const GREEN_HUE: f32 = 0.33;

/// Hue of "sky blue" on the 0-1 hue wheel
pub const SKY_BLUE_HUE: f32 = 0.55;

const BYTES_PER_PIXEL: usize = 4;

/// Color a color mission looks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorTarget {
    Green,
    SkyBlue,
}

impl ColorTarget {
    /// Target for a mission type; `None` for non-color missions
    pub fn for_mission(mission_type: MissionType) -> Option<Self> {
        match mission_type {
            MissionType::ColorGreen => Some(ColorTarget::Green),
            MissionType::SkyBlue => Some(ColorTarget::SkyBlue),
            MissionType::Smile => None,
        }
    }

    pub fn hue(&self) -> f32 {
        match self {
            ColorTarget::Green => GREEN_HUE,
            ColorTarget::SkyBlue => SKY_BLUE_HUE,
        }
    }
}

/// Borrowed RGBA8 frame, row-major, `4 * width * height` bytes
#[derive(Debug, Clone, Copy)]
pub struct RgbaFrame<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
}

impl<'a> RgbaFrame<'a> {
    pub fn new(data: &'a [u8], width: u32, height: u32) -> Result<Self, MissionError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(BYTES_PER_PIXEL))
            .ok_or_else(|| {
                MissionError::InvalidFrame(format!("{}x{} frame is too large", width, height))
            })?;

        if data.len() != expected {
            return Err(MissionError::InvalidFrame(format!(
                "expected {} bytes for {}x{} RGBA, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }

        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

/// Supplier of camera frames
pub trait FrameSource {
    /// Latest available frame, if any
    fn latest_frame(&mut self) -> Option<RgbaFrame<'_>>;
}

impl<'a> FrameSource for RgbaFrame<'a> {
    fn latest_frame(&mut self) -> Option<RgbaFrame<'_>> {
        Some(*self)
    }
}

/// Stateless HSV color classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorClassifier {
    config: ClassifierConfig,
}

impl ColorClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Downsampled grid size for a frame
    pub fn sample_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let factor = self.config.downsample_factor.max(1);
        ((width / factor).max(1), (height / factor).max(1))
    }

    /// Fraction of sampled pixels matching `target`, in [0, 1].
    ///
    /// Samples the nearest source pixel for each cell of a
    /// `max(1, w / f) x max(1, h / f)` grid. An empty frame yields 0.
    pub fn match_ratio(&self, frame: &RgbaFrame<'_>, target: ColorTarget) -> f32 {
        if frame.width == 0 || frame.height == 0 {
            return 0.0;
        }

        let src_w = frame.width as usize;
        let src_h = frame.height as usize;
        let (out_w, out_h) = self.sample_dimensions(frame.width, frame.height);
        let (out_w, out_h) = (out_w as usize, out_h as usize);
        let target_hue = target.hue();

        let mut matches = 0usize;
        for y in 0..out_h {
            let row = (y * src_h / out_h) * src_w;
            for x in 0..out_w {
                let offset = (row + x * src_w / out_w) * BYTES_PER_PIXEL;
                let (r, g, b) = (
                    frame.data[offset],
                    frame.data[offset + 1],
                    frame.data[offset + 2],
                );
                if self.is_match(r, g, b, target_hue) {
                    matches += 1;
                }
            }
        }

        matches as f32 / (out_w * out_h) as f32
    }

    #[inline]
    fn is_match(&self, r: u8, g: u8, b: u8, target_hue: f32) -> bool {
        let (h, s, v) = rgb_to_hsv(r, g, b);
        hue_distance(h, target_hue) <= self.config.hue_range
            && s >= self.config.min_saturation
            && v >= self.config.min_value
    }
}

/// Convert 8-bit RGB to HSV, each component in [0, 1]
#[inline]
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let r = f32::from(r) / 255.0;
    let g = f32::from(g) / 255.0;
    let b = f32::from(b) / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    if max <= 0.0 {
        return (0.0, 0.0, 0.0);
    }
    let s = delta / max;
    if delta <= 0.0 {
        return (0.0, s, max);
    }

    let sector = if b >= g && b >= r {
        4.0 + (r - g) / delta
    } else if g >= r {
        2.0 + (b - r) / delta
    } else {
        (g - b) / delta
    };

    ((sector / 6.0).rem_euclid(1.0), s, max)
}

/// Shortest distance between two hues on the 0-1 wheel
#[inline]
pub fn hue_distance(a: f32, b: f32) -> f32 {
    let d = (a - b).abs().rem_euclid(1.0);
    d.min(1.0 - d)
}
