//! Best-effort derivation of the speed factor from scene geometry.
//!
//! Lane markings show up as near-vertical lines in a road-facing camera. The median
//! horizontal spacing between neighbouring markings is taken as one lane width, which
//! fixes the metres-per-pixel scale. When markings cannot be found the full frame width
//! is assumed to span a fixed distance, and when the frame itself is unusable a
//! configured constant is returned. Estimation never fails.

use std::path::Path;

use image::GrayImage;
use imageproc::hough::{detect_lines, LineDetectionOptions, PolarLine};
use tracing::{info, warn};

use crate::config::CalibrationConfig;
use crate::math;

// m/s to km/h
const MS_TO_KMH: f32 = 3.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationMethod {
    LaneMarkings { lane_width_px: f32 },
    SceneWidth,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// km/h per px/s
    pub speed_factor: f32,
    pub method: CalibrationMethod,
}

#[derive(Debug, Clone, Default)]
pub struct CalibrationEstimator {
    config: CalibrationConfig,
}

impl CalibrationEstimator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    pub fn fallback(&self) -> Calibration {
        Calibration {
            speed_factor: self.config.default_factor,
            method: CalibrationMethod::Default,
        }
    }

    pub fn estimate(&self, frame: &GrayImage) -> Calibration {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            warn!("empty reference frame, using default speed factor");
            return self.fallback();
        }

        if !self.config.canny_thresholds_usable() {
            warn!(
                "unusable canny thresholds {} / {}, using default speed factor",
                self.config.canny_low, self.config.canny_high
            );
            return self.fallback();
        }

        let edges = imageproc::edges::canny(frame, self.config.canny_low, self.config.canny_high);
        let lines = detect_lines(
            &edges,
            LineDetectionOptions {
                vote_threshold: self.config.vote_threshold,
                suppression_radius: self.config.suppression_radius,
            },
        );

        self.from_lines(&lines, width, height)
    }

    /// Calibrates from lines already detected in a `width` x `height` frame.
    pub fn from_lines(&self, lines: &[PolarLine], width: u32, height: u32) -> Calibration {
        if lines.is_empty() {
            info!("no lines detected, using default speed factor");
            return self.fallback();
        }

        let xs = lane_marking_positions(lines, height as f32);
        if let Some(lane_width_px) = lane_width_px(&xs) {
            let speed_factor = self.config.lane_width_m / lane_width_px * MS_TO_KMH;
            info!(
                "calibrated from {} lane markings: lane width {:.1} px, speed factor {:.4}",
                xs.len(),
                lane_width_px,
                speed_factor
            );

            return Calibration {
                speed_factor,
                method: CalibrationMethod::LaneMarkings { lane_width_px },
            };
        }

        if width == 0 {
            return self.fallback();
        }

        let speed_factor = self.config.scene_width_m / width as f32 * MS_TO_KMH;
        info!(
            "{} lane markings found, assuming {} m scene width: speed factor {:.4}",
            xs.len(),
            self.config.scene_width_m,
            speed_factor
        );

        Calibration {
            speed_factor,
            method: CalibrationMethod::SceneWidth,
        }
    }

    /// Calibrates from an image file, falling back to the default factor when it can't be read.
    pub fn estimate_from_path<P: AsRef<Path>>(&self, path: P) -> Calibration {
        match image::open(path.as_ref()) {
            Ok(img) => self.estimate(&img.to_luma8()),
            Err(err) => {
                warn!(
                    "could not read reference frame {:?}: {}",
                    path.as_ref(),
                    err
                );
                self.fallback()
            }
        }
    }

    /// Calibrates from the first frame of a video, falling back to the default factor
    /// when the video can't be opened or decoded.
    #[cfg(feature = "opencv")]
    pub fn estimate_from_video<P: AsRef<Path>>(&self, path: P) -> Calibration {
        match crate::video::VideoProbe::open(path.as_ref()).and_then(|mut v| v.first_frame()) {
            Ok(frame) => self.estimate(&frame),
            Err(err) => {
                warn!("could not read video {:?}: {}", path.as_ref(), err);
                self.fallback()
            }
        }
    }
}

/// Horizontal positions, at mid-height, of the lines that are more vertical than horizontal.
pub fn lane_marking_positions(lines: &[PolarLine], height: f32) -> Vec<f32> {
    let y = height / 2.0;

    lines
        .iter()
        .filter(|l| l.angle_in_degrees < 45 || l.angle_in_degrees > 135)
        .map(|l| {
            // x cos(t) + y sin(t) = r
            let (sin, cos) = (l.angle_in_degrees as f32).to_radians().sin_cos();
            (l.r - y * sin) / cos
        })
        .filter(|x| x.is_finite())
        .collect()
}

/// Median spacing between neighbouring markings, `None` when under two markings
/// or when the spacing collapses to zero.
pub fn lane_width_px(xs: &[f32]) -> Option<f32> {
    if xs.len() < 2 {
        return None;
    }

    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let gaps: Vec<f32> = sorted.windows(2).map(|w| (w[1] - w[0]).abs()).collect();

    math::median(&gaps).filter(|&w| w > 0.0)
}
