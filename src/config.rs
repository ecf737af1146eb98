use serde_derive::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Error;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub tracker: TrackerConfig,
    pub speed: SpeedConfig,
    pub detection: DetectionConfig,
    pub calibration: CalibrationConfig,
    pub violation: ViolationConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    /// Frames a track survives without a match
    pub max_age: u32,
    /// Matches needed before a track is reported
    pub min_hits: u32,
    pub iou_threshold: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_age: 10,
            min_hits: 3,
            iou_threshold: 0.3,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct SpeedConfig {
    /// km/h per px/s; derived by calibration when absent
    pub speed_factor: Option<f32>,
    /// Most recent positions used for the distance average
    pub window: usize,
    /// Weight of the new sample in the exponential smoothing
    pub smoothing: f32,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            speed_factor: None,
            window: 10,
            smoothing: 0.7,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DetectionConfig {
    pub classes: Vec<i32>,
    pub min_confidence: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        // COCO car, motorcycle, bus, truck
        Self {
            classes: vec![2, 3, 5, 7],
            min_confidence: 0.5,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct CalibrationConfig {
    pub lane_width_m: f32,
    /// Real-world span assumed for the full frame width
    pub scene_width_m: f32,
    pub default_factor: f32,
    /// Hysteresis thresholds of the Canny detector, which applies its own blur
    pub canny_low: f32,
    pub canny_high: f32,
    pub vote_threshold: u32,
    pub suppression_radius: u32,
}

impl CalibrationConfig {
    /// Canny needs finite thresholds with `canny_low <= canny_high`.
    pub fn canny_thresholds_usable(&self) -> bool {
        self.canny_low.is_finite() && self.canny_high.is_finite() && self.canny_low <= self.canny_high
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            lane_width_m: 3.5,
            scene_width_m: 35.0,
            default_factor: 0.1,
            canny_low: 50.0,
            canny_high: 150.0,
            vote_threshold: 100,
            suppression_radius: 8,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct ViolationConfig {
    /// km/h
    pub speed_limit: f32,
}

impl Default for ViolationConfig {
    fn default() -> Self {
        Self { speed_limit: 60.0 }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, Error> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));

        if !(0.0..=1.0).contains(&self.tracker.iou_threshold) {
            return invalid(format!(
                "tracker.iou_threshold must be within [0, 1], got {}",
                self.tracker.iou_threshold
            ));
        }

        if self.tracker.min_hits == 0 {
            return invalid("tracker.min_hits must be at least 1".into());
        }

        if self.speed.window < 2 {
            return invalid(format!(
                "speed.window must be at least 2, got {}",
                self.speed.window
            ));
        }

        if !(0.0..=1.0).contains(&self.speed.smoothing) {
            return invalid(format!(
                "speed.smoothing must be within [0, 1], got {}",
                self.speed.smoothing
            ));
        }

        if let Some(factor) = self.speed.speed_factor {
            if !(factor.is_finite() && factor > 0.0) {
                return invalid(format!("speed.speed_factor must be positive, got {}", factor));
            }
        }

        if !(self.violation.speed_limit.is_finite() && self.violation.speed_limit > 0.0) {
            return invalid(format!(
                "violation.speed_limit must be positive, got {}",
                self.violation.speed_limit
            ));
        }

        if !(0.0..=1.0).contains(&self.detection.min_confidence) {
            return invalid(format!(
                "detection.min_confidence must be within [0, 1], got {}",
                self.detection.min_confidence
            ));
        }

        let cal = &self.calibration;
        if !(cal.lane_width_m > 0.0 && cal.scene_width_m > 0.0 && cal.default_factor > 0.0) {
            return invalid(
                "calibration lane_width_m, scene_width_m and default_factor must be positive"
                    .into(),
            );
        }

        if !cal.canny_thresholds_usable() {
            return invalid(format!(
                "calibration.canny_low must not exceed canny_high, got {} and {}",
                cal.canny_low, cal.canny_high
            ));
        }

        Ok(())
    }
}
