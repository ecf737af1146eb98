use std::collections::{BTreeMap, HashMap};

use nalgebra as na;

use crate::bbox::{BBox, Ltrb};
use crate::config::SpeedConfig;
use crate::math;
use crate::Track;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackSpeed {
    /// Smoothed speed in real-world units (km/h for a km/h speed factor)
    pub speed: f32,
    pub bbox: BBox<Ltrb>,
}

/// Converts track position histories into smoothed real-world speeds
#[derive(Debug, Clone)]
pub struct SpeedEstimator {
    speed_factor: f32,
    window: usize,
    smoothing: f32,
    previous: HashMap<u32, f32>,
}

impl SpeedEstimator {
    /// Estimator averaging over the last 10 positions with a 0.7 weight on new samples
    pub fn new(speed_factor: f32) -> Self {
        Self::with_config(speed_factor, &SpeedConfig::default())
    }

    pub fn with_config(speed_factor: f32, config: &SpeedConfig) -> Self {
        Self {
            speed_factor,
            window: config.window.max(2),
            smoothing: config.smoothing,
            previous: HashMap::new(),
        }
    }

    #[inline]
    pub fn speed_factor(&self) -> f32 {
        self.speed_factor
    }

    /// Last smoothed speed computed for the track
    #[inline]
    pub fn previous(&self, track_id: u32) -> Option<f32> {
        self.previous.get(&track_id).copied()
    }

    /// Number of tracks with smoothing state
    #[inline]
    pub fn len(&self) -> usize {
        self.previous.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }

    /// Drops smoothing state of tracks that no longer exist.
    pub fn forget<I: IntoIterator<Item = u32>>(&mut self, track_ids: I) {
        for id in track_ids {
            self.previous.remove(&id);
        }
    }

    /// Speed of every track with at least two positions; shorter tracks are skipped.
    pub fn calculate_speeds(
        &mut self,
        tracks: &BTreeMap<u32, Track>,
        fps: f32,
    ) -> BTreeMap<u32, TrackSpeed> {
        let mut results = BTreeMap::new();

        for (&id, track) in tracks {
            let distances: Vec<f32> = track
                .positions
                .recent(self.window)
                .collect::<Vec<_>>()
                .windows(2)
                .map(|w| na::distance(w[0], w[1]))
                .collect();

            let avg_distance = match math::mean(&distances) {
                Some(d) => d,
                None => continue,
            };

            let pixels_per_second = avg_distance * fps;
            let raw = pixels_per_second * self.speed_factor;

            let speed = match self.previous.get(&id) {
                Some(&prev) => self.smoothing * raw + (1.0 - self.smoothing) * prev,
                None => raw,
            };

            self.previous.insert(id, speed);
            results.insert(
                id,
                TrackSpeed {
                    speed,
                    bbox: track.bbox,
                },
            );
        }

        results
    }
}

/// Unsmoothed speed from the last two positions only, 0.0 when there are fewer than two.
pub fn estimate_speed(positions: &[na::Point2<f32>], fps: f32, speed_factor: f32) -> f32 {
    match positions {
        [.., p1, p2] => na::distance(p1, p2) * fps * speed_factor,
        _ => 0.0,
    }
}
