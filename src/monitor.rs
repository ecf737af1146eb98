use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::adapter::DetectionSource;
use crate::error::Error;
use crate::speed::{SpeedEstimator, TrackSpeed};
use crate::violation::{Violation, ViolationSink};
use crate::{Frame, Tracking};

#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    pub frame_index: u64,
    /// Speeds of confirmed tracks with enough history
    pub speeds: BTreeMap<u32, TrackSpeed>,
    pub violations: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub violations: usize,
    /// Distinct confirmed tracks seen so far
    pub tracks_seen: usize,
}

/// Per-frame driver: detections in, speeds and violations out.
///
/// Owns both the track table and the speed smoothing state so the two can't drift apart:
/// whenever the tracker drops a track its smoothed speed is dropped too.
pub struct Monitor<T: Tracking, S: ViolationSink> {
    tracker: T,
    speeds: SpeedEstimator,
    sink: S,
    fps: f32,
    speed_limit: f32,
    // confirmed ids of the previous frame
    confirmed: BTreeSet<u32>,
    tracks_seen: usize,
}

impl<T: Tracking, S: ViolationSink> Monitor<T, S> {
    pub fn new(tracker: T, speeds: SpeedEstimator, sink: S, fps: f32, speed_limit: f32) -> Self {
        Self {
            tracker,
            speeds,
            sink,
            fps,
            speed_limit,
            confirmed: BTreeSet::new(),
            tracks_seen: 0,
        }
    }

    #[inline]
    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    #[inline]
    pub fn speeds(&self) -> &SpeedEstimator {
        &self.speeds
    }

    #[inline]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Runs one frame through track, speed, threshold check and notification.
    pub fn process(&mut self, frame: &Frame) -> Result<FrameReport, Error> {
        let tracks = self.tracker.update(&frame.detections)?;

        let deleted = self.tracker.drain_deleted();
        if !deleted.is_empty() {
            debug!("frame {}: dropping speed state of {:?}", frame.index, deleted);
            self.speeds.forget(deleted);
        }

        // a confirmed track is reported on every frame until it is deleted
        let confirmed: BTreeSet<u32> = tracks.keys().copied().collect();
        self.tracks_seen += confirmed.difference(&self.confirmed).count();
        self.confirmed = confirmed;

        let speeds = self.speeds.calculate_speeds(&tracks, self.fps);
        let limit = self.speed_limit;
        let mut violations = 0;

        for (&track_id, s) in speeds.iter().filter(|(_, s)| s.speed > limit) {
            let violation = Violation {
                track_id,
                speed: s.speed,
                bbox: s.bbox,
                frame_index: frame.index,
                timestamp: frame.timestamp,
            };

            violations += 1;
            if let Err(err) = self.sink.notify(&violation) {
                warn!("failed to deliver violation of track {}: {}", track_id, err);
            }
        }

        Ok(FrameReport {
            frame_index: frame.index,
            speeds,
            violations,
        })
    }

    /// Processes frames in arrival order until the source runs dry.
    pub fn run<D: DetectionSource>(&mut self, source: &mut D) -> Result<RunSummary, Error> {
        self.run_limited(source, None)
    }

    /// Like [`Monitor::run`], stopping after `max_frames` frames when given.
    pub fn run_limited<D: DetectionSource>(
        &mut self,
        source: &mut D,
        max_frames: Option<u64>,
    ) -> Result<RunSummary, Error> {
        info!(
            "monitoring at {} fps, speed limit {} km/h, speed factor {:.4}",
            self.fps,
            self.speed_limit,
            self.speeds.speed_factor()
        );

        let mut summary = RunSummary::default();

        while max_frames.map_or(true, |max| summary.frames < max) {
            let frame = match source.next_frame()? {
                Some(frame) => frame,
                None => break,
            };

            let report = self.process(&frame)?;
            summary.frames += 1;
            summary.violations += report.violations;
        }

        summary.tracks_seen = self.tracks_seen;

        info!(
            "processed {} frames: {} confirmed vehicles, {} violations",
            summary.frames, summary.tracks_seen, summary.violations
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;
    use crate::config::TrackerConfig;
    use crate::tracker::IouTracker;
    use crate::Detection;

    fn frame(index: u64, boxes: &[(f32, f32)]) -> Frame {
        let detections = boxes
            .iter()
            .map(|&(x, y)| Detection::new(BBox::ltrb(x, y, x + 100., y + 60.), 2, 0.9))
            .collect();

        Frame::new(index, index as f32 / 30.0, detections)
    }

    fn monitor(speed_limit: f32) -> Monitor<IouTracker, Vec<Violation>> {
        let config = TrackerConfig {
            max_age: 2,
            min_hits: 2,
            iou_threshold: 0.3,
        };

        Monitor::new(
            IouTracker::new(config),
            SpeedEstimator::new(0.1),
            Vec::new(),
            30.0,
            speed_limit,
        )
    }

    #[test]
    fn reports_speed_once_confirmed() {
        let mut m = monitor(1000.0);

        assert!(m.process(&frame(0, &[(0., 0.)])).unwrap().speeds.is_empty());

        // 10 px per frame at 30 fps with 0.1 factor
        let report = m.process(&frame(1, &[(10., 0.)])).unwrap();
        assert!((report.speeds[&1].speed - 30.0).abs() < 1e-4);
        assert_eq!(report.violations, 0);
    }

    #[test]
    fn speeding_tracks_are_notified_every_frame() {
        let mut m = monitor(25.0);

        for i in 0..4 {
            m.process(&frame(i, &[(i as f32 * 10., 0.)])).unwrap();
        }

        let sink = m.into_sink();
        assert_eq!(sink.len(), 3);
        assert!(sink.iter().all(|v| v.track_id == 1));
        assert_eq!(sink[0].frame_index, 1);
        assert!((sink[0].speed - 30.0).abs() < 1e-4);
    }

    #[test]
    fn deleted_tracks_lose_their_speed_state() {
        let mut m = monitor(1000.0);

        m.process(&frame(0, &[(0., 0.)])).unwrap();
        m.process(&frame(1, &[(10., 0.)])).unwrap();
        assert!(m.speeds().previous(1).is_some());

        for i in 2..5 {
            m.process(&frame(i, &[])).unwrap();
        }

        assert!(m.tracker().is_empty());
        assert_eq!(m.speeds().previous(1), None);
        assert!(m.speeds().is_empty());
    }

    #[test]
    fn run_consumes_the_source() {
        let mut m = monitor(25.0);
        let frames: Vec<Frame> = (0..6).map(|i| frame(i, &[(i as f32 * 10., 0.)])).collect();

        let summary = m.run(&mut frames.clone().into_iter()).unwrap();
        assert_eq!(
            summary,
            RunSummary {
                frames: 6,
                violations: 5,
                tracks_seen: 1
            }
        );

        let mut m = monitor(25.0);
        let summary = m.run_limited(&mut frames.into_iter(), Some(2)).unwrap();
        assert_eq!(summary.frames, 2);
    }
}
