use std::collections::BTreeMap;

use ndarray::Array2;
use tracing::debug;

use crate::assignment;
use crate::config::TrackerConfig;
use crate::error::Error;
use crate::{Detection, Track, Tracking};

/// Frame-to-frame tracker matching detections to tracks by IoU with an optimal assignment
#[derive(Debug)]
pub struct IouTracker {
    config: TrackerConfig,
    tracks: BTreeMap<u32, Track>,
    next_id: u32,
    deleted: Vec<u32>,
}

impl IouTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: BTreeMap::new(),
            next_id: 1,
            deleted: Vec::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Every live track, confirmed or not, in id order
    #[inline]
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    #[inline]
    pub fn get(&self, track_id: u32) -> Option<&Track> {
        self.tracks.get(&track_id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    fn spawn(&mut self, det: &Detection) {
        let id = self.next_id;
        self.next_id += 1;

        debug!("track {} created (class {})", id, det.class);
        self.tracks.insert(id, Track::new(id, det));
    }

    fn remove_expired(&mut self) {
        let max_age = self.config.max_age;
        let deleted = &mut self.deleted;

        self.tracks.retain(|&id, t| {
            if t.age > max_age {
                debug!("track {} deleted after {} missed frames", id, t.age);
                deleted.push(id);
                false
            } else {
                true
            }
        });
    }

    fn active(&self) -> BTreeMap<u32, Track> {
        self.tracks
            .iter()
            .filter(|(_, t)| t.active)
            .map(|(&id, t)| (id, t.clone()))
            .collect()
    }
}

impl Tracking for IouTracker {
    fn update(&mut self, detections: &[Detection]) -> Result<BTreeMap<u32, Track>, Error> {
        // the first frame seeds the table; nothing is confirmed yet
        if self.tracks.is_empty() {
            for det in detections {
                self.spawn(det);
            }

            return Ok(self.active());
        }

        if detections.is_empty() {
            for t in self.tracks.values_mut() {
                t.miss();
            }

            self.remove_expired();
            return Ok(self.active());
        }

        let ids: Vec<u32> = self.tracks.keys().copied().collect();
        let boxes: Vec<_> = self.tracks.values().map(|t| t.bbox).collect();

        let costs = Array2::from_shape_fn((ids.len(), detections.len()), |(i, j)| {
            1.0 - boxes[i].iou(&detections[j].bbox)
        });

        let max_cost = 1.0 - self.config.iou_threshold;
        let min_hits = self.config.min_hits;

        let mut track_matched = vec![false; ids.len()];
        let mut det_matched = vec![false; detections.len()];

        for (i, j) in assignment::solve(&costs)? {
            if costs[[i, j]] > max_cost {
                continue;
            }

            if let Some(track) = self.tracks.get_mut(&ids[i]) {
                let was_active = track.active;
                track.hit(&detections[j], min_hits);

                if track.active && !was_active {
                    debug!("track {} confirmed after {} hits", track.track_id, track.hits);
                }

                track_matched[i] = true;
                det_matched[j] = true;
            }
        }

        for (det, _) in detections
            .iter()
            .zip(det_matched.iter())
            .filter(|(_, &matched)| !matched)
        {
            self.spawn(det);
        }

        for (id, _) in ids
            .iter()
            .zip(track_matched.iter())
            .filter(|(_, &matched)| !matched)
        {
            if let Some(track) = self.tracks.get_mut(id) {
                track.miss();
            }
        }

        self.remove_expired();

        Ok(self.active())
    }

    fn drain_deleted(&mut self) -> Vec<u32> {
        std::mem::take(&mut self.deleted)
    }
}
