use crate::bbox::{BBox, Ltrb};
use crate::history::History;
use crate::Detection;
use nalgebra as na;

/// Number of most recent centers retained per track
pub const MAX_POSITIONS: usize = 30;

#[derive(Debug, Clone)]
pub struct Track {
    pub track_id: u32,
    pub bbox: BBox<Ltrb>,
    pub class: i32,

    // matches since creation
    pub hits: u32,

    // frames since last match
    pub age: u32,

    // latched once hits reaches min_hits
    pub active: bool,

    // bbox centers in px, oldest first
    pub positions: History<na::Point2<f32>>,
}

impl Track {
    pub fn new(track_id: u32, det: &Detection) -> Self {
        let mut positions = History::new(MAX_POSITIONS);
        positions.record(det.bbox.center());

        Self {
            track_id,
            bbox: det.bbox,
            class: det.class,
            hits: 1,
            age: 0,
            active: false,
            positions,
        }
    }

    /// Applies an accepted match.
    pub fn hit(&mut self, det: &Detection, min_hits: u32) {
        self.bbox = det.bbox;
        self.class = det.class;
        self.hits += 1;
        self.age = 0;
        self.positions.record(det.bbox.center());

        if self.hits >= min_hits {
            self.active = true;
        }
    }

    /// Records a frame without a match.
    pub fn miss(&mut self) {
        self.age += 1;
        self.positions.retain_newest(MAX_POSITIONS);
    }
}
