use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};

/// Single-frame observation of a vehicle, in pixel corners
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BBox<Ltrb>,
    #[serde(rename = "c")]
    pub class: i32,
    #[serde(rename = "p")]
    pub confidence: f32,
}

impl Detection {
    #[inline]
    pub fn new(bbox: BBox<Ltrb>, class: i32, confidence: f32) -> Self {
        Self {
            bbox,
            class,
            confidence,
        }
    }
}
