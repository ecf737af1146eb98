pub mod adapter;
pub mod assignment;
pub mod bbox;
pub mod calibration;
pub mod config;
pub mod detection;
pub mod error;
pub mod frame;
pub mod math;
pub mod monitor;
pub mod speed;
pub mod track;
pub mod tracker;
pub mod violation;

#[cfg(feature = "opencv")]
pub mod video;

pub mod history;

pub use detection::Detection;
pub use frame::Frame;
pub use track::Track;

use error::Error;
use std::collections::BTreeMap;

pub trait Tracking {
    /// Consumes one frame of detections and returns the confirmed tracks by id.
    fn update(&mut self, dets: &[Detection]) -> Result<BTreeMap<u32, Track>, Error>;

    /// Ids of tracks deleted since the last call.
    fn drain_deleted(&mut self) -> Vec<u32>;
}
