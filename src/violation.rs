use std::fmt;

use tracing::warn;

use crate::bbox::{BBox, Ltrb};
use crate::error::Error;

/// A confirmed vehicle observed above the speed limit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Violation {
    pub track_id: u32,
    pub speed: f32,
    pub bbox: BBox<Ltrb>,
    pub frame_index: u64,
    pub timestamp: f32,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Your vehicle was detected overspeeding at {:.2} km/h. Please pay the fine.",
            self.speed
        )
    }
}

/// Receives violations. Delivery is best effort: a failed notification is not retried.
pub trait ViolationSink {
    fn notify(&mut self, violation: &Violation) -> Result<(), Error>;
}

/// Reports violations through the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ViolationSink for LogSink {
    fn notify(&mut self, v: &Violation) -> Result<(), Error> {
        warn!(
            "OVERSPEEDING: vehicle {} at {:.2} km/h (frame {}, {:.2}s)",
            v.track_id, v.speed, v.frame_index, v.timestamp
        );

        Ok(())
    }
}

impl ViolationSink for Vec<Violation> {
    fn notify(&mut self, violation: &Violation) -> Result<(), Error> {
        self.push(*violation);
        Ok(())
    }
}
