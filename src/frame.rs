use crate::detection::Detection;

/// Detections produced for one video frame
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub index: u64,
    pub detections: Vec<Detection>,
    pub timestamp: f32, // in seconds
}

impl Frame {
    pub fn new(index: u64, timestamp: f32, detections: Vec<Detection>) -> Self {
        Self {
            index,
            detections,
            timestamp,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}
