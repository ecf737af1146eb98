//! Boundary between detector output and the tracker.
//!
//! Whatever shape a detector produces is normalized here into [`Detection`] and filtered
//! to the configured vehicle classes, so nothing downstream inspects raw detector output.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use serde_derive::Deserialize;
use tracing::trace;

use crate::bbox::BBox;
use crate::config::DetectionConfig;
use crate::error::Error;
use crate::{Detection, Frame};

/// Yields one frame of detections at a time, in arrival order.
pub trait DetectionSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, Error>;
}

impl DetectionSource for std::vec::IntoIter<Frame> {
    fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
        Ok(self.next())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionFilter {
    classes: Vec<i32>,
    min_confidence: f32,
}

impl DetectionFilter {
    pub fn new(classes: Vec<i32>, min_confidence: f32) -> Self {
        Self {
            classes,
            min_confidence,
        }
    }

    /// Keeps vehicles above the confidence floor with a well-formed box
    pub fn accepts(&self, det: &Detection) -> bool {
        let [x1, y1, x2, y2]: [f32; 4] = det.bbox.into();

        self.classes.contains(&det.class)
            && det.confidence > self.min_confidence
            && [x1, y1, x2, y2].iter().all(|v| v.is_finite())
            && x1 <= x2
            && y1 <= y2
    }

    pub fn apply(&self, detections: Vec<Detection>) -> Vec<Detection> {
        detections.into_iter().filter(|d| self.accepts(d)).collect()
    }
}

impl From<&DetectionConfig> for DetectionFilter {
    fn from(config: &DetectionConfig) -> Self {
        Self::new(config.classes.clone(), config.min_confidence)
    }
}

/// Detector output shapes accepted in a dump
#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(untagged)]
enum RawDetection {
    Corners {
        bbox: [f32; 4],
        #[serde(alias = "c")]
        class_id: i32,
        #[serde(alias = "p")]
        confidence: f32,
    },
    Center {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        #[serde(rename = "p")]
        confidence: f32,
        #[serde(rename = "c")]
        class: i32,
    },
}

impl From<RawDetection> for Detection {
    fn from(raw: RawDetection) -> Self {
        match raw {
            RawDetection::Corners {
                bbox: [x1, y1, x2, y2],
                class_id,
                confidence,
            } => Detection::new(BBox::ltrb(x1, y1, x2, y2), class_id, confidence),
            RawDetection::Center {
                x,
                y,
                w,
                h,
                confidence,
                class,
            } => Detection::new(BBox::xywh(x, y, w, h).as_ltrb(), class, confidence),
        }
    }
}

/// Replays a detections dump, one frame per line: `<timestamp_ms>: <json array>`
pub struct DumpReader<R: BufRead> {
    lines: Lines<R>,
    line_no: usize,
    index: u64,
    filter: Option<DetectionFilter>,
}

impl DumpReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> DumpReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            index: 0,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: DetectionFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

fn parse_line(line_no: usize, line: &str) -> Result<(f32, Vec<Detection>), Error> {
    let malformed = |reason: String| Error::MalformedDump {
        line: line_no,
        reason,
    };

    let (ts, json) = line
        .split_once(':')
        .ok_or_else(|| malformed("expected `<timestamp_ms>: <detections>`".into()))?;

    let ts_ms: f64 = ts
        .trim()
        .parse()
        .map_err(|err| malformed(format!("bad timestamp {:?}: {}", ts.trim(), err)))?;

    let raw: Vec<RawDetection> =
        serde_json::from_str(json.trim()).map_err(|err| malformed(err.to_string()))?;

    Ok((
        (ts_ms / 1000.0) as f32,
        raw.into_iter().map(Detection::from).collect(),
    ))
}

impl<R: BufRead> DetectionSource for DumpReader<R> {
    fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
        for line in self.lines.by_ref() {
            self.line_no += 1;

            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let (timestamp, mut detections) = parse_line(self.line_no, &line)?;

            if let Some(filter) = &self.filter {
                let total = detections.len();
                detections = filter.apply(detections);
                trace!(
                    "frame {}: kept {} of {} detections",
                    self.index,
                    detections.len(),
                    total
                );
            }

            let frame = Frame::new(self.index, timestamp, detections);
            self.index += 1;

            return Ok(Some(frame));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(text: &str) -> DumpReader<Cursor<Vec<u8>>> {
        DumpReader::new(Cursor::new(text.as_bytes().to_vec()))
    }

    #[test]
    fn reads_both_detection_shapes() {
        let mut src = reader(concat!(
            "0: [{\"bbox\": [10, 20, 30, 60], \"class_id\": 2, \"confidence\": 0.9}]\n",
            "\n",
            "40: [{\"x\": 20, \"y\": 40, \"w\": 20, \"h\": 40, \"p\": 0.8, \"c\": 7}]\n",
        ));

        let f0 = src.next_frame().unwrap().unwrap();
        assert_eq!(f0.index, 0);
        assert_eq!(f0.timestamp, 0.0);
        assert_eq!(f0.detections[0].bbox, BBox::ltrb(10., 20., 30., 60.));
        assert_eq!(f0.detections[0].class, 2);

        let f1 = src.next_frame().unwrap().unwrap();
        assert_eq!(f1.index, 1);
        assert!((f1.timestamp - 0.04).abs() < 1e-6);
        assert_eq!(f1.detections[0].bbox, BBox::ltrb(10., 20., 30., 60.));
        assert_eq!(f1.detections[0].class, 7);

        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn serialized_detections_read_back() {
        let det = Detection::new(BBox::ltrb(1., 2., 3., 4.), 3, 0.75);
        let line = format!("120: {}", serde_json::to_string(&vec![det]).unwrap());

        let frame = reader(&line).next_frame().unwrap().unwrap();
        assert_eq!(frame.detections, vec![det]);
    }

    #[test]
    fn filter_keeps_confident_vehicles() {
        let filter = DetectionFilter::new(vec![2, 7], 0.5);
        let mut src = reader(concat!(
            "0: [",
            "{\"bbox\": [0, 0, 10, 10], \"class_id\": 2, \"confidence\": 0.9},",
            "{\"bbox\": [0, 0, 10, 10], \"class_id\": 0, \"confidence\": 0.9},",
            "{\"bbox\": [0, 0, 10, 10], \"class_id\": 7, \"confidence\": 0.5},",
            "{\"bbox\": [10, 0, 0, 10], \"class_id\": 7, \"confidence\": 0.9}",
            "]\n"
        ))
        .with_filter(filter);

        let frame = src.next_frame().unwrap().unwrap();
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.detections[0].class, 2);
    }

    #[test]
    fn malformed_lines_report_their_position() {
        let mut src = reader("0: []\nnot a frame\n");
        assert!(src.next_frame().unwrap().unwrap().is_empty());

        match src.next_frame() {
            Err(Error::MalformedDump { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected {:?}", other),
        }

        let mut src = reader("abc: []\n");
        assert!(matches!(
            src.next_frame(),
            Err(Error::MalformedDump { line: 1, .. })
        ));
    }
}
