use std::io::Cursor;

use speedtrack::adapter::{DetectionFilter, DumpReader};
use speedtrack::config::Config;
use speedtrack::monitor::{Monitor, RunSummary};
use speedtrack::speed::SpeedEstimator;
use speedtrack::tracker::IouTracker;
use speedtrack::violation::Violation;

// car A: 10 px/frame along y = 0, car B: 30 px/frame along y = 300 (center form)
fn dump(frames: usize) -> String {
    let mut out = String::new();

    for i in 0..frames {
        let ax = i as f32 * 10.0;
        let bx = 50.0 + i as f32 * 30.0;

        let mut dets = vec![
            format!(
                "{{\"bbox\": [{}, 0, {}, 60], \"class_id\": 2, \"confidence\": 0.9}}",
                ax,
                ax + 100.0
            ),
            format!(
                "{{\"x\": {}, \"y\": 330, \"w\": 100, \"h\": 60, \"p\": 0.8, \"c\": 7}}",
                bx
            ),
        ];

        // one-frame false positive and a pedestrian
        if i == 5 {
            dets.push(
                "{\"bbox\": [1000, 1000, 1080, 1050], \"class_id\": 2, \"confidence\": 0.7}".into(),
            );
            dets.push("{\"bbox\": [500, 0, 520, 60], \"class_id\": 0, \"confidence\": 0.99}".into());
        }

        out.push_str(&format!("{:.3}: [{}]\n", i as f32 * 1000.0 / 30.0, dets.join(", ")));
    }

    out
}

fn monitor(config: &Config) -> Monitor<IouTracker, Vec<Violation>> {
    Monitor::new(
        IouTracker::new(config.tracker),
        SpeedEstimator::with_config(0.1, &config.speed),
        Vec::new(),
        30.0,
        config.violation.speed_limit,
    )
}

#[test]
fn dump_to_violations() {
    let config = Config::default();
    let mut source = DumpReader::new(Cursor::new(dump(10).into_bytes()))
        .with_filter(DetectionFilter::from(&config.detection));

    let mut m = monitor(&config);
    let summary = m.run(&mut source).unwrap();

    // both cars confirm on their third frame; only B is above 60 km/h
    assert_eq!(
        summary,
        RunSummary {
            frames: 10,
            violations: 8,
            tracks_seen: 2,
        }
    );

    let violations = m.into_sink();
    assert!(violations.iter().all(|v| v.track_id == 2));
    assert_eq!(violations[0].frame_index, 2);
    assert!(violations.iter().all(|v| (v.speed - 90.0).abs() < 1e-3));
    assert_eq!(violations.last().map(|v| v.frame_index), Some(9));
}

#[test]
fn frame_reports_follow_tracks() {
    let config = Config::default();
    let mut source = DumpReader::new(Cursor::new(dump(4).into_bytes()))
        .with_filter(DetectionFilter::from(&config.detection));
    let mut m = monitor(&config);

    let mut reports = Vec::new();
    while let Some(frame) = speedtrack::adapter::DetectionSource::next_frame(&mut source).unwrap() {
        reports.push(m.process(&frame).unwrap());
    }

    assert!(reports[0].speeds.is_empty());
    assert!(reports[1].speeds.is_empty());
    assert!((reports[2].speeds[&1].speed - 30.0).abs() < 1e-3);
    assert!((reports[3].speeds[&2].speed - 90.0).abs() < 1e-3);
    assert_eq!(reports[3].violations, 1);
}

#[test]
fn tracker_outlives_missing_frames() {
    let config = Config::default();
    let text = dump(4) + &"200: []\n".repeat(10) + "\n";
    let mut source = DumpReader::new(Cursor::new(text.into_bytes()))
        .with_filter(DetectionFilter::from(&config.detection));

    let mut m = monitor(&config);
    let summary = m.run(&mut source).unwrap();
    assert_eq!(summary.frames, 14);

    // ten missed frames are still within max_age
    let live: Vec<(u32, u32)> = m.tracker().tracks().map(|t| (t.track_id, t.age)).collect();
    assert_eq!(live, vec![(1, 10), (2, 10)]);

    // a confirmed track keeps its last speed while unmatched
    assert_eq!(summary.violations, 12);
}
