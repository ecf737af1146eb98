use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use speedtrack::adapter::{DetectionFilter, DumpReader};
use speedtrack::calibration::CalibrationEstimator;
use speedtrack::config::Config;
use speedtrack::monitor::Monitor;
use speedtrack::speed::SpeedEstimator;
use speedtrack::tracker::IouTracker;
use speedtrack::violation::LogSink;

const DEFAULT_FPS: f32 = 30.0;

/// Tracks vehicles through a detections dump and reports speeding ones
#[derive(Parser, Debug)]
#[command(name = "speedtrack", version, about)]
struct Args {
    /// Detections dump, one `<timestamp_ms>: <json>` line per frame
    #[arg(short, long)]
    detections: PathBuf,

    /// YAML configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Frame rate of the source video
    #[arg(long)]
    fps: Option<f32>,

    /// km/h per px/s, skips calibration
    #[arg(long)]
    speed_factor: Option<f32>,

    /// Reference frame used to calibrate the speed factor
    #[arg(long)]
    reference: Option<PathBuf>,

    /// Source video, used for calibration and frame rate
    #[cfg(feature = "opencv")]
    #[arg(long)]
    video: Option<PathBuf>,

    /// km/h, overrides the configured limit
    #[arg(long)]
    speed_limit: Option<f32>,

    /// Stop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("speedtrack=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {:?}", path))?,
        None => Config::default(),
    };

    if let Some(limit) = args.speed_limit {
        config.violation.speed_limit = limit;
    }
    if args.speed_factor.is_some() {
        config.speed.speed_factor = args.speed_factor;
    }
    config.validate()?;

    let fps = match args.fps {
        Some(fps) => fps,
        None => probe_fps(&args).unwrap_or(DEFAULT_FPS),
    };
    anyhow::ensure!(fps.is_finite() && fps > 0.0, "fps must be positive, got {}", fps);

    let speed_factor = match config.speed.speed_factor {
        Some(factor) => factor,
        None => calibrate(&args, &config),
    };

    info!("speed factor {:.4}, {} fps", speed_factor, fps);

    let mut source = DumpReader::open(&args.detections)
        .with_context(|| format!("opening {:?}", args.detections))?
        .with_filter(DetectionFilter::from(&config.detection));

    let mut monitor = Monitor::new(
        IouTracker::new(config.tracker),
        SpeedEstimator::with_config(speed_factor, &config.speed),
        LogSink,
        fps,
        config.violation.speed_limit,
    );

    let summary = monitor.run_limited(&mut source, args.max_frames)?;

    println!(
        "{} frames, {} vehicles, {} violations",
        summary.frames, summary.tracks_seen, summary.violations
    );

    Ok(())
}

fn calibrate(args: &Args, config: &Config) -> f32 {
    let estimator = CalibrationEstimator::new(config.calibration);

    if let Some(path) = &args.reference {
        return estimator.estimate_from_path(path).speed_factor;
    }

    #[cfg(feature = "opencv")]
    if let Some(path) = &args.video {
        return estimator.estimate_from_video(path).speed_factor;
    }

    estimator.fallback().speed_factor
}

#[cfg(feature = "opencv")]
fn probe_fps(args: &Args) -> Option<f32> {
    let path = args.video.as_ref()?;

    speedtrack::video::VideoProbe::open(path)
        .and_then(|probe| probe.fps())
        .map_err(|err| tracing::warn!("could not probe {:?}: {}", path, err))
        .ok()
        .flatten()
}

#[cfg(not(feature = "opencv"))]
fn probe_fps(_args: &Args) -> Option<f32> {
    None
}
