use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Assignment Error: {0}")]
    Assignment(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed detections dump at line {line}: {reason}")]
    MalformedDump { line: usize, reason: String },

    #[error("Config Error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Image Error: {0}")]
    Image(#[from] image::ImageError),

    #[cfg(feature = "opencv")]
    #[error("OpenCV Error: {0}")]
    OpenCv(#[from] opencv::Error),
}
