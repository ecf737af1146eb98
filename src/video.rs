use std::path::Path;

use image::{GrayImage, Luma};
use opencv::{core, imgproc, prelude::*, videoio};

use crate::error::Error;

/// Reads stream properties and the reference frame of a video file
pub struct VideoProbe {
    cap: videoio::VideoCapture,
}

impl VideoProbe {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let cap = videoio::VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)?;

        if !videoio::VideoCapture::is_opened(&cap)? {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("unable to open video {:?}", path),
            )));
        }

        Ok(Self { cap })
    }

    /// Frame rate reported by the container, `None` when unknown
    pub fn fps(&self) -> Result<Option<f32>, Error> {
        let fps = self.cap.get(videoio::CAP_PROP_FPS)?;

        Ok(if fps.is_finite() && fps > 0.0 {
            Some(fps as f32)
        } else {
            None
        })
    }

    /// Decodes the next frame as grayscale, the first one on a freshly opened probe.
    pub fn first_frame(&mut self) -> Result<GrayImage, Error> {
        let mut mat = core::Mat::default();
        if !self.cap.read(&mut mat)? || mat.rows() == 0 || mat.cols() == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "video has no readable frame",
            )));
        }

        let mut gray = core::Mat::default();
        imgproc::cvt_color(&mat, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;

        let (rows, cols) = (gray.rows(), gray.cols());
        let mut img = GrayImage::new(cols as u32, rows as u32);
        for y in 0..rows {
            for x in 0..cols {
                let v = *gray.at_2d::<u8>(y, x)?;
                img.put_pixel(x as u32, y as u32, Luma([v]));
            }
        }

        Ok(img)
    }
}
