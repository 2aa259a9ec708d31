//! Fixed-window cropping.

use anyhow::{anyhow, Result};

use crate::frame::Frame;

use super::Corrector;

/// Output window of a crop, offset within the source frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRegion {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

/// Extracts a fixed window from the (inner-corrected) frame.
pub struct Cropper {
    region: CropRegion,
    inner: Option<Box<dyn Corrector>>,
}

impl Cropper {
    pub fn new(region: CropRegion, inner: Option<Box<dyn Corrector>>) -> Result<Self> {
        if region.width == 0 || region.height == 0 {
            return Err(anyhow!("crop window must be nonzero"));
        }
        if let Some(inner) = &inner {
            let (w, h) = inner.output_size();
            if region.x + region.width > w || region.y + region.height > h {
                return Err(anyhow!(
                    "crop window {}x{}+{}+{} exceeds inner stage output {}x{}",
                    region.width,
                    region.height,
                    region.x,
                    region.y,
                    w,
                    h
                ));
            }
        }
        Ok(Self { region, inner })
    }
}

impl Corrector for Cropper {
    fn correct(&self, frame: &Frame) -> Result<Frame> {
        let source = match &self.inner {
            Some(inner) => inner.correct(frame)?,
            None => frame.clone(),
        };
        let r = self.region;
        if r.x + r.width > source.width() || r.y + r.height > source.height() {
            return Err(anyhow!(
                "crop window {}x{}+{}+{} exceeds frame {}x{}",
                r.width,
                r.height,
                r.x,
                r.y,
                source.width(),
                source.height()
            ));
        }

        let channels = source.format().channels();
        let row_bytes = r.width as usize * channels;
        let mut pixels = Vec::with_capacity(r.height as usize * row_bytes);
        for row in 0..r.height {
            let start = source.pixel_offset(r.x, r.y + row);
            pixels.extend_from_slice(&source.data()[start..start + row_bytes]);
        }

        Frame::new(
            pixels,
            r.width,
            r.height,
            source.format(),
            source.timestamp(),
            source.index(),
        )
    }

    fn output_size(&self) -> (u32, u32) {
        (self.region.width, self.region.height)
    }
}
