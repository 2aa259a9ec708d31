//! Bilinear resizing.

use anyhow::{anyhow, Result};

use crate::frame::Frame;

use super::{sample_bilinear, Corrector};

/// Scales the (inner-corrected) frame to a fixed output geometry.
pub struct Resizer {
    width: u32,
    height: u32,
    inner: Option<Box<dyn Corrector>>,
}

impl Resizer {
    pub fn new(width: u32, height: u32, inner: Option<Box<dyn Corrector>>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("resize target must be nonzero"));
        }
        Ok(Self {
            width,
            height,
            inner,
        })
    }
}

impl Corrector for Resizer {
    fn correct(&self, frame: &Frame) -> Result<Frame> {
        let source = match &self.inner {
            Some(inner) => inner.correct(frame)?,
            None => frame.clone(),
        };
        if source.size() == (self.width, self.height) {
            return Ok(source);
        }

        let channels = source.format().channels();
        let scale_x = source.width() as f32 / self.width as f32;
        let scale_y = source.height() as f32 / self.height as f32;
        let mut pixels =
            vec![0u8; self.width as usize * self.height as usize * channels];
        for y in 0..self.height {
            let sy = (y as f32 + 0.5) * scale_y - 0.5;
            for x in 0..self.width {
                let sx = (x as f32 + 0.5) * scale_x - 0.5;
                let out = (y as usize * self.width as usize + x as usize) * channels;
                for c in 0..channels {
                    pixels[out + c] = sample_bilinear(&source, sx, sy, c).round() as u8;
                }
            }
        }

        Frame::new(
            pixels,
            self.width,
            self.height,
            source.format(),
            source.timestamp(),
            source.index(),
        )
    }

    fn output_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
