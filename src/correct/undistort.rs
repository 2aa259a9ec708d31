//! Lens undistortion via a precomputed remap table.

use anyhow::{anyhow, Result};

use crate::calib::CameraCalib;
use crate::frame::Frame;

use super::{sample_bilinear, Corrector};

/// Radial-tangential undistorter. Output geometry equals the calibrated
/// input geometry; the remap table is computed once at construction, so the
/// per-frame cost is one bilinear sample per output pixel.
pub struct Undistorter {
    width: u32,
    height: u32,
    /// Source sampling position for each output pixel, row-major.
    remap: Vec<(f32, f32)>,
    inner: Option<Box<dyn Corrector>>,
}

impl Undistorter {
    pub fn new(calib: &CameraCalib) -> Result<Self> {
        Self::wrapping(calib, None)
    }

    pub fn wrapping(calib: &CameraCalib, inner: Option<Box<dyn Corrector>>) -> Result<Self> {
        if let Some(inner) = &inner {
            if inner.output_size() != (calib.width, calib.height) {
                return Err(anyhow!(
                    "undistorter input {}x{} does not match inner stage output {}x{}",
                    calib.width,
                    calib.height,
                    inner.output_size().0,
                    inner.output_size().1
                ));
            }
        }

        let k = calib.intrinsics;
        let d = calib.distortion;
        let mut remap = Vec::with_capacity(calib.width as usize * calib.height as usize);
        for v in 0..calib.height {
            for u in 0..calib.width {
                // Undistorted pixel -> normalized plane -> distorted pixel.
                let x = (u as f64 - k.cx) / k.fx;
                let y = (v as f64 - k.cy) / k.fy;
                let r2 = x * x + y * y;
                let radial = 1.0 + d.k1 * r2 + d.k2 * r2 * r2 + d.k3 * r2 * r2 * r2;
                let xd = x * radial + 2.0 * d.p1 * x * y + d.p2 * (r2 + 2.0 * x * x);
                let yd = y * radial + d.p1 * (r2 + 2.0 * y * y) + 2.0 * d.p2 * x * y;
                let src_u = (k.fx * xd + k.cx) as f32;
                let src_v = (k.fy * yd + k.cy) as f32;
                remap.push((src_u, src_v));
            }
        }

        Ok(Self {
            width: calib.width,
            height: calib.height,
            remap,
            inner,
        })
    }
}

impl Corrector for Undistorter {
    fn correct(&self, frame: &Frame) -> Result<Frame> {
        let source = match &self.inner {
            Some(inner) => inner.correct(frame)?,
            None => frame.clone(),
        };
        if source.size() != (self.width, self.height) {
            return Err(anyhow!(
                "undistorter expects {}x{} input, got {}x{}",
                self.width,
                self.height,
                source.width(),
                source.height()
            ));
        }

        let channels = source.format().channels();
        let mut pixels =
            vec![0u8; self.width as usize * self.height as usize * channels];
        for (i, &(sx, sy)) in self.remap.iter().enumerate() {
            let out = i * channels;
            for c in 0..channels {
                pixels[out + c] = sample_bilinear(&source, sx, sy, c).round() as u8;
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
