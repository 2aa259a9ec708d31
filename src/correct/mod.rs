//! Geometric frame correction.
//!
//! A `Corrector` is a pure mapping from a raw frame to a corrected frame of
//! fixed output geometry. Correction stages (undistort, resize, crop) each
//! optionally wrap an inner stage that runs first, so a full pipeline is one
//! `Corrector` built by composition; callers only ever see the single
//! `correct` operation and the final output size.

mod crop;
mod resize;
mod undistort;

pub use crop::{CropRegion, Cropper};
pub use resize::Resizer;
pub use undistort::Undistorter;

use std::sync::Arc;

use anyhow::Result;

use crate::calib::CameraCalib;
use crate::frame::Frame;

/// Deterministic geometric correction with a declared fixed output size.
pub trait Corrector: Send + Sync {
    /// Map a raw frame to a corrected frame of `output_size()` geometry.
    fn correct(&self, frame: &Frame) -> Result<Frame>;

    /// (width, height) of every frame `correct` produces.
    fn output_size(&self) -> (u32, u32);
}

/// Assemble the standard chain for one camera: undistort at native
/// resolution (skipped for a distortion-free calibration), resize to the
/// working size, then crop to the engine's input window.
pub fn build_chain(
    calib: &CameraCalib,
    resize_to: (u32, u32),
    crop: CropRegion,
) -> Result<Arc<dyn Corrector>> {
    let undistorter: Option<Box<dyn Corrector>> = if calib.distortion.is_zero() {
        None
    } else {
        Some(Box::new(Undistorter::new(calib)?))
    };
    let resizer = Resizer::new(resize_to.0, resize_to.1, undistorter)?;
    let cropper = Cropper::new(crop, Some(Box::new(resizer)))?;
    Ok(Arc::new(cropper))
}

/// Bilinear sample of one channel at a fractional position. Out-of-bounds
/// reads clamp to the border.
pub(crate) fn sample_bilinear(frame: &Frame, x: f32, y: f32, channel: usize) -> f32 {
    let max_x = frame.width().saturating_sub(1) as f32;
    let max_y = frame.height().saturating_sub(1) as f32;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(frame.width() - 1);
    let y1 = (y0 + 1).min(frame.height() - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let data = frame.data();
    let at = |px: u32, py: u32| data[frame.pixel_offset(px, py) + channel] as f32;

    let top = at(x0, y0) * (1.0 - fx) + at(x1, y0) * fx;
    let bottom = at(x0, y1) * (1.0 - fx) + at(x1, y1) * fx;
    top * (1.0 - fy) + bottom * fy
}
