//! Synthetic sources for tests and demo runs.
//!
//! These generate frames in-memory with a moving gradient pattern plus a
//! little noise, so downstream stages see content that changes every tick.
//! Both sources can be scripted to fail at a given tick, which is how the
//! stream-fault exit paths are exercised without real hardware.

use anyhow::{anyhow, Result};
use rand::Rng;

use crate::frame::{Frame, PixelFormat};

use super::{FrameSource, StereoSource};

const DEFAULT_FPS: u32 = 30;

/// Synthetic mono source yielding a fixed number of frames.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    format: PixelFormat,
    total: u64,
    fail_at: Option<u64>,
    fps: u32,
    next_index: u64,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, total: u64) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Gray8,
            total,
            fail_at: None,
            fps: DEFAULT_FPS,
            next_index: 0,
        }
    }

    /// Script a read failure at the given tick (0-based).
    pub fn fail_at(mut self, tick: u64) -> Self {
        self.fail_at = Some(tick);
        self
    }

    pub fn frames_produced(&self) -> u64 {
        self.next_index
    }
}

impl FrameSource for SyntheticSource {
    fn set_target_fps(&mut self, fps: u32) {
        if fps > 0 {
            self.fps = fps;
        }
    }

    fn set_output_format(&mut self, format: PixelFormat) {
        self.format = format;
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.fail_at == Some(self.next_index) {
            return Err(anyhow!("synthetic read fault at tick {}", self.next_index));
        }
        if self.next_index >= self.total {
            return Ok(None);
        }
        let index = self.next_index;
        self.next_index += 1;
        let frame = synthesize(self.width, self.height, self.format, index, self.fps, 0)?;
        Ok(Some(frame))
    }
}

/// Synthetic stereo source yielding a fixed number of synchronized pairs.
pub struct SyntheticStereoSource {
    width: u32,
    height: u32,
    format: PixelFormat,
    total: u64,
    drop_right_at: Option<u64>,
    fps: u32,
    next_index: u64,
}

impl SyntheticStereoSource {
    pub fn new(width: u32, height: u32, total: u64) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Gray8,
            total,
            drop_right_at: None,
            fps: DEFAULT_FPS,
            next_index: 0,
        }
    }

    /// Script a missing right frame at the given tick. The source reports
    /// the tick as a fault rather than delivering a partial pair.
    pub fn drop_right_at(mut self, tick: u64) -> Self {
        self.drop_right_at = Some(tick);
        self
    }
}

impl StereoSource for SyntheticStereoSource {
    fn set_target_fps(&mut self, fps: u32) {
        if fps > 0 {
            self.fps = fps;
        }
    }

    fn set_output_format(&mut self, format: PixelFormat) {
        self.format = format;
    }

    fn next_pair(&mut self) -> Result<Option<(Frame, Frame)>> {
        if self.drop_right_at == Some(self.next_index) {
            return Err(anyhow!(
                "stereo desync: right frame missing at tick {}",
                self.next_index
            ));
        }
        if self.next_index >= self.total {
            return Ok(None);
        }
        let index = self.next_index;
        self.next_index += 1;
        let left = synthesize(self.width, self.height, self.format, index, self.fps, 0)?;
        let right = synthesize(self.width, self.height, self.format, index, self.fps, 17)?;
        Ok(Some((left, right)))
    }
}

fn synthesize(
    width: u32,
    height: u32,
    format: PixelFormat,
    index: u64,
    fps: u32,
    phase: u64,
) -> Result<Frame> {
    let mut rng = rand::thread_rng();
    let len = width as usize * height as usize * format.bytes_per_pixel();
    let mut pixels = vec![0u8; len];
    for (i, px) in pixels.iter_mut().enumerate() {
        let gradient = (i as u64 + index * 3 + phase) % 256;
        let noise: u8 = rng.gen_range(0..8);
        *px = (gradient as u8).wrapping_add(noise);
    }
    let timestamp = index as f64 / fps.max(1) as f64;
    Frame::new(pixels, width, height, format, timestamp, index)
}
