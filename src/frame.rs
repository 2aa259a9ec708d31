//! Frame container shared across the ingestion pipeline.
//!
//! A `Frame` is an immutable 2D raster with a fixed pixel encoding and an
//! acquisition timestamp/index. Pixel storage is shared (`Arc<[u8]>`), so
//! cloning a frame to hand it to the engine and an observer is cheap and
//! never copies pixels. Mono ingestion produces one `Frame` per tick; stereo
//! ingestion produces two frames sharing one timestamp and index.

use std::sync::Arc;

use anyhow::{anyhow, Result};

/// Pixel encoding of a frame.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit grayscale, one byte per pixel.
    Gray8,
    /// 8-bit RGB, three bytes per pixel.
    Rgb8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 => 3,
        }
    }

    pub fn channels(self) -> usize {
        self.bytes_per_pixel()
    }
}

/// One image, immutable after construction.
#[derive(Clone)]
pub struct Frame {
    data: Arc<[u8]>,
    width: u32,
    height: u32,
    format: PixelFormat,
    /// Acquisition time in seconds since the start of the stream.
    timestamp: f64,
    /// Monotonically increasing acquisition index.
    index: u64,
}

impl Frame {
    /// Wrap a pixel buffer. The buffer length must match the geometry.
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        timestamp: f64,
        index: u64,
    ) -> Result<Self> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(anyhow!(
                "frame buffer length {} does not match {}x{} {:?} (expected {})",
                data.len(),
                width,
                height,
                format,
                expected
            ));
        }
        Ok(Self {
            data: data.into(),
            width,
            height,
            format,
            timestamp,
            index,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Byte offset of pixel (x, y). Caller guarantees x < width, y < height.
    pub(crate) fn pixel_offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.format.bytes_per_pixel()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("timestamp", &self.timestamp)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}
