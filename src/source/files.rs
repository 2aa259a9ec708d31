//! Image-file frame sources.
//!
//! `ImageDirSource` walks an ordered list of image files or directories and
//! decodes one frame per tick. `StereoDirSource` walks a left/right
//! directory pair in lockstep and refuses to deliver a tick for which the
//! two sides disagree, so a desynchronized rig surfaces as a stream fault
//! instead of a partial pair.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use crate::frame::{Frame, PixelFormat};

use super::{FrameSource, StereoSource};

const DEFAULT_FPS: u32 = 30;
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Mono source reading image files in sorted order.
pub struct ImageDirSource {
    files: Vec<PathBuf>,
    format: PixelFormat,
    fps: u32,
    skip: usize,
    cursor: usize,
    next_index: u64,
}

impl ImageDirSource {
    /// Build from a list of files and/or directories. Directories are
    /// expanded to their image files in lexical order. An empty expansion is
    /// a configuration error.
    pub fn new(inputs: &[PathBuf]) -> Result<Self> {
        let mut files = Vec::new();
        for input in inputs {
            expand_input(input, &mut files)?;
        }
        if files.is_empty() {
            return Err(anyhow!("input list contains no image files"));
        }
        Ok(Self {
            files,
            format: PixelFormat::Gray8,
            fps: DEFAULT_FPS,
            skip: 0,
            cursor: 0,
            next_index: 0,
        })
    }

    /// Decimate the stream: skip `skip` files between delivered frames.
    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for ImageDirSource {
    fn set_target_fps(&mut self, fps: u32) {
        if fps > 0 {
            self.fps = fps;
        }
    }

    fn set_output_format(&mut self, format: PixelFormat) {
        self.format = format;
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.files.get(self.cursor) else {
            return Ok(None);
        };
        let index = self.next_index;
        let timestamp = index as f64 / self.fps as f64;
        let frame = decode_image(path, self.format, timestamp, index)?;
        self.cursor += 1 + self.skip;
        self.next_index += 1;
        Ok(Some(frame))
    }
}

/// Stereo source reading two directories in lockstep, matched by file stem.
pub struct StereoDirSource {
    left: Vec<PathBuf>,
    right: Vec<PathBuf>,
    format: PixelFormat,
    fps: u32,
    cursor: usize,
    next_index: u64,
}

impl StereoDirSource {
    pub fn new(left_dir: &Path, right_dir: &Path) -> Result<Self> {
        let mut left = Vec::new();
        let mut right = Vec::new();
        expand_input(left_dir, &mut left)?;
        expand_input(right_dir, &mut right)?;
        if left.is_empty() || right.is_empty() {
            return Err(anyhow!(
                "stereo input directories contain no image files ({} / {})",
                left_dir.display(),
                right_dir.display()
            ));
        }
        Ok(Self {
            left,
            right,
            format: PixelFormat::Gray8,
            fps: DEFAULT_FPS,
            cursor: 0,
            next_index: 0,
        })
    }
}

impl StereoSource for StereoDirSource {
    fn set_target_fps(&mut self, fps: u32) {
        if fps > 0 {
            self.fps = fps;
        }
    }

    fn set_output_format(&mut self, format: PixelFormat) {
        self.format = format;
    }

    fn next_pair(&mut self) -> Result<Option<(Frame, Frame)>> {
        let Some(left_path) = self.left.get(self.cursor) else {
            return Ok(None);
        };
        let Some(right_path) = self.right.get(self.cursor) else {
            return Err(anyhow!(
                "stereo desync: right stream exhausted at tick {}",
                self.next_index
            ));
        };
        if left_path.file_stem() != right_path.file_stem() {
            return Err(anyhow!(
                "stereo desync at tick {}: {} does not match {}",
                self.next_index,
                left_path.display(),
                right_path.display()
            ));
        }
        let index = self.next_index;
        let timestamp = index as f64 / self.fps as f64;
        let left = decode_image(left_path, self.format, timestamp, index)?;
        let right = decode_image(right_path, self.format, timestamp, index)?;
        self.cursor += 1;
        self.next_index += 1;
        Ok(Some((left, right)))
    }
}

/// Expand a file or directory into the output list. Directories contribute
/// their image files in lexical order; anything else is passed through.
pub(super) fn expand_input(input: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    if input.is_dir() {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(input)
            .with_context(|| format!("failed to read input directory {}", input.display()))?
        {
            let path = entry?.path();
            if path.is_file() && has_image_extension(&path) {
                entries.push(path);
            }
        }
        entries.sort();
        out.extend(entries);
    } else {
        out.push(input.to_path_buf());
    }
    Ok(())
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.iter().any(|known| *known == ext)
        })
        .unwrap_or(false)
}

/// Decode one image file into a frame of the requested encoding.
pub(super) fn decode_image(
    path: &Path,
    format: PixelFormat,
    timestamp: f64,
    index: u64,
) -> Result<Frame> {
    let decoded =
        image::open(path).with_context(|| format!("failed to decode {}", path.display()))?;
    let (pixels, width, height) = match format {
        PixelFormat::Gray8 => {
            let gray = decoded.to_luma8();
            let (w, h) = gray.dimensions();
            (gray.into_raw(), w, h)
        }
        PixelFormat::Rgb8 => {
            let rgb = decoded.to_rgb8();
            let (w, h) = rgb.dimensions();
            (rgb.into_raw(), w, h)
        }
    };
    Frame::new(pixels, width, height, format, timestamp, index)
}
