//! JSON manifest frame source.
//!
//! A manifest names chunks of recorded frames, so one file can describe a
//! whole capture session and a run can select a single chunk out of it:
//!
//! ```json
//! {
//!   "fps": 30,
//!   "chunks": [
//!     { "name": "lot_a", "frames": ["lot_a/000.png", "lot_a/001.png"] },
//!     { "name": "lot_b", "frames": ["lot_b/000.png"] }
//!   ]
//! }
//! ```
//!
//! Frame paths are resolved relative to the manifest file. Without a chunk
//! selector the chunks play back in order, concatenated.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::frame::{Frame, PixelFormat};

use super::files::decode_image;
use super::FrameSource;

#[derive(Debug, Deserialize)]
struct ManifestFile {
    #[serde(default)]
    fps: Option<u32>,
    chunks: Vec<ChunkFile>,
}

#[derive(Debug, Deserialize)]
struct ChunkFile {
    name: String,
    frames: Vec<PathBuf>,
}

/// Mono source backed by a JSON manifest of recorded frames.
pub struct ManifestSource {
    files: Vec<PathBuf>,
    format: PixelFormat,
    fps: u32,
    skip: usize,
    cursor: usize,
    next_index: u64,
}

impl ManifestSource {
    /// Open a manifest, optionally selecting one named chunk.
    pub fn open(path: &Path, chunk: Option<&str>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        let manifest: ManifestFile = serde_json::from_str(&raw)
            .with_context(|| format!("invalid manifest {}", path.display()))?;
        let base = path.parent().unwrap_or(Path::new("."));

        let selected: Vec<&ChunkFile> = match chunk {
            Some(name) => {
                let found = manifest
                    .chunks
                    .iter()
                    .find(|c| c.name == name)
                    .ok_or_else(|| {
                        anyhow!("chunk {name:?} not found in manifest {}", path.display())
                    })?;
                vec![found]
            }
            None => manifest.chunks.iter().collect(),
        };

        let files: Vec<PathBuf> = selected
            .iter()
            .flat_map(|c| c.frames.iter())
            .map(|frame| base.join(frame))
            .collect();
        if files.is_empty() {
            return Err(anyhow!("manifest {} selects no frames", path.display()));
        }

        Ok(Self {
            files,
            format: PixelFormat::Gray8,
            fps: manifest.fps.filter(|fps| *fps > 0).unwrap_or(30),
            skip: 0,
            cursor: 0,
            next_index: 0,
        })
    }

    /// Decimate the stream: skip `skip` frames between delivered frames.
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

impl FrameSource for ManifestSource {
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
