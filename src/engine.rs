//! Processing-engine boundary.
//!
//! The engine consumes corrected frames one at a time, in arrival order, and
//! is where tracking/estimation happens, outside this crate. Deliveries are
//! synchronous and come from the ingestion thread only; `finalize` is called
//! once by the owning thread after the ingestion thread has terminated and
//! joined. The engine is shared as `Arc<Mutex<_>>` so the owning thread can
//! reach it again for finalization, mirroring how the rest of the
//! application holds its subsystems.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;

use crate::frame::Frame;
use crate::geometry::RigidTransform;

/// Consumer of corrected frames.
pub trait ProcessingEngine: Send {
    /// Process one mono frame. Blocks until the engine is ready for the next
    /// one; at most one frame is ever in flight.
    fn process_mono(&mut self, frame: &Frame) -> Result<()>;

    /// Process one synchronized stereo pair plus the rig extrinsic, as a
    /// single atomic delivery.
    fn process_stereo(
        &mut self,
        left: &Frame,
        right: &Frame,
        right_to_left: &RigidTransform,
    ) -> Result<()>;

    /// Finish up after the input stream has terminated.
    fn finalize(&mut self) -> Result<()>;
}

/// Engine handle shared between the owning thread and the ingestion thread.
pub type SharedEngine = Arc<Mutex<dyn ProcessingEngine>>;

/// Stub engine recording deliveries, for tests and synthetic runs.
#[derive(Default)]
pub struct StubEngine {
    keep_frames: bool,
    mono_count: usize,
    stereo_count: usize,
    mono: Vec<Frame>,
    stereo: Vec<(Frame, Frame, RigidTransform)>,
    fail_after: Option<usize>,
    finalized: bool,
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep every delivered frame for later inspection (cheap: frames share
    /// pixel storage).
    pub fn recording() -> Self {
        Self {
            keep_frames: true,
            ..Self::default()
        }
    }

    /// Reject deliveries after the first `count` have been accepted.
    pub fn fail_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    pub fn mono_count(&self) -> usize {
        self.mono_count
    }

    pub fn stereo_count(&self) -> usize {
        self.stereo_count
    }

    pub fn delivered(&self) -> usize {
        self.mono_count + self.stereo_count
    }

    pub fn mono_frames(&self) -> &[Frame] {
        &self.mono
    }

    pub fn stereo_frames(&self) -> &[(Frame, Frame, RigidTransform)] {
        &self.stereo
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    fn check_capacity(&self) -> Result<()> {
        if let Some(limit) = self.fail_after {
            if self.delivered() >= limit {
                return Err(anyhow!("stub engine rejecting delivery after {limit}"));
            }
        }
        Ok(())
    }
}

impl ProcessingEngine for StubEngine {
    fn process_mono(&mut self, frame: &Frame) -> Result<()> {
        self.check_capacity()?;
        log::debug!(
            "engine: mono frame #{} {}x{} t={:.3}",
            frame.index(),
            frame.width(),
            frame.height(),
            frame.timestamp()
        );
        self.mono_count += 1;
        if self.keep_frames {
            self.mono.push(frame.clone());
        }
        Ok(())
    }

    fn process_stereo(
        &mut self,
        left: &Frame,
        right: &Frame,
        right_to_left: &RigidTransform,
    ) -> Result<()> {
        self.check_capacity()?;
        log::debug!(
            "engine: stereo pair #{} {}x{} t={:.3}",
            left.index(),
            left.width(),
            left.height(),
            left.timestamp()
        );
        self.stereo_count += 1;
        if self.keep_frames {
            self.stereo.push((left.clone(), right.clone(), *right_to_left));
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        self.finalized = true;
        log::info!(
            "engine finalized: {} mono, {} stereo deliveries",
            self.mono_count,
            self.stereo_count
        );
        Ok(())
    }
}

/// Wrap an engine for sharing with an ingestion thread.
pub fn shared<E: ProcessingEngine + 'static>(engine: E) -> Arc<Mutex<E>> {
    Arc::new(Mutex::new(engine))
}
