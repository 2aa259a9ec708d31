//! Output-observer boundary.
//!
//! An observer receives the same corrected frames the engine does, for
//! rendering or recording. Delivery is best-effort: the engine path never
//! waits on an observer, and an observer failure is logged and dropped
//! instead of terminating ingestion. "No observer attached" is a valid,
//! checked state; headless runs simply never attach one.

use anyhow::Result;

use crate::frame::Frame;

/// Best-effort sink for corrected frames.
pub trait OutputObserver: Send {
    fn observe_mono(&mut self, frame: &Frame) -> Result<()>;

    fn observe_stereo(&mut self, left: &Frame, right: &Frame) -> Result<()>;
}

/// Observer that logs a progress line every `every` frames.
pub struct LogObserver {
    every: u64,
    seen: u64,
}

impl LogObserver {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            seen: 0,
        }
    }
}

impl Default for LogObserver {
    fn default() -> Self {
        Self::new(30)
    }
}

impl OutputObserver for LogObserver {
    fn observe_mono(&mut self, frame: &Frame) -> Result<()> {
        self.seen += 1;
        if self.seen % self.every == 0 {
            log::info!(
                "display: {} frames, latest #{} t={:.3}",
                self.seen,
                frame.index(),
                frame.timestamp()
            );
        }
        Ok(())
    }

    fn observe_stereo(&mut self, left: &Frame, _right: &Frame) -> Result<()> {
        self.observe_mono(left)
    }
}
