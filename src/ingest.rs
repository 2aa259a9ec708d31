//! Ingestion threads.
//!
//! An input thread owns the ingest -> correct -> deliver loop for one
//! camera rig and publishes two lifecycle signals: a readiness gate that
//! fires once the first frame has been corrected, and a completion gate that
//! fires on every exit path. The owning thread waits on readiness, fires the
//! process-wide start barrier, and later waits on (or polls) completion
//! before finalizing the engine.
//!
//! Per tick the loop pulls a raw frame (or pair), corrects it, delivers to
//! the engine synchronously (at most one frame is in flight) and then
//! forwards the same frame to the optional observer, whose failures are
//! isolated from the engine path. Stream faults (read errors, decode
//! errors, desynchronized stereo ticks) terminate the thread cleanly, the
//! same as normal exhaustion: retry policy belongs to the source, not here.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::correct::Corrector;
use crate::engine::SharedEngine;
use crate::geometry::RigidTransform;
use crate::observer::OutputObserver;
use crate::source::{FrameSource, StereoSource};
use crate::sync::{CancelToken, Gate};

/// Gates and stop signal shared between an input thread and its owner.
struct Lifecycle {
    ready: Arc<Gate>,
    done: Arc<Gate>,
    start: Arc<Gate>,
    cancel: CancelToken,
    ready_fired: bool,
}

impl Lifecycle {
    fn new(start: Arc<Gate>) -> Self {
        Self {
            ready: Arc::new(Gate::new()),
            done: Arc::new(Gate::new()),
            start,
            cancel: CancelToken::new(),
            ready_fired: false,
        }
    }

    /// Publish readiness after the first successful correction, then hold at
    /// the start barrier until every peer subsystem has been released. Runs
    /// its body exactly once; later ticks fall straight through.
    fn first_frame_ready(&mut self) {
        if !self.ready_fired {
            self.ready_fired = true;
            self.ready.fire();
            self.start.wait();
        }
    }

    /// Publish completion. Readiness is released too, so an owner blocked on
    /// `wait_ready` wakes even when the stream ended before the first frame.
    fn finish(&self) {
        self.ready.fire();
        self.done.fire();
    }

    fn is_stopped(&self) -> bool {
        self.cancel.is_stopped()
    }
}

/// Owner-side handle to a spawned input thread.
pub struct IngestHandle {
    ready: Arc<Gate>,
    done: Arc<Gate>,
    cancel: CancelToken,
    join: Option<JoinHandle<()>>,
}

impl IngestHandle {
    /// Block until the thread has corrected its first frame (or terminated).
    pub fn wait_ready(&self) {
        self.ready.wait();
    }

    /// Block until the thread has terminated.
    pub fn wait_done(&self) {
        self.done.wait();
    }

    /// Poll-friendly completion check for display loops.
    pub fn done_within(&self, timeout: Duration) -> bool {
        self.done.wait_timeout(timeout)
    }

    pub fn is_done(&self) -> bool {
        self.done.is_fired()
    }

    /// Cooperative stop signal into the ingestion loop.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn request_stop(&self) {
        self.cancel.request_stop();
    }

    /// Join the thread. Call after completion has fired.
    pub fn join(mut self) -> Result<()> {
        if let Some(join) = self.join.take() {
            join.join().map_err(|_| anyhow!("input thread panicked"))?;
        }
        Ok(())
    }
}

/// Mono ingestion thread.
pub struct InputThread {
    engine: SharedEngine,
    source: Box<dyn FrameSource>,
    corrector: Arc<dyn Corrector>,
    observer: Option<Box<dyn OutputObserver>>,
    lifecycle: Lifecycle,
}

impl InputThread {
    /// The source must be open and ready to yield frames; the corrector's
    /// output size must match what the engine expects (the caller checks
    /// this when wiring the pipeline).
    pub fn new(
        engine: SharedEngine,
        source: Box<dyn FrameSource>,
        corrector: Arc<dyn Corrector>,
        start: Arc<Gate>,
    ) -> Self {
        Self {
            engine,
            source,
            corrector,
            observer: None,
            lifecycle: Lifecycle::new(start),
        }
    }

    /// Attach the render/record sink. Only callable before the thread
    /// starts; once `spawn` consumes the thread the observer is fixed.
    pub fn attach_observer(&mut self, observer: Box<dyn OutputObserver>) {
        self.observer = Some(observer);
    }

    pub fn ready_gate(&self) -> Arc<Gate> {
        self.lifecycle.ready.clone()
    }

    pub fn done_gate(&self) -> Arc<Gate> {
        self.lifecycle.done.clone()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.lifecycle.cancel.clone()
    }

    /// Thread body. Runs until the source is exhausted, a stream fault
    /// occurs, or a stop is requested; always fires the completion gate.
    pub fn run(mut self) {
        log::debug!("input thread: running");
        loop {
            if self.lifecycle.is_stopped() {
                log::info!("input thread: stop requested");
                break;
            }
            let raw = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::info!("input thread: source exhausted");
                    break;
                }
                Err(e) => {
                    log::warn!("input thread: read failed, treating as end of stream: {e:#}");
                    break;
                }
            };
            let corrected = match self.corrector.correct(&raw) {
                Ok(frame) => frame,
                Err(e) => {
                    log::warn!(
                        "input thread: correction failed on frame #{}, treating as end of stream: {e:#}",
                        raw.index()
                    );
                    break;
                }
            };
            self.lifecycle.first_frame_ready();
            if let Err(e) = self.engine.lock().process_mono(&corrected) {
                log::error!(
                    "input thread: engine refused frame #{}: {e:#}",
                    corrected.index()
                );
                break;
            }
            if let Some(observer) = self.observer.as_mut() {
                if let Err(e) = observer.observe_mono(&corrected) {
                    log::warn!(
                        "input thread: observer failed on frame #{} (ignored): {e:#}",
                        corrected.index()
                    );
                }
            }
        }
        self.lifecycle.finish();
        log::debug!("input thread: terminated");
    }

    /// Launch the loop on its own thread.
    pub fn spawn(self) -> Result<IngestHandle> {
        let ready = self.lifecycle.ready.clone();
        let done = self.lifecycle.done.clone();
        let cancel = self.lifecycle.cancel.clone();
        let join = thread::Builder::new()
            .name("input".to_string())
            .spawn(move || self.run())?;
        Ok(IngestHandle {
            ready,
            done,
            cancel,
            join: Some(join),
        })
    }
}

/// Stereo ingestion thread: two synchronized cameras, two correctors, one
/// fixed right-to-left extrinsic delivered with every pair.
pub struct StereoInputThread {
    engine: SharedEngine,
    source: Box<dyn StereoSource>,
    left_corrector: Arc<dyn Corrector>,
    right_corrector: Arc<dyn Corrector>,
    right_to_left: RigidTransform,
    observer: Option<Box<dyn OutputObserver>>,
    lifecycle: Lifecycle,
}

impl StereoInputThread {
    pub fn new(
        engine: SharedEngine,
        source: Box<dyn StereoSource>,
        left_corrector: Arc<dyn Corrector>,
        right_corrector: Arc<dyn Corrector>,
        right_to_left: RigidTransform,
        start: Arc<Gate>,
    ) -> Self {
        Self {
            engine,
            source,
            left_corrector,
            right_corrector,
            right_to_left,
            observer: None,
            lifecycle: Lifecycle::new(start),
        }
    }

    pub fn attach_observer(&mut self, observer: Box<dyn OutputObserver>) {
        self.observer = Some(observer);
    }

    pub fn ready_gate(&self) -> Arc<Gate> {
        self.lifecycle.ready.clone()
    }

    pub fn done_gate(&self) -> Arc<Gate> {
        self.lifecycle.done.clone()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.lifecycle.cancel.clone()
    }

    /// Thread body. A tick for which the source cannot produce both sides
    /// ends the whole stream; no partial pair is ever delivered.
    pub fn run(mut self) {
        log::debug!("stereo input thread: running");
        loop {
            if self.lifecycle.is_stopped() {
                log::info!("stereo input thread: stop requested");
                break;
            }
            let (raw_left, raw_right) = match self.source.next_pair() {
                Ok(Some(pair)) => pair,
                Ok(None) => {
                    log::info!("stereo input thread: source exhausted");
                    break;
                }
                Err(e) => {
                    log::warn!(
                        "stereo input thread: read failed, treating as end of stream: {e:#}"
                    );
                    break;
                }
            };
            // The two corrections are independent; both must succeed before
            // anything is delivered.
            let corrected = self
                .left_corrector
                .correct(&raw_left)
                .and_then(|left| Ok((left, self.right_corrector.correct(&raw_right)?)));
            let (left, right) = match corrected {
                Ok(pair) => pair,
                Err(e) => {
                    log::warn!(
                        "stereo input thread: correction failed on tick #{}, treating as end of stream: {e:#}",
                        raw_left.index()
                    );
                    break;
                }
            };
            self.lifecycle.first_frame_ready();
            if let Err(e) = self
                .engine
                .lock()
                .process_stereo(&left, &right, &self.right_to_left)
            {
                log::error!(
                    "stereo input thread: engine refused pair #{}: {e:#}",
                    left.index()
                );
                break;
            }
            if let Some(observer) = self.observer.as_mut() {
                if let Err(e) = observer.observe_stereo(&left, &right) {
                    log::warn!(
                        "stereo input thread: observer failed on pair #{} (ignored): {e:#}",
                        left.index()
                    );
                }
            }
        }
        self.lifecycle.finish();
        log::debug!("stereo input thread: terminated");
    }

    pub fn spawn(self) -> Result<IngestHandle> {
        let ready = self.lifecycle.ready.clone();
        let done = self.lifecycle.done.clone();
        let cancel = self.lifecycle.cancel.clone();
        let join = thread::Builder::new()
            .name("stereo-input".to_string())
            .spawn(move || self.run())?;
        Ok(IngestHandle {
            ready,
            done,
            cancel,
            join: Some(join),
        })
    }
}
