//! End-to-end lifecycle tests for the ingestion threads: delivery order,
//! gate semantics, stereo pairing, observer isolation, and termination on
//! every exit path.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;

use slam_ingest::{
    build_chain, shared, CameraCalib, CameraIntrinsics, CropRegion, Distortion, Frame, Gate,
    InputThread, OutputObserver, ProcessingEngine, Resizer, RigidTransform, StereoInputThread,
    StubEngine, SyntheticSource, SyntheticStereoSource,
};

const WAIT: Duration = Duration::from_secs(5);

/// Engine that records deliveries and, when given the readiness gate,
/// checks it has fired before every delivery.
#[derive(Default)]
struct RecordingEngine {
    ready: Option<Arc<Gate>>,
    ready_before_every_delivery: bool,
    mono: Vec<(u64, (u32, u32))>,
    stereo: Vec<(u64, u64, RigidTransform)>,
    finalized: bool,
}

impl RecordingEngine {
    fn new() -> Self {
        Self {
            ready_before_every_delivery: true,
            ..Self::default()
        }
    }

    fn watch_ready(&mut self, gate: Arc<Gate>) {
        self.ready = Some(gate);
    }

    fn note_delivery(&mut self) {
        if let Some(ready) = &self.ready {
            self.ready_before_every_delivery &= ready.is_fired();
        }
    }
}

impl ProcessingEngine for RecordingEngine {
    fn process_mono(&mut self, frame: &Frame) -> Result<()> {
        self.note_delivery();
        self.mono.push((frame.index(), frame.size()));
        Ok(())
    }

    fn process_stereo(
        &mut self,
        left: &Frame,
        right: &Frame,
        right_to_left: &RigidTransform,
    ) -> Result<()> {
        self.note_delivery();
        self.stereo.push((left.index(), right.index(), *right_to_left));
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        self.finalized = true;
        Ok(())
    }
}

struct FailingObserver;

impl OutputObserver for FailingObserver {
    fn observe_mono(&mut self, _frame: &Frame) -> Result<()> {
        Err(anyhow!("observer is broken"))
    }

    fn observe_stereo(&mut self, _left: &Frame, _right: &Frame) -> Result<()> {
        Err(anyhow!("observer is broken"))
    }
}

fn passthrough(width: u32, height: u32) -> Arc<Resizer> {
    Arc::new(Resizer::new(width, height, None).unwrap())
}

fn flat_calib(width: u32, height: u32) -> CameraCalib {
    CameraCalib {
        intrinsics: CameraIntrinsics {
            fx: width as f64,
            fy: width as f64,
            cx: width as f64 / 2.0,
            cy: height as f64 / 2.0,
        },
        distortion: Distortion::default(),
        width,
        height,
    }
}

fn rig_extrinsic() -> RigidTransform {
    RigidTransform::from_parts(
        [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        [-0.11, 0.0, 0.0],
    )
    .unwrap()
}

#[test]
fn mono_stream_delivers_every_frame_in_order() {
    // Source yields 640x360 frames; the chain crops to the 640x320 engine
    // window. Every frame the engine sees must be corrector output.
    let engine = shared(RecordingEngine::new());
    let start = Arc::new(Gate::new());
    let corrector = build_chain(
        &flat_calib(640, 360),
        (640, 360),
        CropRegion {
            width: 640,
            height: 320,
            x: 0,
            y: 20,
        },
    )
    .unwrap();
    let input = InputThread::new(
        engine.clone(),
        Box::new(SyntheticSource::new(640, 360, 3)),
        corrector,
        start.clone(),
    );
    engine.lock().watch_ready(input.ready_gate());
    let done = input.done_gate();
    let handle = input.spawn().unwrap();

    handle.wait_ready();
    start.fire();
    assert!(handle.done_within(WAIT));
    handle.join().unwrap();

    let mut engine = engine.lock();
    assert_eq!(
        engine.mono,
        vec![(0, (640, 320)), (1, (640, 320)), (2, (640, 320))]
    );
    assert!(engine.ready_before_every_delivery);
    assert!(done.is_fired());

    engine.finalize().unwrap();
    assert!(engine.finalized);
}

#[test]
fn readiness_waiters_before_and_after_start_both_wake() {
    let engine = shared(RecordingEngine::new());
    let start = Arc::new(Gate::new());
    start.fire();
    let input = InputThread::new(
        engine,
        Box::new(SyntheticSource::new(16, 12, 2)),
        passthrough(16, 12),
        start,
    );
    let ready = input.ready_gate();

    // One waiter blocks before the thread even starts.
    let early = {
        let ready = ready.clone();
        thread::spawn(move || ready.wait())
    };
    let handle = input.spawn().unwrap();
    early.join().unwrap();

    // A late waiter sees the already-fired gate immediately.
    assert!(ready.wait_timeout(WAIT));
    assert!(handle.done_within(WAIT));
    handle.join().unwrap();
}

#[test]
fn completion_fires_exactly_once_and_refire_is_harmless() {
    let engine = shared(RecordingEngine::new());
    let start = Arc::new(Gate::new());
    start.fire();
    let input = InputThread::new(
        engine,
        Box::new(SyntheticSource::new(16, 12, 1)),
        passthrough(16, 12),
        start,
    );
    let done = input.done_gate();
    let handle = input.spawn().unwrap();
    assert!(handle.done_within(WAIT));
    handle.join().unwrap();

    // Firing an already-fired gate is a no-op; waiters still return.
    done.fire();
    assert!(done.wait_timeout(Duration::from_millis(10)));
}

#[test]
fn start_barrier_releases_parallel_input_threads_together() {
    let start = Arc::new(Gate::new());
    let mut handles = Vec::new();
    for _ in 0..2 {
        let engine = shared(RecordingEngine::new());
        let input = InputThread::new(
            engine,
            Box::new(SyntheticSource::new(16, 12, 2)),
            passthrough(16, 12),
            start.clone(),
        );
        handles.push(input.spawn().unwrap());
    }

    for handle in &handles {
        handle.wait_ready();
    }
    // Neither worker may proceed past its first corrected frame yet.
    assert!(!handles[0].is_done());
    assert!(!handles[1].is_done());

    start.fire();
    for handle in handles {
        assert!(handle.done_within(WAIT));
        handle.join().unwrap();
    }
}

#[test]
fn stereo_pairs_share_tick_and_constant_extrinsic() {
    let engine = shared(RecordingEngine::new());
    let start = Arc::new(Gate::new());
    start.fire();
    let extrinsic = rig_extrinsic();
    let input = StereoInputThread::new(
        engine.clone(),
        Box::new(SyntheticStereoSource::new(16, 12, 4)),
        passthrough(16, 12),
        passthrough(16, 12),
        extrinsic,
        start,
    );
    let handle = input.spawn().unwrap();
    assert!(handle.done_within(WAIT));
    handle.join().unwrap();

    let engine = engine.lock();
    assert_eq!(engine.stereo.len(), 4);
    for (tick, (left, right, transform)) in engine.stereo.iter().enumerate() {
        assert_eq!(left, right);
        assert_eq!(*left, tick as u64);
        assert_eq!(transform, &extrinsic);
    }
}

#[test]
fn stereo_desync_terminates_without_a_partial_pair() {
    let engine = shared(RecordingEngine::new());
    let start = Arc::new(Gate::new());
    start.fire();
    let input = StereoInputThread::new(
        engine.clone(),
        Box::new(SyntheticStereoSource::new(16, 12, 5).drop_right_at(2)),
        passthrough(16, 12),
        passthrough(16, 12),
        rig_extrinsic(),
        start,
    );
    let done = input.done_gate();
    let handle = input.spawn().unwrap();
    assert!(handle.done_within(WAIT));
    handle.join().unwrap();

    assert_eq!(engine.lock().stereo.len(), 2);
    assert!(done.is_fired());
}

#[test]
fn broken_observer_does_not_disturb_the_engine_path() {
    let engine = shared(RecordingEngine::new());
    let start = Arc::new(Gate::new());
    start.fire();
    let mut input = InputThread::new(
        engine.clone(),
        Box::new(SyntheticSource::new(16, 12, 3)),
        passthrough(16, 12),
        start,
    );
    input.attach_observer(Box::new(FailingObserver));
    let handle = input.spawn().unwrap();
    assert!(handle.done_within(WAIT));
    handle.join().unwrap();

    assert_eq!(engine.lock().mono.len(), 3);
}

#[test]
fn broken_observer_does_not_disturb_stereo_deliveries() {
    let engine = shared(RecordingEngine::new());
    let start = Arc::new(Gate::new());
    start.fire();
    let mut input = StereoInputThread::new(
        engine.clone(),
        Box::new(SyntheticStereoSource::new(16, 12, 2)),
        passthrough(16, 12),
        passthrough(16, 12),
        rig_extrinsic(),
        start,
    );
    input.attach_observer(Box::new(FailingObserver));
    let handle = input.spawn().unwrap();
    assert!(handle.done_within(WAIT));
    handle.join().unwrap();

    assert_eq!(engine.lock().stereo.len(), 2);
}

#[test]
fn source_fault_ends_the_stream_cleanly() {
    let engine = shared(RecordingEngine::new());
    let start = Arc::new(Gate::new());
    start.fire();
    let input = InputThread::new(
        engine.clone(),
        Box::new(SyntheticSource::new(16, 12, 10).fail_at(4)),
        passthrough(16, 12),
        start,
    );
    let handle = input.spawn().unwrap();
    assert!(handle.done_within(WAIT));
    handle.join().unwrap();

    assert_eq!(engine.lock().mono.len(), 4);
}

#[test]
fn engine_refusal_terminates_ingestion() {
    let engine: Arc<Mutex<StubEngine>> = shared(StubEngine::new().fail_after(2));
    let start = Arc::new(Gate::new());
    start.fire();
    let input = InputThread::new(
        engine.clone(),
        Box::new(SyntheticSource::new(16, 12, 10)),
        passthrough(16, 12),
        start,
    );
    let handle = input.spawn().unwrap();
    assert!(handle.done_within(WAIT));
    handle.join().unwrap();

    assert_eq!(engine.lock().mono_count(), 2);
}

#[test]
fn cancellation_stops_an_endless_stream() {
    let engine: Arc<Mutex<StubEngine>> = shared(StubEngine::new());
    let start = Arc::new(Gate::new());
    let input = InputThread::new(
        engine.clone(),
        Box::new(SyntheticSource::new(16, 12, u64::MAX)),
        passthrough(16, 12),
        start.clone(),
    );
    let handle = input.spawn().unwrap();

    handle.wait_ready();
    start.fire();
    // Let a few frames through before asking the thread to stop.
    while engine.lock().mono_count() < 3 {
        thread::sleep(Duration::from_millis(1));
    }
    handle.request_stop();

    assert!(handle.done_within(WAIT));
    let delivered = engine.lock().mono_count();
    assert!(delivered >= 3);
    handle.join().unwrap();
}

#[test]
fn empty_stream_still_releases_both_gates() {
    let engine = shared(RecordingEngine::new());
    let start = Arc::new(Gate::new());
    let input = InputThread::new(
        engine.clone(),
        Box::new(SyntheticSource::new(16, 12, 0)),
        passthrough(16, 12),
        start,
    );
    let handle = input.spawn().unwrap();

    // No frame ever arrives, so the thread never reaches the start barrier;
    // the owner must still wake on both gates instead of hanging forever.
    handle.wait_ready();
    assert!(handle.done_within(WAIT));
    handle.join().unwrap();
    assert!(engine.lock().mono.is_empty());
}
