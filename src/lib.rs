//! Frame ingestion and thread synchronization for a real-time visual
//! processing pipeline.
//!
//! This crate owns the background thread that pulls frames from a sensor
//! source, geometrically corrects them, and hands them to a processing
//! engine, and it owns the synchronization contract that coordinates
//! startup readiness and shutdown completion with the main thread:
//!
//! 1. The main thread wires a source, a corrector chain, the engine, and an
//!    optional output observer into an [`InputThread`] (or
//!    [`StereoInputThread`]) and spawns it.
//! 2. The input thread corrects its first frame, fires its readiness gate,
//!    and holds at the shared start barrier.
//! 3. The main thread observes readiness, fires the barrier, and every
//!    worker is released together.
//! 4. The input thread delivers corrected frames to the engine one at a
//!    time until the stream ends, then fires its completion gate; the main
//!    thread finalizes the engine after joining.
//!
//! # Module Structure
//!
//! - `frame`: immutable frame container with shared pixel storage
//! - `source`: mono/stereo frame sources (image files, manifests, synthetic)
//! - `calib`: calibration file loading and validation
//! - `correct`: geometric correction chain (undistort, resize, crop)
//! - `engine` / `observer`: processing and display boundaries
//! - `sync`: broadcast-once gates and the cooperative stop token
//! - `ingest`: the input threads themselves

pub mod calib;
pub mod correct;
pub mod engine;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod observer;
pub mod source;
pub mod sync;

pub use calib::{Calibration, CameraCalib, CameraIntrinsics, Distortion, StereoCalib};
pub use correct::{build_chain, Corrector, CropRegion, Cropper, Resizer, Undistorter};
pub use engine::{shared, ProcessingEngine, SharedEngine, StubEngine};
pub use frame::{Frame, PixelFormat};
pub use geometry::RigidTransform;
pub use ingest::{IngestHandle, InputThread, StereoInputThread};
pub use observer::{LogObserver, OutputObserver};
pub use source::{
    FrameSource, ImageDirSource, ManifestSource, StereoDirSource, StereoSource, SyntheticSource,
    SyntheticStereoSource,
};
pub use sync::{CancelToken, Gate};
