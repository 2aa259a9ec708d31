//! slamd - runs the ingestion pipeline against recorded input.
//!
//! Wires a frame source, a correction chain, the processing engine, and an
//! optional display observer into an input thread, then drives the startup
//! and shutdown handshake: wait for the input thread to report its first
//! frame ready, release the start barrier, watch for completion (polling in
//! display mode, blocking in headless mode), join, and finalize the engine.
//!
//! Exit code is 0 on graceful completion. Configuration problems (missing
//! or invalid calibration, empty input list, missing stereo extrinsics)
//! abort with a diagnostic before any thread is created.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use parking_lot::Mutex;

use slam_ingest::{
    build_chain, shared, Calibration, CropRegion, FrameSource, Gate, ImageDirSource, IngestHandle,
    InputThread, LogObserver, ManifestSource, PixelFormat, ProcessingEngine, SharedEngine,
    StereoDirSource, StereoInputThread, StereoSource, StubEngine,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Camera calibration file (TOML).
    #[arg(short = 'c', long = "calib", value_name = "FILE")]
    calib: PathBuf,

    /// Print DEBUG output to console.
    #[arg(short, long)]
    verbose: bool,

    /// Run without the display observer and block until completion.
    #[arg(long)]
    headless: bool,

    /// Chunk to play back when the input is a JSON manifest.
    #[arg(long)]
    chunk: Option<String>,

    /// Skip this many frames between delivered frames.
    #[arg(long, default_value_t = 0)]
    skip: usize,

    /// Target frame rate used to stamp timestamps.
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Ingest synchronized stereo pairs; inputs are the left and right
    /// image directories.
    #[arg(long)]
    stereo: bool,

    /// Working size frames are resized to before cropping (WxH).
    #[arg(long, default_value = "640x360", value_parser = parse_size)]
    size: (u32, u32),

    /// Engine input window within the working size (WxH+X+Y).
    #[arg(long, default_value = "640x320+0+20", value_parser = parse_crop)]
    crop: CropRegion,

    /// Input files, directories, or a JSON manifest.
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if !args.calib.is_file() {
        return Err(anyhow!(
            "calibration file {} does not exist",
            args.calib.display()
        ));
    }
    let calib = Calibration::load(&args.calib)?;
    log::info!(
        "engine input: {}x{} (working size {}x{})",
        args.crop.width,
        args.crop.height,
        args.size.0,
        args.size.1
    );

    let engine = shared(StubEngine::new());
    let start = Arc::new(Gate::new());
    let handle = if args.stereo {
        spawn_stereo(&args, &calib, engine.clone(), start.clone())?
    } else {
        spawn_mono(&args, &calib, engine.clone(), start.clone())?
    };

    let cancel = handle.cancel_token();
    ctrlc::set_handler(move || {
        log::info!("interrupt received, stopping input thread");
        cancel.request_stop();
    })
    .context("failed to install interrupt handler")?;

    log::info!("waiting for input thread");
    handle.wait_ready();

    log::info!("starting all threads");
    start.fire();

    if args.headless {
        handle.wait_done();
    } else {
        poll_until_done(&handle, &engine);
    }

    handle.join()?;
    log::info!("finalizing engine");
    engine.lock().finalize()?;
    Ok(())
}

fn spawn_mono(
    args: &Args,
    calib: &Calibration,
    engine: SharedEngine,
    start: Arc<Gate>,
) -> Result<IngestHandle> {
    let mut source: Box<dyn FrameSource> = match manifest_path(&args.inputs) {
        Some(path) => Box::new(
            ManifestSource::open(path, args.chunk.as_deref())?.with_skip(args.skip),
        ),
        None => Box::new(ImageDirSource::new(&args.inputs)?.with_skip(args.skip)),
    };
    source.set_target_fps(args.fps);
    source.set_output_format(PixelFormat::Gray8);

    let corrector = build_chain(&calib.camera, args.size, args.crop)?;
    let mut input = InputThread::new(engine, source, corrector, start);
    if !args.headless {
        input.attach_observer(Box::new(LogObserver::new(args.fps.max(1) as u64)));
    }
    input.spawn()
}

fn spawn_stereo(
    args: &Args,
    calib: &Calibration,
    engine: SharedEngine,
    start: Arc<Gate>,
) -> Result<IngestHandle> {
    let stereo = calib.require_stereo()?;
    let [left_dir, right_dir] = args.inputs.as_slice() else {
        return Err(anyhow!(
            "stereo mode takes exactly two inputs (left and right image directories)"
        ));
    };
    let mut source = StereoDirSource::new(left_dir, right_dir)?;
    source.set_target_fps(args.fps);
    source.set_output_format(PixelFormat::Gray8);

    let left_corrector = build_chain(&calib.camera, args.size, args.crop)?;
    let right_corrector = build_chain(&stereo.right, args.size, args.crop)?;
    let mut input = StereoInputThread::new(
        engine,
        Box::new(source),
        left_corrector,
        right_corrector,
        stereo.right_to_left,
        start,
    );
    if !args.headless {
        input.attach_observer(Box::new(LogObserver::new(args.fps.max(1) as u64)));
    }
    input.spawn()
}

/// Display-mode loop: stay responsive while the stream runs, logging a
/// heartbeat so a stalled source is visible.
fn poll_until_done(handle: &IngestHandle, engine: &Arc<Mutex<StubEngine>>) {
    let mut last_heartbeat = Instant::now();
    while !handle.done_within(Duration::from_millis(250)) {
        if last_heartbeat.elapsed() >= Duration::from_secs(2) {
            log::info!("delivered {} frames", engine.lock().delivered());
            last_heartbeat = Instant::now();
        }
    }
}

fn manifest_path(inputs: &[PathBuf]) -> Option<&PathBuf> {
    match inputs {
        [single]
            if single
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json")) =>
        {
            Some(single)
        }
        _ => None,
    }
}

fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once('x')
        .ok_or_else(|| format!("expected WxH, got {value:?}"))?;
    let width: u32 = w.parse().map_err(|_| format!("bad width in {value:?}"))?;
    let height: u32 = h.parse().map_err(|_| format!("bad height in {value:?}"))?;
    Ok((width, height))
}

fn parse_crop(value: &str) -> Result<CropRegion, String> {
    let (size, offsets) = value
        .split_once('+')
        .ok_or_else(|| format!("expected WxH+X+Y, got {value:?}"))?;
    let (width, height) = parse_size(size)?;
    let (x, y) = offsets
        .split_once('+')
        .ok_or_else(|| format!("expected WxH+X+Y, got {value:?}"))?;
    let x: u32 = x.parse().map_err(|_| format!("bad x offset in {value:?}"))?;
    let y: u32 = y.parse().map_err(|_| format!("bad y offset in {value:?}"))?;
    Ok(CropRegion {
        width,
        height,
        x,
        y,
    })
}
