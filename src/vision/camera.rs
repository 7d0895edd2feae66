//! Camera access.
//!
//! [`Camera`] owns a [`CameraDevice`], opens it on first use, keeps it
//! open between captures and releases it exactly once.

use crate::config::CameraConfig;
use crate::error::{KioskError, Result};
use crate::exec::{ChildProcess, CommandExecutor, SystemCommandExecutor};
use crate::vision::frame::Frame;
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Trait for frame sources.
pub trait CameraDevice: Send {
    /// Acquire the device.
    fn open(&mut self) -> Result<()>;

    /// Grab one frame from an open device.
    fn read_frame(&mut self) -> Result<Frame>;

    /// Give the device back.
    fn release(&mut self);
}

#[cfg(target_os = "macos")]
const INPUT_FORMAT: &str = "avfoundation";
#[cfg(not(target_os = "macos"))]
const INPUT_FORMAT: &str = "v4l2";

/// Longest wait for the stream to deliver a new frame.
const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Camera read through one long-running `ffmpeg` that streams PPM frames.
///
/// A reader thread keeps only the newest frame; `read_frame` waits for one
/// it has not handed out yet. If ffmpeg dies, the next read restarts it.
pub struct FfmpegCamera<E: CommandExecutor = SystemCommandExecutor> {
    executor: E,
    ffmpeg: String,
    device: String,
    is_open: bool,
    stream: Option<FrameStream>,
}

struct FrameStream {
    child: Box<dyn ChildProcess>,
    reader: JoinHandle<()>,
    slot: Arc<FrameSlot>,
}

#[derive(Default)]
struct FrameSlot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

#[derive(Default)]
struct SlotState {
    latest: Option<Frame>,
    ended: Option<String>,
}

impl FfmpegCamera<SystemCommandExecutor> {
    pub fn from_config(config: &CameraConfig) -> Self {
        Self::with_executor(config, SystemCommandExecutor::new())
    }
}

impl<E: CommandExecutor> FfmpegCamera<E> {
    pub fn with_executor(config: &CameraConfig, executor: E) -> Self {
        Self {
            executor,
            ffmpeg: config.ffmpeg.clone(),
            device: config.device.clone(),
            is_open: false,
            stream: None,
        }
    }

    fn args(&self) -> Vec<&str> {
        vec![
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            INPUT_FORMAT,
            "-i",
            &self.device,
            "-f",
            "image2pipe",
            "-vcodec",
            "ppm",
            "-",
        ]
    }

    fn start_stream(&self) -> Result<FrameStream> {
        let mut child = self
            .executor
            .spawn(&self.ffmpeg, &self.args())
            .map_err(|e| KioskError::capture(e.to_string()))?;
        let Some(stdout) = child.take_stdout() else {
            child.terminate();
            return Err(KioskError::capture("ffmpeg stdout is not available"));
        };

        let slot = Arc::new(FrameSlot::default());
        let pump = Arc::clone(&slot);
        let reader = std::thread::Builder::new()
            .name("camera-frames".to_string())
            .spawn(move || pump_frames(stdout, &pump));
        let reader = match reader {
            Ok(handle) => handle,
            Err(e) => {
                child.terminate();
                return Err(KioskError::capture(format!(
                    "failed to start frame reader: {}",
                    e
                )));
            }
        };

        tracing::debug!(device = %self.device, "camera stream started");
        Ok(FrameStream {
            child,
            reader,
            slot,
        })
    }

    fn stop_stream(&mut self) {
        if let Some(FrameStream {
            mut child, reader, ..
        }) = self.stream.take()
        {
            child.terminate();
            if reader.join().is_err() {
                tracing::warn!("camera frame reader panicked");
            }
            tracing::debug!(device = %self.device, "camera stream stopped");
        }
    }

    fn next_frame(slot: &FrameSlot) -> std::result::Result<Frame, Option<String>> {
        let poisoned = || Some("frame reader panicked".to_string());
        let guard = slot.state.lock().map_err(|_| poisoned())?;
        let (mut state, _) = slot
            .ready
            .wait_timeout_while(guard, FRAME_TIMEOUT, |s| {
                s.latest.is_none() && s.ended.is_none()
            })
            .map_err(|_| poisoned())?;
        match state.latest.take() {
            Some(frame) => Ok(frame),
            None => Err(state.ended.clone()),
        }
    }
}

/// Decode frames until the stream fails, publishing each one to `slot`.
fn pump_frames(mut stdout: Box<dyn Read + Send>, slot: &FrameSlot) {
    loop {
        let result = Frame::read_ppm(&mut stdout);
        let Ok(mut state) = slot.state.lock() else {
            return;
        };
        let done = match result {
            Ok(frame) => {
                state.latest = Some(frame);
                false
            }
            Err(KioskError::CaptureFailure { message }) => {
                state.ended = Some(message);
                true
            }
            Err(e) => {
                state.ended = Some(e.to_string());
                true
            }
        };
        slot.ready.notify_all();
        if done {
            return;
        }
    }
}

impl<E: CommandExecutor> CameraDevice for FfmpegCamera<E> {
    fn open(&mut self) -> Result<()> {
        if self.is_open {
            return Ok(());
        }
        // V4L2 devices are files; catch a wrong path before spawning ffmpeg.
        if INPUT_FORMAT == "v4l2" && !std::path::Path::new(&self.device).exists() {
            return Err(KioskError::capture(format!(
                "could not access camera at {}",
                self.device
            )));
        }
        self.stream = Some(self.start_stream()?);
        self.is_open = true;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame> {
        if !self.is_open {
            return Err(KioskError::capture("camera is not open"));
        }
        let slot = match self.stream.as_ref().map(|stream| Arc::clone(&stream.slot)) {
            Some(slot) => slot,
            None => {
                let stream = self.start_stream()?;
                let slot = Arc::clone(&stream.slot);
                self.stream = Some(stream);
                slot
            }
        };

        match Self::next_frame(&slot) {
            Ok(frame) => Ok(frame),
            Err(Some(reason)) => {
                self.stop_stream();
                Err(KioskError::capture(format!(
                    "camera stream ended: {}",
                    reason
                )))
            }
            Err(None) => Err(KioskError::capture(format!(
                "no frame from {} within {:?}",
                self.device, FRAME_TIMEOUT
            ))),
        }
    }

    fn release(&mut self) {
        self.stop_stream();
        self.is_open = false;
    }
}

impl<E: CommandExecutor> Drop for FfmpegCamera<E> {
    fn drop(&mut self) {
        self.stop_stream();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CameraState {
    Closed,
    Open,
    Released,
}

/// Lazily opened, once-released camera handle.
pub struct Camera {
    device: Box<dyn CameraDevice>,
    warmup_frames: u32,
    state: CameraState,
}

impl Camera {
    pub fn new(device: Box<dyn CameraDevice>, warmup_frames: u32) -> Self {
        Self {
            device,
            warmup_frames,
            state: CameraState::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == CameraState::Open
    }

    /// Capture one frame, opening the device first if needed.
    ///
    /// # Errors
    /// `CaptureFailure` if the device cannot be opened or read, or if the
    /// camera was already shut down.
    pub fn capture(&mut self) -> Result<Frame> {
        match self.state {
            CameraState::Released => {
                return Err(KioskError::capture("camera has been released"));
            }
            CameraState::Closed => self.open()?,
            CameraState::Open => {}
        }
        self.device.read_frame()
    }

    fn open(&mut self) -> Result<()> {
        tracing::info!("initializing camera");
        self.device.open()?;
        self.state = CameraState::Open;
        // Early frames are often dark while exposure settles.
        for _ in 0..self.warmup_frames {
            if let Err(e) = self.device.read_frame() {
                tracing::debug!("warm-up frame failed: {}", e);
            }
        }
        Ok(())
    }

    /// Release the device. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.state == CameraState::Open {
            self.device.release();
            tracing::info!("camera released");
        }
        self.state = CameraState::Released;
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Mock camera for testing.
///
/// Counters are shared between clones so tests can observe a camera after
/// handing it to a describer.
#[derive(Debug, Clone)]
pub struct MockCamera {
    frame: Frame,
    fail_open: bool,
    fail_read: bool,
    opens: Arc<AtomicUsize>,
    reads: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

impl MockCamera {
    pub fn new(frame: Frame) -> Self {
        Self {
            frame,
            fail_open: false,
            fail_read: false,
            opens: Arc::new(AtomicUsize::new(0)),
            reads: Arc::new(AtomicUsize::new(0)),
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_open_failure(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn with_read_failure(mut self) -> Self {
        self.fail_read = true;
        self
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl CameraDevice for MockCamera {
    fn open(&mut self) -> Result<()> {
        if self.fail_open {
            return Err(KioskError::capture("could not access camera"));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_read {
            return Err(KioskError::capture("failed to capture frame"));
        }
        Ok(self.frame.clone())
    }

    fn release(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}
