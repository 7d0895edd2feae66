//! Face and smile detection.

use crate::config::VisionConfig;
use crate::error::{KioskError, Result};
use crate::exec::{CommandExecutor, SystemCommandExecutor};
use crate::vision::frame::{Frame, Region};
use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Exit status detector commands use for "ran fine, found nothing".
const NOTHING_FOUND_STATUS: i32 = 2;

/// Trait for face detectors.
pub trait FaceDetector: Send {
    /// Regions of every face in the frame, in no particular order.
    fn detect_faces(&mut self, frame: &Frame) -> Result<Vec<Region>>;

    /// Whether the face inside `face` is smiling.
    fn detect_smile(&mut self, frame: &Frame, face: Region) -> Result<bool>;
}

/// Detector backed by external cascade-classifier commands.
///
/// Each command takes an image path and prints one `x y w h` line per hit,
/// exiting with status 2 when there are none (the `facedetect` convention).
/// Without a smile command every face reads as not smiling.
pub struct CommandFaceDetector<E: CommandExecutor = SystemCommandExecutor> {
    executor: E,
    face_command: String,
    smile_command: Option<String>,
}

impl CommandFaceDetector<SystemCommandExecutor> {
    pub fn from_config(config: &VisionConfig) -> Self {
        Self::with_executor(config, SystemCommandExecutor::new())
    }
}

impl<E: CommandExecutor> CommandFaceDetector<E> {
    pub fn with_executor(config: &VisionConfig, executor: E) -> Self {
        Self {
            executor,
            face_command: config.face_command.clone(),
            smile_command: config.smile_command.clone(),
        }
    }

    fn run_detector(&self, command: &str, frame: &Frame) -> Result<Vec<Region>> {
        let mut image = tempfile::Builder::new()
            .prefix("skyy-")
            .suffix(".ppm")
            .tempfile()?;
        image.write_all(&frame.to_ppm())?;
        image.flush()?;
        let path = image.path().to_string_lossy().to_string();

        let output = self
            .executor
            .run(command, &[&path])
            .map_err(|e| KioskError::capture(e.to_string()))?;
        match output.status {
            Some(0) => parse_regions(&String::from_utf8_lossy(&output.stdout)),
            Some(NOTHING_FOUND_STATUS) => Ok(Vec::new()),
            status => Err(KioskError::capture(format!(
                "{} exited with status {:?}: {}",
                command,
                status,
                output.stderr.trim()
            ))),
        }
    }
}

impl<E: CommandExecutor> FaceDetector for CommandFaceDetector<E> {
    fn detect_faces(&mut self, frame: &Frame) -> Result<Vec<Region>> {
        let faces = self.run_detector(&self.face_command, frame)?;
        tracing::debug!(count = faces.len(), "faces detected");
        Ok(faces)
    }

    fn detect_smile(&mut self, frame: &Frame, face: Region) -> Result<bool> {
        let Some(command) = &self.smile_command else {
            return Ok(false);
        };
        let crop = frame.crop(face)?;
        Ok(!self.run_detector(command, &crop)?.is_empty())
    }
}

/// Parse `x y w h` lines; blank lines are skipped.
fn parse_regions(text: &str) -> Result<Vec<Region>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let values: Vec<u32> = line
                .split_whitespace()
                .map(str::parse)
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| KioskError::capture(format!("bad detector line: {}", line)))?;
            match values[..] {
                [x, y, width, height] => Ok(Region::new(x, y, width, height)),
                _ => Err(KioskError::capture(format!("bad detector line: {}", line))),
            }
        })
        .collect()
}

/// Mock face detector for testing.
///
/// Returns the scripted faces on every call and a fixed smile answer.
#[derive(Debug, Clone, Default)]
pub struct MockFaceDetector {
    faces: Vec<Region>,
    smiling: bool,
    failure: Option<String>,
    smile_checks: Arc<Mutex<VecDeque<Region>>>,
}

impl MockFaceDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_face(mut self, face: Region) -> Self {
        self.faces.push(face);
        self
    }

    pub fn smiling(mut self) -> Self {
        self.smiling = true;
        self
    }

    pub fn with_failure(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Regions passed to `detect_smile`, oldest first.
    pub fn smile_checks(&self) -> Vec<Region> {
        self.smile_checks
            .lock()
            .map(|checks| checks.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl FaceDetector for MockFaceDetector {
    fn detect_faces(&mut self, _frame: &Frame) -> Result<Vec<Region>> {
        match &self.failure {
            Some(message) => Err(KioskError::capture(message.clone())),
            None => Ok(self.faces.clone()),
        }
    }

    fn detect_smile(&mut self, _frame: &Frame, face: Region) -> Result<bool> {
        if let Ok(mut checks) = self.smile_checks.lock() {
            checks.push_back(face);
        }
        Ok(self.smiling)
    }
}
