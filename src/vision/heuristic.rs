//! Structured scene features from local detectors.

use crate::error::Result;
use crate::vision::camera::Camera;
use crate::vision::face::FaceDetector;
use crate::vision::frame::Frame;
use crate::vision::palette;
use crate::vision::{Emotion, SceneFeatures};

/// Face, smile and clothing color from one frame.
pub struct HeuristicDescriber {
    camera: Camera,
    detector: Box<dyn FaceDetector>,
    sample_step: u32,
}

impl HeuristicDescriber {
    pub fn new(camera: Camera, detector: Box<dyn FaceDetector>, sample_step: u32) -> Self {
        Self {
            camera,
            detector,
            sample_step,
        }
    }

    pub fn describe(&mut self) -> Result<SceneFeatures> {
        let frame = self.camera.capture()?;
        self.analyze(&frame)
    }

    /// Features of an already captured frame.
    pub fn analyze(&mut self, frame: &Frame) -> Result<SceneFeatures> {
        let faces = self.detector.detect_faces(frame)?;
        let Some(face) = faces.into_iter().max_by_key(|region| region.area()) else {
            tracing::info!("no face in frame");
            return Ok(SceneFeatures::default());
        };

        let emotion = if self.detector.detect_smile(frame, face)? {
            Emotion::Happy
        } else {
            Emotion::Neutral
        };

        // Everything outside the face approximates clothing and background.
        let colors = frame
            .average_color(self.sample_step, Some(face))
            .map(palette::classify)
            .into_iter()
            .collect();

        let features = SceneFeatures {
            face_detected: true,
            emotion: Some(emotion),
            colors,
        };
        tracing::info!(?features, "scene analyzed");
        Ok(features)
    }

    pub fn shutdown(&mut self) {
        self.camera.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::camera::MockCamera;
    use crate::vision::face::MockFaceDetector;
    use crate::vision::frame::{Region, Rgb};
    use crate::vision::palette::Color;

    fn red_shirt_frame(face: Region) -> Frame {
        let mut frame = Frame::solid(16, 16, Rgb::new(200, 30, 40));
        frame.fill(face, Rgb::new(230, 190, 160));
        frame
    }

    fn describer(frame: Frame, detector: MockFaceDetector) -> HeuristicDescriber {
        let camera = Camera::new(Box::new(MockCamera::new(frame)), 0);
        HeuristicDescriber::new(camera, Box::new(detector), 1)
    }

    #[test]
    fn test_smiling_face_in_red() {
        let face = Region::new(4, 0, 8, 8);
        let mut describer = describer(
            red_shirt_frame(face),
            MockFaceDetector::new().with_face(face).smiling(),
        );

        let features = describer.describe().unwrap();

        assert!(features.face_detected);
        assert_eq!(features.emotion, Some(Emotion::Happy));
        assert_eq!(features.colors, vec![Color::Red]);
    }

    #[test]
    fn test_no_face_yields_empty_features() {
        let mut describer = describer(Frame::solid(4, 4, Rgb::new(0, 0, 0)), MockFaceDetector::new());

        let features = describer.describe().unwrap();

        assert!(!features.face_detected);
        assert_eq!(features.emotion, None);
        assert!(features.colors.is_empty());
    }

    #[test]
    fn test_largest_face_is_checked_for_smile() {
        let small = Region::new(0, 0, 2, 2);
        let large = Region::new(6, 6, 6, 6);
        let detector = MockFaceDetector::new().with_face(small).with_face(large);
        let handle = detector.clone();
        let mut describer = describer(Frame::solid(16, 16, Rgb::new(128, 128, 128)), detector);

        let features = describer.describe().unwrap();

        assert_eq!(handle.smile_checks(), vec![large]);
        assert_eq!(features.emotion, Some(Emotion::Neutral));
        assert_eq!(features.colors, vec![Color::Neutral]);
    }

    #[test]
    fn test_detector_failure_propagates() {
        let mut describer = describer(
            Frame::solid(4, 4, Rgb::new(0, 0, 0)),
            MockFaceDetector::new().with_failure("cascade missing"),
        );
        assert!(describer.describe().is_err());
    }
}
