//! Detector collaborator contracts.
//!
//! Pose and face inference run outside this crate.  [`PoseDetector`] and
//! [`FaceDetector`] are the seams the quality processor calls through; both
//! are async, object-safe and `Send + Sync` so they can be held behind an
//! `Arc<dyn …>`.
//!
//! [`MockPoseDetector`] and [`MockFaceDetector`] (available under
//! `#[cfg(test)]`) replay scripted responses for unit tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::VideoFrame;

// ---------------------------------------------------------------------------
// Detection types
// ---------------------------------------------------------------------------

/// One body landmark in image coordinates (y grows downward).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
    /// Landmark name, e.g. `"nose"` or `"left_shoulder"`.
    pub name: String,
}

impl Keypoint {
    pub fn new(name: impl Into<String>, x: f32, y: f32, confidence: f32) -> Self {
        Self {
            x,
            y,
            confidence,
            name: name.into(),
        }
    }
}

/// Result of pose inference on one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseDetection {
    pub keypoints: Vec<Keypoint>,
    /// Overall detection confidence.
    pub confidence: f32,
}

/// Axis-aligned box in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A detected face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    pub confidence: f32,
    pub bounding_box: Option<BoundingBox>,
}

// ---------------------------------------------------------------------------
// DetectorError
// ---------------------------------------------------------------------------

/// A rejected detector call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DetectorError {
    /// The model ran but failed.
    #[error("detector inference failed: {0}")]
    Inference(String),

    /// The payload could not be decoded as an image.
    #[error("frame payload is not a decodable image: {0}")]
    InvalidFrame(String),

    /// The model is not loaded or the backend is unreachable.
    #[error("detector unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Pose inference backend.
#[async_trait]
pub trait PoseDetector: Send + Sync {
    async fn detect(&self, frame: &VideoFrame) -> Result<PoseDetection, DetectorError>;
}

/// Face inference backend.  `Ok(None)` means no face in the frame.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    async fn detect(&self, frame: &VideoFrame) -> Result<Option<FaceDetection>, DetectorError>;
}

// ---------------------------------------------------------------------------
// Test doubles  (test-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use mock::{MockFaceDetector, MockPoseDetector};

#[cfg(test)]
mod mock {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// Replays scripted pose results in order, then repeats `fallback`.
    pub struct MockPoseDetector {
        script: Mutex<VecDeque<Result<PoseDetection, DetectorError>>>,
        fallback: Result<PoseDetection, DetectorError>,
        calls: AtomicUsize,
    }

    impl MockPoseDetector {
        /// Always return `pose`.
        pub fn always(pose: PoseDetection) -> Self {
            Self::scripted(Vec::new(), Ok(pose))
        }

        /// Always fail.
        pub fn failing() -> Self {
            Self::scripted(
                Vec::new(),
                Err(DetectorError::Inference("mock failure".into())),
            )
        }

        pub fn scripted(
            script: Vec<Result<PoseDetection, DetectorError>>,
            fallback: Result<PoseDetection, DetectorError>,
        ) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PoseDetector for MockPoseDetector {
        async fn detect(&self, _frame: &VideoFrame) -> Result<PoseDetection, DetectorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| self.fallback.clone())
        }
    }

    /// Replays scripted face results in order, then repeats `fallback`.
    pub struct MockFaceDetector {
        script: Mutex<VecDeque<Result<Option<FaceDetection>, DetectorError>>>,
        fallback: Result<Option<FaceDetection>, DetectorError>,
    }

    impl MockFaceDetector {
        /// A face is always found.
        pub fn visible() -> Self {
            Self::scripted(Vec::new(), Ok(Some(face())))
        }

        /// No face is ever found.
        pub fn hidden() -> Self {
            Self::scripted(Vec::new(), Ok(None))
        }

        pub fn scripted(
            script: Vec<Result<Option<FaceDetection>, DetectorError>>,
            fallback: Result<Option<FaceDetection>, DetectorError>,
        ) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback,
            }
        }
    }

    #[async_trait]
    impl FaceDetector for MockFaceDetector {
        async fn detect(
            &self,
            _frame: &VideoFrame,
        ) -> Result<Option<FaceDetection>, DetectorError> {
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| self.fallback.clone())
        }
    }

    /// A plausible face detection.
    pub fn face() -> FaceDetection {
        FaceDetection {
            confidence: 0.9,
            bounding_box: Some(BoundingBox {
                x: 280.0,
                y: 100.0,
                width: 80.0,
                height: 100.0,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
