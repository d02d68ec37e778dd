//! Video path: bounded frame queue → pose/face detection → quality grade.
//!
//! # Pipeline
//!
//! ```text
//! decode_video_frame → FrameQueue (drop-oldest) → VideoQualityProcessor
//!                    → PoseDetector / FaceDetector → GazeClassifier
//!                    → finalize → QualityReport
//! ```
//!
//! | Module        | Responsibility                                        |
//! |---------------|-------------------------------------------------------|
//! | [`queue`]     | Fixed-capacity FIFO with backpressure accounting      |
//! | [`detector`]  | Async pose/face detector traits                       |
//! | [`gaze`]      | Keypoint geometry → facing / away / undetermined      |
//! | [`grade`]     | Analysis rate, grade bands, [`QualityReport`]         |
//! | [`processor`] | `Idle → Sampling → Finalized` session state machine   |

pub mod detector;
pub mod gaze;
pub mod grade;
pub mod processor;
pub mod queue;

pub use detector::{
    BoundingBox, DetectorError, FaceDetection, FaceDetector, Keypoint, PoseDetection,
    PoseDetector,
};
pub use gaze::{BodyPart, GazeClass, GazeClassifier, GazeSummary};
pub use grade::{
    analysis_rate, GradeInputs, GradingPolicy, QualityGrade, QualityReport, Verdict, GOOD_FROM,
    POOR_BELOW,
};
pub use processor::{
    FaceObservation, FrameObservation, FrameOutcome, ProcessorError, ProcessorState,
    SamplingStats, VideoQualityProcessor,
};
pub use queue::{FrameQueue, QueuedFrame, DEFAULT_QUEUE_CAPACITY};

#[cfg(test)]
pub use detector::{MockFaceDetector, MockPoseDetector};
