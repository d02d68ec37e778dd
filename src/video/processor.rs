//! Streaming video-quality state machine.
//!
//! ```text
//! Idle ──first frame──▶ Sampling ──finalize──▶ Finalized
//! Idle ──finalize────────────────────────────▶ Finalized
//! ```
//!
//! [`ProcessorState`] is a value: [`observe`](ProcessorState::observe) and
//! [`finalize`](ProcessorState::finalize) consume it and return the next
//! state, and a `Finalized` state is returned unchanged by both.
//! [`VideoQualityProcessor`] owns one state per session, runs the detectors
//! and feeds their outcomes through those transitions.
//!
//! Frames are processed one at a time: every method takes `&mut self`, so a
//! processor can never have two detector calls in flight.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::codec::VideoFrame;
use crate::config::QualityConfig;

use super::detector::{FaceDetector, PoseDetector};
use super::gaze::{GazeClass, GazeClassifier, GazeSummary};
use super::grade::{GradeInputs, GradingPolicy, QualityReport};

// ---------------------------------------------------------------------------
// ProcessorError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProcessorError {
    #[error("session already finalized")]
    AlreadyFinalized,
}

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

/// What the face detector said about one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceObservation {
    /// No face detector attached, or its call failed.
    NotChecked,
    Visible,
    NotVisible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Analyzed {
        gaze: GazeClass,
        face: FaceObservation,
    },
    /// The pose detector failed; the frame still counts as arrived.
    Failed,
}

/// One processed frame, ready to be folded into the state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameObservation {
    /// Sender-side capture timestamp, in seconds.
    pub timestamp: f64,
    /// When the frame reached the server.
    pub arrived_at: Instant,
    pub outcome: FrameOutcome,
}

// ---------------------------------------------------------------------------
// SamplingStats
// ---------------------------------------------------------------------------

/// Counters accumulated while sampling.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingStats {
    pub frames_analyzed: u64,
    pub frames_failed: u64,
    /// Largest frame timestamp seen.
    pub last_received_timestamp: f64,
    pub face_not_detected_count: u64,
    pub face_checked_count: u64,
    /// Gaze class of every analysed frame, in processing order.
    pub gaze: Vec<GazeClass>,
    /// Arrival time of the latest frame; the session start until one arrives.
    pub last_frame_wall_time: Instant,
}

impl SamplingStats {
    pub fn new(started_at: Instant) -> Self {
        Self {
            frames_analyzed: 0,
            frames_failed: 0,
            last_received_timestamp: 0.0,
            face_not_detected_count: 0,
            face_checked_count: 0,
            gaze: Vec::new(),
            last_frame_wall_time: started_at,
        }
    }

    fn record(&mut self, obs: &FrameObservation) {
        if obs.timestamp > self.last_received_timestamp {
            self.last_received_timestamp = obs.timestamp;
        }
        if obs.arrived_at > self.last_frame_wall_time {
            self.last_frame_wall_time = obs.arrived_at;
        }

        match obs.outcome {
            FrameOutcome::Failed => self.frames_failed += 1,
            FrameOutcome::Analyzed { gaze, face } => {
                self.frames_analyzed += 1;
                self.gaze.push(gaze);
                match face {
                    FaceObservation::NotChecked => {}
                    FaceObservation::Visible => self.face_checked_count += 1,
                    FaceObservation::NotVisible => {
                        self.face_checked_count += 1;
                        self.face_not_detected_count += 1;
                    }
                }
            }
        }
    }

    /// Fraction of face-checked frames that had a face.
    pub fn face_visibility(&self) -> Option<f64> {
        if self.face_checked_count == 0 {
            return None;
        }
        Some(1.0 - self.face_not_detected_count as f64 / self.face_checked_count as f64)
    }

    fn into_report(self, now: Instant, policy: &GradingPolicy) -> QualityReport {
        let face_visibility = self.face_visibility();
        let verdict = policy.grade(&GradeInputs {
            frames_analyzed: self.frames_analyzed,
            last_received_timestamp: self.last_received_timestamp,
            since_last_frame: now.saturating_duration_since(self.last_frame_wall_time),
            face_visibility,
        });

        QualityReport {
            grade: verdict.grade,
            analysis_rate: verdict.analysis_rate,
            expected_sample_count: verdict.expected_sample_count,
            frames_analyzed: self.frames_analyzed,
            frames_failed: self.frames_failed,
            face_not_detected_count: self.face_not_detected_count,
            face_visibility,
            camera_drop_detected: verdict.camera_drop_detected,
            insufficient_data: verdict.insufficient_data,
            last_received_timestamp: self.last_received_timestamp,
            gaze: GazeSummary::from_sequence(&self.gaze),
        }
    }
}

// ---------------------------------------------------------------------------
// ProcessorState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessorState {
    Idle { started_at: Instant },
    Sampling(SamplingStats),
    Finalized(QualityReport),
}

impl ProcessorState {
    /// `Idle` session whose clock started at `started_at`.
    pub fn new(started_at: Instant) -> Self {
        ProcessorState::Idle { started_at }
    }

    /// Fold one frame into the state.  `Finalized` is returned unchanged.
    pub fn observe(self, obs: FrameObservation) -> Self {
        let mut stats = match self {
            ProcessorState::Idle { started_at } => SamplingStats::new(started_at),
            ProcessorState::Sampling(stats) => stats,
            finalized @ ProcessorState::Finalized(_) => return finalized,
        };
        stats.record(&obs);
        ProcessorState::Sampling(stats)
    }

    /// Grade the session as of `now`.  `Finalized` is returned unchanged.
    pub fn finalize(self, now: Instant, policy: &GradingPolicy) -> Self {
        let stats = match self {
            ProcessorState::Idle { started_at } => SamplingStats::new(started_at),
            ProcessorState::Sampling(stats) => stats,
            finalized @ ProcessorState::Finalized(_) => return finalized,
        };
        ProcessorState::Finalized(stats.into_report(now, policy))
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self, ProcessorState::Finalized(_))
    }

    pub fn stats(&self) -> Option<&SamplingStats> {
        match self {
            ProcessorState::Sampling(stats) => Some(stats),
            _ => None,
        }
    }

    pub fn report(&self) -> Option<&QualityReport> {
        match self {
            ProcessorState::Finalized(report) => Some(report),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProcessorState::Idle { .. } => "Idle",
            ProcessorState::Sampling(_) => "Sampling",
            ProcessorState::Finalized(_) => "Finalized",
        }
    }
}

// ---------------------------------------------------------------------------
// VideoQualityProcessor
// ---------------------------------------------------------------------------

/// Per-session processor: detectors in, [`QualityReport`] out.
pub struct VideoQualityProcessor {
    pose: Arc<dyn PoseDetector>,
    face: Option<Arc<dyn FaceDetector>>,
    classifier: GazeClassifier,
    policy: GradingPolicy,
    min_face_visibility: f64,
    started_at: Instant,
    state: ProcessorState,
}

impl VideoQualityProcessor {
    /// Pose-only processor.  The session clock starts now.
    pub fn new(pose: Arc<dyn PoseDetector>, config: &QualityConfig) -> Self {
        let started_at = Instant::now();
        Self {
            pose,
            face: None,
            classifier: GazeClassifier::from_config(config),
            policy: GradingPolicy::from_config(config),
            min_face_visibility: config.min_face_visibility,
            started_at,
            state: ProcessorState::new(started_at),
        }
    }

    /// Attach a face detector; enables the face-visibility downgrade.
    pub fn with_face_detector(mut self, face: Arc<dyn FaceDetector>) -> Self {
        self.face = Some(face);
        self.policy = self.policy.with_face_visibility(self.min_face_visibility);
        self
    }

    pub fn state(&self) -> &ProcessorState {
        &self.state
    }

    pub fn is_finalized(&self) -> bool {
        self.state.is_finalized()
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Analyse a frame that arrived just now.
    pub async fn process_frame(&mut self, frame: &VideoFrame) -> Result<FrameOutcome, ProcessorError> {
        self.process_frame_at(frame, Instant::now()).await
    }

    /// Analyse a frame that arrived at `arrived_at`.
    ///
    /// Detector failures are recorded in the stats, not returned.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::AlreadyFinalized`] once the session has been
    /// graded.
    pub async fn process_frame_at(
        &mut self,
        frame: &VideoFrame,
        arrived_at: Instant,
    ) -> Result<FrameOutcome, ProcessorError> {
        if self.state.is_finalized() {
            return Err(ProcessorError::AlreadyFinalized);
        }

        let seq = frame.header.seq;
        let outcome = match self.pose.detect(frame).await {
            Ok(pose) => {
                let gaze = self.classifier.classify(&pose);
                let face = self.check_face(frame).await;
                log::debug!("processor: frame seq={seq} gaze={gaze} face={face:?}");
                FrameOutcome::Analyzed { gaze, face }
            }
            Err(e) => {
                log::warn!("processor: pose detection failed for seq={seq}: {e}");
                FrameOutcome::Failed
            }
        };

        let obs = FrameObservation {
            timestamp: frame.header.timestamp,
            arrived_at,
            outcome,
        };
        self.transition(|state| state.observe(obs));
        Ok(outcome)
    }

    /// Grade the session as of now.
    pub fn finalize(&mut self) -> Result<QualityReport, ProcessorError> {
        self.finalize_at(Instant::now())
    }

    /// Grade the session as of `now`.  Succeeds exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::AlreadyFinalized`] on every later call.
    pub fn finalize_at(&mut self, now: Instant) -> Result<QualityReport, ProcessorError> {
        if self.state.is_finalized() {
            return Err(ProcessorError::AlreadyFinalized);
        }

        let policy = self.policy;
        self.transition(|state| state.finalize(now, &policy));

        let report = self
            .state
            .report()
            .cloned()
            .ok_or(ProcessorError::AlreadyFinalized)?;
        log::info!(
            "processor: finalized grade={} rate={:.2} analysed={} failed={} drop={}",
            report.grade,
            report.analysis_rate,
            report.frames_analyzed,
            report.frames_failed,
            report.camera_drop_detected
        );
        Ok(report)
    }

    async fn check_face(&self, frame: &VideoFrame) -> FaceObservation {
        let Some(face) = &self.face else {
            return FaceObservation::NotChecked;
        };
        match face.detect(frame).await {
            Ok(Some(_)) => FaceObservation::Visible,
            Ok(None) => FaceObservation::NotVisible,
            Err(e) => {
                log::warn!("processor: face detection failed for seq={}: {e}", frame.header.seq);
                FaceObservation::NotChecked
            }
        }
    }

    fn transition(&mut self, f: impl FnOnce(ProcessorState) -> ProcessorState) {
        let current = std::mem::replace(&mut self.state, ProcessorState::new(self.started_at));
        self.state = f(current);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
