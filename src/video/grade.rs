//! Session quality grading.
//!
//! ```text
//! expected       = last_received_timestamp × frame_rate
//! analysis_rate  = min(1, frames_analyzed / expected)
//!
//! rate <  0.5          → poor
//! rate in [0.5, 0.8)   → degraded
//! rate >= 0.8          → good
//! ```
//!
//! A good session is downgraded to degraded when the camera dropped out, or
//! (face detector attached) when the face was visible in fewer than
//! `min_face_visibility` of the checked frames.  Downgrades never go below
//! degraded.  A session with no expected samples is graded poor and flagged
//! as `insufficient_data`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::QualityConfig;

use super::gaze::GazeSummary;

/// Rates below this are poor.
pub const POOR_BELOW: f64 = 0.5;
/// Rates at or above this are good.
pub const GOOD_FROM: f64 = 0.8;

// ---------------------------------------------------------------------------
// QualityGrade
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityGrade {
    Poor,
    Degraded,
    Good,
}

impl QualityGrade {
    /// Band for a measured analysis rate.
    pub fn from_rate(rate: f64) -> Self {
        if rate < POOR_BELOW {
            QualityGrade::Poor
        } else if rate < GOOD_FROM {
            QualityGrade::Degraded
        } else {
            QualityGrade::Good
        }
    }

    /// Lower `Good` to `Degraded`; other grades are unchanged.
    pub fn downgraded(self) -> Self {
        match self {
            QualityGrade::Good => QualityGrade::Degraded,
            other => other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            QualityGrade::Good => "good",
            QualityGrade::Degraded => "degraded",
            QualityGrade::Poor => "poor",
        }
    }
}

impl std::fmt::Display for QualityGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// `frames / expected`, capped at 1.  `None` when nothing was expected.
pub fn analysis_rate(frames_analyzed: u64, expected: f64) -> Option<f64> {
    if !expected.is_finite() || expected <= 0.0 {
        return None;
    }
    Some((frames_analyzed as f64 / expected).min(1.0))
}

// ---------------------------------------------------------------------------
// GradingPolicy
// ---------------------------------------------------------------------------

/// Inputs to a grade that are collected while sampling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradeInputs {
    pub frames_analyzed: u64,
    pub last_received_timestamp: f64,
    /// Time since the last frame arrived.
    pub since_last_frame: Duration,
    /// Fraction of face-checked frames with a face.  `None` when no face
    /// check completed.
    pub face_visibility: Option<f64>,
}

/// Outcome of [`GradingPolicy::grade`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub grade: QualityGrade,
    pub analysis_rate: f64,
    pub expected_sample_count: f64,
    pub camera_drop_detected: bool,
    pub insufficient_data: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradingPolicy {
    pub frame_rate: f64,
    pub camera_drop_timeout: Duration,
    /// Set only when a face detector is attached.
    pub min_face_visibility: Option<f64>,
}

impl GradingPolicy {
    /// Pose-only policy from config.
    ///
    /// A negative or non-finite `camera_drop_timeout_secs` disables the
    /// camera-drop check.
    pub fn from_config(config: &QualityConfig) -> Self {
        Self {
            frame_rate: config.frame_rate,
            camera_drop_timeout: Duration::try_from_secs_f64(config.camera_drop_timeout_secs)
                .unwrap_or(Duration::MAX),
            min_face_visibility: None,
        }
    }

    /// Enable the face-visibility downgrade.
    pub fn with_face_visibility(mut self, min: f64) -> Self {
        self.min_face_visibility = Some(min);
        self
    }

    pub fn grade(&self, inputs: &GradeInputs) -> Verdict {
        let expected = inputs.last_received_timestamp * self.frame_rate;
        let camera_drop_detected = inputs.since_last_frame > self.camera_drop_timeout;

        let Some(rate) = analysis_rate(inputs.frames_analyzed, expected) else {
            return Verdict {
                grade: QualityGrade::Poor,
                analysis_rate: 0.0,
                expected_sample_count: expected.max(0.0),
                camera_drop_detected,
                insufficient_data: true,
            };
        };

        let mut grade = QualityGrade::from_rate(rate);
        if let (Some(min), Some(visible)) = (self.min_face_visibility, inputs.face_visibility) {
            if visible < min {
                grade = grade.downgraded();
            }
        }
        if camera_drop_detected {
            grade = grade.downgraded();
        }

        Verdict {
            grade,
            analysis_rate: rate,
            expected_sample_count: expected,
            camera_drop_detected,
            insufficient_data: false,
        }
    }
}

impl Default for GradingPolicy {
    fn default() -> Self {
        Self::from_config(&QualityConfig::default())
    }
}

// ---------------------------------------------------------------------------
// QualityReport
// ---------------------------------------------------------------------------

/// Final verdict for a session, produced once by finalisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub grade: QualityGrade,
    pub analysis_rate: f64,
    pub expected_sample_count: f64,
    pub frames_analyzed: u64,
    pub frames_failed: u64,
    pub face_not_detected_count: u64,
    pub face_visibility: Option<f64>,
    pub camera_drop_detected: bool,
    pub insufficient_data: bool,
    pub last_received_timestamp: f64,
    pub gaze: GazeSummary,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// 50 s at 2 fps → 100 expected samples.
    fn inputs(frames: u64, since_last: u64) -> GradeInputs {
        GradeInputs {
            frames_analyzed: frames,
            last_received_timestamp: 50.0,
            since_last_frame: Duration::from_secs(since_last),
            face_visibility: None,
        }
    }

    fn pose_only() -> GradingPolicy {
        GradingPolicy::default()
    }

    // ---- Rate bands ---------------------------------------------------------

    #[test]
    fn forty_of_hundred_is_poor() {
        let v = pose_only().grade(&inputs(40, 0));
        assert_eq!(v.grade, QualityGrade::Poor);
        assert!((v.analysis_rate - 0.4).abs() < 1e-12);
        assert!((v.expected_sample_count - 100.0).abs() < 1e-12);
    }

    #[test]
    fn ninety_without_drop_is_good() {
        let v = pose_only().grade(&inputs(90, 1));
        assert_eq!(v.grade, QualityGrade::Good);
        assert!(!v.camera_drop_detected);
    }

    #[test]
    fn ninety_with_drop_is_degraded() {
        let v = pose_only().grade(&inputs(90, 6));
        assert_eq!(v.grade, QualityGrade::Degraded);
        assert!(v.camera_drop_detected);
    }

    #[test]
    fn sixty_is_degraded() {
        assert_eq!(pose_only().grade(&inputs(60, 0)).grade, QualityGrade::Degraded);
    }

    #[test]
    fn band_edges() {
        assert_eq!(QualityGrade::from_rate(0.4999), QualityGrade::Poor);
        assert_eq!(QualityGrade::from_rate(0.5), QualityGrade::Degraded);
        assert_eq!(QualityGrade::from_rate(0.7999), QualityGrade::Degraded);
        assert_eq!(QualityGrade::from_rate(0.8), QualityGrade::Good);
    }

    #[test]
    fn rate_is_capped_at_one() {
        let v = pose_only().grade(&inputs(250, 0));
        assert_eq!(v.analysis_rate, 1.0);
        assert_eq!(v.grade, QualityGrade::Good);
    }

    #[test]
    fn drop_never_lowers_poor() {
        assert_eq!(pose_only().grade(&inputs(10, 60)).grade, QualityGrade::Poor);
    }

    #[test]
    fn timeout_is_strict() {
        assert!(!pose_only().grade(&inputs(90, 5)).camera_drop_detected);
    }

    fn policy_with_timeout(secs: f64) -> GradingPolicy {
        GradingPolicy::from_config(&QualityConfig {
            camera_drop_timeout_secs: secs,
            ..QualityConfig::default()
        })
    }

    #[test]
    fn negative_timeout_never_drops() {
        let policy = policy_with_timeout(-1.0);
        assert_eq!(policy.camera_drop_timeout, Duration::MAX);
        assert!(!policy.grade(&inputs(90, 3_600)).camera_drop_detected);
    }

    #[test]
    fn non_finite_timeout_never_drops() {
        for secs in [f64::NAN, f64::INFINITY] {
            let policy = policy_with_timeout(secs);
            assert_eq!(policy.camera_drop_timeout, Duration::MAX);
            let v = policy.grade(&inputs(90, u64::MAX));
            assert!(!v.camera_drop_detected);
            assert_eq!(v.grade, QualityGrade::Good);
        }
    }

    #[test]
    fn configured_timeout_is_used() {
        let policy = policy_with_timeout(2.5);
        assert_eq!(policy.camera_drop_timeout, Duration::from_millis(2_500));
        assert!(policy.grade(&inputs(90, 3)).camera_drop_detected);
    }

    // ---- Zero expected ------------------------------------------------------

    #[test]
    fn zero_expected_is_insufficient_data() {
        let v = pose_only().grade(&GradeInputs {
            frames_analyzed: 3,
            last_received_timestamp: 0.0,
            since_last_frame: Duration::ZERO,
            face_visibility: None,
        });
        assert_eq!(v.grade, QualityGrade::Poor);
        assert_eq!(v.analysis_rate, 0.0);
        assert!(v.insufficient_data);
    }

    #[test]
    fn analysis_rate_rejects_non_positive_expected() {
        assert_eq!(analysis_rate(5, 0.0), None);
        assert_eq!(analysis_rate(5, -1.0), None);
        assert_eq!(analysis_rate(5, f64::NAN), None);
        assert_eq!(analysis_rate(5, 10.0), Some(0.5));
    }

    // ---- Face visibility ----------------------------------------------------

    #[test]
    fn face_visibility_ignored_in_pose_only_mode() {
        let mut i = inputs(90, 0);
        i.face_visibility = Some(0.0);
        assert_eq!(pose_only().grade(&i).grade, QualityGrade::Good);
    }

    #[test]
    fn low_face_visibility_downgrades_good() {
        let policy = pose_only().with_face_visibility(0.6);
        let mut i = inputs(90, 0);
        i.face_visibility = Some(0.5);
        assert_eq!(policy.grade(&i).grade, QualityGrade::Degraded);

        i.face_visibility = Some(0.6);
        assert_eq!(policy.grade(&i).grade, QualityGrade::Good);
    }

    #[test]
    fn face_and_drop_together_stop_at_degraded() {
        let policy = pose_only().with_face_visibility(0.6);
        let mut i = inputs(90, 30);
        i.face_visibility = Some(0.1);
        assert_eq!(policy.grade(&i).grade, QualityGrade::Degraded);
    }

    #[test]
    fn unknown_visibility_does_not_downgrade() {
        let policy = pose_only().with_face_visibility(0.6);
        assert_eq!(policy.grade(&inputs(90, 0)).grade, QualityGrade::Good);
    }

    #[test]
    fn report_serializes_lowercase_grade() {
        let report = QualityReport {
            grade: QualityGrade::Degraded,
            analysis_rate: 0.6,
            expected_sample_count: 100.0,
            frames_analyzed: 60,
            frames_failed: 0,
            face_not_detected_count: 0,
            face_visibility: None,
            camera_drop_detected: false,
            insufficient_data: false,
            last_received_timestamp: 50.0,
            gaze: GazeSummary::default(),
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"grade\":\"degraded\""), "json: {json}");
    }
}
