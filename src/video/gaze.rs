//! Gaze classification from pose keypoints.
//!
//! The classifier reads the nose, shoulders, elbows, wrists and hips, each
//! gated on its own confidence.  Image coordinates are assumed (y grows
//! downward).
//!
//! The body axis (midpoint, width and shoulder line) comes from the
//! shoulders.  When a shoulder is missing but both hips are present, the axis
//! is estimated from the hips: the shoulder width is taken as
//! `SHOULDER_PER_HIP_SPAN` × hip span and the shoulder line sits
//! `TORSO_PER_HIP_SPAN` × hip span above the hip midpoint.
//!
//! Rules, in order:
//!
//! | Condition                                              | Result          |
//! |--------------------------------------------------------|-----------------|
//! | no body axis (shoulders and hips incomplete)           | `Undetermined`  |
//! | nose missing, axis present                             | `LookingAway`   |
//! | body seen side-on (axis width collapses)               | `LookingAway`   |
//! | a wrist or elbow raised over the shoulder line near the nose | `Undetermined` |
//! | nose below the shoulder line                           | `LookingAway`   |
//! | nose offset ≤ `max_nose_offset` × shoulder width       | `FacingCamera`  |
//! | otherwise                                              | `LookingAway`   |
//!
//! Keypoints below `min_keypoint_confidence` are treated as missing.

use serde::{Deserialize, Serialize};

use crate::config::QualityConfig;

use super::detector::{Keypoint, PoseDetection};

/// Body widths narrower than this are treated as a side-on body.
const MIN_SHOULDER_WIDTH: f32 = 1e-3;

/// Estimated shoulder width per unit of hip span.
const SHOULDER_PER_HIP_SPAN: f32 = 1.4;

/// Estimated hip-to-shoulder height per unit of hip span.
const TORSO_PER_HIP_SPAN: f32 = 1.5;

/// Limbs checked for covering the face.
const RAISED_LIMBS: [BodyPart; 4] = [
    BodyPart::LeftWrist,
    BodyPart::RightWrist,
    BodyPart::LeftElbow,
    BodyPart::RightElbow,
];

// ---------------------------------------------------------------------------
// GazeClass
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GazeClass {
    FacingCamera,
    LookingAway,
    Undetermined,
}

impl GazeClass {
    pub fn label(self) -> &'static str {
        match self {
            GazeClass::FacingCamera => "facing camera",
            GazeClass::LookingAway => "looking away",
            GazeClass::Undetermined => "undetermined",
        }
    }
}

impl std::fmt::Display for GazeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// BodyPart
// ---------------------------------------------------------------------------

/// The landmarks the classifier looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyPart {
    Nose,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
}

impl BodyPart {
    /// Map a detector landmark name.  Matching ignores case and `_`/`-`, so
    /// `"left_shoulder"`, `"leftShoulder"` and `"LEFT-SHOULDER"` all match.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "nose" => Some(BodyPart::Nose),
            "leftshoulder" => Some(BodyPart::LeftShoulder),
            "rightshoulder" => Some(BodyPart::RightShoulder),
            "leftelbow" => Some(BodyPart::LeftElbow),
            "rightelbow" => Some(BodyPart::RightElbow),
            "leftwrist" => Some(BodyPart::LeftWrist),
            "rightwrist" => Some(BodyPart::RightWrist),
            "lefthip" => Some(BodyPart::LeftHip),
            "righthip" => Some(BodyPart::RightHip),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// GazeClassifier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct GazeClassifier {
    min_confidence: f32,
    max_nose_offset: f32,
}

impl GazeClassifier {
    pub fn new(min_confidence: f32, max_nose_offset: f32) -> Self {
        Self {
            min_confidence,
            max_nose_offset,
        }
    }

    pub fn from_config(config: &QualityConfig) -> Self {
        Self::new(config.min_keypoint_confidence, config.max_nose_offset)
    }

    pub fn classify(&self, pose: &PoseDetection) -> GazeClass {
        let Some(axis) = self.body_axis(pose) else {
            return GazeClass::Undetermined;
        };

        let Some(nose) = self.find(pose, BodyPart::Nose) else {
            return GazeClass::LookingAway;
        };

        if axis.width < MIN_SHOULDER_WIDTH {
            return GazeClass::LookingAway;
        }

        let limb_over_face = RAISED_LIMBS
            .into_iter()
            .filter_map(|part| self.find(pose, part))
            .any(|limb| limb.y <= axis.shoulder_y && (limb.x - nose.x).abs() <= axis.width);
        if limb_over_face {
            return GazeClass::Undetermined;
        }

        if nose.y > axis.shoulder_y {
            return GazeClass::LookingAway;
        }

        if (nose.x - axis.mid_x).abs() / axis.width <= self.max_nose_offset {
            GazeClass::FacingCamera
        } else {
            GazeClass::LookingAway
        }
    }

    /// Shoulder axis, or one estimated from the hips when a shoulder is
    /// missing.
    fn body_axis(&self, pose: &PoseDetection) -> Option<BodyAxis> {
        if let (Some(l), Some(r)) = (
            self.find(pose, BodyPart::LeftShoulder),
            self.find(pose, BodyPart::RightShoulder),
        ) {
            return Some(BodyAxis {
                mid_x: (l.x + r.x) / 2.0,
                shoulder_y: (l.y + r.y) / 2.0,
                width: (l.x - r.x).abs(),
            });
        }

        let l = self.find(pose, BodyPart::LeftHip)?;
        let r = self.find(pose, BodyPart::RightHip)?;
        let span = (l.x - r.x).abs();
        Some(BodyAxis {
            mid_x: (l.x + r.x) / 2.0,
            shoulder_y: (l.y + r.y) / 2.0 - span * TORSO_PER_HIP_SPAN,
            width: span * SHOULDER_PER_HIP_SPAN,
        })
    }

    /// Most confident keypoint for `part` that clears the threshold.
    fn find<'a>(&self, pose: &'a PoseDetection, part: BodyPart) -> Option<&'a Keypoint> {
        pose.keypoints
            .iter()
            .filter(|k| k.confidence >= self.min_confidence)
            .filter(|k| BodyPart::from_name(&k.name) == Some(part))
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    }
}

/// Horizontal centre, shoulder line and width of the torso.
#[derive(Debug, Clone, Copy)]
struct BodyAxis {
    mid_x: f32,
    shoulder_y: f32,
    width: f32,
}

impl Default for GazeClassifier {
    fn default() -> Self {
        Self::from_config(&QualityConfig::default())
    }
}

// ---------------------------------------------------------------------------
// GazeSummary
// ---------------------------------------------------------------------------

/// Per-class counts over a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GazeSummary {
    pub facing_camera: u64,
    pub looking_away: u64,
    pub undetermined: u64,
    /// `facing_camera / total`, or `0.0` for an empty session.
    pub facing_ratio: f64,
}

impl GazeSummary {
    pub fn from_sequence(classes: &[GazeClass]) -> Self {
        let mut summary = Self::default();
        for class in classes {
            match class {
                GazeClass::FacingCamera => summary.facing_camera += 1,
                GazeClass::LookingAway => summary.looking_away += 1,
                GazeClass::Undetermined => summary.undetermined += 1,
            }
        }
        let total = summary.total();
        if total > 0 {
            summary.facing_ratio = summary.facing_camera as f64 / total as f64;
        }
        summary
    }

    pub fn total(&self) -> u64 {
        self.facing_camera + self.looking_away + self.undetermined
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn kp(name: &str, x: f32, y: f32) -> Keypoint {
        Keypoint::new(name, x, y, 0.9)
    }

    /// Upright subject centred in a 640x480 frame.
    fn upright(nose_x: f32) -> PoseDetection {
        PoseDetection {
            keypoints: vec![
                kp("nose", nose_x, 150.0),
                kp("left_shoulder", 400.0, 300.0),
                kp("right_shoulder", 240.0, 300.0),
            ],
            confidence: 0.9,
        }
    }

    fn classifier() -> GazeClassifier {
        GazeClassifier::new(0.3, 0.35)
    }

    #[test]
    fn centred_nose_faces_camera() {
        assert_eq!(classifier().classify(&upright(320.0)), GazeClass::FacingCamera);
    }

    #[test]
    fn turned_head_looks_away() {
        // Offset 80 / width 160 = 0.5 > 0.35.
        assert_eq!(classifier().classify(&upright(400.0)), GazeClass::LookingAway);
    }

    #[test]
    fn offset_exactly_at_limit_faces_camera() {
        // Offset 40 / width 160 = 0.25.
        let c = GazeClassifier::new(0.3, 0.25);
        assert_eq!(c.classify(&upright(360.0)), GazeClass::FacingCamera);
    }

    #[test]
    fn no_shoulders_is_undetermined() {
        let pose = PoseDetection {
            keypoints: vec![kp("nose", 320.0, 150.0), kp("left_shoulder", 400.0, 300.0)],
            confidence: 0.5,
        };
        assert_eq!(classifier().classify(&pose), GazeClass::Undetermined);
        assert_eq!(
            classifier().classify(&PoseDetection::default()),
            GazeClass::Undetermined
        );
    }

    #[test]
    fn missing_nose_looks_away() {
        let mut pose = upright(320.0);
        pose.keypoints.retain(|k| k.name != "nose");
        assert_eq!(classifier().classify(&pose), GazeClass::LookingAway);
    }

    #[test]
    fn low_confidence_nose_counts_as_missing() {
        let mut pose = upright(320.0);
        pose.keypoints[0].confidence = 0.1;
        assert_eq!(classifier().classify(&pose), GazeClass::LookingAway);
    }

    #[test]
    fn profile_view_looks_away() {
        let pose = PoseDetection {
            keypoints: vec![
                kp("nose", 330.0, 150.0),
                kp("left_shoulder", 320.0, 300.0),
                kp("right_shoulder", 320.0, 302.0),
            ],
            confidence: 0.9,
        };
        assert_eq!(classifier().classify(&pose), GazeClass::LookingAway);
    }

    #[test]
    fn head_down_looks_away() {
        let mut pose = upright(320.0);
        pose.keypoints[0].y = 320.0;
        assert_eq!(classifier().classify(&pose), GazeClass::LookingAway);
    }

    #[test]
    fn raised_hand_near_face_is_undetermined() {
        let mut pose = upright(320.0);
        pose.keypoints.push(kp("right_wrist", 300.0, 160.0));
        assert_eq!(classifier().classify(&pose), GazeClass::Undetermined);
    }

    #[test]
    fn resting_hand_does_not_block() {
        let mut pose = upright(320.0);
        pose.keypoints.push(kp("left_wrist", 420.0, 460.0));
        assert_eq!(classifier().classify(&pose), GazeClass::FacingCamera);
    }

    #[test]
    fn raised_elbow_near_face_is_undetermined() {
        let mut pose = upright(320.0);
        pose.keypoints.push(kp("right_elbow", 300.0, 250.0));
        assert_eq!(classifier().classify(&pose), GazeClass::Undetermined);
    }

    #[test]
    fn lowered_elbow_does_not_block() {
        let mut pose = upright(320.0);
        pose.keypoints.push(kp("left_elbow", 200.0, 380.0));
        assert_eq!(classifier().classify(&pose), GazeClass::FacingCamera);
    }

    /// Nose and hips only; hips span 120 px, shoulder line estimated at y=270.
    fn hips_only(nose_x: f32) -> PoseDetection {
        PoseDetection {
            keypoints: vec![
                kp("nose", nose_x, 150.0),
                kp("left_hip", 380.0, 450.0),
                kp("right_hip", 260.0, 450.0),
            ],
            confidence: 0.7,
        }
    }

    #[test]
    fn hips_stand_in_for_missing_shoulders() {
        assert_eq!(classifier().classify(&hips_only(320.0)), GazeClass::FacingCamera);
        // Offset 100 / estimated width 168 > 0.35.
        assert_eq!(classifier().classify(&hips_only(420.0)), GazeClass::LookingAway);
    }

    #[test]
    fn low_confidence_shoulder_falls_back_to_hips() {
        let mut pose = hips_only(320.0);
        pose.keypoints.push(Keypoint::new("left_shoulder", 400.0, 300.0, 0.1));
        pose.keypoints.push(kp("right_shoulder", 240.0, 300.0));
        assert_eq!(classifier().classify(&pose), GazeClass::FacingCamera);
    }

    #[test]
    fn raised_elbow_with_hip_axis_is_undetermined() {
        let mut pose = hips_only(320.0);
        pose.keypoints.push(kp("left_elbow", 340.0, 200.0));
        assert_eq!(classifier().classify(&pose), GazeClass::Undetermined);
    }

    #[test]
    fn single_hip_without_shoulders_is_undetermined() {
        let mut pose = hips_only(320.0);
        pose.keypoints.retain(|k| k.name != "right_hip");
        assert_eq!(classifier().classify(&pose), GazeClass::Undetermined);
    }

    #[test]
    fn body_part_names_normalize() {
        assert_eq!(BodyPart::from_name("leftShoulder"), Some(BodyPart::LeftShoulder));
        assert_eq!(BodyPart::from_name("RIGHT-WRIST"), Some(BodyPart::RightWrist));
        assert_eq!(BodyPart::from_name("Nose"), Some(BodyPart::Nose));
        assert_eq!(BodyPart::from_name("left_hip"), Some(BodyPart::LeftHip));
        assert_eq!(BodyPart::from_name("rightHip"), Some(BodyPart::RightHip));
        assert_eq!(BodyPart::from_name("left_elbow"), Some(BodyPart::LeftElbow));
        assert_eq!(BodyPart::from_name("RIGHT_ELBOW"), Some(BodyPart::RightElbow));
        assert_eq!(BodyPart::from_name("left_ear"), None);
    }

    #[test]
    fn summary_counts_and_ratio() {
        let s = GazeSummary::from_sequence(&[
            GazeClass::FacingCamera,
            GazeClass::FacingCamera,
            GazeClass::LookingAway,
            GazeClass::Undetermined,
        ]);
        assert_eq!((s.facing_camera, s.looking_away, s.undetermined), (2, 1, 1));
        assert_eq!(s.total(), 4);
        assert!((s.facing_ratio - 0.5).abs() < 1e-12);
    }

    #[test]
    fn empty_summary_ratio_is_zero() {
        let s = GazeSummary::from_sequence(&[]);
        assert_eq!(s.total(), 0);
        assert_eq!(s.facing_ratio, 0.0);
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&GazeClass::FacingCamera).unwrap();
        assert_eq!(json, "\"facing_camera\"");
    }
}
