use thiserror::Error;

use crate::config::GateConfig;

use super::keypoint::{KeypointIndex, PoseLandmarkSet};

/// 品質ゲートの棄却理由
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GateRejection {
    #[error("mean keypoint confidence {mean:.3} is below {floor}")]
    LowMeanConfidence { mean: f64, floor: f64 },
    #[error("no shoulder keypoint above {threshold}")]
    NoShoulders { threshold: f64 },
    #[error("no hip keypoint above {threshold}")]
    NoHips { threshold: f64 },
    #[error("no knee or ankle keypoint above {threshold}")]
    NoLegs { threshold: f64 },
}

const SHOULDERS: &[KeypointIndex] = &[KeypointIndex::LeftShoulder, KeypointIndex::RightShoulder];
const HIPS: &[KeypointIndex] = &[KeypointIndex::LeftHip, KeypointIndex::RightHip];
const LEGS: &[KeypointIndex] = &[
    KeypointIndex::LeftKnee,
    KeypointIndex::RightKnee,
    KeypointIndex::LeftAnkle,
    KeypointIndex::RightAnkle,
];

/// 姿勢品質ゲート
///
/// 明らかに使えない検出だけを落とす緩いゲート。撮影品質の保証はしない。
/// 4つのチェックは独立で、どれか1つでも落ちればビュー全体を棄却する。
#[derive(Debug, Clone)]
pub struct QualityGate {
    min_mean_confidence: f64,
    structure_confidence: f64,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self::from_config(&GateConfig::default())
    }
}

impl QualityGate {
    pub fn new(min_mean_confidence: f64, structure_confidence: f64) -> Self {
        Self {
            min_mean_confidence,
            structure_confidence,
        }
    }

    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(config.min_mean_confidence, config.structure_confidence)
    }

    /// ビューを検査（順序: 平均信頼度 → 肩 → 腰 → 脚）
    pub fn check(&self, pose: &PoseLandmarkSet) -> Result<(), GateRejection> {
        let mean = pose.average_confidence();
        if mean.is_nan() || mean < self.min_mean_confidence {
            return Err(GateRejection::LowMeanConfidence {
                mean,
                floor: self.min_mean_confidence,
            });
        }

        let threshold = self.structure_confidence;
        if !self.any_visible(pose, SHOULDERS) {
            return Err(GateRejection::NoShoulders { threshold });
        }
        if !self.any_visible(pose, HIPS) {
            return Err(GateRejection::NoHips { threshold });
        }
        if !self.any_visible(pose, LEGS) {
            return Err(GateRejection::NoLegs { threshold });
        }
        Ok(())
    }

    fn any_visible(&self, pose: &PoseLandmarkSet, group: &[KeypointIndex]) -> bool {
        group
            .iter()
            .any(|&idx| pose.get(idx).exceeds(self.structure_confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::keypoint::Keypoint;

    fn pose_with_confidence(conf: f64) -> PoseLandmarkSet {
        PoseLandmarkSet::new([Keypoint::new(0.5, 0.5, conf); KeypointIndex::COUNT], 640, 480)
    }

    fn set_conf(pose: &mut PoseLandmarkSet, group: &[KeypointIndex], conf: f64) {
        for &idx in group {
            pose.keypoints[idx as usize].confidence = conf;
        }
    }

    #[test]
    fn test_accepts_confident_pose() {
        let gate = QualityGate::default();
        assert_eq!(gate.check(&pose_with_confidence(0.8)), Ok(()));
    }

    #[test]
    fn test_rejects_low_mean_confidence() {
        let gate = QualityGate::default();
        let result = gate.check(&pose_with_confidence(0.05));
        assert!(matches!(result, Err(GateRejection::LowMeanConfidence { .. })));
    }

    #[test]
    fn test_mean_exactly_at_floor_passes() {
        let gate = QualityGate::new(0.5, 0.1);
        assert_eq!(gate.check(&pose_with_confidence(0.5)), Ok(()));
    }

    #[test]
    fn test_rejects_missing_shoulders() {
        let gate = QualityGate::default();
        let mut pose = pose_with_confidence(0.9);
        set_conf(&mut pose, SHOULDERS, 0.1);
        assert_eq!(
            gate.check(&pose),
            Err(GateRejection::NoShoulders { threshold: 0.1 })
        );
    }

    #[test]
    fn test_one_shoulder_is_enough() {
        let gate = QualityGate::default();
        let mut pose = pose_with_confidence(0.9);
        pose.keypoints[KeypointIndex::LeftShoulder as usize].confidence = 0.0;
        assert_eq!(gate.check(&pose), Ok(()));
    }

    #[test]
    fn test_rejects_missing_hips() {
        let gate = QualityGate::default();
        let mut pose = pose_with_confidence(0.9);
        set_conf(&mut pose, HIPS, 0.02);
        assert_eq!(gate.check(&pose), Err(GateRejection::NoHips { threshold: 0.1 }));
    }

    #[test]
    fn test_rejects_missing_legs() {
        let gate = QualityGate::default();
        let mut pose = pose_with_confidence(0.9);
        set_conf(&mut pose, LEGS, 0.0);
        assert_eq!(gate.check(&pose), Err(GateRejection::NoLegs { threshold: 0.1 }));
    }

    #[test]
    fn test_single_ankle_counts_as_legs() {
        let gate = QualityGate::default();
        let mut pose = pose_with_confidence(0.9);
        set_conf(&mut pose, LEGS, 0.0);
        pose.keypoints[KeypointIndex::RightAnkle as usize].confidence = 0.11;
        assert_eq!(gate.check(&pose), Ok(()));
    }

    #[test]
    fn test_nan_confidence_rejected() {
        let gate = QualityGate::default();
        let mut pose = pose_with_confidence(0.9);
        pose.keypoints[0].confidence = f64::NAN;
        assert!(matches!(
            gate.check(&pose),
            Err(GateRejection::LowMeanConfidence { .. })
        ));
    }
}
