//! 部位ごとの計測ルールと抽出器
//!
//! 各ルールは正面ビューの2点間距離（幅）と左側面ビューの水平差（奥行き）を
//! ピクセル空間で求め、単一のスケール係数で一度だけ cm に換算してから
//! 楕円周囲長に通す。補正係数はここでは掛けない（`calibration::apply` の担当）。

use crate::body::{BodyMeasurements, BodyPart, PerPart};
use crate::geometry::{ellipse_perimeter, horizontal_gap, lerp_x, pixel_distance};
use crate::pose::{KeypointIndex, PoseLandmarkSet};

use KeypointIndex::*;

/// 正面の幅: `fraction × |a − b|`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WidthSource {
    pub a: KeypointIndex,
    pub b: KeypointIndex,
    pub fraction: f64,
}

/// 側面の奥行き
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DepthSource {
    /// 奥行きなし（直線距離の部位）
    None,
    /// `fraction × |a.x − b.x|`
    Gap {
        a: KeypointIndex,
        b: KeypointIndex,
        fraction: f64,
    },
    /// from→to を t で内分した点と reference の水平差 × fraction
    Interpolated {
        from: KeypointIndex,
        to: KeypointIndex,
        t: f64,
        reference: KeypointIndex,
        fraction: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rule {
    pub part: BodyPart,
    pub width: WidthSource,
    pub depth: DepthSource,
}

/// ルールの中間値（cm）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartGeometry {
    pub width_cm: f64,
    pub depth_cm: f64,
    /// 補正係数を掛ける前の値
    pub raw_cm: f64,
}

const fn width(a: KeypointIndex, b: KeypointIndex, fraction: f64) -> WidthSource {
    WidthSource { a, b, fraction }
}

/// 固定ルール表（`BodyPart::ALL` と同じ順序）
pub const RULES: [Rule; BodyPart::COUNT] = [
    Rule {
        part: BodyPart::Neck,
        width: width(LeftEar, RightEar, 1.0),
        depth: DepthSource::Gap { a: LeftEar, b: LeftShoulder, fraction: 0.3 },
    },
    Rule {
        part: BodyPart::Shoulders,
        width: width(LeftShoulder, RightShoulder, 1.0),
        depth: DepthSource::None,
    },
    Rule {
        part: BodyPart::Chest,
        width: width(LeftShoulder, RightShoulder, 1.0),
        depth: DepthSource::Gap { a: LeftShoulder, b: LeftHip, fraction: 0.5 },
    },
    Rule {
        part: BodyPart::Waist,
        width: width(LeftHip, RightHip, 0.85),
        depth: DepthSource::Interpolated {
            from: LeftShoulder,
            to: LeftHip,
            t: 0.6,
            reference: LeftShoulder,
            fraction: 0.65,
        },
    },
    Rule {
        part: BodyPart::Hips,
        width: width(LeftHip, RightHip, 1.0),
        depth: DepthSource::Gap { a: LeftHip, b: LeftShoulder, fraction: 0.6 },
    },
    Rule {
        part: BodyPart::Thigh,
        width: width(LeftHip, RightHip, 0.55),
        depth: DepthSource::Interpolated {
            from: LeftHip,
            to: LeftKnee,
            t: 0.3,
            reference: LeftKnee,
            fraction: 0.9,
        },
    },
    Rule {
        part: BodyPart::Calf,
        width: width(LeftKnee, RightKnee, 0.35),
        depth: DepthSource::Interpolated {
            from: LeftKnee,
            to: LeftAnkle,
            t: 0.4,
            reference: LeftAnkle,
            fraction: 0.5,
        },
    },
    Rule {
        part: BodyPart::Bicep,
        width: width(LeftShoulder, LeftElbow, 0.35),
        depth: DepthSource::Interpolated {
            from: LeftShoulder,
            to: LeftElbow,
            t: 0.4,
            reference: LeftElbow,
            fraction: 0.5,
        },
    },
];

pub fn rule_for(part: BodyPart) -> &'static Rule {
    &RULES[part as usize]
}

impl WidthSource {
    fn pixels(&self, front: &PoseLandmarkSet) -> f64 {
        pixel_distance(
            front.get(self.a),
            front.get(self.b),
            front.image_width,
            front.image_height,
        ) * self.fraction
    }
}

impl DepthSource {
    fn pixels(&self, side: &PoseLandmarkSet) -> f64 {
        match *self {
            DepthSource::None => 0.0,
            DepthSource::Gap { a, b, fraction } => {
                horizontal_gap(side.get(a).x, side.get(b).x, side.image_width) * fraction
            }
            DepthSource::Interpolated {
                from,
                to,
                t,
                reference,
                fraction,
            } => {
                let x = lerp_x(side.get(from), side.get(to), t);
                horizontal_gap(x, side.get(reference).x, side.image_width) * fraction
            }
        }
    }
}

impl Rule {
    /// 正面・側面ビューとスケールから中間値を計算
    pub fn evaluate(&self, front: &PoseLandmarkSet, side: &PoseLandmarkSet, scale: f64) -> PartGeometry {
        let width_cm = self.width.pixels(front) * scale;
        let depth_cm = self.depth.pixels(side) * scale;
        let raw_cm = match self.depth {
            DepthSource::None => width_cm,
            _ => ellipse_perimeter(width_cm, depth_cm),
        };
        PartGeometry {
            width_cm,
            depth_cm,
            raw_cm,
        }
    }
}

/// 全部位の中間値を計算
pub fn extract_geometry(front: &PoseLandmarkSet, side: &PoseLandmarkSet, scale: f64) -> PerPart<PartGeometry> {
    PerPart::from_fn(|part| rule_for(part).evaluate(front, side, scale))
}

/// 中間値から補正前の値（cm）だけを取り出す
pub fn raw_measurements(geometry: &PerPart<PartGeometry>) -> BodyMeasurements {
    PerPart::from_fn(|part| geometry[part].raw_cm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Keypoint;

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    fn pose(points: &[(KeypointIndex, f64, f64)], w: u32, h: u32) -> PoseLandmarkSet {
        let mut keypoints = [Keypoint::new(0.5, 0.5, 0.9); KeypointIndex::COUNT];
        for &(idx, x, y) in points {
            keypoints[idx as usize] = Keypoint::new(x, y, 0.9);
        }
        PoseLandmarkSet::new(keypoints, w, h)
    }

    #[test]
    fn test_rules_follow_part_order() {
        for (i, part) in BodyPart::ALL.iter().enumerate() {
            assert_eq!(RULES[i].part, *part);
        }
    }

    #[test]
    fn test_only_shoulders_has_no_depth() {
        for rule in RULES.iter() {
            assert_eq!(rule.depth == DepthSource::None, rule.part == BodyPart::Shoulders);
        }
    }

    #[test]
    fn test_shoulders_is_linear_distance() {
        let front = pose(&[(LeftShoulder, 0.3, 0.3), (RightShoulder, 0.7, 0.3)], 1000, 1000);
        let side = pose(&[], 1000, 1000);
        let g = rule_for(BodyPart::Shoulders).evaluate(&front, &side, 0.5);
        assert!(approx_eq(g.raw_cm, 400.0 * 0.5, 1e-9));
        assert_eq!(g.depth_cm, 0.0);
    }

    #[test]
    fn test_neck_rule() {
        let front = pose(&[(LeftEar, 0.45, 0.1), (RightEar, 0.55, 0.1)], 1000, 1000);
        let side = pose(&[(LeftEar, 0.50, 0.1), (LeftShoulder, 0.40, 0.2)], 800, 1000);
        let g = rule_for(BodyPart::Neck).evaluate(&front, &side, 0.2);
        // 幅 100px, 奥行き 0.1*800*0.3 = 24px
        assert!(approx_eq(g.width_cm, 20.0, 1e-9));
        assert!(approx_eq(g.depth_cm, 4.8, 1e-9));
        assert!(approx_eq(g.raw_cm, ellipse_perimeter(20.0, 4.8), 1e-9));
    }

    #[test]
    fn test_waist_interpolates_from_shoulder() {
        let front = pose(&[(LeftHip, 0.4, 0.5), (RightHip, 0.6, 0.5)], 1000, 1000);
        let side = pose(&[(LeftShoulder, 0.40, 0.3), (LeftHip, 0.50, 0.5)], 1000, 1000);
        let g = rule_for(BodyPart::Waist).evaluate(&front, &side, 1.0);
        // 幅 200*0.85 = 170, 奥行き 0.6*100*0.65 = 39
        assert!(approx_eq(g.width_cm, 170.0, 1e-9));
        assert!(approx_eq(g.depth_cm, 39.0, 1e-9));
    }

    #[test]
    fn test_thigh_gap_measured_to_knee() {
        let front = pose(&[(LeftHip, 0.4, 0.5), (RightHip, 0.6, 0.5)], 1000, 1000);
        let side = pose(&[(LeftHip, 0.50, 0.5), (LeftKnee, 0.60, 0.7)], 1000, 1000);
        let g = rule_for(BodyPart::Thigh).evaluate(&front, &side, 1.0);
        // 内分点 0.53 → 膝まで 70px × 0.9
        assert!(approx_eq(g.width_cm, 110.0, 1e-9));
        assert!(approx_eq(g.depth_cm, 63.0, 1e-9));
    }

    #[test]
    fn test_calf_and_bicep_rules() {
        let front = pose(
            &[
                (LeftKnee, 0.45, 0.7),
                (RightKnee, 0.55, 0.7),
                (LeftShoulder, 0.40, 0.3),
                (LeftElbow, 0.40, 0.45),
            ],
            1000,
            1000,
        );
        let side = pose(
            &[
                (LeftKnee, 0.50, 0.7),
                (LeftAnkle, 0.45, 0.9),
                (LeftShoulder, 0.50, 0.3),
                (LeftElbow, 0.55, 0.45),
            ],
            1000,
            1000,
        );
        let calf = rule_for(BodyPart::Calf).evaluate(&front, &side, 1.0);
        assert!(approx_eq(calf.width_cm, 35.0, 1e-9));
        // 0.6 * 50px * 0.5
        assert!(approx_eq(calf.depth_cm, 15.0, 1e-9));

        let bicep = rule_for(BodyPart::Bicep).evaluate(&front, &side, 1.0);
        assert!(approx_eq(bicep.width_cm, 150.0 * 0.35, 1e-9));
        assert!(approx_eq(bicep.depth_cm, 15.0, 1e-9));
    }

    #[test]
    fn test_scale_applied_once() {
        let front = pose(&[(LeftHip, 0.4, 0.5), (RightHip, 0.6, 0.5)], 1000, 1000);
        let side = pose(&[(LeftShoulder, 0.40, 0.3), (LeftHip, 0.50, 0.5)], 1000, 1000);
        let r1 = raw_measurements(&extract_geometry(&front, &side, 1.0));
        let r2 = raw_measurements(&extract_geometry(&front, &side, 3.0));
        for part in BodyPart::ALL {
            assert!(approx_eq(r2[part], 3.0 * r1[part], 1e-9), "{}", part);
        }
    }

    #[test]
    fn test_side_view_width_used_for_depth() {
        let front = pose(&[(LeftHip, 0.4, 0.5), (RightHip, 0.6, 0.5)], 1000, 1000);
        let narrow = pose(&[(LeftShoulder, 0.40, 0.3), (LeftHip, 0.50, 0.5)], 500, 1000);
        let wide = pose(&[(LeftShoulder, 0.40, 0.3), (LeftHip, 0.50, 0.5)], 1000, 1000);
        let g_narrow = rule_for(BodyPart::Hips).evaluate(&front, &narrow, 1.0);
        let g_wide = rule_for(BodyPart::Hips).evaluate(&front, &wide, 1.0);
        assert!(approx_eq(g_wide.depth_cm, 2.0 * g_narrow.depth_cm, 1e-9));
    }
}
