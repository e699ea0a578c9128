//! 正規化キーポイント → 物理距離・周囲長近似（状態なしの純関数）

use nalgebra::Vector2;
use std::f64::consts::PI;

use crate::pose::{Keypoint, KeypointIndex, PoseLandmarkSet};

/// 正規化座標をピクセル空間に戻したユークリッド距離
pub fn pixel_distance(a: &Keypoint, b: &Keypoint, width: u32, height: u32) -> f64 {
    let scale = Vector2::new(width as f64, height as f64);
    let d = Vector2::new(a.x - b.x, a.y - b.y).component_mul(&scale);
    d.norm()
}

/// 2点間の水平方向ピクセル差（絶対値）
pub fn horizontal_gap(a_x: f64, b_x: f64, width: u32) -> f64 {
    ((a_x - b_x) * width as f64).abs()
}

/// a→b を t (0..1) で内分した点の x 座標
pub fn lerp_x(a: &Keypoint, b: &Keypoint, t: f64) -> f64 {
    a.x + (b.x - a.x) * t
}

/// 正面ビューの 鼻〜両足首中点 のピクセル長
pub fn pixel_height(front: &PoseLandmarkSet) -> f64 {
    let nose = front.get(KeypointIndex::Nose);
    let left_ankle = front.get(KeypointIndex::LeftAnkle);
    let right_ankle = front.get(KeypointIndex::RightAnkle);

    let avg_ankle = Keypoint::new(
        (left_ankle.x + right_ankle.x) / 2.0,
        (left_ankle.y + right_ankle.y) / 2.0,
        0.0,
    );

    pixel_distance(nose, &avg_ankle, front.image_width, front.image_height)
}

/// cm/px スケール係数
///
/// ピクセル高が 0 に近いと無限大に発散する。ここでは検査しないので、
/// 呼び出し側で非有限・非正を失敗として扱うこと。
pub fn scale_factor(front: &PoseLandmarkSet, user_height_cm: f64) -> f64 {
    user_height_cm / pixel_height(front)
}

/// 幅・奥行きを直径とする楕円の周囲長近似 π·√(2(a²+b²))
///
/// 厳密な楕円積分ではない。奥行き 0 のときは π·w/√2 になり、π·w にはならない。
pub fn ellipse_perimeter(front_width: f64, side_depth: f64) -> f64 {
    let a = front_width / 2.0;
    let b = side_depth / 2.0;
    PI * (2.0 * (a * a + b * b)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    fn front_pose(nose: (f64, f64), left_ankle: (f64, f64), right_ankle: (f64, f64)) -> PoseLandmarkSet {
        let mut keypoints = [Keypoint::new(0.5, 0.5, 0.9); KeypointIndex::COUNT];
        keypoints[KeypointIndex::Nose as usize] = Keypoint::new(nose.0, nose.1, 0.9);
        keypoints[KeypointIndex::LeftAnkle as usize] = Keypoint::new(left_ankle.0, left_ankle.1, 0.9);
        keypoints[KeypointIndex::RightAnkle as usize] = Keypoint::new(right_ankle.0, right_ankle.1, 0.9);
        PoseLandmarkSet::new(keypoints, 1000, 2000)
    }

    #[test]
    fn test_pixel_distance_denormalizes_each_axis() {
        let a = Keypoint::new(0.0, 0.0, 1.0);
        let b = Keypoint::new(0.3, 0.2, 1.0);
        // (0.3*100, 0.2*200) = (30, 40)
        assert!(approx_eq(pixel_distance(&a, &b, 100, 200), 50.0, 1e-9));
        assert!(approx_eq(pixel_distance(&b, &a, 100, 200), 50.0, 1e-9));
    }

    #[test]
    fn test_pixel_distance_same_point_is_zero() {
        let a = Keypoint::new(0.4, 0.7, 0.2);
        assert_eq!(pixel_distance(&a, &a, 640, 480), 0.0);
    }

    #[test]
    fn test_horizontal_gap_ignores_sign() {
        assert!(approx_eq(horizontal_gap(0.2, 0.5, 100), 30.0, 1e-9));
        assert!(approx_eq(horizontal_gap(0.5, 0.2, 100), 30.0, 1e-9));
    }

    #[test]
    fn test_lerp_x() {
        let a = Keypoint::new(0.2, 0.0, 1.0);
        let b = Keypoint::new(0.6, 1.0, 1.0);
        assert!(approx_eq(lerp_x(&a, &b, 0.0), 0.2, 1e-12));
        assert!(approx_eq(lerp_x(&a, &b, 0.25), 0.3, 1e-12));
        assert!(approx_eq(lerp_x(&a, &b, 1.0), 0.6, 1e-12));
    }

    #[test]
    fn test_scale_factor_uses_ankle_midpoint() {
        let pose = front_pose((0.5, 0.1), (0.45, 0.9), (0.55, 0.9));
        // 足首中点 (0.5, 0.9) → 縦 0.8 * 2000 = 1600 px
        assert!(approx_eq(pixel_height(&pose), 1600.0, 1e-9));
        assert!(approx_eq(scale_factor(&pose, 180.0), 180.0 / 1600.0, 1e-12));
    }

    #[test]
    fn test_scale_factor_linear_in_height() {
        let pose = front_pose((0.52, 0.08), (0.41, 0.93), (0.6, 0.95));
        for h in [100.0, 152.5, 180.0, 249.0] {
            let s1 = scale_factor(&pose, h);
            let s2 = scale_factor(&pose, 2.0 * h);
            assert!(approx_eq(s2, 2.0 * s1, 1e-12), "h={}", h);
        }
    }

    #[test]
    fn test_scale_factor_degenerate_is_infinite() {
        let pose = front_pose((0.5, 0.5), (0.5, 0.5), (0.5, 0.5));
        assert!(scale_factor(&pose, 170.0).is_infinite());
    }

    #[test]
    fn test_ellipse_zero_depth_is_not_circle() {
        for w in [1.0, 12.5, 40.0, 300.0] {
            let expected = PI * w / 2.0_f64.sqrt();
            assert!(approx_eq(ellipse_perimeter(w, 0.0), expected, 1e-9), "w={}", w);
            assert!(!approx_eq(ellipse_perimeter(w, 0.0), PI * w, 1e-3));
        }
    }

    #[test]
    fn test_ellipse_symmetric() {
        for (w, d) in [(0.0, 0.0), (10.0, 3.0), (2.5, 40.0), (33.3, 33.3)] {
            assert_eq!(ellipse_perimeter(w, d), ellipse_perimeter(d, w));
        }
    }

    #[test]
    fn test_ellipse_circle_case() {
        // 幅 = 奥行き = d のとき π·d
        assert!(approx_eq(ellipse_perimeter(10.0, 10.0), PI * 10.0, 1e-9));
    }

    #[test]
    fn test_ellipse_monotonic() {
        let base = ellipse_perimeter(20.0, 10.0);
        assert!(ellipse_perimeter(21.0, 10.0) > base);
        assert!(ellipse_perimeter(20.0, 11.0) > base);
    }
}
