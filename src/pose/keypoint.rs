use serde::{Deserialize, Serialize};
use std::fmt;

/// MoveNet の 17 キーポイントインデックス（正規順序）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(usize)]
pub enum KeypointIndex {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl KeypointIndex {
    pub const COUNT: usize = 17;

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Nose),
            1 => Some(Self::LeftEye),
            2 => Some(Self::RightEye),
            3 => Some(Self::LeftEar),
            4 => Some(Self::RightEar),
            5 => Some(Self::LeftShoulder),
            6 => Some(Self::RightShoulder),
            7 => Some(Self::LeftElbow),
            8 => Some(Self::RightElbow),
            9 => Some(Self::LeftWrist),
            10 => Some(Self::RightWrist),
            11 => Some(Self::LeftHip),
            12 => Some(Self::RightHip),
            13 => Some(Self::LeftKnee),
            14 => Some(Self::RightKnee),
            15 => Some(Self::LeftAnkle),
            16 => Some(Self::RightAnkle),
            _ => None,
        }
    }
}

/// 単一キーポイント
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Keypoint {
    /// 正規化されたX座標 (0.0〜1.0)
    pub x: f64,
    /// 正規化されたY座標 (0.0〜1.0)
    pub y: f64,
    /// 信頼度スコア (0.0〜1.0)
    pub confidence: f64,
}

impl Keypoint {
    pub fn new(x: f64, y: f64, confidence: f64) -> Self {
        Self { x, y, confidence }
    }

    /// 信頼度が閾値を超えているか（閾値ちょうどは不可）
    pub fn exceeds(&self, threshold: f64) -> bool {
        self.confidence > threshold
    }
}

/// 1枚の撮影ビューから得た 17 キーポイントと画像サイズ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseLandmarkSet {
    pub keypoints: [Keypoint; KeypointIndex::COUNT],
    pub image_width: u32,
    pub image_height: u32,
}

impl PoseLandmarkSet {
    pub fn new(keypoints: [Keypoint; KeypointIndex::COUNT], image_width: u32, image_height: u32) -> Self {
        Self {
            keypoints,
            image_width,
            image_height,
        }
    }

    /// インデックスでキーポイントを取得
    pub fn get(&self, index: KeypointIndex) -> &Keypoint {
        &self.keypoints[index as usize]
    }

    /// 全キーポイントの平均信頼度
    pub fn average_confidence(&self) -> f64 {
        let sum: f64 = self.keypoints.iter().map(|k| k.confidence).sum();
        sum / KeypointIndex::COUNT as f64
    }

    /// 画像サイズが有効か（幅・高さとも正）
    pub fn has_valid_dimensions(&self) -> bool {
        self.image_width > 0 && self.image_height > 0
    }
}

/// 撮影ビュー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Front,
    Back,
    Left,
    Right,
}

impl View {
    /// 正規順序（失敗報告もこの順で行う）
    pub const ALL: [View; 4] = [View::Front, View::Back, View::Left, View::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            View::Front => "front",
            View::Back => "back",
            View::Left => "left",
            View::Right => "right",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 4ビュー一式
///
/// back は入力として必須だが、現行の計測ルールはどれも参照しない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSet {
    pub front: PoseLandmarkSet,
    pub back: PoseLandmarkSet,
    pub left: PoseLandmarkSet,
    pub right: PoseLandmarkSet,
}

impl ViewSet {
    pub fn get(&self, view: View) -> &PoseLandmarkSet {
        match view {
            View::Front => &self.front,
            View::Back => &self.back,
            View::Left => &self.left,
            View::Right => &self.right,
        }
    }

    /// 正規順序でビューを列挙
    pub fn iter(&self) -> impl Iterator<Item = (View, &PoseLandmarkSet)> {
        View::ALL.into_iter().map(move |v| (v, self.get(v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypoint_index_count() {
        assert_eq!(KeypointIndex::COUNT, 17);
    }

    #[test]
    fn test_keypoint_index_from_index() {
        assert_eq!(KeypointIndex::from_index(0), Some(KeypointIndex::Nose));
        assert_eq!(KeypointIndex::from_index(16), Some(KeypointIndex::RightAnkle));
        assert_eq!(KeypointIndex::from_index(17), None);
        for i in 0..KeypointIndex::COUNT {
            assert_eq!(KeypointIndex::from_index(i).map(|k| k as usize), Some(i));
        }
    }

    #[test]
    fn test_keypoint_exceeds_is_strict() {
        let kp = Keypoint::new(0.5, 0.5, 0.1);
        assert!(!kp.exceeds(0.1));
        assert!(kp.exceeds(0.05));
    }

    #[test]
    fn test_landmark_set_get() {
        let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
        keypoints[KeypointIndex::Nose as usize] = Keypoint::new(0.5, 0.3, 0.9);

        let set = PoseLandmarkSet::new(keypoints, 100, 200);
        let nose = set.get(KeypointIndex::Nose);
        assert_eq!(nose.x, 0.5);
        assert_eq!(nose.y, 0.3);
        assert_eq!(nose.confidence, 0.9);
        assert!(set.has_valid_dimensions());
    }

    #[test]
    fn test_landmark_set_average_confidence() {
        let keypoints = [Keypoint::new(0.0, 0.0, 0.5); KeypointIndex::COUNT];
        let set = PoseLandmarkSet::new(keypoints, 1, 1);
        assert!((set.average_confidence() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_zero_dimensions_invalid() {
        let set = PoseLandmarkSet::new([Keypoint::default(); KeypointIndex::COUNT], 0, 480);
        assert!(!set.has_valid_dimensions());
    }

    #[test]
    fn test_view_set_iter_canonical_order() {
        let set = PoseLandmarkSet::new([Keypoint::default(); KeypointIndex::COUNT], 10, 10);
        let views = ViewSet {
            front: set.clone(),
            back: set.clone(),
            left: set.clone(),
            right: set,
        };
        let order: Vec<View> = views.iter().map(|(v, _)| v).collect();
        assert_eq!(order, View::ALL.to_vec());
    }

    #[test]
    fn test_view_serde_lowercase() {
        let json = serde_json::to_string(&View::Left).unwrap();
        assert_eq!(json, "\"left\"");
    }
}
