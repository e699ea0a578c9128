use ndarray::ArrayViewD;
use serde::Deserialize;
use thiserror::Error;

use super::keypoint::{Keypoint, KeypointIndex, PoseLandmarkSet};

/// 外部の姿勢検出器が返す失敗
///
/// `LowConfidence` と `IncompleteStructure` は検出器自身が品質を判定する場合に返す。
/// このクレートの変換関数は品質判定を `QualityGate` に任せ、これらは返さない。
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("no pose found in image")]
    NoPoseFound,
    #[error("pose confidence too low")]
    LowConfidence,
    #[error("incomplete body structure in image")]
    IncompleteStructure,
    #[error("expected {expected} keypoints, got {0}", expected = KeypointIndex::COUNT)]
    KeypointCount(usize),
    #[error("unexpected detector output shape {0:?}")]
    OutputShape(Vec<usize>),
    #[error("detector backend: {0}")]
    Backend(String),
}

/// 画像 → 正規順序の 17 キーポイント
///
/// 実装は一度だけ構築してエンジンに参照で渡す。4ビューを並列に検出するため
/// `Sync` が必要。
pub trait PoseDetector: Send + Sync {
    /// エンコード済み画像（JPEG/PNG 等）から姿勢を検出
    fn detect(&self, image: &[u8]) -> Result<PoseLandmarkSet, DetectionError>;
}

impl<D: PoseDetector + ?Sized> PoseDetector for &D {
    fn detect(&self, image: &[u8]) -> Result<PoseLandmarkSet, DetectionError> {
        (**self).detect(image)
    }
}

/// MoveNet 出力テンソルを `PoseLandmarkSet` に変換
///
/// MoveNet の出力は [1, 1, 17, 3] (y, x, confidence)。座標は入力画像に対する
/// 正規化値なので、そのまま元画像の正規化座標として扱う。
pub fn pose_from_movenet_output(
    output: ArrayViewD<'_, f32>,
    image_width: u32,
    image_height: u32,
) -> Result<PoseLandmarkSet, DetectionError> {
    let shape = output.shape();
    if shape != [1, 1, KeypointIndex::COUNT, 3] {
        return Err(DetectionError::OutputShape(shape.to_vec()));
    }

    let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
    for (i, kp) in keypoints.iter_mut().enumerate() {
        let y = output[[0, 0, i, 0]] as f64;
        let x = output[[0, 0, i, 1]] as f64;
        let confidence = output[[0, 0, i, 2]] as f64;
        *kp = Keypoint::new(x, y, confidence);
    }

    Ok(PoseLandmarkSet::new(keypoints, image_width, image_height))
}

/// ピクセル座標のキーポイント列 (x, y, score) を正規化して取り込む
///
/// 入力は正規順序であること。
pub fn pose_from_pixel_keypoints(
    points: &[(f64, f64, f64)],
    image_width: u32,
    image_height: u32,
) -> Result<PoseLandmarkSet, DetectionError> {
    if points.len() != KeypointIndex::COUNT {
        return Err(DetectionError::KeypointCount(points.len()));
    }
    if image_width == 0 || image_height == 0 {
        return Err(DetectionError::Backend(format!(
            "image size {}x{}",
            image_width, image_height
        )));
    }

    let w = image_width as f64;
    let h = image_height as f64;
    let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
    for (kp, &(x, y, score)) in keypoints.iter_mut().zip(points) {
        *kp = Keypoint::new(x / w, y / h, score);
    }

    Ok(PoseLandmarkSet::new(keypoints, image_width, image_height))
}

/// 全キーポイントの信頼度が 0 以下なら「検出なし」
///
/// シングルポーズのモデルは人がいなくても常に 17 点を返す。
pub fn ensure_pose_found(pose: PoseLandmarkSet) -> Result<PoseLandmarkSet, DetectionError> {
    if pose.keypoints.iter().all(|kp| kp.confidence <= 0.0) {
        return Err(DetectionError::NoPoseFound);
    }
    Ok(pose)
}

/// 外部検出器のピクセル座標出力（1ビュー分）
///
/// JSON では `{"keypoints": [[x, y, score], ...], "image_width": w, "image_height": h}`。
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PixelDetection {
    pub keypoints: Vec<(f64, f64, f64)>,
    pub image_width: u32,
    pub image_height: u32,
}

impl PixelDetection {
    pub fn to_pose(&self) -> Result<PoseLandmarkSet, DetectionError> {
        let pose = pose_from_pixel_keypoints(&self.keypoints, self.image_width, self.image_height)?;
        ensure_pose_found(pose)
    }
}
