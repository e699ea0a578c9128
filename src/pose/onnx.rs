use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use std::sync::Mutex;

use super::detector::{ensure_pose_found, pose_from_movenet_output, DetectionError, PoseDetector};
use super::keypoint::PoseLandmarkSet;

/// MoveNet用の入力サイズ
pub const MOVENET_INPUT_SIZE: u32 = 192;

/// 画像を MoveNet用の入力テンソルに変換
///
/// - 192x192 にリサイズ（アスペクト比は保持しない）
/// - [1, 192, 192, 3] の f32 テンソルに変換 (0.0-255.0, RGB)
pub fn preprocess_for_movenet(image: &DynamicImage) -> Array4<f32> {
    let size = MOVENET_INPUT_SIZE;
    let rgb = image.resize_exact(size, size, FilterType::Triangle).to_rgb8();

    let mut tensor = Array4::<f32>::zeros((1, size as usize, size as usize, 3));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, y as usize, x as usize, c]] = pixel[c] as f32;
        }
    }
    tensor
}

/// ONNX Runtime 上の MoveNet 検出器
///
/// セッションはプロセス内で一度だけ作り、エンジンへ参照で渡す。
/// `Session::run` は排他アクセスが必要なので Mutex で保護する。
pub struct OnnxPoseDetector {
    session: Mutex<Session>,
}

impl OnnxPoseDetector {
    /// ONNXモデルを読み込んで初期化
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path.as_ref())
            .context("Failed to load ONNX model")?;

        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

fn backend<E: std::fmt::Display>(e: E) -> DetectionError {
    DetectionError::Backend(e.to_string())
}

impl PoseDetector for OnnxPoseDetector {
    fn detect(&self, image: &[u8]) -> Result<PoseLandmarkSet, DetectionError> {
        let decoded = image::load_from_memory(image).map_err(backend)?;
        let (width, height) = (decoded.width(), decoded.height());

        let input_tensor = Tensor::from_array(preprocess_for_movenet(&decoded)).map_err(backend)?;
        let mut session = self
            .session
            .lock()
            .map_err(|_| DetectionError::Backend("session lock poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs!["serving_default_input_0" => input_tensor])
            .map_err(backend)?;

        let output = outputs["StatefulPartitionedCall_0"]
            .try_extract_array::<f32>()
            .map_err(backend)?;

        ensure_pose_found(pose_from_movenet_output(output, width, height)?)
    }
}
