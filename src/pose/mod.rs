pub mod detector;
pub mod gate;
pub mod keypoint;
#[cfg(feature = "onnx")]
pub mod onnx;

pub use detector::{
    ensure_pose_found, pose_from_movenet_output, pose_from_pixel_keypoints, DetectionError, PixelDetection,
    PoseDetector,
};
pub use gate::{GateRejection, QualityGate};
pub use keypoint::{Keypoint, KeypointIndex, PoseLandmarkSet, View, ViewSet};
#[cfg(feature = "onnx")]
pub use onnx::{preprocess_for_movenet, OnnxPoseDetector};
