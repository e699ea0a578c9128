//! 計測エンジンのエラー型

use thiserror::Error;

use crate::body::BodyPart;
use crate::pose::detector::DetectionError;
use crate::pose::gate::GateRejection;
use crate::pose::View;
use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// 品質ゲートで棄却されたビュー
    #[error("{view} view rejected: {reason}")]
    PoseRejected { view: View, reason: GateRejection },

    /// 外部検出器の失敗（そのまま伝搬）
    #[error("pose detection failed for {view} view: {source}")]
    DetectionFailed { view: View, source: DetectionError },

    /// スケール係数が非有限または非正
    #[error("degenerate scale factor {scale} cm/px (nose and ankles coincide?)")]
    DegenerateScale { scale: f64 },

    #[error("no calibration profile for user '{user_id}'")]
    ProfileNotFound { user_id: String },

    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInput),

    /// 幾何計算の結果が負または NaN（クランプせず報告する）
    #[error("{part} came out as {value} cm")]
    Geometry { part: BodyPart, value: f64 },

    #[error("profile store: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidInput {
    #[error("height {height_cm} cm is outside {min_cm}..={max_cm} cm")]
    Height { height_cm: f64, min_cm: f64, max_cm: f64 },

    #[error("real {part} must be finite and positive, got {value}")]
    RealMeasurement { part: BodyPart, value: f64 },

    /// 0 は「係数据え置き」として許す
    #[error("predicted {part} must be finite and non-negative, got {value}")]
    PredictedMeasurement { part: BodyPart, value: f64 },

    /// 更新後の係数が有限かつ正にならない組
    #[error("{part} coefficient would become {value}")]
    Coefficient { part: BodyPart, value: f64 },

    #[error("{view} view has image size {width}x{height}")]
    ImageDimensions { view: View, width: u32, height: u32 },
}

impl EngineError {
    /// 失敗したビュー（ビュー単位のエラーのみ）
    pub fn view(&self) -> Option<View> {
        match self {
            EngineError::PoseRejected { view, .. } | EngineError::DetectionFailed { view, .. } => {
                Some(*view)
            }
            EngineError::InvalidInput(InvalidInput::ImageDimensions { view, .. }) => Some(*view),
            _ => None,
        }
    }

    /// 失敗した部位（部位単位のエラーのみ）
    pub fn part(&self) -> Option<BodyPart> {
        match self {
            EngineError::Geometry { part, .. } => Some(*part),
            EngineError::InvalidInput(
                InvalidInput::RealMeasurement { part, .. }
                | InvalidInput::PredictedMeasurement { part, .. }
                | InvalidInput::Coefficient { part, .. },
            ) => Some(*part),
            _ => None,
        }
    }
}
