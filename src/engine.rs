//! 計測パイプライン: 4ビュー → 品質ゲート → 抽出 → 補正係数適用

use serde::{Deserialize, Serialize};
use std::thread;
use tracing::{debug, info, warn};

use crate::body::{BodyMeasurements, BodyPart};
use crate::calibration::{self, CalibrationProfile};
use crate::config::{Config, EngineConfig, GateConfig};
use crate::error::{EngineError, InvalidInput, Result};
use crate::geometry::scale_factor;
use crate::measure::{extract_geometry, raw_measurements};
use crate::pose::{DetectionError, PoseDetector, PoseLandmarkSet, QualityGate, View, ViewSet};

/// 計測結果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub measurements: BodyMeasurements,
    pub is_calibrated: bool,
    /// 正面ビューから求めた cm/px
    pub scale_cm_per_px: f64,
}

/// 4ビュー分のエンコード済み画像
#[derive(Debug, Clone, Copy)]
pub struct ViewImages<'a> {
    pub front: &'a [u8],
    pub back: &'a [u8],
    pub left: &'a [u8],
    pub right: &'a [u8],
}

impl<'a> ViewImages<'a> {
    pub fn get(&self, view: View) -> &'a [u8] {
        match view {
            View::Front => self.front,
            View::Back => self.back,
            View::Left => self.left,
            View::Right => self.right,
        }
    }
}

/// 計測エンジン
///
/// 抽出と補正計算は純粋・同期・決定的。共有可変状態は持たない。
#[derive(Debug, Clone)]
pub struct MeasurementEngine {
    gate: QualityGate,
    min_height_cm: f64,
    max_height_cm: f64,
}

impl Default for MeasurementEngine {
    fn default() -> Self {
        Self::new(&GateConfig::default(), &EngineConfig::default())
    }
}

impl MeasurementEngine {
    pub fn new(gate: &GateConfig, engine: &EngineConfig) -> Self {
        Self {
            gate: QualityGate::from_config(gate),
            min_height_cm: engine.min_height_cm,
            max_height_cm: engine.max_height_cm,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.gate, &config.engine)
    }

    fn validate_height(&self, height_cm: f64) -> Result<()> {
        if !(self.min_height_cm..=self.max_height_cm).contains(&height_cm) {
            return Err(InvalidInput::Height {
                height_cm,
                min_cm: self.min_height_cm,
                max_cm: self.max_height_cm,
            }
            .into());
        }
        Ok(())
    }

    /// 1ビューを検査（画像サイズ → 品質ゲート）
    pub fn check_view(&self, view: View, pose: &PoseLandmarkSet) -> Result<()> {
        if !pose.has_valid_dimensions() {
            return Err(InvalidInput::ImageDimensions {
                view,
                width: pose.image_width,
                height: pose.image_height,
            }
            .into());
        }
        self.gate.check(pose).map_err(|reason| {
            warn!(%view, %reason, "pose rejected");
            EngineError::PoseRejected { view, reason }
        })
    }

    /// 4ビューから8部位を計測
    ///
    /// どれか1ビューでも失敗すれば全体を中止し、部分的な結果は返さない。
    /// back ビューは検査するが、現行ルールでは使わない。
    pub fn estimate(
        &self,
        views: &ViewSet,
        height_cm: f64,
        profile: Option<&CalibrationProfile>,
    ) -> Result<Estimate> {
        self.validate_height(height_cm)?;
        for (view, pose) in views.iter() {
            self.check_view(view, pose)?;
        }

        let scale = scale_factor(&views.front, height_cm);
        if !scale.is_finite() || scale <= 0.0 {
            return Err(EngineError::DegenerateScale { scale });
        }
        debug!(scale, height_cm, "scale factor");

        // 側面は左ビュー
        let geometry = extract_geometry(&views.front, &views.left, scale);
        for (part, g) in geometry.iter() {
            debug!(%part, width_cm = g.width_cm, depth_cm = g.depth_cm, raw_cm = g.raw_cm, "part geometry");
        }
        let raw = raw_measurements(&geometry);
        let calibrated = calibration::apply(&raw, profile);

        for (part, &value) in calibrated.measurements.iter() {
            check_measurement(part, value)?;
        }

        info!(
            is_calibrated = calibrated.is_calibrated,
            chest = calibrated.measurements.chest,
            waist = calibrated.measurements.waist,
            hips = calibrated.measurements.hips,
            "estimate complete"
        );
        Ok(Estimate {
            measurements: calibrated.measurements,
            is_calibrated: calibrated.is_calibrated,
            scale_cm_per_px: scale,
        })
    }

    /// 画像4枚を並列に検出してから計測
    ///
    /// 4つの検出が全て終わるまで待ち、失敗があれば正規順序で最初のビューを報告する。
    pub fn estimate_from_images<D: PoseDetector + ?Sized>(
        &self,
        detector: &D,
        images: &ViewImages<'_>,
        height_cm: f64,
        profile: Option<&CalibrationProfile>,
    ) -> Result<Estimate> {
        self.validate_height(height_cm)?;

        let [front, back, left, right] = thread::scope(|s| {
            let handles = View::ALL.map(|view| {
                let image = images.get(view);
                s.spawn(move || detector.detect(image))
            });
            handles.map(|h| {
                h.join().unwrap_or_else(|_| {
                    Err(DetectionError::Backend("detector thread panicked".to_string()))
                })
            })
        });

        self.estimate_from_detections([front, back, left, right], height_cm, profile)
    }

    /// 検出済みの4ビュー分の結果（正規順序）から計測
    ///
    /// 外部の検出器の結果もここに渡す。失敗があれば正規順序で最初のビューを報告する。
    pub fn estimate_from_detections(
        &self,
        detections: [std::result::Result<PoseLandmarkSet, DetectionError>; 4],
        height_cm: f64,
        profile: Option<&CalibrationProfile>,
    ) -> Result<Estimate> {
        let [front, back, left, right] = detections;
        let views = ViewSet {
            front: detected(View::Front, front)?,
            back: detected(View::Back, back)?,
            left: detected(View::Left, left)?,
            right: detected(View::Right, right)?,
        };
        self.estimate(&views, height_cm, profile)
    }

    /// 補正プロファイルの1ステップ更新
    pub fn calibrate(
        &self,
        profile: &CalibrationProfile,
        predicted: &BodyMeasurements,
        real: &BodyMeasurements,
    ) -> Result<CalibrationProfile> {
        calibration::update(profile, predicted, real)
    }
}

fn detected(view: View, result: std::result::Result<PoseLandmarkSet, DetectionError>) -> Result<PoseLandmarkSet> {
    result.map_err(|source| {
        warn!(%view, error = %source, "pose detection failed");
        EngineError::DetectionFailed { view, source }
    })
}

/// 負値・NaN は上流の幾何不良なのでクランプせずに失敗させる
fn check_measurement(part: BodyPart, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(EngineError::Geometry { part, value })
    }
}
