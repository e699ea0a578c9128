use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::body::{BodyMeasurements, BodyPart, Coefficients, PerPart};
use crate::error::{InvalidInput, Result};
use crate::store::StoreError;

// --- データ構造 ---

/// 初期補正係数（実測との比から経験的に決めた値）
pub const DEFAULT_COEFFICIENTS: Coefficients = PerPart {
    neck: 0.37,
    shoulders: 0.80,
    chest: 0.72,
    waist: 1.09,
    hips: 0.98,
    thigh: 1.15,
    calf: 0.89,
    bicep: 1.47,
};

/// ユーザーごとの補正プロファイル
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    pub coefficients: Coefficients,
    pub is_calibrated: bool,
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self {
            coefficients: DEFAULT_COEFFICIENTS,
            is_calibrated: false,
        }
    }
}

impl CalibrationProfile {
    pub fn coefficient(&self, part: BodyPart) -> f64 {
        self.coefficients[part]
    }

    /// 全係数が有限かつ正か
    pub fn is_valid(&self) -> bool {
        self.invalid_part().is_none()
    }

    /// 有限かつ正でない最初の係数の部位
    pub fn invalid_part(&self) -> Option<BodyPart> {
        self.coefficients
            .iter()
            .find(|&(_, &c)| !(c.is_finite() && c > 0.0))
            .map(|(part, _)| part)
    }
}

/// 係数適用後の計測結果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibrated {
    pub measurements: BodyMeasurements,
    pub is_calibrated: bool,
}

// --- 適用 / 更新 ---

/// 補正前の値に係数を掛ける
///
/// プロファイルが無ければ初期係数表をそのまま使い、未補正として返す。
pub fn apply(raw: &BodyMeasurements, profile: Option<&CalibrationProfile>) -> Calibrated {
    let (coefficients, is_calibrated) = match profile {
        Some(p) => (&p.coefficients, p.is_calibrated),
        None => (&DEFAULT_COEFFICIENTS, false),
    };
    Calibrated {
        measurements: PerPart::from_fn(|part| raw[part] * coefficients[part]),
        is_calibrated,
    }
}

/// 予測値と実測値の比で係数を1ステップ更新
///
/// `new = old × real / predicted`。predicted が 0 の部位は係数を変えない。
/// 移動平均ではなく上書きなので、同じ予測ジオメトリを再計算すると実測値に一致する。
/// 実測値は全部位で有限かつ正、予測値は有限かつ非負であること。
/// 更新後の係数が有限かつ正にならない場合もエラーで、元のプロファイルは変わらない。
pub fn update(
    profile: &CalibrationProfile,
    predicted: &BodyMeasurements,
    real: &BodyMeasurements,
) -> Result<CalibrationProfile> {
    for (part, &value) in real.iter() {
        if !value.is_finite() || value <= 0.0 {
            return Err(InvalidInput::RealMeasurement { part, value }.into());
        }
    }
    for (part, &value) in predicted.iter() {
        if !value.is_finite() || value < 0.0 {
            return Err(InvalidInput::PredictedMeasurement { part, value }.into());
        }
    }

    let coefficients = PerPart::from_fn(|part| {
        let old = profile.coefficients[part];
        let p = predicted[part];
        if p == 0.0 {
            old
        } else {
            old * (real[part] / p)
        }
    });

    let updated = CalibrationProfile {
        coefficients,
        is_calibrated: true,
    };
    // 極小の予測値で係数が溢れる場合など
    if let Some(part) = updated.invalid_part() {
        return Err(InvalidInput::Coefficient {
            part,
            value: updated.coefficients[part],
        }
        .into());
    }
    Ok(updated)
}

// --- Save / Load ---

pub fn save_profile<P: AsRef<Path>>(path: P, profile: &CalibrationProfile) -> std::result::Result<(), StoreError> {
    let json = serde_json::to_string_pretty(profile)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn load_profile<P: AsRef<Path>>(path: P) -> std::result::Result<CalibrationProfile, StoreError> {
    let content = fs::read_to_string(path)?;
    let profile: CalibrationProfile = serde_json::from_str(&content)?;
    Ok(profile)
}
