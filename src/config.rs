use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
}

/// 姿勢品質ゲートの閾値
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GateConfig {
    /// 全17点の平均信頼度の下限（これ未満で棄却）
    #[serde(default = "default_min_mean_confidence")]
    pub min_mean_confidence: f64,
    /// 肩・腰・脚の構造チェックで「見えている」とみなす信頼度（これを超える必要あり）
    #[serde(default = "default_structure_confidence")]
    pub structure_confidence: f64,
}

fn default_min_mean_confidence() -> f64 { 0.15 }
fn default_structure_confidence() -> f64 { 0.1 }

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_mean_confidence: default_min_mean_confidence(),
            structure_confidence: default_structure_confidence(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct EngineConfig {
    /// 許容身長の下限（cm）
    #[serde(default = "default_min_height_cm")]
    pub min_height_cm: f64,
    /// 許容身長の上限（cm）
    #[serde(default = "default_max_height_cm")]
    pub max_height_cm: f64,
}

fn default_min_height_cm() -> f64 { 100.0 }
fn default_max_height_cm() -> f64 { 250.0 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_height_cm: default_min_height_cm(),
            max_height_cm: default_max_height_cm(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StoreConfig {
    /// ユーザーごとの補正プロファイル（JSON）を置くディレクトリ
    #[serde(default = "default_profile_dir")]
    pub profile_dir: String,
    /// 計測履歴（JSON Lines）
    #[serde(default = "default_history_path")]
    pub history_path: String,
}

fn default_profile_dir() -> String { "profiles".to_string() }
fn default_history_path() -> String { "measurements.jsonl".to_string() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            profile_dir: default_profile_dir(),
            history_path: default_history_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DetectorConfig {
    /// MoveNet ONNX モデルのパス
    #[serde(default = "default_model_path")]
    pub model_path: String,
}

fn default_model_path() -> String { "models/movenet_singlepose_lightning.onnx".to_string() }

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// ファイルが無い・読めない場合はデフォルト設定
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("using default config: {e:#}");
                Self::default()
            }
        }
    }
}
