use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

use body_measure::calibration::CalibrationProfile;
use body_measure::config::Config;
use body_measure::engine::{Estimate, MeasurementEngine};
use body_measure::pose::{PixelDetection, ViewSet};
use body_measure::store::{JsonLinesHistory, JsonProfileStore, MeasurementHistory, MeasurementRecord, ProfileStore};

const CONFIG_PATH: &str = "config.toml";

enum Input {
    /// 検出済みランドマーク（ViewSet JSON）
    Landmarks(String),
    /// 外部検出器のピクセル座標出力（ビューごとの PixelDetection JSON）
    Pixels(String),
    /// 画像4枚 (front back left right)
    Images([String; 4]),
}

/// 外部検出器の4ビュー分の出力
#[derive(Deserialize)]
struct PixelViews {
    front: PixelDetection,
    back: PixelDetection,
    left: PixelDetection,
    right: PixelDetection,
}

struct Args {
    input: Input,
    height_cm: f64,
    user_id: Option<String>,
}

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  measure-estimate <views.json> <height_cm> [user_id]");
    eprintln!("  measure-estimate --pixels <detections.json> <height_cm> [user_id]");
    eprintln!("  measure-estimate --images <front> <back> <left> <right> <height_cm> [user_id]");
    std::process::exit(2);
}

fn parse_args() -> Result<Args> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (input, rest) = match args.first().map(String::as_str) {
        Some("--images") if args.len() >= 6 => {
            let paths = [
                args[1].clone(),
                args[2].clone(),
                args[3].clone(),
                args[4].clone(),
            ];
            (Input::Images(paths), &args[5..])
        }
        Some("--pixels") if args.len() >= 3 => (Input::Pixels(args[1].clone()), &args[2..]),
        Some(path) if args.len() >= 2 && !path.starts_with("--") => {
            (Input::Landmarks(path.to_string()), &args[1..])
        }
        _ => usage(),
    };

    let height_cm: f64 = rest[0]
        .parse()
        .with_context(|| format!("invalid height '{}'", rest[0]))?;
    let user_id = rest.get(1).cloned();
    Ok(Args {
        input,
        height_cm,
        user_id,
    })
}

fn print_estimate(est: &Estimate) {
    println!();
    println!("計測結果 ({}):", if est.is_calibrated { "補正済み" } else { "初期係数" });
    for (part, value) in est.measurements.iter() {
        println!("  {:<10} {:>7.1} cm", part.as_str(), value);
    }
    println!("  (scale: {:.4} cm/px)", est.scale_cm_per_px);
}

#[cfg(feature = "onnx")]
fn estimate_images(
    config: &Config,
    engine: &MeasurementEngine,
    paths: &[String; 4],
    height_cm: f64,
    profile: Option<&CalibrationProfile>,
) -> Result<Estimate> {
    use body_measure::engine::ViewImages;
    use body_measure::pose::OnnxPoseDetector;

    let detector = OnnxPoseDetector::new(&config.detector.model_path)?;
    let data = paths
        .iter()
        .map(|p| fs::read(p).with_context(|| format!("failed to read {}", p)))
        .collect::<Result<Vec<_>>>()?;
    let images = ViewImages {
        front: &data[0],
        back: &data[1],
        left: &data[2],
        right: &data[3],
    };
    Ok(engine.estimate_from_images(&detector, &images, height_cm, profile)?)
}

#[cfg(not(feature = "onnx"))]
fn estimate_images(
    _config: &Config,
    _engine: &MeasurementEngine,
    _paths: &[String; 4],
    _height_cm: f64,
    _profile: Option<&CalibrationProfile>,
) -> Result<Estimate> {
    anyhow::bail!("image input requires the `onnx` feature");
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;
    let config = Config::load_or_default(CONFIG_PATH);
    let engine = MeasurementEngine::from_config(&config);

    println!("=== Body Measure ({}) ===", env!("GIT_VERSION"));
    println!("身長: {} cm", args.height_cm);

    let store = JsonProfileStore::open(&config.store.profile_dir)?;
    let profile = match &args.user_id {
        Some(user_id) => {
            let profile = store.get(user_id)?;
            match &profile {
                Some(p) if p.is_calibrated => println!("ユーザー: {} (補正プロファイルあり)", user_id),
                Some(_) => println!("ユーザー: {} (未補正プロファイル)", user_id),
                None => println!("ユーザー: {} (プロファイルなし、初期係数を使用)", user_id),
            }
            profile
        }
        None => None,
    };

    let estimate = match &args.input {
        Input::Landmarks(path) => {
            let content = fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?;
            let views: ViewSet = serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path))?;
            engine.estimate(&views, args.height_cm, profile.as_ref())?
        }
        Input::Pixels(path) => {
            let content = fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?;
            let views: PixelViews =
                serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path))?;
            let detections = [&views.front, &views.back, &views.left, &views.right].map(PixelDetection::to_pose);
            engine.estimate_from_detections(detections, args.height_cm, profile.as_ref())?
        }
        Input::Images(paths) => estimate_images(&config, &engine, paths, args.height_cm, profile.as_ref())?,
    };

    print_estimate(&estimate);

    if let Some(user_id) = &args.user_id {
        let history = JsonLinesHistory::new(&config.store.history_path);
        history.append(&MeasurementRecord::new(user_id, args.height_cm, estimate.measurements))?;
        println!();
        println!("履歴に保存しました: {}", config.store.history_path);
    }

    Ok(())
}
