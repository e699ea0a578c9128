use anyhow::{Context, Result};
use std::fs;

use body_measure::body::{BodyMeasurements, BodyPart};
use body_measure::calibration::CalibrationProfile;
use body_measure::config::Config;
use body_measure::store::{CalibrationService, JsonProfileStore, ProfileStore};

const CONFIG_PATH: &str = "config.toml";

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  measure-calibrate init <user_id>");
    eprintln!("  measure-calibrate show <user_id>");
    eprintln!("  measure-calibrate update <user_id> <predicted.json> <real.json>");
    std::process::exit(2);
}

fn read_measurements(path: &str) -> Result<BodyMeasurements> {
    let content = fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path))
}

fn print_profile(profile: &CalibrationProfile) {
    println!("  状態: {}", if profile.is_calibrated { "補正済み" } else { "未補正" });
    for part in BodyPart::ALL {
        println!("  {:<10} {:.4}", part.as_str(), profile.coefficient(part));
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = Config::load_or_default(CONFIG_PATH);

    println!("=== 補正係数ツール ({}) ===", env!("GIT_VERSION"));
    println!("  保存先: {}", config.store.profile_dir);
    println!();

    let store = JsonProfileStore::open(&config.store.profile_dir)?;

    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["init", user_id] => {
            let profile = store.create_default(user_id)?;
            println!("[init] {}", user_id);
            print_profile(&profile);
        }
        ["show", user_id] => match store.get(user_id)? {
            Some(profile) => {
                println!("[show] {}", user_id);
                print_profile(&profile);
            }
            None => println!("プロファイルがありません: {}", user_id),
        },
        ["update", user_id, predicted_path, real_path] => {
            let predicted = read_measurements(predicted_path)?;
            let real = read_measurements(real_path)?;

            let service = CalibrationService::new(store);
            let before = service.profile(user_id)?;
            let updated = service.calibrate_user(user_id, &predicted, &real)?;

            println!("[update] {}", user_id);
            for part in BodyPart::ALL {
                let old = before.as_ref().map(|p| p.coefficient(part)).unwrap_or(f64::NAN);
                println!(
                    "  {:<10} {:.4} -> {:.4}  (予測 {:.1} / 実測 {:.1} cm)",
                    part.as_str(),
                    old,
                    updated.coefficient(part),
                    predicted[part],
                    real[part],
                );
            }
        }
        _ => usage(),
    }

    Ok(())
}
