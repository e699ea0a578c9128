//! 永続化コラボレータ（補正プロファイル・計測履歴）
//!
//! エンジン自体は値レコードを受け渡すだけで、保存形式はここに閉じる。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info};

use crate::body::BodyMeasurements;
use crate::calibration::{self, load_profile, save_profile, CalibrationProfile};
use crate::error::EngineError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid user id '{0}'")]
    InvalidUserId(String),
    #[error("store lock poisoned")]
    Poisoned,
}

impl<T> From<PoisonError<T>> for StoreError {
    fn from(_: PoisonError<T>) -> Self {
        StoreError::Poisoned
    }
}

/// ユーザーごとの補正プロファイル保存先
pub trait ProfileStore: Send + Sync {
    /// 無ければ `Ok(None)`
    fn get(&self, user_id: &str) -> Result<Option<CalibrationProfile>, StoreError>;

    fn save(&self, user_id: &str, profile: &CalibrationProfile) -> Result<(), StoreError>;

    /// オンボーディング用: 初期係数のプロファイルを作る（既存なら何もしない）
    fn create_default(&self, user_id: &str) -> Result<CalibrationProfile, StoreError> {
        if let Some(existing) = self.get(user_id)? {
            return Ok(existing);
        }
        let profile = CalibrationProfile::default();
        self.save(user_id, &profile)?;
        Ok(profile)
    }
}

impl<S: ProfileStore + ?Sized> ProfileStore for Arc<S> {
    fn get(&self, user_id: &str) -> Result<Option<CalibrationProfile>, StoreError> {
        (**self).get(user_id)
    }

    fn save(&self, user_id: &str, profile: &CalibrationProfile) -> Result<(), StoreError> {
        (**self).save(user_id, profile)
    }
}

/// メモリ上のプロファイルストア
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profiles: Mutex<HashMap<String, CalibrationProfile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn get(&self, user_id: &str) -> Result<Option<CalibrationProfile>, StoreError> {
        Ok(self.profiles.lock()?.get(user_id).cloned())
    }

    fn save(&self, user_id: &str, profile: &CalibrationProfile) -> Result<(), StoreError> {
        self.profiles.lock()?.insert(user_id.to_string(), profile.clone());
        Ok(())
    }
}

/// 1ユーザー1ファイル（`<dir>/<user_id>.json`）のプロファイルストア
#[derive(Debug, Clone)]
pub struct JsonProfileStore {
    dir: PathBuf,
}

impl JsonProfileStore {
    /// ディレクトリが無ければ作成
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, user_id: &str) -> Result<PathBuf, StoreError> {
        let valid = !user_id.is_empty()
            && user_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidUserId(user_id.to_string()));
        }
        Ok(self.dir.join(format!("{user_id}.json")))
    }
}

impl ProfileStore for JsonProfileStore {
    fn get(&self, user_id: &str) -> Result<Option<CalibrationProfile>, StoreError> {
        let path = self.path_for(user_id)?;
        if !path.exists() {
            return Ok(None);
        }
        load_profile(&path).map(Some)
    }

    fn save(&self, user_id: &str, profile: &CalibrationProfile) -> Result<(), StoreError> {
        let path = self.path_for(user_id)?;
        // 一時ファイルに書いてから rename で置き換える
        let tmp = path.with_extension("json.tmp");
        save_profile(&tmp, profile)?;
        fs::rename(&tmp, &path)?;
        debug!(user_id, path = %path.display(), "saved calibration profile");
        Ok(())
    }
}

/// ユーザー単位で直列化した補正更新
///
/// 取得 → 更新 → 保存 をユーザーごとのロック内で行い、同一ユーザーへの
/// 並行した補正送信による更新の消失を防ぐ。別ユーザー同士は並行に進む。
pub struct CalibrationService<S> {
    store: S,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: ProfileStore> CalibrationService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(user_id.to_string()).or_default())
    }

    /// 待っている呼び出しが無ければロックを表から外す
    fn release_user_lock(&self, user_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // 表の分と自分の分だけ。複製は表のロック内でしか作られない
        if Arc::strong_count(&lock) == 2 {
            locks.remove(user_id);
        }
    }

    /// 保存済みプロファイルを取得（無ければ None、初期係数は作らない）
    pub fn profile(&self, user_id: &str) -> crate::Result<Option<CalibrationProfile>> {
        Ok(self.store.get(user_id)?)
    }

    /// 予測値と実測値でプロファイルを更新して保存
    ///
    /// プロファイルが無いユーザーは `ProfileNotFound`。勝手に作成はしない。
    pub fn calibrate_user(
        &self,
        user_id: &str,
        predicted: &BodyMeasurements,
        real: &BodyMeasurements,
    ) -> crate::Result<CalibrationProfile> {
        let lock = self.user_lock(user_id);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.update_stored(user_id, predicted, real)
        };
        self.release_user_lock(user_id, lock);

        let updated = result?;
        info!(user_id, "calibration profile updated");
        Ok(updated)
    }

    fn update_stored(
        &self,
        user_id: &str,
        predicted: &BodyMeasurements,
        real: &BodyMeasurements,
    ) -> crate::Result<CalibrationProfile> {
        let profile = self
            .store
            .get(user_id)?
            .ok_or_else(|| EngineError::ProfileNotFound {
                user_id: user_id.to_string(),
            })?;
        let updated = calibration::update(&profile, predicted, real)?;
        self.store.save(user_id, &updated)?;
        Ok(updated)
    }

    #[cfg(test)]
    fn tracked_users(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

// --- 計測履歴 ---

/// 計測履歴の1件（追記のみ）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub user_id: String,
    pub height_cm: f64,
    pub measurements: BodyMeasurements,
    pub timestamp: DateTime<Utc>,
}

impl MeasurementRecord {
    pub fn new(user_id: &str, height_cm: f64, measurements: BodyMeasurements) -> Self {
        Self {
            user_id: user_id.to_string(),
            height_cm,
            measurements,
            timestamp: Utc::now(),
        }
    }
}

pub trait MeasurementHistory: Send + Sync {
    fn append(&self, record: &MeasurementRecord) -> Result<(), StoreError>;

    /// 新しい順
    fn history(&self, user_id: &str) -> Result<Vec<MeasurementRecord>, StoreError>;
}

fn newest_first(records: &mut [MeasurementRecord]) {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

#[derive(Debug, Default)]
pub struct MemoryHistory {
    records: Mutex<Vec<MeasurementRecord>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MeasurementHistory for MemoryHistory {
    fn append(&self, record: &MeasurementRecord) -> Result<(), StoreError> {
        self.records.lock()?.push(record.clone());
        Ok(())
    }

    fn history(&self, user_id: &str) -> Result<Vec<MeasurementRecord>, StoreError> {
        let mut records: Vec<MeasurementRecord> = self
            .records
            .lock()?
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut records);
        Ok(records)
    }
}

/// JSON Lines ファイルへの追記型履歴
#[derive(Debug)]
pub struct JsonLinesHistory {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesHistory {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }
}

impl MeasurementHistory for JsonLinesHistory {
    fn append(&self, record: &MeasurementRecord) -> Result<(), StoreError> {
        let line = serde_json::to_string(record)?;
        let _guard = self.write_lock.lock()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    fn history(&self, user_id: &str) -> Result<Vec<MeasurementRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(fs::File::open(&self.path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: MeasurementRecord = serde_json::from_str(&line)?;
            if record.user_id == user_id {
                records.push(record);
            }
        }
        newest_first(&mut records);
        Ok(records)
    }
}
