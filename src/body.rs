//! 計測部位と部位ごとの値レコード

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// 計測対象の 8 部位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyPart {
    Neck,
    Shoulders,
    Chest,
    Waist,
    Hips,
    Thigh,
    Calf,
    Bicep,
}

impl BodyPart {
    pub const COUNT: usize = 8;

    pub const ALL: [BodyPart; BodyPart::COUNT] = [
        BodyPart::Neck,
        BodyPart::Shoulders,
        BodyPart::Chest,
        BodyPart::Waist,
        BodyPart::Hips,
        BodyPart::Thigh,
        BodyPart::Calf,
        BodyPart::Bicep,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BodyPart::Neck => "neck",
            BodyPart::Shoulders => "shoulders",
            BodyPart::Chest => "chest",
            BodyPart::Waist => "waist",
            BodyPart::Hips => "hips",
            BodyPart::Thigh => "thigh",
            BodyPart::Calf => "calf",
            BodyPart::Bicep => "bicep",
        }
    }
}

impl fmt::Display for BodyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 部位ごとに 1 つずつ値を持つレコード
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerPart<T> {
    pub neck: T,
    pub shoulders: T,
    pub chest: T,
    pub waist: T,
    pub hips: T,
    pub thigh: T,
    pub calf: T,
    pub bicep: T,
}

/// 部位ごとの計測値（cm）
pub type BodyMeasurements = PerPart<f64>;

/// 部位ごとの乗算補正係数
pub type Coefficients = PerPart<f64>;

impl<T> PerPart<T> {
    /// 部位ごとに関数を呼んで構築（呼び出し順は `BodyPart::ALL`）
    pub fn from_fn<F: FnMut(BodyPart) -> T>(mut f: F) -> Self {
        Self {
            neck: f(BodyPart::Neck),
            shoulders: f(BodyPart::Shoulders),
            chest: f(BodyPart::Chest),
            waist: f(BodyPart::Waist),
            hips: f(BodyPart::Hips),
            thigh: f(BodyPart::Thigh),
            calf: f(BodyPart::Calf),
            bicep: f(BodyPart::Bicep),
        }
    }

    pub fn get(&self, part: BodyPart) -> &T {
        match part {
            BodyPart::Neck => &self.neck,
            BodyPart::Shoulders => &self.shoulders,
            BodyPart::Chest => &self.chest,
            BodyPart::Waist => &self.waist,
            BodyPart::Hips => &self.hips,
            BodyPart::Thigh => &self.thigh,
            BodyPart::Calf => &self.calf,
            BodyPart::Bicep => &self.bicep,
        }
    }

    pub fn get_mut(&mut self, part: BodyPart) -> &mut T {
        match part {
            BodyPart::Neck => &mut self.neck,
            BodyPart::Shoulders => &mut self.shoulders,
            BodyPart::Chest => &mut self.chest,
            BodyPart::Waist => &mut self.waist,
            BodyPart::Hips => &mut self.hips,
            BodyPart::Thigh => &mut self.thigh,
            BodyPart::Calf => &mut self.calf,
            BodyPart::Bicep => &mut self.bicep,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (BodyPart, &T)> {
        BodyPart::ALL.into_iter().map(move |p| (p, self.get(p)))
    }
}

impl<T> Index<BodyPart> for PerPart<T> {
    type Output = T;

    fn index(&self, part: BodyPart) -> &T {
        self.get(part)
    }
}

impl<T> IndexMut<BodyPart> for PerPart<T> {
    fn index_mut(&mut self, part: BodyPart) -> &mut T {
        self.get_mut(part)
    }
}
