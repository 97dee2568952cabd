use serde::{Deserialize, Serialize};
use std::ops::Add;

/// 緯度経度（度）で表す2次元座標
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64, // deg
    pub lon: f64, // deg
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// 度単位のユークリッド距離（経度スケーリングなし）
    ///
    /// 最近傍探索・ステップ数算出・重複除去に使用します。
    pub fn degree_distance(&self, other: &GeoPoint) -> f64 {
        ((self.lat - other.lat).powi(2) + (self.lon - other.lon).powi(2)).sqrt()
    }

    /// 2点間の線形補間（t=0で self、t=1で other）
    pub fn lerp(&self, other: &GeoPoint, t: f64) -> GeoPoint {
        GeoPoint::new(
            self.lat + t * (other.lat - self.lat),
            self.lon + t * (other.lon - self.lon),
        )
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

impl Add for GeoPoint {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.lat + other.lat, self.lon + other.lon)
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// 高度付きの位置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPosition {
    pub lat: f64,   // deg
    pub lon: f64,   // deg
    pub alt_m: f64, // m
}

impl GeoPosition {
    pub fn new(point: GeoPoint, alt_m: f64) -> Self {
        Self {
            lat: point.lat,
            lon: point.lon,
            alt_m,
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }

    pub fn set_point(&mut self, point: GeoPoint) {
        self.lat = point.lat;
        self.lon = point.lon;
    }
}

/// 移動ユニットの状態を表す列挙型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    Following, // 経路追従中
    Arrived,   // 経路終端に到達
}

/// 設定値の検証エラー
///
/// 境界やプランナーのパラメータが不正な場合に構築時点で返されます。
/// シミュレーション実行中にこのエラーが発生することはありません。
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("半径は正の値である必要があります: {0}")]
    NonPositiveRadius(f64),

    #[error("範囲が不正です ({axis}): min={min}, max={max}")]
    InvalidRange { axis: &'static str, min: f64, max: f64 },

    #[error("座標が有限値ではありません: {0}")]
    NonFiniteCoordinate(String),

    #[error("確率は0〜1の範囲である必要があります ({name}): {value}")]
    InvalidProbability { name: &'static str, value: f64 },

    #[error("{0}")]
    Invalid(String),
}

/// 数学ユーティリティ関数
pub mod math_utils {
    use rand::{Rng, RngCore};

    /// [lo, hi] の一様乱数。hi <= lo の場合は lo を返す
    pub fn uniform(rng: &mut dyn RngCore, lo: f64, hi: f64) -> f64 {
        if hi > lo { rng.gen_range(lo..hi) } else { lo }
    }

    /// `[min, max]` 形式の範囲から一様乱数を生成
    pub fn uniform_in(rng: &mut dyn RngCore, range: [f64; 2]) -> f64 {
        uniform(rng, range[0], range[1])
    }

    /// 確率 p で true を返す（p は [0, 1] にクランプ）
    pub fn chance(rng: &mut dyn RngCore, p: f64) -> bool {
        rng.gen_bool(p.clamp(0.0, 1.0))
    }

    /// 指定桁数で四捨五入
    pub fn round_to(value: f64, decimals: i32) -> f64 {
        let factor = 10f64.powi(decimals);
        (value * factor).round() / factor
    }

    /// start から end までを num 個に等分した値（両端を含む）
    pub fn linspace(start: f64, end: f64, num: usize) -> Vec<f64> {
        match num {
            0 => Vec::new(),
            1 => vec![start],
            _ => (0..num)
                .map(|i| start + (end - start) * i as f64 / (num - 1) as f64)
                .collect(),
        }
    }

    /// ステップ数の算出: max(min_steps, floor(distance * multiplier)) を cap で制限
    pub fn step_count(distance: f64, multiplier: f64, min_steps: usize, cap: usize) -> usize {
        let raw = distance * multiplier;
        let scaled = if raw.is_finite() && raw > 0.0 { raw as usize } else { 0 };
        scaled.max(min_steps).min(cap.max(min_steps))
    }
}
