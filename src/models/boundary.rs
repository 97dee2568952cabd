//! # Boundary モジュール
//!
//! 都市領域の境界モデルを提供します。
//!
//! 円形境界は中心緯度の cos で経度差をスケーリングした近似等距離座標で距離を測り、
//! 領域外の点を中心からの同一方位・半径の95%位置へ射影します。
//! 矩形境界は各軸の独立したクランプで領域内に収めます。

use crate::models::common::{ConfigError, GeoPoint, math_utils};
use rand::RngCore;
use std::f64::consts::PI;

/// 射影先の半径比率（境界線上で振動しないよう5%内側に置く）
pub const EDGE_INSET_FACTOR: f64 = 0.95;

/// これ未満の半径は実質ゼロとみなす
const DEGENERATE_RADIUS_DEG: f64 = 1e-12;

/// 都市領域の境界
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Boundary {
    /// 円形境界（半径は度単位）
    Circular { center: GeoPoint, radius_deg: f64 },
    /// 軸平行な矩形境界
    Rectangular {
        lat_min: f64,
        lat_max: f64,
        lon_min: f64,
        lon_max: f64,
    },
}

impl Boundary {
    /// 円形境界を作成
    ///
    /// 半径が0以下、座標が有限値でない、または中心が極（|緯度| >= 90）の場合は設定エラーを返します。
    pub fn circular(center: GeoPoint, radius_deg: f64) -> Result<Self, ConfigError> {
        if !center.is_finite() {
            return Err(ConfigError::NonFiniteCoordinate(center.to_string()));
        }
        // 極では経度スケール cos(lat0) が0に近づく
        if center.lat.abs() >= 90.0 {
            return Err(ConfigError::InvalidRange {
                axis: "center.lat",
                min: center.lat,
                max: center.lat,
            });
        }
        if !radius_deg.is_finite() || radius_deg <= 0.0 {
            return Err(ConfigError::NonPositiveRadius(radius_deg));
        }
        Ok(Boundary::Circular { center, radius_deg })
    }

    /// 矩形境界を作成
    pub fn rectangular(
        lat_min: f64,
        lat_max: f64,
        lon_min: f64,
        lon_max: f64,
    ) -> Result<Self, ConfigError> {
        for (axis, min, max) in [("lat", lat_min, lat_max), ("lon", lon_min, lon_max)] {
            if !min.is_finite() || !max.is_finite() || min >= max {
                return Err(ConfigError::InvalidRange { axis, min, max });
            }
        }
        Ok(Boundary::Rectangular {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        })
    }

    /// 領域の中心
    pub fn center(&self) -> GeoPoint {
        match *self {
            Boundary::Circular { center, .. } => center,
            Boundary::Rectangular {
                lat_min,
                lat_max,
                lon_min,
                lon_max,
            } => GeoPoint::new((lat_min + lat_max) / 2.0, (lon_min + lon_max) / 2.0),
        }
    }

    /// 領域の代表的な広がり（度）
    ///
    /// 円形では半径、矩形では短辺の半分を返します。
    pub fn extent_deg(&self) -> f64 {
        match *self {
            Boundary::Circular { radius_deg, .. } => radius_deg,
            Boundary::Rectangular {
                lat_min,
                lat_max,
                lon_min,
                lon_max,
            } => ((lat_max - lat_min).min(lon_max - lon_min)) / 2.0,
        }
    }

    pub fn is_circular(&self) -> bool {
        matches!(self, Boundary::Circular { .. })
    }

    /// 中心からのスケーリング済み距離（度）
    ///
    /// 経度差に cos(中心緯度) を掛けた近似等距離座標で計算します。
    pub fn scaled_distance(&self, point: &GeoPoint) -> f64 {
        let center = self.center();
        let dlat = point.lat - center.lat;
        let dlon = (point.lon - center.lon) * Self::lon_scale(center);
        (dlat.powi(2) + dlon.powi(2)).sqrt()
    }

    /// 点が領域内にあるかを判定
    pub fn contains(&self, point: &GeoPoint) -> bool {
        match *self {
            Boundary::Circular { radius_deg, .. } => self.scaled_distance(point) <= radius_deg,
            Boundary::Rectangular {
                lat_min,
                lat_max,
                lon_min,
                lon_max,
            } => {
                point.lat >= lat_min
                    && point.lat <= lat_max
                    && point.lon >= lon_min
                    && point.lon <= lon_max
            }
        }
    }

    /// 領域外の点を領域内へ射影
    ///
    /// 領域内の点はそのまま返します（冪等）。
    pub fn project(&self, point: GeoPoint) -> GeoPoint {
        if !point.is_finite() {
            return self.center();
        }
        if self.contains(&point) {
            return point;
        }

        match *self {
            Boundary::Circular { center, radius_deg } => {
                let scale = Self::lon_scale(center);
                let dlat = point.lat - center.lat;
                let dlon = (point.lon - center.lon) * scale;
                let bearing = dlat.atan2(dlon);
                Self::point_at(center, radius_deg * EDGE_INSET_FACTOR, bearing)
            }
            Boundary::Rectangular {
                lat_min,
                lat_max,
                lon_min,
                lon_max,
            } => GeoPoint::new(
                point.lat.clamp(lat_min, lat_max),
                point.lon.clamp(lon_min, lon_max),
            ),
        }
    }

    /// 領域内の一様ランダムな点
    ///
    /// 円形では半径係数に sqrt(U(0,1)) を使い、面積当たりの密度を一様にします。
    pub fn random_interior_point(&self, rng: &mut dyn RngCore) -> GeoPoint {
        match *self {
            Boundary::Circular { center, radius_deg } => {
                if radius_deg < DEGENERATE_RADIUS_DEG {
                    return center;
                }
                let angle = math_utils::uniform(rng, 0.0, 2.0 * PI);
                let radius_factor = math_utils::uniform(rng, 0.0, 1.0).sqrt();
                Self::point_at(center, radius_deg * radius_factor, angle)
            }
            Boundary::Rectangular {
                lat_min,
                lat_max,
                lon_min,
                lon_max,
            } => GeoPoint::new(
                math_utils::uniform(rng, lat_min, lat_max),
                math_utils::uniform(rng, lon_min, lon_max),
            ),
        }
    }

    /// 中心から方位角 angle（東=0、反時計回り）、スケーリング済み距離 distance の点
    pub fn point_at(center: GeoPoint, distance: f64, angle: f64) -> GeoPoint {
        GeoPoint::new(
            center.lat + distance * angle.sin(),
            center.lon + distance * angle.cos() / Self::lon_scale(center),
        )
    }

    fn lon_scale(center: GeoPoint) -> f64 {
        center.lat.to_radians().cos()
    }
}
