use crate::models::{boundary::Boundary, common::GeoPoint};
use rand::{RngCore, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// 名前付きの重要地点
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct KeyLocation {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl KeyLocation {
    pub fn new(name: impl Into<String>, point: GeoPoint) -> Self {
        Self {
            name: name.into(),
            lat: point.lat,
            lon: point.lon,
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

/// 重要地点テーブル
///
/// 構築時に境界外の地点を一度だけ境界内へ射影し、以降は読み取り専用です。
/// 全ての地点が境界内にあることが保証されます。
#[derive(Debug, Clone)]
pub struct KeyLocationTable {
    locations: Vec<KeyLocation>,
    projected_count: usize,
}

impl KeyLocationTable {
    /// 地点が一つもない場合に境界中心へ置く代替地点の名前
    pub const FALLBACK_NAME: &'static str = "Merkez_Fallback";

    pub fn new(locations: Vec<KeyLocation>, boundary: &Boundary) -> Self {
        let mut projected_count = 0;
        let mut adjusted: Vec<KeyLocation> = locations
            .into_iter()
            .map(|location| {
                let original = location.point();
                if boundary.contains(&original) {
                    return location;
                }
                let projected = boundary.project(original);
                projected_count += 1;
                warn!(
                    location = %location.name,
                    original = %original,
                    projected = %projected,
                    "重要地点が境界外のため境界内へ射影しました"
                );
                KeyLocation::new(location.name, projected)
            })
            .collect();

        if adjusted.is_empty() {
            warn!("重要地点が定義されていないため境界中心を代替地点として使用します");
            adjusted.push(KeyLocation::new(Self::FALLBACK_NAME, boundary.center()));
        }

        info!(
            total = adjusted.len(),
            inside = adjusted.len() - projected_count,
            projected = projected_count,
            "重要地点テーブルを構築しました"
        );

        Self {
            locations: adjusted,
            projected_count,
        }
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// 射影された地点の数
    pub fn projected_count(&self) -> usize {
        self.projected_count
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyLocation> {
        self.locations.iter()
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&KeyLocation> {
        self.locations.iter().find(|location| location.name == name)
    }

    /// 指定点に最も近い地点（度単位の距離、同距離なら先に定義された地点）
    pub fn nearest(&self, point: &GeoPoint) -> Option<&KeyLocation> {
        let mut best: Option<(&KeyLocation, f64)> = None;
        for location in &self.locations {
            let distance = location.point().degree_distance(point);
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((location, distance));
            }
        }
        best.map(|(location, _)| location)
    }

    /// 一様ランダムに地点を選択
    pub fn choose(&self, rng: &mut dyn RngCore) -> Option<&KeyLocation> {
        self.locations.choose(rng)
    }

    /// 直前の地点以外から一様ランダムに選択
    ///
    /// 候補が残らない場合（地点が1つだけ等）は全地点から選びます。
    pub fn choose_other(&self, previous: Option<&str>, rng: &mut dyn RngCore) -> Option<&KeyLocation> {
        let candidates: Vec<&KeyLocation> = self
            .locations
            .iter()
            .filter(|location| Some(location.name.as_str()) != previous)
            .collect();
        match candidates.choose(rng) {
            Some(location) => Some(*location),
            None => self.choose(rng),
        }
    }
}
