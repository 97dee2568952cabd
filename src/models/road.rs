use crate::models::{
    boundary::Boundary,
    common::{GeoPoint, math_utils},
};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{debug, warn};

/// 道路の種類
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoadKind {
    /// 環状道路（閉ループ、半径は度単位）
    Ring { radius_deg: f64 },
    /// 放射道路（中心付近から外側へ向かう）
    Radial { bearing_rad: f64 },
}

/// 名前付きの道路ポリライン
///
/// 方向性・速度制限・接続性は持たず、経路計画時のスナップ先として使う点列です。
#[derive(Debug, Clone, PartialEq)]
pub struct Road {
    pub name: String,
    pub kind: RoadKind,
    pub points: Vec<GeoPoint>,
}

impl Road {
    pub fn is_ring(&self) -> bool {
        matches!(self.kind, RoadKind::Ring { .. })
    }

    /// 指定点に最も近い点のインデックス（空の場合は None）
    pub fn nearest_index(&self, point: &GeoPoint) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (index, candidate) in self.points.iter().enumerate() {
            let distance = candidate.degree_distance(point);
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((index, distance));
            }
        }
        best.map(|(index, _)| index)
    }
}

/// 環状道路の設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RingRoadConfig {
    pub name: String,
    /// 境界半径に対する比率
    pub radius_fraction: f64,
}

/// 道路網の生成設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoadNetworkConfig {
    #[serde(default = "default_rings")]
    pub rings: Vec<RingRoadConfig>,
    #[serde(default = "default_ring_point_count")]
    pub ring_point_count: usize,
    /// これより小さい半径の環状道路・放射道路サンプルは生成しない
    #[serde(default = "default_min_ring_radius_deg")]
    pub min_ring_radius_deg: f64,
    #[serde(default = "default_radial_count")]
    pub radial_count: usize,
    #[serde(default = "default_radial_prefix")]
    pub radial_prefix: String,
    #[serde(default = "default_radial_start")]
    pub radial_start: f64,
    #[serde(default = "default_radial_end")]
    pub radial_end: f64,
    #[serde(default = "default_radial_samples")]
    pub radial_samples: usize,
}

fn default_rings() -> Vec<RingRoadConfig> {
    [("Ic_Cevre_Yolu", 0.4), ("Orta_Cevre_Yolu", 0.7), ("Dis_Cevre_Yolu", 0.95)]
        .into_iter()
        .map(|(name, radius_fraction)| RingRoadConfig {
            name: name.to_string(),
            radius_fraction,
        })
        .collect()
}

fn default_ring_point_count() -> usize {
    24
}

fn default_min_ring_radius_deg() -> f64 {
    0.001
}

fn default_radial_count() -> usize {
    6
}

fn default_radial_prefix() -> String {
    "Radyal_Yol".to_string()
}

fn default_radial_start() -> f64 {
    0.1
}

fn default_radial_end() -> f64 {
    0.95
}

fn default_radial_samples() -> usize {
    10
}

impl Default for RoadNetworkConfig {
    fn default() -> Self {
        Self {
            rings: default_rings(),
            ring_point_count: default_ring_point_count(),
            min_ring_radius_deg: default_min_ring_radius_deg(),
            radial_count: default_radial_count(),
            radial_prefix: default_radial_prefix(),
            radial_start: default_radial_start(),
            radial_end: default_radial_end(),
            radial_samples: default_radial_samples(),
        }
    }
}

/// 合成道路網（環状道路＋放射道路）
///
/// 起動時に一度だけ構築され、以降は不変です。
/// 道路は放射道路→環状道路の順で保持され、最近傍探索で距離が等しい場合は
/// 放射道路の点が優先されます。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoadNetwork {
    roads: Vec<Road>,
}

impl RoadNetwork {
    /// 道路リストから直接作成（順序はそのまま探索順になる）
    pub fn from_roads(roads: Vec<Road>) -> Self {
        Self { roads }
    }

    /// 境界パラメータから道路網を構築
    ///
    /// 矩形境界では道路網は空になります。
    pub fn build(boundary: &Boundary, config: &RoadNetworkConfig) -> Self {
        let Boundary::Circular { center, radius_deg } = *boundary else {
            debug!("矩形境界のため道路網は生成しません");
            return Self::default();
        };

        let mut radials = Vec::new();
        let fractions = math_utils::linspace(config.radial_start, config.radial_end, config.radial_samples);
        for i in 0..config.radial_count {
            let bearing = 2.0 * PI * i as f64 / config.radial_count as f64;
            let points: Vec<GeoPoint> = fractions
                .iter()
                .map(|fraction| radius_deg * fraction)
                .filter(|r| *r >= config.min_ring_radius_deg)
                .map(|r| Boundary::point_at(center, r, bearing))
                .collect();
            if points.is_empty() {
                continue;
            }
            let name = format!("{}_{}", config.radial_prefix, i + 1);
            debug!(road = %name, points = points.len(), "放射道路を生成しました");
            radials.push(Road {
                name,
                kind: RoadKind::Radial { bearing_rad: bearing },
                points,
            });
        }

        let mut rings = Vec::new();
        for ring in &config.rings {
            let ring_radius = radius_deg * ring.radius_fraction;
            if ring_radius < config.min_ring_radius_deg || config.ring_point_count == 0 {
                warn!(
                    road = %ring.name,
                    radius_deg = ring_radius,
                    "環状道路の半径が小さすぎるためスキップします"
                );
                continue;
            }
            let points: Vec<GeoPoint> = (0..config.ring_point_count)
                .map(|i| {
                    let angle = 2.0 * PI * i as f64 / config.ring_point_count as f64;
                    Boundary::point_at(center, ring_radius, angle)
                })
                .collect();
            debug!(road = %ring.name, points = points.len(), radius_deg = ring_radius, "環状道路を生成しました");
            rings.push(Road {
                name: ring.name.clone(),
                kind: RoadKind::Ring { radius_deg: ring_radius },
                points,
            });
        }

        if radials.is_empty() && rings.is_empty() {
            warn!("道路網を生成できませんでした。経路は直線補間になります");
        }

        radials.extend(rings);
        Self { roads: radials }
    }

    pub fn roads(&self) -> &[Road] {
        &self.roads
    }

    pub fn len(&self) -> usize {
        self.roads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roads.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&Road> {
        self.roads.iter().find(|road| road.name == name)
    }

    /// 半径が min_radius_deg を超える環状道路
    pub fn ring_roads_wider_than(&self, min_radius_deg: f64) -> Vec<&Road> {
        self.roads
            .iter()
            .filter(|road| match road.kind {
                RoadKind::Ring { radius_deg } => radius_deg > min_radius_deg && !road.points.is_empty(),
                RoadKind::Radial { .. } => false,
            })
            .collect()
    }

    /// 全道路点に対する最近傍点（線形探索）
    ///
    /// 道路点は高々百数十点なので索引構造は持たず O(N) の全探索で済ませます。
    /// 距離が等しい場合は先に探索される放射道路の点が選ばれます。
    pub fn nearest_point(&self, point: &GeoPoint) -> Option<GeoPoint> {
        let mut best: Option<(GeoPoint, f64)> = None;
        for candidate in self.roads.iter().flat_map(|road| road.points.iter()) {
            let distance = candidate.degree_distance(point);
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((*candidate, distance));
            }
        }
        best.map(|(p, _)| p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ankara() -> Boundary {
        Boundary::circular(GeoPoint::new(39.9208, 32.8541), 0.10).unwrap()
    }

    #[test]
    fn test_build_default_network() {
        let network = RoadNetwork::build(&ankara(), &RoadNetworkConfig::default());
        assert_eq!(network.len(), 9);

        // 放射道路が先に並ぶ
        assert!(network.roads()[..6].iter().all(|r| !r.is_ring()));
        assert!(network.roads()[6..].iter().all(|r| r.is_ring()));
        assert_eq!(network.roads()[0].name, "Radyal_Yol_1");
        assert_eq!(network.roads()[0].points.len(), 10);

        let outer = network.get("Dis_Cevre_Yolu").unwrap();
        assert_eq!(outer.points.len(), 24);
        let boundary = ankara();
        for p in &outer.points {
            assert!((boundary.scaled_distance(p) - 0.095).abs() < 1e-9);
        }
    }

    #[test]
    fn test_small_radius_skips_rings() {
        let tiny = Boundary::circular(GeoPoint::new(39.9208, 32.8541), 0.002).unwrap();
        let network = RoadNetwork::build(&tiny, &RoadNetworkConfig::default());
        // 0.4*0.002 = 0.0008 < 0.001 のため内側環状道路は生成されない
        assert!(network.get("Ic_Cevre_Yolu").is_none());
        assert!(network.get("Orta_Cevre_Yolu").is_some());
        // 放射道路は半径 0.001 未満のサンプルを除外
        let radial = network.get("Radyal_Yol_1").unwrap();
        assert!(radial.points.len() < 10);
    }

    #[test]
    fn test_rectangular_boundary_has_no_roads() {
        let rect = Boundary::rectangular(40.8, 41.3, 28.2, 29.65).unwrap();
        assert!(RoadNetwork::build(&rect, &RoadNetworkConfig::default()).is_empty());
    }

    #[test]
    fn test_nearest_point_prefers_radial_on_tie() {
        let shared = GeoPoint::new(1.0, 1.0);
        let network = RoadNetwork::from_roads(vec![
            Road {
                name: "radial".to_string(),
                kind: RoadKind::Radial { bearing_rad: 0.0 },
                points: vec![shared],
            },
            Road {
                name: "ring".to_string(),
                kind: RoadKind::Ring { radius_deg: 1.0 },
                points: vec![GeoPoint::new(1.0, 1.0), GeoPoint::new(5.0, 5.0)],
            },
        ]);
        let nearest = network.nearest_point(&GeoPoint::new(0.0, 0.0)).unwrap();
        assert_eq!(nearest, shared);
        assert!(RoadNetwork::default().nearest_point(&shared).is_none());
    }

    #[test]
    fn test_ring_roads_wider_than() {
        let network = RoadNetwork::build(&ankara(), &RoadNetworkConfig::default());
        assert_eq!(network.ring_roads_wider_than(0.005).len(), 3);
        assert_eq!(network.ring_roads_wider_than(0.05).len(), 2);
    }
}
