//! # Planner モジュール
//!
//! 始点と終点から、もっともらしい都市内経路を近似する点列を生成します。
//!
//! ## プランナーの種類
//!
//! - **RoadNetworkPlanner**: 円形都市用。最寄りの道路点へスナップし、確率的に環状道路を
//!   短い弧の方向へ周回してから目的地へ接続します。
//! - **DirectPlanner**: 矩形都市用。道路網を使わず、ステップごとのジッター付き線形補間のみ。
//!
//! どちらのプランナーも点が2つ未満の経路を返すことはなく、同じ乱数状態からは同じ経路を返します。

use crate::models::{
    boundary::Boundary,
    common::{ConfigError, GeoPoint, math_utils},
    path::Path,
    road::{RoadNetwork, RoadNetworkConfig},
    traits::IPathPlanner,
};
use rand::{Rng, RngCore, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// 区間ごとのステップ数の下限・上限
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct StepBounds {
    pub min: usize,
    pub max: usize,
}

impl StepBounds {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    fn steps(&self, distance: f64, multiplier: f64) -> usize {
        math_utils::step_count(distance, multiplier, self.min, self.max)
    }
}

/// 道路網プランナーの設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoadPlannerConfig {
    /// 環状道路を経由する確率
    pub ring_probability: f64,
    /// 経由候補にする環状道路の最小半径（度）
    pub min_ring_span_deg: f64,
    /// 基準半径でのステップ倍率（度あたりのステップ数）
    pub step_multiplier_base: f64,
    /// step_multiplier_base が想定する境界半径（度）
    pub reference_radius_deg: f64,
    pub approach_steps: StepBounds,
    pub ring_entry_steps: StepBounds,
    pub connector_steps: StepBounds,
    pub connector_step_factor: f64,
    pub exit_steps: StepBounds,
    /// 道路点間の区間に加える横方向ノイズの振幅（noise_reference_radius_deg 時）
    pub noise_amplitude_deg: f64,
    pub noise_reference_radius_deg: f64,
    /// 道路網が使えない場合の直線補間
    pub direct_multiplier: f64,
    pub direct_steps: StepBounds,
    /// 計画結果が短すぎた場合の最終フォールバックの上限ステップ数
    pub fallback_max_steps: usize,
    /// これより近い連続点は除去する（約1m）
    pub dedup_distance_deg: f64,
    /// 始点・終点がこの距離未満なら3点の直線経路にする
    pub direct_shortcut_deg: Option<f64>,
}

impl Default for RoadPlannerConfig {
    fn default() -> Self {
        Self {
            ring_probability: 0.6,
            min_ring_span_deg: 0.005,
            step_multiplier_base: 25000.0,
            reference_radius_deg: 0.05,
            approach_steps: StepBounds::new(2, 30),
            ring_entry_steps: StepBounds::new(2, 30),
            connector_steps: StepBounds::new(3, 40),
            connector_step_factor: 0.8,
            exit_steps: StepBounds::new(2, 30),
            noise_amplitude_deg: 0.00005,
            noise_reference_radius_deg: 0.1,
            direct_multiplier: 30000.0,
            direct_steps: StepBounds::new(3, 100),
            fallback_max_steps: 20,
            dedup_distance_deg: 0.00001,
            direct_shortcut_deg: None,
        }
    }
}

/// 直線補間プランナーの設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DirectPlannerConfig {
    pub min_steps: usize,
    pub min_steps_upper: usize,
    /// 距離（|Δlat|+|Δlon|）あたりのステップ数の下限・上限
    pub steps_per_degree: [f64; 2],
    pub max_steps: usize,
    pub jitter_deg: f64,
}

impl Default for DirectPlannerConfig {
    fn default() -> Self {
        Self {
            min_steps: 15,
            min_steps_upper: 45,
            steps_per_degree: [500.0, 1500.0],
            max_steps: 240,
            jitter_deg: 0.0002,
        }
    }
}

/// プランナー選択
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlannerConfig {
    RoadNetwork(RoadPlannerConfig),
    Direct(DirectPlannerConfig),
}

impl PlannerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            PlannerConfig::RoadNetwork(cfg) => {
                if !(0.0..=1.0).contains(&cfg.ring_probability) {
                    return Err(ConfigError::InvalidProbability {
                        name: "planner.ring_probability",
                        value: cfg.ring_probability,
                    });
                }
                if cfg.step_multiplier_base <= 0.0 || cfg.reference_radius_deg <= 0.0 {
                    return Err(ConfigError::Invalid(
                        "planner.step_multiplier_base and reference_radius_deg must be positive".to_string(),
                    ));
                }
                if cfg.noise_reference_radius_deg <= 0.0 || cfg.noise_amplitude_deg < 0.0 {
                    return Err(ConfigError::Invalid("planner noise parameters are invalid".to_string()));
                }
            }
            PlannerConfig::Direct(cfg) => {
                if cfg.max_steps == 0 || cfg.jitter_deg < 0.0 {
                    return Err(ConfigError::Invalid(
                        "planner.max_steps must be positive and jitter_deg non-negative".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// 設定と境界からプランナーを構築
///
/// 道路網プランナーは円形境界でのみ使用できます。
pub fn build_planner(
    config: &PlannerConfig,
    boundary: Boundary,
    road_config: Option<&RoadNetworkConfig>,
) -> Result<Box<dyn IPathPlanner>, ConfigError> {
    config.validate()?;
    match config {
        PlannerConfig::RoadNetwork(cfg) => {
            if !boundary.is_circular() {
                return Err(ConfigError::Invalid(
                    "road_network planner requires a circular boundary".to_string(),
                ));
            }
            let network = road_config
                .map(|rc| RoadNetwork::build(&boundary, rc))
                .unwrap_or_default();
            Ok(Box::new(RoadNetworkPlanner::new(boundary, network, cfg.clone())))
        }
        PlannerConfig::Direct(cfg) => Ok(Box::new(DirectPlanner::new(boundary, cfg.clone()))),
    }
}

/// 環状道路上で start から end へ短い弧の方向に進むインデックス列（両端を含む）
///
/// |end - start| が周長の半分以下なら end へ直接向かい、それを超える場合は
/// 反対方向へ回り込みます。ちょうど半分の場合は end へ直接向かう方向になります。
pub fn ring_walk(start: usize, end: usize, len: usize) -> Vec<usize> {
    if len == 0 || start >= len || end >= len {
        return Vec::new();
    }
    let direct = start.abs_diff(end) as f64 <= len as f64 / 2.0;
    let step: isize = match (direct, end > start) {
        (true, true) | (false, false) => 1,
        (true, false) | (false, true) => -1,
    };

    let mut indices = Vec::new();
    let mut index = start;
    while index != end {
        indices.push(index);
        index = (index as isize + step).rem_euclid(len as isize) as usize;
    }
    indices.push(end);
    indices
}

/// 道路網を利用するプランナー（円形都市用）
pub struct RoadNetworkPlanner {
    boundary: Boundary,
    network: RoadNetwork,
    config: RoadPlannerConfig,
}

impl RoadNetworkPlanner {
    pub fn new(boundary: Boundary, network: RoadNetwork, config: RoadPlannerConfig) -> Self {
        Self {
            boundary,
            network,
            config,
        }
    }

    /// 境界が小さいほど度あたりのステップ数を増やし、実距離での点間隔をほぼ一定に保つ
    fn adaptive_multiplier(&self) -> f64 {
        self.config.step_multiplier_base * (self.config.reference_radius_deg / self.boundary.extent_deg())
    }

    /// from→to を steps 点で補間（両端を含む）し、射影して追加
    fn push_segment(&self, points: &mut Vec<GeoPoint>, from: GeoPoint, to: GeoPoint, steps: usize) {
        for i in 0..steps {
            let t = if steps > 1 { i as f64 / (steps - 1) as f64 } else { 1.0 };
            points.push(self.boundary.project(from.lerp(&to, t)));
        }
    }

    /// 道路点間の接続区間（両端でゼロになる正弦包絡の横ノイズ付き）
    fn push_connector(&self, points: &mut Vec<GeoPoint>, from: GeoPoint, to: GeoPoint, rng: &mut dyn RngCore) {
        let distance = from.degree_distance(&to);
        let steps = self
            .config
            .connector_steps
            .steps(distance, self.adaptive_multiplier() * self.config.connector_step_factor);
        if steps <= 1 {
            return;
        }

        let amplitude = self.config.noise_amplitude_deg
            * (self.boundary.extent_deg() / self.config.noise_reference_radius_deg);
        for i in 0..steps {
            let t = i as f64 / (steps - 1) as f64;
            let envelope = (t * PI).sin();
            let noise = GeoPoint::new(
                math_utils::uniform(rng, -amplitude, amplitude) * envelope,
                math_utils::uniform(rng, -amplitude, amplitude) * envelope,
            );
            points.push(self.boundary.project(from.lerp(&to, t) + noise));
        }
    }

    /// 道路網が使えない場合の直線補間
    fn direct_path(&self, start: GeoPoint, end: GeoPoint) -> Path {
        let multiplier = self.config.direct_multiplier * (self.config.reference_radius_deg / self.boundary.extent_deg());
        let steps = self
            .config
            .direct_steps
            .steps(start.degree_distance(&end), multiplier)
            .max(2);
        let mut points = Vec::with_capacity(steps);
        self.push_segment(&mut points, start, end, steps);
        Path::new(points)
    }

    /// 計画結果が短すぎた場合の最終フォールバック: [start] + 1..=n
    fn fallback_path(&self, start: GeoPoint, end: GeoPoint) -> Path {
        let steps = math_utils::step_count(
            start.degree_distance(&end),
            self.adaptive_multiplier(),
            2,
            self.config.fallback_max_steps,
        );
        let mut points = vec![start];
        for i in 1..=steps {
            let t = i as f64 / steps as f64;
            points.push(self.boundary.project(start.lerp(&end, t)));
        }
        Path::new(points)
    }

    /// 連続する近接点を除去
    fn dedup(&self, points: Vec<GeoPoint>) -> Vec<GeoPoint> {
        let mut result: Vec<GeoPoint> = Vec::with_capacity(points.len());
        for point in points {
            match result.last() {
                Some(last) if point.degree_distance(last) <= self.config.dedup_distance_deg => {}
                _ => result.push(point),
            }
        }
        result
    }
}

impl IPathPlanner for RoadNetworkPlanner {
    fn plan(&self, start: GeoPoint, end: GeoPoint, rng: &mut dyn RngCore) -> Path {
        let start = self.boundary.project(start);
        let end = self.boundary.project(end);

        if let Some(shortcut) = self.config.direct_shortcut_deg {
            if start.degree_distance(&end) < shortcut {
                let mut points = Vec::with_capacity(3);
                self.push_segment(&mut points, start, end, 3);
                return Path::new(points);
            }
        }

        if self.network.len() < 2 {
            return self.direct_path(start, end);
        }
        let (Some(start_road), Some(end_road)) = (
            self.network.nearest_point(&start),
            self.network.nearest_point(&end),
        ) else {
            return self.direct_path(start, end);
        };

        let multiplier = self.adaptive_multiplier();
        let mut points = Vec::new();

        let steps = self.config.approach_steps.steps(start.degree_distance(&start_road), multiplier);
        self.push_segment(&mut points, start, start_road, steps);

        let mut segment_start = start_road;
        let rings = self.network.ring_roads_wider_than(self.config.min_ring_span_deg);
        if !rings.is_empty() && math_utils::chance(rng, self.config.ring_probability) {
            if let Some(ring) = rings.choose(rng) {
                if let (Some(entry_index), Some(exit_index)) =
                    (ring.nearest_index(&start_road), ring.nearest_index(&end_road))
                {
                    let entry = ring.points[entry_index];
                    let steps = self
                        .config
                        .ring_entry_steps
                        .steps(start_road.degree_distance(&entry), multiplier);
                    self.push_segment(&mut points, start_road, entry, steps);

                    for index in ring_walk(entry_index, exit_index, ring.points.len()) {
                        points.push(self.boundary.project(ring.points[index]));
                    }
                    segment_start = ring.points[exit_index];
                }
            }
        }

        self.push_connector(&mut points, segment_start, end_road, rng);

        let steps = self.config.exit_steps.steps(end_road.degree_distance(&end), multiplier);
        self.push_segment(&mut points, end_road, end, steps);

        let points = self.dedup(points);
        if points.len() < 2 {
            return self.fallback_path(start, end);
        }
        Path::new(points)
    }

    fn road_network(&self) -> Option<&RoadNetwork> {
        Some(&self.network)
    }
}

/// 道路網を使わない直線補間プランナー（矩形都市用）
pub struct DirectPlanner {
    boundary: Boundary,
    config: DirectPlannerConfig,
}

impl DirectPlanner {
    pub fn new(boundary: Boundary, config: DirectPlannerConfig) -> Self {
        Self { boundary, config }
    }

    /// 概算距離からステップ数を乱数で決定
    fn step_count(&self, start: &GeoPoint, end: &GeoPoint, rng: &mut dyn RngCore) -> usize {
        let distance = (end.lat - start.lat).abs() + (end.lon - start.lon).abs();
        let [per_deg_low, per_deg_high] = self.config.steps_per_degree;
        let low = ((distance * per_deg_low) as usize).max(self.config.min_steps);
        let high = ((distance * per_deg_high) as usize).max(self.config.min_steps_upper).max(low);
        rng.gen_range(low..=high).min(self.config.max_steps).max(1)
    }
}

impl IPathPlanner for DirectPlanner {
    fn plan(&self, start: GeoPoint, end: GeoPoint, rng: &mut dyn RngCore) -> Path {
        let start = self.boundary.project(start);
        let end = self.boundary.project(end);
        let steps = self.step_count(&start, &end, rng);
        let jitter = self.config.jitter_deg;

        let mut points = Vec::with_capacity(steps + 1);
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            let mut point = start.lerp(&end, t);
            if i > 0 && i < steps {
                point = point
                    + GeoPoint::new(
                        math_utils::uniform(rng, -jitter, jitter),
                        math_utils::uniform(rng, -jitter, jitter),
                    );
            }
            points.push(self.boundary.project(point));
        }
        Path::new(points)
    }

    fn road_network(&self) -> Option<&RoadNetwork> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::road::{Road, RoadKind};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn ankara_boundary() -> Boundary {
        Boundary::circular(GeoPoint::new(39.9208, 32.8541), 0.10).unwrap()
    }

    fn ankara_planner() -> RoadNetworkPlanner {
        let boundary = ankara_boundary();
        let network = RoadNetwork::build(&boundary, &RoadNetworkConfig::default());
        RoadNetworkPlanner::new(boundary, network, RoadPlannerConfig::default())
    }

    fn istanbul_planner() -> DirectPlanner {
        let boundary = Boundary::rectangular(40.80, 41.30, 28.20, 29.65).unwrap();
        DirectPlanner::new(boundary, DirectPlannerConfig::default())
    }

    #[test]
    fn test_ring_walk_takes_shorter_arc() {
        let walk = ring_walk(2, 20, 24);
        assert_eq!(walk, vec![2, 1, 0, 23, 22, 21, 20]);
        assert_eq!(walk.len() - 1, 6);

        assert_eq!(ring_walk(20, 2, 24), vec![20, 21, 22, 23, 0, 1, 2]);
        assert_eq!(ring_walk(3, 6, 24), vec![3, 4, 5, 6]);
        assert_eq!(ring_walk(5, 5, 24), vec![5]);
    }

    #[test]
    fn test_ring_walk_antipodal_moves_toward_end() {
        assert_eq!(ring_walk(0, 12, 24).len(), 13);
        assert_eq!(ring_walk(0, 12, 24)[1], 1);
        assert_eq!(ring_walk(12, 0, 24)[1], 11);
    }

    #[test]
    fn test_plan_walks_ring_on_shorter_arc() {
        // 赤道上の中心なら経度スケールは1
        let boundary = Boundary::circular(GeoPoint::new(0.0, 0.0), 0.10).unwrap();
        let at = |radius: f64, index: usize| {
            let angle = 2.0 * PI * index as f64 / 24.0;
            GeoPoint::new(radius * angle.sin(), radius * angle.cos())
        };
        let ring = Road {
            name: "Orta_Cevre_Yolu".to_string(),
            kind: RoadKind::Ring { radius_deg: 0.05 },
            points: (0..24).map(|i| at(0.05, i)).collect(),
        };
        let hub = Road {
            name: "Merkez".to_string(),
            kind: RoadKind::Radial { bearing_rad: 0.0 },
            points: vec![boundary.center()],
        };
        let config = RoadPlannerConfig {
            ring_probability: 1.0,
            ..RoadPlannerConfig::default()
        };
        let planner = RoadNetworkPlanner::new(boundary, RoadNetwork::from_roads(vec![hub, ring.clone()]), config);

        let path = planner.plan(at(0.06, 2), at(0.06, 20), &mut StdRng::seed_from_u64(3));
        let expected: Vec<GeoPoint> = ring_walk(2, 20, 24).into_iter().map(|i| ring.points[i]).collect();
        assert_eq!(expected.len(), 7);

        let points = path.points();
        let close = |a: &GeoPoint, b: &GeoPoint| a.degree_distance(b) < 1e-9;
        let offset = points
            .iter()
            .position(|p| close(p, &expected[0]))
            .expect("path must enter the ring at index 2");
        for (k, ring_point) in expected.iter().enumerate() {
            assert!(close(&points[offset + k], ring_point), "ring point {} out of sequence", k);
        }
        assert!(!points.iter().any(|p| close(p, &ring.points[10])));
    }

    #[test]
    fn test_plan_is_deterministic_for_seed() {
        let planner = ankara_planner();
        let a = GeoPoint::new(39.95, 32.80);
        let b = GeoPoint::new(39.88, 32.90);
        let first = planner.plan(a, b, &mut StdRng::seed_from_u64(99));
        let second = planner.plan(a, b, &mut StdRng::seed_from_u64(99));
        assert_eq!(first, second);

        let direct = istanbul_planner();
        let s = GeoPoint::new(41.0369, 28.9760);
        let e = GeoPoint::new(40.9905, 29.0290);
        assert_eq!(
            direct.plan(s, e, &mut StdRng::seed_from_u64(5)),
            direct.plan(s, e, &mut StdRng::seed_from_u64(5))
        );
    }

    #[test]
    fn test_plan_is_total_and_contained() {
        let planner = ankara_planner();
        let boundary = ankara_boundary();
        let mut rng = StdRng::seed_from_u64(2024);
        for _ in 0..300 {
            let a = boundary.random_interior_point(&mut rng);
            let b = boundary.random_interior_point(&mut rng);
            for (start, end) in [(a, b), (a, a)] {
                let path = planner.plan(start, end, &mut rng);
                assert!(path.len() >= 2);
                assert!(path.points().iter().all(|p| boundary.contains(p)));
            }
        }
    }

    #[test]
    fn test_plan_starts_at_start_and_ends_at_target() {
        let planner = ankara_planner();
        let start = GeoPoint::new(39.93, 32.83);
        let end = GeoPoint::new(39.90, 32.88);
        let path = planner.plan(start, end, &mut StdRng::seed_from_u64(11));
        assert!(path.first().unwrap().degree_distance(&start) < 1e-9);
        assert!(path.last().unwrap().degree_distance(&end) < 1e-9);
    }

    #[test]
    fn test_plan_projects_outside_endpoints() {
        let planner = ankara_planner();
        let boundary = ankara_boundary();
        let outside = GeoPoint::new(40.1231, 32.9975);
        let path = planner.plan(boundary.center(), outside, &mut StdRng::seed_from_u64(8));
        let last = path.last().unwrap();
        assert!(boundary.contains(&last));
        assert!((boundary.scaled_distance(&last) - 0.095).abs() < 1e-9);
    }

    #[test]
    fn test_plan_removes_near_duplicate_points() {
        let planner = ankara_planner();
        let mut rng = StdRng::seed_from_u64(77);
        let boundary = ankara_boundary();
        for _ in 0..50 {
            let a = boundary.random_interior_point(&mut rng);
            let b = boundary.random_interior_point(&mut rng);
            let path = planner.plan(a, b, &mut rng);
            for pair in path.points().windows(2) {
                assert!(pair[0].degree_distance(&pair[1]) > 0.00001);
            }
        }
    }

    #[test]
    fn test_sparse_network_falls_back_to_direct_interpolation() {
        let boundary = ankara_boundary();
        let single = RoadNetwork::from_roads(vec![Road {
            name: "only".to_string(),
            kind: RoadKind::Radial { bearing_rad: 0.0 },
            points: vec![boundary.center()],
        }]);
        let planner = RoadNetworkPlanner::new(boundary, single, RoadPlannerConfig::default());
        let start = GeoPoint::new(39.95, 32.85);
        let end = GeoPoint::new(39.90, 32.86);
        let path = planner.plan(start, end, &mut StdRng::seed_from_u64(1));
        assert!(path.len() >= 3 && path.len() <= 100);
        assert_eq!(path.first().unwrap(), start);
        assert!(path.last().unwrap().degree_distance(&end) < 1e-12);

        let same = planner.plan(start, start, &mut StdRng::seed_from_u64(1));
        assert!(same.len() >= 2);
    }

    #[test]
    fn test_shortcut_returns_three_points() {
        let boundary = ankara_boundary();
        let network = RoadNetwork::build(&boundary, &RoadNetworkConfig::default());
        let config = RoadPlannerConfig {
            direct_shortcut_deg: Some(0.005),
            ..RoadPlannerConfig::default()
        };
        let planner = RoadNetworkPlanner::new(boundary, network, config);
        let start = GeoPoint::new(39.9208, 32.8541);
        let path = planner.plan(start, GeoPoint::new(39.9228, 32.8551), &mut StdRng::seed_from_u64(1));
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn test_direct_planner_bounds() {
        let planner = istanbul_planner();
        let boundary = Boundary::rectangular(40.80, 41.30, 28.20, 29.65).unwrap();
        let mut rng = StdRng::seed_from_u64(31);
        let start = GeoPoint::new(41.0369, 28.9760);
        let end = GeoPoint::new(40.8250, 29.3000);
        for _ in 0..100 {
            let path = planner.plan(start, end, &mut rng);
            assert!(path.len() >= 16 && path.len() <= 241);
            assert_eq!(path.first().unwrap(), start);
            assert!(path.last().unwrap().degree_distance(&end) < 1e-12);
            assert!(path.points().iter().all(|p| boundary.contains(p)));
        }
        let same = planner.plan(start, start, &mut rng);
        assert!(same.len() >= 2);
    }

    #[test]
    fn test_build_planner_rejects_road_network_on_rectangle() {
        let rect = Boundary::rectangular(40.8, 41.3, 28.2, 29.65).unwrap();
        let config = PlannerConfig::RoadNetwork(RoadPlannerConfig::default());
        assert!(build_planner(&config, rect, Some(&RoadNetworkConfig::default())).is_err());

        let direct = PlannerConfig::Direct(DirectPlannerConfig::default());
        let planner = build_planner(&direct, rect, None).unwrap();
        assert!(planner.road_network().is_none());
    }
}
