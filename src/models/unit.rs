use crate::models::{
    common::{GeoPoint, GeoPosition, UnitStatus, math_utils},
    path::Path,
    traits::{IAgent, IMovable},
};
use crate::simulation::SimulationContext;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// 初期位置の決め方
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StartStrategy {
    /// 境界内の一様ランダムな点
    RandomInterior,
    /// ランダムな重要地点 ± jitter_deg
    KeyLocation { jitter_deg: f64 },
}

/// 移動ユニットの設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UnitConfig {
    pub id_prefix: String,
    /// 高度範囲 [min, max]（m）
    pub altitude_m: [f64; 2],
    /// 初期高度の抽選範囲（省略時は altitude_m、結果は altitude_m にクランプ）
    pub initial_altitude_m: Option<[f64; 2]>,
    /// 1ティックあたりの高度変化の最大幅（m）
    pub altitude_drift_m: f64,
    pub start: StartStrategy,
    /// 新しい目標に重要地点を選ぶ確率
    pub key_target_probability: f64,
    /// ランダム目標のラベル（最寄り重要地点名）に付ける接尾辞
    pub random_target_suffix: String,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            id_prefix: "IKA".to_string(),
            altitude_m: [950.0, 1100.0],
            initial_altitude_m: None,
            altitude_drift_m: 0.5,
            start: StartStrategy::RandomInterior,
            key_target_probability: 0.8,
            random_target_suffix: String::new(),
        }
    }
}

/// 重要地点が一つも引けない場合のランダム目標ラベル
pub const RANDOM_TARGET_NAME: &str = "Rastgele_Hedef";

/// ユニットの現在の目標
#[derive(Debug, Clone, PartialEq)]
pub struct UnitTarget {
    pub name: String,
    pub point: GeoPoint,
}

/// 新しい目標を選択
///
/// 確率 key_target_probability で直前の目標以外の重要地点を選び、
/// それ以外は境界内のランダムな点を最寄りの重要地点名で命名します。
pub fn select_target(context: &mut SimulationContext, previous: Option<&str>) -> UnitTarget {
    let probability = context.unit_config.key_target_probability;
    if math_utils::chance(&mut context.rng, probability) {
        if let Some(location) = context.key_locations.choose_other(previous, &mut context.rng) {
            return UnitTarget {
                name: location.name.clone(),
                point: location.point(),
            };
        }
    }

    let point = context.boundary.random_interior_point(&mut context.rng);
    let name = match context.key_locations.nearest(&point) {
        Some(location) => format!("{}{}", location.name, context.unit_config.random_target_suffix),
        None => RANDOM_TARGET_NAME.to_string(),
    };
    UnitTarget { name, point }
}

/// 1ティック分のユニット出力
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitSnapshot<'a> {
    pub id: &'a str,
    pub position: GeoPosition,
    pub target_name: &'a str,
}

/// 移動センサーユニット（IKA）
///
/// 事前計画された経路をカーソルで1ティックずつ進み、終端に達すると
/// 次のティックで新しい目標を選んで再計画します。終了状態は持ちません。
#[derive(Debug, Clone)]
pub struct MobileUnit {
    /// ユニットの一意識別子
    pub id: String,
    position: GeoPosition,
    target: UnitTarget,
    path: Path,
    /// 次に取り出す経路点のインデックス
    cursor: usize,
    status: UnitStatus,
    altitude_range: [f64; 2],
    altitude_drift_m: f64,
    replan_count: u64,
}

impl MobileUnit {
    /// 初期位置・初期目標・初期経路を決めてユニットを作成
    pub fn new(id: String, context: &mut SimulationContext) -> Self {
        let (start, start_name) = match context.unit_config.start {
            StartStrategy::RandomInterior => (context.boundary.random_interior_point(&mut context.rng), None),
            StartStrategy::KeyLocation { jitter_deg } => {
                match context.key_locations.choose(&mut context.rng).cloned() {
                    Some(location) => {
                        let jitter = GeoPoint::new(
                            math_utils::uniform(&mut context.rng, -jitter_deg, jitter_deg),
                            math_utils::uniform(&mut context.rng, -jitter_deg, jitter_deg),
                        );
                        (context.boundary.project(location.point() + jitter), Some(location.name))
                    }
                    None => (context.boundary.center(), None),
                }
            }
        };

        let target = select_target(context, start_name.as_deref());
        let path = context.planner.plan(start, target.point, &mut context.rng);
        let altitude_range = context.unit_config.altitude_m;
        let initial_range = context.unit_config.initial_altitude_m.unwrap_or(altitude_range);
        let altitude =
            math_utils::uniform_in(&mut context.rng, initial_range).clamp(altitude_range[0], altitude_range[1]);
        let status = if path.is_degenerate() {
            UnitStatus::Arrived
        } else {
            UnitStatus::Following
        };

        debug!(
            unit_id = %id,
            start = %start,
            target = %target.name,
            path_points = path.len(),
            "ユニットを初期化しました"
        );

        Self {
            id,
            position: GeoPosition::new(start, altitude),
            target,
            path,
            cursor: 0,
            status,
            altitude_range,
            altitude_drift_m: context.unit_config.altitude_drift_m,
            replan_count: 0,
        }
    }

    pub fn status(&self) -> UnitStatus {
        self.status
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn target(&self) -> &UnitTarget {
        &self.target
    }

    pub fn replan_count(&self) -> u64 {
        self.replan_count
    }

    pub fn snapshot(&self) -> UnitSnapshot<'_> {
        UnitSnapshot {
            id: &self.id,
            position: self.get_position(),
            target_name: &self.target.name,
        }
    }

    /// 経路点を1つ進める
    fn advance(&mut self) {
        if let Some(point) = self.path.get(self.cursor) {
            self.position.set_point(point);
            self.cursor += 1;
        }
        if self.cursor >= self.path.len() {
            self.status = UnitStatus::Arrived;
        }
    }

    /// 新しい目標を選んで経路を再計画
    fn replan(&mut self, context: &mut SimulationContext) {
        let current = context.boundary.project(self.position.point());
        self.position.set_point(current);

        let target = select_target(context, Some(&self.target.name));
        self.path = context.planner.plan(current, target.point, &mut context.rng);
        self.cursor = 0;
        self.status = if self.path.is_degenerate() {
            UnitStatus::Arrived
        } else {
            UnitStatus::Following
        };
        self.replan_count += 1;

        debug!(
            unit_id = %self.id,
            previous_target = %self.target.name,
            new_target = %target.name,
            path_points = self.path.len(),
            "ユニットが経路を再計画しました"
        );
        self.target = target;
    }

    fn drift_altitude(&mut self, context: &mut SimulationContext) {
        let drift = math_utils::uniform(&mut context.rng, -self.altitude_drift_m, self.altitude_drift_m);
        let [min, max] = self.altitude_range;
        self.position.alt_m = (self.position.alt_m + drift).clamp(min, max);
    }
}

impl IAgent for MobileUnit {
    fn tick(&mut self, context: &mut SimulationContext) {
        match self.status {
            UnitStatus::Following => self.advance(),
            UnitStatus::Arrived => self.replan(context),
        }

        let projected = context.boundary.project(self.position.point());
        self.position.set_point(projected);
        self.drift_altitude(context);

        trace!(
            unit_id = %self.id,
            lat = self.position.lat,
            lon = self.position.lon,
            cursor = self.cursor,
            path_points = self.path.len(),
            "ユニット位置更新"
        );
    }
}

impl IMovable for MobileUnit {
    fn get_position(&self) -> GeoPosition {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        boundary::Boundary,
        key_location::{KeyLocation, KeyLocationTable},
        planner::{DirectPlanner, DirectPlannerConfig, RoadNetworkPlanner, RoadPlannerConfig},
        road::{RoadNetwork, RoadNetworkConfig},
    };

    fn ankara_context(unit_config: UnitConfig, seed: u64) -> SimulationContext {
        let boundary = Boundary::circular(GeoPoint::new(39.9208, 32.8541), 0.10).unwrap();
        let key_locations = KeyLocationTable::new(
            vec![
                KeyLocation::new("Kizilay_Merkez", GeoPoint::new(39.9208, 32.8541)),
                KeyLocation::new("Anitkabir", GeoPoint::new(39.9253, 32.8364)),
                KeyLocation::new("Maltepe", GeoPoint::new(39.9267, 32.8456)),
                KeyLocation::new("Airport", GeoPoint::new(40.1231, 32.9975)),
            ],
            &boundary,
        );
        let network = RoadNetwork::build(&boundary, &RoadNetworkConfig::default());
        let planner = RoadNetworkPlanner::new(boundary, network, RoadPlannerConfig::default());
        SimulationContext::new(boundary, key_locations, Box::new(planner), unit_config, seed)
    }

    #[test]
    fn test_unit_stays_inside_boundary() {
        let mut context = ankara_context(UnitConfig::default(), 1);
        let mut units: Vec<MobileUnit> = (0..5)
            .map(|i| MobileUnit::new(format!("IKA_{:03}", i + 1), &mut context))
            .collect();
        for _ in 0..600 {
            for unit in &mut units {
                unit.tick(&mut context);
                let position = unit.get_position();
                assert!(context.boundary.contains(&position.point()));
                assert!(position.alt_m >= 950.0 && position.alt_m <= 1100.0);
            }
        }
        assert!(units.iter().any(|u| u.replan_count() > 0));
    }

    #[test]
    fn test_cursor_is_monotonic_within_a_path() {
        let mut context = ankara_context(UnitConfig::default(), 2);
        let mut unit = MobileUnit::new("IKA_001".to_string(), &mut context);
        let mut last_cursor = unit.cursor();
        let mut last_replans = unit.replan_count();
        for _ in 0..400 {
            unit.tick(&mut context);
            assert!(unit.cursor() <= unit.path().len());
            if unit.replan_count() == last_replans {
                assert!(unit.cursor() >= last_cursor);
            }
            last_cursor = unit.cursor();
            last_replans = unit.replan_count();
        }
    }

    #[test]
    fn test_arrival_triggers_replan_with_new_target() {
        let config = UnitConfig {
            key_target_probability: 1.0,
            ..UnitConfig::default()
        };
        let mut context = ankara_context(config, 3);
        let mut unit = MobileUnit::new("IKA_001".to_string(), &mut context);

        let mut guard = 0;
        while unit.status() == UnitStatus::Following {
            unit.tick(&mut context);
            guard += 1;
            assert!(guard < 10_000);
        }
        assert_eq!(unit.cursor(), unit.path().len());
        let previous_target = unit.target().name.clone();
        let previous_path = unit.path().clone();

        unit.tick(&mut context);
        assert_eq!(unit.cursor(), 0);
        assert_eq!(unit.status(), UnitStatus::Following);
        assert_ne!(unit.target().name, previous_target);
        assert_ne!(unit.path(), &previous_path);
        assert_eq!(unit.replan_count(), 1);
    }

    #[test]
    fn test_following_tick_moves_to_path_point() {
        let mut context = ankara_context(UnitConfig::default(), 4);
        let mut unit = MobileUnit::new("IKA_001".to_string(), &mut context);
        let first = unit.path().get(0).unwrap();
        unit.tick(&mut context);
        assert_eq!(unit.cursor(), 1);
        assert_eq!(unit.get_position().point(), first);
    }

    #[test]
    fn test_key_location_start_targets_other_location() {
        let boundary = Boundary::rectangular(40.80, 41.30, 28.20, 29.65).unwrap();
        let key_locations = KeyLocationTable::new(
            vec![
                KeyLocation::new("Taksim_Meydani", GeoPoint::new(41.0369, 28.9760)),
                KeyLocation::new("Kadikoy_Rihtim", GeoPoint::new(40.9905, 29.0290)),
            ],
            &boundary,
        );
        let planner = DirectPlanner::new(boundary, DirectPlannerConfig::default());
        let config = UnitConfig {
            altitude_m: [10.0, 250.0],
            altitude_drift_m: 1.0,
            start: StartStrategy::KeyLocation { jitter_deg: 0.005 },
            key_target_probability: 1.0,
            ..UnitConfig::default()
        };
        let mut context = SimulationContext::new(boundary, key_locations, Box::new(planner), config, 9);
        for i in 0..20 {
            let unit = MobileUnit::new(format!("IKA_{:03}", i), &mut context);
            let start = unit.get_position().point();
            let nearest = context.key_locations.nearest(&start).unwrap();
            assert!(nearest.point().degree_distance(&start) < 0.01);
            assert_ne!(unit.target().name, nearest.name);
        }
    }

    #[test]
    fn test_initial_altitude_range_is_clamped_to_flight_range() {
        let config = UnitConfig {
            altitude_m: [10.0, 250.0],
            initial_altitude_m: Some([20.0, 150.0]),
            ..UnitConfig::default()
        };
        let mut context = ankara_context(config, 6);
        for i in 0..50 {
            let unit = MobileUnit::new(format!("IKA_{:03}", i), &mut context);
            let alt = unit.get_position().alt_m;
            assert!((20.0..=150.0).contains(&alt), "initial altitude {}", alt);
        }

        let config = UnitConfig {
            altitude_m: [10.0, 30.0],
            initial_altitude_m: Some([100.0, 200.0]),
            ..UnitConfig::default()
        };
        let mut context = ankara_context(config, 6);
        let unit = MobileUnit::new("IKA_001".to_string(), &mut context);
        assert_eq!(unit.get_position().alt_m, 30.0);
    }

    #[test]
    fn test_random_target_is_labelled_by_nearest_location() {
        let config = UnitConfig {
            key_target_probability: 0.0,
            random_target_suffix: "_Yakini".to_string(),
            ..UnitConfig::default()
        };
        let mut context = ankara_context(config, 5);
        let target = select_target(&mut context, None);
        let nearest = context.key_locations.nearest(&target.point).unwrap();
        assert_eq!(target.name, format!("{}_Yakini", nearest.name));
        assert!(context.boundary.contains(&target.point));
    }
}
